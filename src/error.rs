//! Errors raised while validating configuration and page geometry.
//!
//! Runtime absence (missing pool, missing component, stale id) is never an
//! error: it is reported through `bool` and `Option`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{store} page length {len} must be a non-zero power of two no larger than {max}")]
    InvalidPageLength {
        store: &'static str,
        len: usize,
        max: usize,
    },

    #[error("a page of {len} elements of {element_size} bytes exceeds the addressable size")]
    PageTooLarge { len: usize, element_size: usize },

    #[error("zero-sized type `{type_name}` cannot back a paged store")]
    ZeroSized { type_name: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
