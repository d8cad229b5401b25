//! Page geometry and registry construction settings.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest page length accepted for either store.
pub const MAX_PAGE_LEN: usize = 1 << 20;

/// Default number of entries in a sparse index page. Sparse pages are
/// mostly sentinels, so they are kept small relative to the id space.
pub const DEFAULT_SPARSE_PAGE_LEN: usize = 4096;

/// Default number of components in a dense value page.
pub const DEFAULT_DENSE_PAGE_LEN: usize = 1024;

/// Page lengths used by every pool a registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    pub sparse_page_len: usize,
    pub dense_page_len: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sparse_page_len: DEFAULT_SPARSE_PAGE_LEN,
            dense_page_len: DEFAULT_DENSE_PAGE_LEN,
        }
    }
}

impl PoolConfig {
    pub fn sparse_page_len(mut self, len: usize) -> Self {
        self.sparse_page_len = len;
        self
    }

    pub fn dense_page_len(mut self, len: usize) -> Self {
        self.dense_page_len = len;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_page_len("sparse", self.sparse_page_len)?;
        check_page_len("dense", self.dense_page_len)
    }
}

/// Settings for [`Registry::with_config`](crate::registry::Registry::with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    pub pool: PoolConfig,
    /// Id slots reserved up front.
    pub entity_capacity: usize,
}

impl RegistryConfig {
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

pub(crate) fn check_page_len(store: &'static str, len: usize) -> Result<()> {
    if len == 0 || !len.is_power_of_two() || len > MAX_PAGE_LEN {
        return Err(Error::InvalidPageLength {
            store,
            len,
            max: MAX_PAGE_LEN,
        });
    }
    Ok(())
}
