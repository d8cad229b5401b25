extern crate self as secs;

pub mod arena;
pub mod component;
pub mod config;
pub mod ecs;
pub mod entity;
pub mod error;
pub mod ids;
pub mod pool;
pub mod registry;
pub mod signal;
pub mod sparse_set;
pub mod storage;
pub mod view;

pub use component::{Bundle, Component, ComponentSet, DeletionPolicy};
pub use entity::Entity;
pub use error::{Error, Result};
pub use registry::Registry;
pub use secs_macros::Component;
