//! # Core Error Types
//!
//! Recoverable misuse of the World API. Invariant violations inside the
//! storage (out-of-range rows, allocation failure) are assertions, not
//! values, and never show up here.

use thiserror::Error;

use crate::ecs::{ComponentId, EntityId};

/// Errors that can occur when driving a [`World`](crate::World).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity was never allocated, or has been removed.
    #[error("entity {0:?} is not alive")]
    NoSuchEntity(EntityId),

    /// A typed operation used a component type the World never registered.
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// A raw operation named a component id the registry does not know.
    #[error("unknown component id {0}")]
    UnknownComponentId(u64),

    /// Raw bytes did not match the registered component size.
    #[error("component `{name}` expects {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Component diagnostic name.
        name: &'static str,
        /// Registered size.
        expected: usize,
        /// Size of the supplied buffer.
        actual: usize,
    },

    /// Raw byte access was attempted on a component that owns resources.
    #[error("component `{0}` is not plain data and cannot be written as raw bytes")]
    NotPlainData(&'static str),

    /// A size/alignment pair does not describe a valid layout.
    #[error("invalid component layout: size {size}, align {align}")]
    InvalidLayout {
        /// Requested size.
        size: usize,
        /// Requested alignment.
        align: usize,
    },

    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for World operations.
pub type EcsResult<T> = Result<T, EcsError>;
