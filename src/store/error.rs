//! Error taxonomy for the resource store

use thiserror::Error;

use crate::layer::{LayerError, LayerId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Admission control refused a new image layer
    #[error("image layers are limited to {limit} per overlay")]
    ResourceLimitExceeded { limit: usize },

    /// Operation targeted an id that is not in the store
    #[error("layer '{0}' not found")]
    NotFound(LayerId),

    /// A draft carried an id that is already taken
    #[error("layer id '{0}' is already in use")]
    DuplicateId(LayerId),

    #[error("no built-in template named '{0}'")]
    UnknownTemplate(String),

    /// Draft or patch failed layer validation
    #[error("invalid layer: {0}")]
    InvalidLayer(#[from] LayerError),

    /// The persistence adapter rejected a read or write
    #[error("overlay storage failed: {0}")]
    Persistence(String),
}

impl StoreError {
    pub(crate) fn persistence(err: &anyhow::Error) -> Self {
        StoreError::Persistence(format!("{err:#}"))
    }
}
