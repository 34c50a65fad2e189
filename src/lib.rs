//! Sports broadcast overlay: layer store, persistence and cross-surface sync
//!
//! The editor owns a [`store::ResourceStore`]. Saving persists the layer
//! list and publishes it on a [`sync::SyncChannel`]; [`viewer::Viewer`]
//! surfaces follow that channel and render through [`render`].

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod constants;
pub mod embed;
pub mod layer;
pub mod persistence;
pub mod render;
pub mod selection;
pub mod session;
pub mod store;
pub mod sync;
pub mod templates;
pub mod upload;
pub mod viewer;
