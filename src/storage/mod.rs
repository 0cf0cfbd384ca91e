//! Storage module for uploaded photos
//!
//! Photos live on the local filesystem as `<root>/<homework_id>/<timestamp>.bmp`.
//! The upload sessions write through [`PhotoStore::store`]; the gallery reads the
//! same tree back through [`PhotoStore::list`].

mod photo_store;
mod types;

pub use photo_store::PhotoStore;
pub use types::*;
