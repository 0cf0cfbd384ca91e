//! Lab Photo Server Library
//!
//! Exposes the upload protocol, storage, and gallery pieces so the binary in
//! main.rs stays a thin wiring layer.
//!
//! # Modules
//!
//! - `upload`: raw TCP upload protocol (sessions and the accept loop)
//! - `storage`: on-disk photo layout, shared by uploads and the gallery
//! - `routes`: gallery web server
//! - `config`, `telemetry`, `error`, `state`: process plumbing

pub mod config;
pub mod error;
pub mod html;
pub mod routes;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod upload;
