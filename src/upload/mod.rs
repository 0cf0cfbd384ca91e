//! Photo Upload Module
//!
//! Implements the raw TCP upload protocol used by the lab cameras:
//! - Fixed 9-byte homework ID frame, validated against `[A-F0-9]{9}`
//! - Fixed-size BMP payload with a `BM` magic check
//! - Exactly one ASCII response line per connection
//!
//! Protocol Flow:
//! 1. Client connects and sends the homework ID
//! 2. Client sends the image bytes
//! 3. Server stores the image and answers `SUCCESS` or `ERROR: ...`
//! 4. Server closes the connection

pub mod server;
pub mod session;
pub mod types;

pub use server::ImageServer;
pub use session::UploadSession;
pub use types::*;
