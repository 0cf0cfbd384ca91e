//! HTML rendering module
//!
//! Renders the per-homework photo gallery page. All interpolated text goes
//! through `html_escape`; photo links are percent-encoded by the storage layer.

mod gallery;

pub use gallery::{format_capture_time, humanize_since, render_gallery};
