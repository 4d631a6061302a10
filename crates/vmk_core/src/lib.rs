//! VideoMaker Core - turns a single image into a narrated video.
//!
//! This crate holds the plan model, the workflow engine and its pipeline
//! steps, and the clients for the external services they call. The `videomaker`
//! binary is a thin command layer on top of it.

pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod services;
pub mod timeline;
pub mod workflow;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
