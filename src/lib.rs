// src/lib.rs
//! imgFS: a single-file image store with content dedup, lazily cached
//! thumbnail/small variants and a small HTTP/1.1 front end.

pub mod codec;
pub mod dedup;
pub mod error;
pub mod format;
pub mod gc;
pub mod http_message;
pub mod http_server;
pub mod imgfs;
pub mod list;
pub mod resize;
pub mod service;
pub mod web_assets;

#[cfg(test)]
mod testutil;

pub use error::{ImgfsError, Result};
pub use format::{Dimensions, ImgMetadata, ImgfsHeader, Resolution};
pub use imgfs::{ImgFs, OpenMode};
pub use list::ListMode;
