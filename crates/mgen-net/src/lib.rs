//! Resilient outbound networking.
//!
//! This crate provides:
//! - A retry policy with exponential backoff and per-attempt deadlines
//! - A generic `with_retry` combinator shared by HTTP calls, downloads,
//!   and job-polling loops
//! - Transient-vs-fatal error classification for upstream failures
//! - A binary downloader whose deadline covers the whole body read

pub mod client;
pub mod download;
pub mod error;
pub mod retry;

pub use client::ResilientClient;
pub use download::download_bytes;
pub use error::{NetError, NetResult};
pub use retry::{with_retry, RetryPolicy};
