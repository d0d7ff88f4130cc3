//! Durable blob storage for generated media.
//!
//! This crate provides:
//! - The `BlobStore` port (upload bytes under a key, get a durable URL)
//! - A Cloudflare R2 implementation over the S3 API
//! - The `media/{YYYYMMDD}/{taskId}/{filename}` key convention
//! - An in-memory store for tests

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{media_key, BlobStore, MemoryBlobStore};
