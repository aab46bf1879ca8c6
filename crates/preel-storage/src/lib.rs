//! Cloudflare R2 media storage client.
//!
//! This crate provides:
//! - Presigned URL generation for bucket objects
//! - Music library track resolution for video generation

pub mod client;
pub mod error;
pub mod music;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use music::MusicLibrary;
