//! Core domain types shared across the stager crates.
//!
//! This crate defines the canonical data model used by the other crates:
//! - Owner identities that key per-owner staging areas
//! - Addresses of deployed packages living at addressable objects
//! - Configuration for staging limits, deployment sinks and clients

pub mod address;
pub mod config;
pub mod error;
pub mod owner;

pub use address::ObjectAddress;
pub use error::{Error, Result};
pub use owner::OwnerId;

/// Default per-call payload budget for clients: 60 KiB.
pub const DEFAULT_MAX_CALL_BYTES: usize = 60 * 1024;

/// Default cap on bytes buffered by one staging area: 64 MiB.
pub const DEFAULT_MAX_STAGED_BYTES: u64 = 64 * 1024 * 1024;

/// Default cap on distinct chunk indices in one staging area.
pub const DEFAULT_MAX_CHUNK_INDICES: u32 = 4096;
