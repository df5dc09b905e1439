//! Libra Backend — implementations of the `libra-core` backend traits.
//!
//! This crate provides:
//! - [`SupabaseClient`]: GoTrue auth + PostgREST tables over HTTP
//! - [`MemoryBackend`]: in-process backend with latency and failure
//!   injection, used by tests and offline runs
//! - Error types ([`BackendError`])

mod error;
pub mod memory;
pub mod supabase;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use supabase::{SupabaseClient, SupabaseConfig};
