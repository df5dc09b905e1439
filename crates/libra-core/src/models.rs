//! Domain models for Libra.
//!
//! These are the core types shared across all crates.

pub mod credentials;
pub mod event;
pub mod profile;
pub mod role;
pub mod session;
