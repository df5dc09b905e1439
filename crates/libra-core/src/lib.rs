//! Libra Core — domain models, error types and backend traits shared by
//! every crate in the workspace.

pub mod backend;
pub mod error;
pub mod models;
