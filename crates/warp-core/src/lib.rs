//! warp-core: Shared types, errors, configuration and collaborator interfaces
//!
//! This crate provides the foundational types used across the workspace.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod types;

pub use config::*;
pub use errors::*;
pub use interfaces::*;
pub use types::*;
