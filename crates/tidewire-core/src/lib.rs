//! # tidewire-core
//!
//! Core crate for Tidewire. Contains the client configuration schemas and
//! loader, and the unified error system shared by every other crate.
//!
//! This crate has **no** internal dependencies on other Tidewire crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::ClientConfig;
pub use error::AppError;
pub use result::AppResult;
