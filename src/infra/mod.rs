//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides configuration management and the error type shared by every
//! layer.

pub mod config;
pub mod error;
