//! Insight Forge library root.

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod services;

pub type Result<T> = error::Result<T>;
