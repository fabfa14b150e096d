//! Configuration types for the conduit request pipeline.
//!
//! This crate provides the retry, polling and transport settings read from
//! `.conduit/config.yaml` files and `CONDUIT_*` environment variables.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
