//! # Waypoint App
//!
//! Composition root and binary entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Component health checks
//! - The headless `waypoint` binary
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Owns startup re-hydration and graceful shutdown

pub mod context;
pub mod utils;

// Re-export for convenience
pub use context::*;
