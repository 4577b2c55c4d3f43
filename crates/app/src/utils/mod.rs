//! Shared helpers for the composition root

pub mod health;
