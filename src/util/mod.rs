//! Internal utilities for the space engine.
//!
//! Kept minimal and dependency-free so the engine stays deterministic.

pub mod arena;

pub use arena::{Arena, ArenaIndex};
