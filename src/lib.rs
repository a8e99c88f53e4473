//! Parasite Simulation Library
//!
//! Real-time 2D movement and collision for a single controllable body in a
//! bounded arena, with a uniform-grid broad phase and a queued, reentrant-safe
//! event bus for decoupled subsystems.
//!
//! # Features
//!
//! - `persistence` - JSON file store for meta-progression (enabled by default)

pub mod config;
pub mod game;
pub mod persistence;
pub mod util;
