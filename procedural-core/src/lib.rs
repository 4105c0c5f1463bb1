//! Delve - Procedural Core Library
//!
//! Spatial simulation for a tile-based, turn-based dungeon crawler:
//! - Grid pathfinding (weighted best-first search with pluggable closures)
//! - Level generation (dropped rooms, carved corridors, key/lock chains)
//! - Visibility (ray-cast field of view with light falloff)
//! - Runtime world (tile store + entity arena)
//! - Config loading, tracing setup, multi-seed level survey
//! - ASCII visualization for diagnostics

pub mod config;
pub mod constants;
pub mod generation;
pub mod grid;
pub mod logging;
pub mod pathfinding;
pub mod survey;
pub mod visibility;
pub mod visualization;
pub mod world;
