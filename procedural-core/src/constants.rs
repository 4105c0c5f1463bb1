//! Centralized tuning constants for the delve procedural core.
//!
//! Per-module tables (themes, notes, difficulty factors) remain in their
//! respective modules as the single source of truth.

// =====================================================
// Pathfinding
// =====================================================

/// Cost multiplier for a diagonal step (axis-aligned steps cost 1.0)
pub const DIAGONAL_STEP_COST: f32 = 1.2;

/// Expansion cap for gameplay path requests
pub const DEFAULT_MAX_EXPANSIONS: usize = 500;

/// Expansion cap for corridor carving during generation
pub const CARVE_MAX_EXPANSIONS: usize = 4_000;

/// Edge cost multiplier for stepping into a cell held by another entity
pub const OCCUPIED_STEP_COST: f32 = 4.0;

// =====================================================
// Level Generation
// =====================================================

/// Empty ring kept around every dropped room
pub const ROOM_CLEARANCE: i32 = 1;

/// Smallest room side that still leaves one interior cell
pub const MIN_ROOM_SIDE: i32 = 3;

/// Edge cost for cutting a wall of one of the two rooms being joined
pub const PAIR_WALL_CUT_COST: f32 = 3.0;

/// Edge cost for cutting a wall of an unrelated room
pub const FOREIGN_WALL_CUT_COST: f32 = 25.0;

/// A room with at most this many walls opened is a deadend
pub const DEADEND_WALL_TOLERANCE: usize = 1;

/// Middle rooms guaranteed before deadends are handed out as lock rooms
pub const DEFAULT_MIN_MIDDLE_ROOMS: usize = 2;

/// Chance for any floor cell to get a blood decoration
pub const DEFAULT_BLOOD_CHANCE: f32 = 0.04;

/// Interior cells per themed decoration object
pub const DECORATION_AREA_PER_OBJECT: usize = 10;

/// Extra connection rounds after the first pass, before forcing L-corridors
pub const PATHFINDER_RETRY_ROUNDS: usize = 2;

/// Longest possible lock chain, one lock per color
pub const MAX_LOCKS: usize = 4;

// =====================================================
// Visibility
// =====================================================

/// Light value of any tile that is not currently visible
pub const UNSEEN_LIGHT: f32 = -1.0;

/// Default sight range in cells
pub const DEFAULT_SIGHT_RANGE: i32 = 8;

/// Largest sight range a config may ask for
pub const MAX_SIGHT_RANGE: i32 = 256;

/// Light intensity reached exactly at the sight range
pub const DEFAULT_MIN_LIGHT: f32 = 0.1;
