//! Post-hoc checks over a generated level.
//!
//! The generator never validates its own output; these checks back the test
//! suite and the survey runner.

use serde::Serialize;
use std::collections::BTreeSet;

use super::content::GUARDIAN_KIND;
use super::plan::{flood_fill, GeneratedLevel, LockColor};
use crate::grid::GridPos;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAudit {
    /// Room graph reaches every room from room 0
    pub rooms_connected: bool,
    /// Every open cell reachable from the player start with all locks open
    pub tiles_connected: bool,
    /// Orthogonally adjacent door pairs
    pub adjacent_doors: usize,
    /// The exit can be reached by collecting keys in some order
    pub solvable: bool,
    /// Keys collected along the way, in pickup order
    pub key_order: Vec<LockColor>,
    /// Some placement sits on the player start or shares a cell
    pub overlapping_placements: usize,
    pub open_cells: usize,
}

impl LevelAudit {
    pub fn is_clean(&self) -> bool {
        self.rooms_connected
            && self.tiles_connected
            && self.adjacent_doors == 0
            && self.solvable
            && self.overlapping_placements == 0
    }
}

/// Where the run ends: the guardian when there is one, else the stairs
pub fn exit_position(level: &GeneratedLevel) -> Option<GridPos> {
    level
        .critters
        .iter()
        .find(|c| c.name == GUARDIAN_KIND)
        .map(|c| c.pos)
        .or_else(|| level.stairs())
}

/// Walk from the start, picking up every reachable key, until the exit is
/// reached or no new key turns up. Returns the keys in pickup order, or
/// `None` if the exit stays out of reach.
pub fn solve(level: &GeneratedLevel) -> Option<Vec<LockColor>> {
    let exit = exit_position(level)?;
    let mut held: BTreeSet<LockColor> = BTreeSet::new();
    let mut order = Vec::new();

    loop {
        let reached = flood_fill(&level.tiles, level.player_start, |_, t| {
            t.kind.is_open() && t.needs_key().map_or(true, |c| held.contains(&c))
        });
        if reached.contains(&exit) {
            return Some(order);
        }
        let mut found: Vec<LockColor> = level
            .items
            .iter()
            .filter(|i| reached.contains(&i.pos))
            .filter_map(|i| LockColor::from_key_name(&i.name))
            .filter(|c| !held.contains(c))
            .collect();
        if found.is_empty() {
            return None;
        }
        found.sort();
        for color in found {
            held.insert(color);
            order.push(color);
        }
    }
}

pub fn count_adjacent_doors(level: &GeneratedLevel) -> usize {
    let mut pairs = 0;
    for (pos, tile) in &level.tiles {
        if !tile.kind.is_door() {
            continue;
        }
        // right and down only, so each pair counts once
        for next in [pos.offset(1, 0), pos.offset(0, 1)] {
            if level.tile(next).is_some_and(|t| t.kind.is_door()) {
                pairs += 1;
            }
        }
    }
    pairs
}

fn count_overlaps(level: &GeneratedLevel) -> usize {
    let mut cells = BTreeSet::from([level.player_start]);
    level
        .occupying_placements()
        .filter(|p| !cells.insert(p.pos))
        .count()
}

pub fn audit_level(level: &GeneratedLevel) -> LevelAudit {
    let reach = flood_fill(&level.tiles, level.player_start, |_, t| t.kind.is_open());
    let open_cells = level.tiles.values().filter(|t| t.kind.is_open()).count();
    let solution = solve(level);

    LevelAudit {
        rooms_connected: level.connections.is_fully_connected(),
        tiles_connected: reach.len() == open_cells,
        adjacent_doors: count_adjacent_doors(level),
        solvable: solution.is_some(),
        key_order: solution.unwrap_or_default(),
        overlapping_placements: count_overlaps(level),
        open_cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{generate_level, LevelParams, TileKind};

    #[test]
    fn test_default_levels_are_clean() {
        for seed in 0..25 {
            let level = generate_level(&LevelParams::default(), seed);
            let audit = audit_level(&level);
            assert!(audit.is_clean(), "seed {seed}: {audit:?}");
        }
    }

    #[test]
    fn test_key_order_follows_chain_backwards() {
        for seed in 0..10 {
            let level = generate_level(&LevelParams::default(), seed);
            let order = solve(&level).expect("solvable");
            let chain: Vec<LockColor> = level.lock_chain.iter().rev().map(|s| s.color).collect();
            assert_eq!(order, chain, "seed {seed}");
        }
    }

    #[test]
    fn test_unsolvable_when_key_missing() {
        let mut level = generate_level(&LevelParams::default(), 3);
        if level.lock_chain.is_empty() {
            return;
        }
        level
            .items
            .retain(|i| LockColor::from_key_name(&i.name).is_none());
        assert!(solve(&level).is_none());
        assert!(!audit_level(&level).solvable);
    }

    #[test]
    fn test_adjacent_door_count() {
        let mut level = generate_level(&LevelParams::default(), 1);
        assert_eq!(count_adjacent_doors(&level), 0);
        let start = level.player_start;
        for pos in [start, start.offset(1, 0)] {
            if let Some(tile) = level.tiles.get_mut(&pos) {
                tile.kind = TileKind::Door;
            }
        }
        assert!(count_adjacent_doors(&level) >= 1);
    }
}
