//! Field of view and lighting.
//!
//! Rays are cast from the viewpoint to every cell within range. Light falls
//! off with the square of the walked distance and reaches `min_light` at the
//! edge of range. Opaque cells stop a ray but are themselves lit, and an
//! edge pass lights opaque cells bordering the lit area that no ray reached,
//! so room corners do not show up as gaps.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;

use crate::constants::{DEFAULT_MIN_LIGHT, DEFAULT_SIGHT_RANGE};
use crate::grid::GridPos;

/// Grid accessor the engine reads opacity from and writes light into.
pub trait LightMap {
    /// `None` for a missing cell, which stops rays and is never lit
    fn see_through(&self, pos: GridPos) -> Option<bool>;
    /// Mark visible (and seen) with the given light
    fn light(&mut self, pos: GridPos, value: f32);
    /// Drop out of view; the seen flag is kept
    fn unsee(&mut self, pos: GridPos);
    /// Copy the cell's visibility onto whatever stands on it
    fn sync_occupant(&mut self, pos: GridPos);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Sight radius in cells
    pub range: i32,
    /// Light at exactly `range`
    pub min_light: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            range: DEFAULT_SIGHT_RANGE,
            min_light: DEFAULT_MIN_LIGHT,
        }
    }
}

/// Cells that changed state in one refresh, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub revealed: Vec<GridPos>,
    pub hidden: Vec<GridPos>,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityEngine {
    config: VisionConfig,
    visible: HashSet<GridPos>,
}

impl VisibilityEngine {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            visible: HashSet::new(),
        }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn is_visible(&self, pos: GridPos) -> bool {
        self.visible.contains(&pos)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Light at `distance` cells from the viewpoint.
    pub fn falloff(&self, distance: f32) -> f32 {
        if distance <= 0.0 {
            return 1.0;
        }
        let ratio = self.config.range as f32 / distance;
        (self.config.min_light * ratio * ratio).clamp(0.0, 1.0)
    }

    /// Queue the opaque cells around `pos` for the edge pass.
    fn queue_edges<M: LightMap>(map: &M, pos: GridPos, edges: &mut BTreeSet<GridPos>) {
        for n in pos.compass_neighbors() {
            if map.see_through(n) == Some(false) {
                edges.insert(n);
            }
        }
    }

    /// Record `value` at `pos`, keeping the brightest value seen this pass.
    /// Returns true the first time the cell is hit.
    fn hit(lit: &mut HashMap<GridPos, f32>, pos: GridPos, value: f32) -> bool {
        match lit.get_mut(&pos) {
            Some(current) => {
                *current = current.max(value);
                false
            }
            None => {
                lit.insert(pos, value);
                true
            }
        }
    }

    /// Recompute what can be seen from `viewpoint` and write it into `map`.
    pub fn refresh<M: LightMap>(&mut self, map: &mut M, viewpoint: GridPos) -> VisibilityDelta {
        let range = self.config.range.max(0);
        let range_sq = i64::from(range) * i64::from(range);
        let mut lit: HashMap<GridPos, f32> = HashMap::new();
        let mut edges: BTreeSet<GridPos> = BTreeSet::new();

        if map.see_through(viewpoint).is_some() {
            lit.insert(viewpoint, 1.0);
            Self::queue_edges(map, viewpoint, &mut edges);
        }

        for dx in -range..=range {
            for dy in -range..=range {
                let sq = i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy);
                if sq == 0 || sq > range_sq {
                    continue;
                }
                let length = (sq as f32).sqrt();
                let (ux, uy) = (dx as f32 / length, dy as f32 / length);
                for s in 1..=length.ceil() as i32 {
                    let step = s as f32;
                    let (cx, cy) = ((ux * step).round() as i32, (uy * step).round() as i32);
                    // the last sample can round past the range circle
                    if i64::from(cx) * i64::from(cx) + i64::from(cy) * i64::from(cy) > range_sq {
                        break;
                    }
                    let cell = viewpoint.offset(cx, cy);
                    let Some(clear) = map.see_through(cell) else {
                        break;
                    };
                    if Self::hit(&mut lit, cell, self.falloff(step)) && clear {
                        Self::queue_edges(map, cell, &mut edges);
                    }
                    if !clear {
                        break;
                    }
                }
            }
        }

        let mut edge_lit = 0;
        for pos in edges {
            if !lit.contains_key(&pos) {
                lit.insert(pos, self.falloff(viewpoint.distance(pos)));
                edge_lit += 1;
            }
        }

        let previous = std::mem::take(&mut self.visible);
        for (&pos, &value) in &lit {
            map.light(pos, value);
            self.visible.insert(pos);
        }

        let mut revealed: Vec<GridPos> = self.visible.difference(&previous).copied().collect();
        let mut hidden: Vec<GridPos> = previous.difference(&self.visible).copied().collect();
        revealed.sort();
        hidden.sort();
        for &pos in &hidden {
            map.unsee(pos);
        }
        for &pos in self.visible.iter().chain(hidden.iter()) {
            map.sync_occupant(pos);
        }

        trace!(
            viewpoint = %viewpoint,
            visible = self.visible.len(),
            edge_lit,
            revealed = revealed.len(),
            hidden = hidden.len(),
            "visibility refreshed"
        );
        VisibilityDelta { revealed, hidden }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNSEEN_LIGHT;
    use crate::generation::TileKind;
    use crate::world::{Entity, Tile, World};

    /// Floor rectangle `[0, w) x [0, h)` ringed by walls
    fn walled_room(w: i32, h: i32) -> World {
        let mut world = World::new();
        for x in -1..=w {
            for y in -1..=h {
                let inside = x >= 0 && y >= 0 && x < w && y < h;
                let kind = if inside { TileKind::Floor } else { TileKind::Wall };
                world.insert_tile(GridPos::new(x, y, 0), Tile::new(kind, None));
            }
        }
        world
    }

    fn light_at(world: &World, x: i32, y: i32) -> f32 {
        world.tile(GridPos::new(x, y, 0)).map_or(UNSEEN_LIGHT, |t| t.light)
    }

    #[test]
    fn test_viewpoint_fully_lit() {
        let mut world = walled_room(5, 5);
        let mut engine = VisibilityEngine::default();
        engine.refresh(&mut world, GridPos::new(2, 2, 0));
        assert_eq!(light_at(&world, 2, 2), 1.0);
    }

    #[test]
    fn test_falloff_reaches_min_light_at_range() {
        let engine = VisibilityEngine::new(VisionConfig {
            range: 8,
            min_light: 0.1,
        });
        assert!((engine.falloff(8.0) - 0.1).abs() < 1e-6);
        assert_eq!(engine.falloff(1.0), 1.0, "clamped");
        assert_eq!(engine.falloff(0.0), 1.0);
    }

    #[test]
    fn test_light_decreases_along_corridor() {
        let mut world = walled_room(12, 1);
        let mut engine = VisibilityEngine::new(VisionConfig {
            range: 8,
            min_light: 0.1,
        });
        engine.refresh(&mut world, GridPos::new(0, 0, 0));
        let mut last = light_at(&world, 0, 0);
        for x in 1..=8 {
            let here = light_at(&world, x, 0);
            assert!(here >= 0.0 && here <= last, "x={x}: {here} after {last}");
            last = here;
        }
        assert!((light_at(&world, 8, 0) - 0.1).abs() < 1e-6);
        assert_eq!(light_at(&world, 9, 0), UNSEEN_LIGHT, "out of range");
    }

    #[test]
    fn test_open_field_stays_inside_range_circle() {
        let mut world = walled_room(41, 41);
        let centre = GridPos::new(20, 20, 0);
        let mut engine = VisibilityEngine::new(VisionConfig {
            range: 8,
            min_light: 0.1,
        });
        engine.refresh(&mut world, centre);

        for (pos, tile) in world.tiles() {
            if tile.visible {
                assert!(centre.sq_distance(*pos) <= 64, "{pos} lit beyond range");
                assert!(tile.light >= 0.1 - 1e-6, "{pos}: {}", tile.light);
            }
        }
        for (x, y) in [(28, 20), (12, 20), (20, 28), (20, 12)] {
            assert!(world.can_see(GridPos::new(x, y, 0)), "rim cell {x},{y}");
        }
    }

    #[test]
    fn test_walls_block_but_are_lit() {
        let mut world = walled_room(9, 3);
        // partition at x = 4 with no opening
        for y in 0..3 {
            world.insert_tile(GridPos::new(4, y, 0), Tile::new(TileKind::Wall, None));
        }
        let mut engine = VisibilityEngine::default();
        engine.refresh(&mut world, GridPos::new(1, 1, 0));

        assert!(world.can_see(GridPos::new(4, 1, 0)), "facing wall is lit");
        for x in 5..9 {
            for y in 0..3 {
                assert!(!world.can_see(GridPos::new(x, y, 0)), "({x},{y}) seen through wall");
            }
        }
    }

    #[test]
    fn test_edge_pass_lights_room_corners() {
        let mut world = walled_room(5, 5);
        let mut engine = VisibilityEngine::default();
        engine.refresh(&mut world, GridPos::new(2, 2, 0));
        for corner in [(-1, -1), (5, -1), (-1, 5), (5, 5)] {
            assert!(
                world.can_see(GridPos::new(corner.0, corner.1, 0)),
                "corner {corner:?} dark"
            );
        }
    }

    #[test]
    fn test_unsee_keeps_seen_flag() {
        let mut world = walled_room(30, 1);
        let mut engine = VisibilityEngine::new(VisionConfig {
            range: 4,
            min_light: 0.1,
        });
        let near = GridPos::new(1, 0, 0);

        let first = engine.refresh(&mut world, GridPos::new(0, 0, 0));
        assert!(first.revealed.contains(&near));
        assert!(first.hidden.is_empty());

        let moved = engine.refresh(&mut world, GridPos::new(20, 0, 0));
        assert!(moved.hidden.contains(&near));
        let tile = world.tile(near).unwrap();
        assert!(!tile.visible);
        assert!(tile.seen);
        assert_eq!(tile.light, UNSEEN_LIGHT);

        let back = engine.refresh(&mut world, GridPos::new(0, 0, 0));
        assert!(back.revealed.contains(&near));
        assert!(world.can_see(near));
    }

    #[test]
    fn test_refresh_is_stable() {
        let mut world = walled_room(6, 6);
        let mut engine = VisibilityEngine::default();
        engine.refresh(&mut world, GridPos::new(3, 3, 0));
        let again = engine.refresh(&mut world, GridPos::new(3, 3, 0));
        assert_eq!(again, VisibilityDelta::default());
    }

    #[test]
    fn test_vision_blocking_entity_occludes_and_syncs() {
        let mut world = walled_room(10, 1);
        let mut wardrobe = Entity::critter("wardrobe");
        wardrobe.blocks_vision = true;
        let id = world.spawn(wardrobe, GridPos::new(3, 0, 0)).unwrap();

        let mut engine = VisibilityEngine::default();
        engine.refresh(&mut world, GridPos::new(0, 0, 0));
        assert!(world.can_see(GridPos::new(3, 0, 0)));
        assert!(!world.can_see(GridPos::new(5, 0, 0)));
        let seen = world.entity(id).unwrap();
        assert!(seen.visible);
        assert!(seen.light > 0.0);

        world.despawn(id);
        let chair = world.spawn(Entity::critter("chair"), GridPos::new(9, 0, 0)).unwrap();
        engine.refresh(&mut world, GridPos::new(0, 0, 0));
        assert!(world.can_see(GridPos::new(5, 0, 0)));
        assert!(!world.entity(chair).unwrap().visible, "beyond range");
    }

    #[test]
    fn test_missing_viewpoint_lights_nothing() {
        let mut world = walled_room(3, 3);
        let mut engine = VisibilityEngine::default();
        let delta = engine.refresh(&mut world, GridPos::new(50, 50, 0));
        assert!(delta.revealed.is_empty());
        assert_eq!(engine.visible_count(), 0);
    }
}
