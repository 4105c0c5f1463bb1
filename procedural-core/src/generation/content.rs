//! Phases 4 to 6: room classification, the lock chain and content placement.
//!
//! Deadends (rooms with at most one opening) become lock rooms. The chain is
//! built backwards from the exit: the stairs go behind the first lock, its key
//! behind the second, and so on, until the last key lands in an open room.
//! A deadend is only locked if everything outside it stays reachable from the
//! player start, so each key can be fetched before the door it opens.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::connect::ConnectionTracker;
use super::notes::pick_note;
use super::plan::{
    flood_fill, GeneratedLevel, LockColor, LockStage, Placement, Reward, RoomClass, RoomData,
    TileGrid, TileKind, TilePlan,
};
use super::themes::THEMES;
use super::LevelParams;
use crate::constants::{DEADEND_WALL_TOLERANCE, DECORATION_AREA_PER_OBJECT};
use crate::grid::GridPos;

/// Critter placed behind the last lock when the level carries a win condition
pub const GUARDIAN_KIND: &str = "guardian";
pub const BLOOD_DECORATION: &str = "blood";

/// Phase 4. Tag each room Deadend or Middle from how many of its walls were
/// opened, then promote random deadends until `min_middle` is met.
pub fn classify_rooms<R: Rng>(
    tiles: &TileGrid,
    rooms: &mut [RoomData],
    min_middle: usize,
    rng: &mut R,
) {
    for room in rooms.iter_mut() {
        let walls = room
            .perimeter()
            .filter(|p| tiles.get(p).map(|t| t.kind) == Some(TileKind::Wall))
            .count();
        let opened = room.expected_walls.saturating_sub(walls);
        room.class = if opened <= DEADEND_WALL_TOLERANCE {
            RoomClass::Deadend
        } else {
            RoomClass::Middle
        };
    }

    let mut middle = rooms.iter().filter(|r| !r.is_deadend()).count();
    while middle < min_middle {
        let deadends: Vec<usize> = rooms
            .iter()
            .filter(|r| r.is_deadend())
            .map(|r| r.id)
            .collect();
        let Some(&promoted) = deadends.choose(rng) else {
            break;
        };
        rooms[promoted].class = RoomClass::Middle;
        middle += 1;
    }
}

/// Mutable state shared by the placement steps
struct Layout {
    tiles: TileGrid,
    rooms: Vec<RoomData>,
    taken: HashSet<GridPos>,
    locked: HashSet<usize>,
    decorations: Vec<Placement>,
    items: Vec<Placement>,
    critters: Vec<Placement>,
    objects: Vec<Placement>,
}

impl Layout {
    fn free_spots(&self, room: usize) -> Vec<GridPos> {
        self.rooms[room]
            .spots
            .iter()
            .copied()
            .filter(|p| !self.taken.contains(p))
            .collect()
    }

    fn free_spot<R: Rng>(&self, room: usize, rng: &mut R) -> Option<GridPos> {
        self.free_spots(room).choose(rng).copied()
    }

    /// Free spot in any of `rooms`, trying them in random order
    fn free_spot_in<R: Rng>(&self, rooms: &[usize], rng: &mut R) -> Option<GridPos> {
        let mut order = rooms.to_vec();
        order.shuffle(rng);
        order.into_iter().find_map(|room| self.free_spot(room, rng))
    }

    fn open_rooms(&self) -> Vec<usize> {
        (0..self.rooms.len())
            .filter(|id| !self.locked.contains(id))
            .collect()
    }

    fn middle_rooms(&self) -> Vec<usize> {
        self.rooms
            .iter()
            .filter(|r| !r.is_deadend())
            .map(|r| r.id)
            .collect()
    }

    /// Turn every opening in the room's perimeter into a colored lock.
    fn lock_room(&mut self, room: usize, color: LockColor) -> Vec<GridPos> {
        let openings: Vec<GridPos> = self.rooms[room]
            .perimeter()
            .filter(|p| self.tiles.get(p).is_some_and(|t| t.kind.is_open()))
            .collect();
        for pos in &openings {
            if let Some(tile) = self.tiles.get_mut(pos) {
                tile.kind = TileKind::LockedDoor(color);
            }
        }
        self.rooms[room].doors = openings.clone();
        self.locked.insert(room);
        openings
    }

    /// Can `room` be locked without cutting anything else off from `start`?
    /// Earlier locks count as walls.
    fn lockable(&self, room: usize, start: GridPos) -> bool {
        let data = &self.rooms[room];
        let open = |_: GridPos, t: &TilePlan| t.kind.is_open() && t.needs_key().is_none();
        let with_room = flood_fill(&self.tiles, start, open);
        if !data.spots.iter().any(|p| with_room.contains(p)) {
            return false;
        }
        let without_room =
            flood_fill(&self.tiles, start, |p, t| open(p, t) && !data.is_perimeter(p));
        with_room
            .iter()
            .all(|p| data.contains(*p) || without_room.contains(p))
    }

    fn place_reward(&mut self, reward: Reward, pos: GridPos) {
        match reward {
            Reward::Stairs => {
                if let Some(tile) = self.tiles.get_mut(&pos) {
                    tile.kind = TileKind::Stairs;
                }
            }
            Reward::Guardian => self.critters.push(Placement::new(pos, GUARDIAN_KIND)),
            Reward::Key(color) => self.items.push(Placement::new(pos, color.key_name())),
        }
        self.taken.insert(pos);
    }

    /// Phase 5. Returns the stages in build order and where the outermost
    /// reward went.
    fn build_lock_chain<R: Rng>(
        &mut self,
        final_reward: Reward,
        player_start: GridPos,
        rng: &mut R,
    ) -> (Vec<LockStage>, (Reward, GridPos)) {
        let mut colors = LockColor::ALL.to_vec();
        colors.shuffle(rng);
        let mut deadends: Vec<usize> = self
            .rooms
            .iter()
            .filter(|r| r.is_deadend())
            .map(|r| r.id)
            .collect();

        let mut stages = Vec::new();
        let mut reward = final_reward;
        while !deadends.is_empty() && !colors.is_empty() {
            let room = deadends.swap_remove(rng.gen_range(0..deadends.len()));
            if !self.lockable(room, player_start) {
                debug!(room, "deadend would cut the level, left open");
                continue;
            }
            let Some(spot) = self.free_spot(room, rng) else {
                continue;
            };
            let Some(color) = colors.pop() else {
                break;
            };
            let doors = self.lock_room(room, color);
            self.place_reward(reward, spot);
            debug!(room, %color, ?reward, doors = doors.len(), "room locked");
            stages.push(LockStage {
                color,
                room,
                doors,
                guarded: reward,
                guarded_pos: spot,
            });
            reward = Reward::Key(color);
        }

        let middle = self.middle_rooms();
        let open = self.open_rooms();
        let spot = self
            .free_spot_in(&middle, rng)
            .or_else(|| self.free_spot_in(&open, rng))
            .or_else(|| self.free_reachable_floor(player_start, rng));
        let (reward, spot) = match spot {
            Some(spot) => (reward, spot),
            None => {
                // nothing left to stand on but the start cell
                warn!(?reward, pos = %player_start, "no free cell for reward, stairs at start");
                (Reward::Stairs, player_start)
            }
        };
        self.place_reward(reward, spot);
        (stages, (reward, spot))
    }

    /// Untaken floor reachable from `start` without keys, corridors included
    fn free_reachable_floor<R: Rng>(&self, start: GridPos, rng: &mut R) -> Option<GridPos> {
        let reach = flood_fill(&self.tiles, start, |_, t| {
            t.kind.is_open() && t.needs_key().is_none()
        });
        let mut cells: Vec<GridPos> = reach
            .into_iter()
            .filter(|p| !self.taken.contains(p))
            .filter(|p| self.tiles.get(p).is_some_and(|t| t.kind == TileKind::Floor))
            .collect();
        cells.sort();
        cells.choose(rng).copied()
    }

    fn place_common_items<R: Rng>(&mut self, params: &LevelParams, rng: &mut R) {
        let open = self.open_rooms();
        for _ in 0..params.common_item_count {
            let Some(name) = params.common_items.choose(rng).cloned() else {
                return;
            };
            let Some(spot) = self.free_spot_in(&open, rng) else {
                return;
            };
            self.items.push(Placement::new(spot, name));
            self.taken.insert(spot);
        }
    }

    /// One bonus item per unlocked deadend, cycling a shuffled pool.
    fn place_bonus_items<R: Rng>(&mut self, params: &LevelParams, rng: &mut R) {
        let deadends: Vec<usize> = self
            .rooms
            .iter()
            .filter(|r| r.is_deadend() && !self.locked.contains(&r.id))
            .map(|r| r.id)
            .collect();
        let mut pool: Vec<String> = Vec::new();
        for room in deadends {
            if pool.is_empty() {
                pool = params.bonus_items.clone();
                pool.shuffle(rng);
            }
            let Some(name) = pool.pop() else {
                return;
            };
            if let Some(spot) = self.free_spot(room, rng) {
                self.items.push(Placement::new(spot, name));
                self.taken.insert(spot);
            }
        }
    }

    fn apply_themes<R: Rng>(&mut self, rng: &mut R) {
        for id in 0..self.rooms.len() {
            let theme_id = rng.gen_range(0..THEMES.len());
            let theme = &THEMES[theme_id];
            self.rooms[id].theme = Some(theme_id);
            let (min, max) = (self.rooms[id].min, self.rooms[id].max);
            for x in min.x..=max.x {
                for y in min.y..=max.y {
                    if let Some(tile) = self.tiles.get_mut(&GridPos::new(x, y, min.z)) {
                        tile.theme = Some(theme_id);
                    }
                }
            }

            let count = self.rooms[id].spots.len() / DECORATION_AREA_PER_OBJECT;
            for _ in 0..count {
                let Some(&name) = theme.decorations.choose(rng) else {
                    break;
                };
                let Some(spot) = self.free_spot(id, rng) else {
                    break;
                };
                self.objects.push(Placement::new(spot, name));
                self.taken.insert(spot);
            }
        }
    }

    fn place_blood<R: Rng>(&mut self, chance: f32, rng: &mut R) {
        let mut floors: Vec<GridPos> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.kind == TileKind::Floor)
            .map(|(p, _)| *p)
            .collect();
        floors.sort();
        for pos in floors {
            if rng.gen::<f32>() < chance {
                self.decorations.push(Placement::new(pos, BLOOD_DECORATION));
            }
        }
    }

    fn place_boss<R: Rng>(&mut self, kind: &str, start_room: usize, rng: &mut R) {
        let middle = self.middle_rooms();
        let away: Vec<usize> = middle.iter().copied().filter(|&r| r != start_room).collect();
        let spot = self
            .free_spot_in(&away, rng)
            .or_else(|| self.free_spot_in(&middle, rng));
        match spot {
            Some(spot) => {
                self.critters.push(Placement::new(spot, kind));
                self.taken.insert(spot);
            }
            None => debug!("no free spot for the boss"),
        }
    }

    /// Weighted monsters on open floor outside the start room.
    fn place_monsters<R: Rng>(&mut self, params: &LevelParams, start_room: usize, rng: &mut R) {
        if params.monster_count == 0 {
            return;
        }
        let weights: Vec<u32> = params.monster_pool.iter().map(|k| k.weight).collect();
        let Ok(dist) = WeightedIndex::new(&weights) else {
            debug!("empty monster pool");
            return;
        };

        let start = &self.rooms[start_room];
        let mut candidates: Vec<GridPos> = self
            .tiles
            .iter()
            .filter(|(p, t)| {
                t.kind == TileKind::Floor && !self.taken.contains(*p) && !start.contains(**p)
            })
            .map(|(p, _)| *p)
            .collect();
        candidates.sort();
        candidates.shuffle(rng);

        let placed = candidates.len().min(params.monster_count);
        for pos in candidates.into_iter().take(placed) {
            let kind = &params.monster_pool[dist.sample(rng)];
            self.critters.push(Placement::new(pos, kind.name.clone()));
            self.taken.insert(pos);
        }
        if placed < params.monster_count {
            debug!(placed, wanted = params.monster_count, "ran out of monster spots");
        }
    }
}

/// Phases 4 to 6 on a connected, pruned plan.
pub fn populate<R: Rng>(
    params: &LevelParams,
    tiles: TileGrid,
    mut rooms: Vec<RoomData>,
    connections: ConnectionTracker,
    rng: &mut R,
) -> GeneratedLevel {
    classify_rooms(&tiles, &mut rooms, params.min_middle_rooms, rng);

    let mut layout = Layout {
        tiles,
        rooms,
        taken: HashSet::new(),
        locked: HashSet::new(),
        decorations: Vec::new(),
        items: Vec::new(),
        critters: Vec::new(),
        objects: Vec::new(),
    };

    let middle = layout.middle_rooms();
    let start_room = middle.choose(rng).copied().unwrap_or(0);
    let player_start = layout
        .free_spot(start_room, rng)
        .unwrap_or(layout.rooms[start_room].center);
    layout.taken.insert(player_start);

    let final_reward = if params.include_win_condition {
        Reward::Guardian
    } else {
        Reward::Stairs
    };
    let (lock_chain, free_reward) = layout.build_lock_chain(final_reward, player_start, rng);

    if !params.no_boss {
        layout.place_boss(&params.boss_kind, start_room, rng);
    }
    layout.place_bonus_items(params, rng);
    layout.place_common_items(params, rng);
    layout.apply_themes(rng);

    let open = layout.open_rooms();
    if let Some(note) = pick_note(params.level, rng) {
        if let Some(spot) = layout.free_spot_in(&open, rng) {
            layout.objects.push(Placement::new(spot, note.object_name()));
            layout.taken.insert(spot);
        }
    }

    layout.place_monsters(params, start_room, rng);
    layout.place_blood(params.blood_chance, rng);

    GeneratedLevel {
        seed: 0,
        level: params.level,
        tiles: layout.tiles,
        rooms: layout.rooms,
        connections,
        player_start,
        decorations: layout.decorations,
        items: layout.items,
        critters: layout.critters,
        objects: layout.objects,
        lock_chain,
        free_reward: Some(free_reward),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::generate_level;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::collections::HashMap;

    fn square_room(id: usize, x: i32, size: i32) -> (TileGrid, RoomData) {
        let mut tiles = TileGrid::new();
        let mut spots = Vec::new();
        for i in 0..size {
            for j in 0..size {
                let pos = GridPos::new(x + i, j, 0);
                let edge = i == 0 || j == 0 || i == size - 1 || j == size - 1;
                let kind = if edge { TileKind::Wall } else { TileKind::Floor };
                if !edge {
                    spots.push(pos);
                }
                tiles.insert(pos, TilePlan::new(kind, Some(id)));
            }
        }
        let room = RoomData {
            id,
            center: GridPos::new(x + size / 2, size / 2, 0),
            min: GridPos::new(x, 0, 0),
            max: GridPos::new(x + size - 1, size - 1, 0),
            expected_walls: (4 * size - 4) as usize,
            expected_floors: spots.len(),
            doors: vec![],
            spots,
            theme: None,
            class: RoomClass::Middle,
        };
        (tiles, room)
    }

    fn open_wall(tiles: &mut TileGrid, pos: GridPos) {
        if let Some(tile) = tiles.get_mut(&pos) {
            tile.kind = TileKind::Door;
        }
    }

    #[test]
    fn test_classify_by_opened_walls() {
        let (mut tiles, mut room) = square_room(0, 0, 5);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);

        classify_rooms(&tiles, std::slice::from_mut(&mut room), 0, &mut rng);
        assert_eq!(room.class, RoomClass::Deadend);

        open_wall(&mut tiles, GridPos::new(0, 2, 0));
        classify_rooms(&tiles, std::slice::from_mut(&mut room), 0, &mut rng);
        assert_eq!(room.class, RoomClass::Deadend, "one opening is still a deadend");

        open_wall(&mut tiles, GridPos::new(4, 2, 0));
        classify_rooms(&tiles, std::slice::from_mut(&mut room), 0, &mut rng);
        assert_eq!(room.class, RoomClass::Middle);
    }

    #[test]
    fn test_classify_promotes_to_minimum() {
        let (tiles_a, a) = square_room(0, 0, 5);
        let (tiles_b, b) = square_room(1, 10, 5);
        let tiles: TileGrid = tiles_a.into_iter().chain(tiles_b).collect();
        let mut rooms = vec![a, b];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        classify_rooms(&tiles, &mut rooms, 1, &mut rng);
        assert_eq!(rooms.iter().filter(|r| !r.is_deadend()).count(), 1);
        classify_rooms(&tiles, &mut rooms, 5, &mut rng);
        assert!(rooms.iter().all(|r| !r.is_deadend()));
    }

    #[test]
    fn test_lock_chain_keys_sit_behind_earlier_locks() {
        for seed in 0..20 {
            let level = generate_level(&LevelParams::default(), seed);
            for (i, stage) in level.lock_chain.iter().enumerate() {
                let room = &level.rooms[stage.room];
                assert!(room.is_deadend());
                assert!(room.spots.contains(&stage.guarded_pos));
                assert!(!stage.doors.is_empty());
                for door in &stage.doors {
                    assert_eq!(level.tiles[door].kind, TileKind::LockedDoor(stage.color));
                }
                match (i, stage.guarded) {
                    (0, Reward::Stairs) => {
                        assert_eq!(level.tiles[&stage.guarded_pos].kind, TileKind::Stairs)
                    }
                    (0, other) => panic!("seed {seed}: chain starts with {other:?}"),
                    (_, Reward::Key(color)) => {
                        assert_eq!(color, level.lock_chain[i - 1].color)
                    }
                    (_, other) => panic!("seed {seed}: stage {i} guards {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_free_reward_is_last_key_in_open_room() {
        for seed in 0..10 {
            let level = generate_level(&LevelParams::default(), seed);
            let Some((reward, pos)) = level.free_reward else {
                panic!("seed {seed}: no free reward");
            };
            match level.lock_chain.last() {
                Some(stage) => assert_eq!(reward, Reward::Key(stage.color)),
                None => assert_eq!(reward, Reward::Stairs),
            }
            let owner = level.rooms.iter().find(|r| r.spots.contains(&pos));
            assert!(owner.is_some_and(|r| !r.is_deadend()), "seed {seed}");
        }
    }

    #[test]
    fn test_win_condition_places_guardian() {
        let params = LevelParams {
            include_win_condition: true,
            ..LevelParams::default()
        };
        let level = generate_level(&params, 4);
        let guardians = level
            .critters
            .iter()
            .filter(|c| c.name == GUARDIAN_KIND)
            .count();
        assert_eq!(guardians, 1);
        assert!(level.stairs().is_none());
    }

    #[test]
    fn test_no_shared_cells() {
        for seed in 0..15 {
            let level = generate_level(&LevelParams::default(), seed);
            let mut seen: HashMap<GridPos, &str> = HashMap::new();
            seen.insert(level.player_start, "player");
            for p in level.occupying_placements() {
                if let Some(prev) = seen.insert(p.pos, &p.name) {
                    panic!("seed {seed}: {} and {prev} share {}", p.name, p.pos);
                }
            }
        }
    }

    #[test]
    fn test_boss_and_monsters() {
        let params = LevelParams::default();
        let level = generate_level(&params, 11);
        let bosses = level
            .critters
            .iter()
            .filter(|c| c.name == params.boss_kind)
            .count();
        assert_eq!(bosses, 1);

        let start_room = level
            .rooms
            .iter()
            .find(|r| r.spots.contains(&level.player_start))
            .expect("player starts in a room");
        let pool: Vec<&str> = params.monster_pool.iter().map(|k| k.name.as_str()).collect();
        let monsters: Vec<&Placement> = level
            .critters
            .iter()
            .filter(|c| pool.contains(&c.name.as_str()))
            .collect();
        assert_eq!(monsters.len(), params.monster_count);
        assert!(monsters.iter().all(|m| !start_room.contains(m.pos)));
    }

    #[test]
    fn test_cramped_win_level_keeps_an_exit() {
        use crate::generation::audit::{audit_level, exit_position};
        use crate::world::{EntityKind, World};

        for max in [3, 4, 5] {
            let params = LevelParams {
                target_room_count: 1,
                min_room_size: 3,
                max_room_size: max,
                include_win_condition: true,
                ..LevelParams::default()
            };
            for seed in 0..20 {
                let level = generate_level(&params, seed);
                let audit = audit_level(&level);
                assert_eq!(audit.overlapping_placements, 0, "seed {seed} max {max}");
                assert!(audit.solvable, "seed {seed} max {max}");

                let world = World::from_level(&level);
                let spawned = world
                    .entities()
                    .filter(|(_, e)| e.kind == EntityKind::Critter && e.is_placed())
                    .count();
                assert_eq!(spawned, level.critters.len(), "seed {seed} max {max}");

                let exit = exit_position(&level).expect("level has an exit");
                let guardian = level.critters.iter().any(|c| c.name == GUARDIAN_KIND);
                assert!(guardian || level.tile(exit).is_some_and(|t| t.kind == TileKind::Stairs));
            }
        }
    }

    #[test]
    fn test_themes_assigned() {
        let level = generate_level(&LevelParams::default(), 6);
        for room in &level.rooms {
            let theme = room.theme.expect("every room is themed");
            assert_eq!(level.tiles[&room.center].theme, Some(theme));
        }
    }
}
