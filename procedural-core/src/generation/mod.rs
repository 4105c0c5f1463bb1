//! Level generation.
//!
//! A level is built in fixed phases, all driven by one seeded RNG:
//! rooms are dropped ([`rooms`]), connected and pruned ([`connect`]), then
//! classified, locked and populated ([`content`]). The result is a
//! [`GeneratedLevel`] plan the runtime [`crate::world::World`] is built from.

pub mod audit;
pub mod connect;
pub mod content;
pub mod notes;
pub mod plan;
pub mod rooms;
pub mod themes;

pub use connect::ConnectionTracker;
pub use plan::{
    GeneratedLevel, LockColor, LockStage, Placement, Reward, RoomClass, RoomData, TileGrid,
    TileKind, TilePlan,
};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, info};

use crate::constants::{DEFAULT_BLOOD_CHANCE, DEFAULT_MIN_MIDDLE_ROOMS, MIN_ROOM_SIDE};
use crate::logging::TimingSpan;

/// Monster kind with a relative spawn weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKind {
    pub name: String,
    pub weight: u32,
}

impl WeightedKind {
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Everything the generator needs to know about one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelParams {
    /// Level index; becomes the `z` of every generated position
    pub level: i32,
    pub target_room_count: usize,
    pub min_room_size: i32,
    pub max_room_size: i32,
    pub monster_count: usize,
    pub monster_pool: Vec<WeightedKind>,
    pub boss_kind: String,
    pub multiple_connection_chance: f32,
    pub no_boss: bool,
    /// Guard the end of the lock chain with an exit guardian instead of stairs
    pub include_win_condition: bool,
    pub bonus_items: Vec<String>,
    pub common_items: Vec<String>,
    pub common_item_count: usize,
    pub blood_chance: f32,
    pub min_middle_rooms: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            level: 1,
            target_room_count: 10,
            min_room_size: 5,
            max_room_size: 10,
            monster_count: 10,
            monster_pool: vec![
                WeightedKind::new("chair", 4),
                WeightedKind::new("lamp", 3),
                WeightedKind::new("sofa", 1),
            ],
            boss_kind: "wardrobe".to_string(),
            multiple_connection_chance: 0.5,
            no_boss: false,
            include_win_condition: false,
            bonus_items: vec![
                "crossbow".to_string(),
                "armor".to_string(),
                "medkit".to_string(),
                "flashlight".to_string(),
            ],
            common_items: vec!["knife".to_string(), "bandage".to_string()],
            common_item_count: 3,
            blood_chance: DEFAULT_BLOOD_CHANCE,
            min_middle_rooms: DEFAULT_MIN_MIDDLE_ROOMS,
        }
    }
}

impl LevelParams {
    /// Clamp degenerate values into something the phases can run on.
    pub fn normalized(&self) -> Self {
        let mut params = self.clone();
        params.target_room_count = params.target_room_count.max(1);
        params.min_room_size = params.min_room_size.max(MIN_ROOM_SIDE);
        params.max_room_size = params.max_room_size.max(params.min_room_size);
        params.multiple_connection_chance = clamp_chance(params.multiple_connection_chance);
        params.blood_chance = clamp_chance(params.blood_chance);
        params.min_middle_rooms = params.min_middle_rooms.max(1);
        params.monster_pool.retain(|k| k.weight > 0);
        params
    }

    /// Parameters for `level` scaled by `difficulty`.
    pub fn for_difficulty(difficulty: Difficulty, level: i32) -> Self {
        let base = Self::default();
        let depth = level.max(1) as f32;
        let rooms = base.target_room_count as f32 * difficulty.room_count_factor();
        let monsters = (base.monster_count as f32 + depth - 1.0) * difficulty.monster_count_factor();
        Self {
            level,
            target_room_count: rooms.round() as usize,
            monster_count: monsters.round() as usize,
            common_item_count: difficulty.item_count(),
            ..base
        }
    }
}

fn clamp_chance(chance: f32) -> f32 {
    if chance.is_nan() {
        0.0
    } else {
        chance.clamp(0.0, 1.0)
    }
}

/// Difficulty setting chosen at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Nightmare,
}

/// Multipliers applied to spawned monsters' base stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonsterScale {
    pub strength: f32,
    pub speed: f32,
    pub health: f32,
}

impl Difficulty {
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => Difficulty::Easy,
            1 => Difficulty::Normal,
            2 => Difficulty::Hard,
            _ => Difficulty::Nightmare,
        }
    }

    pub fn monster_count_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.75,
            Difficulty::Normal => 0.9,
            Difficulty::Hard => 1.0,
            Difficulty::Nightmare => 1.2,
        }
    }

    pub fn room_count_factor(&self) -> f32 {
        match self {
            Difficulty::Nightmare => 1.2,
            _ => 1.0,
        }
    }

    /// Common items scattered per level
    pub fn item_count(&self) -> usize {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Normal => 4,
            Difficulty::Hard | Difficulty::Nightmare => 3,
        }
    }

    pub fn monster_scale(&self) -> MonsterScale {
        let (strength, speed, health) = match self {
            Difficulty::Easy => (0.75, 0.8, 0.75),
            Difficulty::Normal => (0.9, 0.9, 0.9),
            Difficulty::Hard => (1.0, 1.0, 1.0),
            Difficulty::Nightmare => (1.2, 1.1, 1.0),
        };
        MonsterScale {
            strength,
            speed,
            health,
        }
    }
}

/// Run seed; every level derives its own RNG stream from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSeed {
    pub seed: u64,
}

impl LevelSeed {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Deterministic level hash from run seed and level index
    pub fn level_hash(&self, level: i32) -> u64 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(level.to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, level: i32) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.level_hash(level))
    }
}

/// Generate the level described by `params` from a run seed.
pub fn generate_level(params: &LevelParams, seed: u64) -> GeneratedLevel {
    let mut rng = LevelSeed::new(seed).rng_for(params.level);
    let mut level = generate_level_with_rng(params, &mut rng);
    level.seed = seed;
    level
}

/// Generate with a caller-supplied RNG. The returned `seed` is 0.
pub fn generate_level_with_rng<R: Rng>(params: &LevelParams, rng: &mut R) -> GeneratedLevel {
    let _span = TimingSpan::new("generate_level");
    let params = params.normalized();

    let mut tiles = TileGrid::new();
    let mut rooms = rooms::drop_rooms(&params, &mut tiles, rng);
    debug!(rooms = rooms.len(), tiles = tiles.len(), "rooms dropped");

    let connections = connect::connect_rooms(
        &mut tiles,
        &mut rooms,
        params.multiple_connection_chance,
        rng,
    );
    debug!(
        corridors = connections.connection_count(),
        "rooms connected"
    );

    let demoted = connect::prune_doors(&mut tiles, &mut rooms);
    debug!(demoted, "doors pruned");

    let level = content::populate(&params, tiles, rooms, connections, rng);
    info!(
        level = level.level,
        rooms = level.rooms.len(),
        locks = level.lock_chain.len(),
        critters = level.critters.len(),
        items = level.items.len(),
        "level generated"
    );
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_hash_deterministic() {
        let seed = LevelSeed::new(12345);
        assert_eq!(seed.level_hash(1), seed.level_hash(1));
        assert_ne!(seed.level_hash(1), seed.level_hash(2));
        assert_ne!(seed.level_hash(1), LevelSeed::new(12346).level_hash(1));
    }

    #[test]
    fn test_difficulty_tables() {
        assert_eq!(Difficulty::from_id(0), Difficulty::Easy);
        assert_eq!(Difficulty::from_id(9), Difficulty::Nightmare);
        assert_eq!(Difficulty::Normal.monster_count_factor(), 0.9);
        assert_eq!(Difficulty::Hard.room_count_factor(), 1.0);
        assert_eq!(Difficulty::Nightmare.room_count_factor(), 1.2);
        assert_eq!(Difficulty::Easy.item_count(), 5);
        assert_eq!(Difficulty::Nightmare.item_count(), 3);
        assert_eq!(Difficulty::Easy.monster_scale().speed, 0.8);
    }

    #[test]
    fn test_for_difficulty_scales_counts() {
        let easy = LevelParams::for_difficulty(Difficulty::Easy, 1);
        let nightmare = LevelParams::for_difficulty(Difficulty::Nightmare, 1);
        assert!(nightmare.monster_count > easy.monster_count);
        assert_eq!(nightmare.target_room_count, 12);
        assert_eq!(easy.common_item_count, 5);
        assert_eq!(LevelParams::for_difficulty(Difficulty::Hard, 4).level, 4);
    }

    #[test]
    fn test_normalized_repairs_degenerate_params() {
        let params = LevelParams {
            target_room_count: 0,
            min_room_size: 8,
            max_room_size: 2,
            blood_chance: 4.0,
            multiple_connection_chance: f32::NAN,
            min_middle_rooms: 0,
            monster_pool: vec![WeightedKind::new("ghost", 0)],
            ..LevelParams::default()
        }
        .normalized();
        assert_eq!(params.target_room_count, 1);
        assert_eq!(params.max_room_size, 8);
        assert_eq!(params.blood_chance, 1.0);
        assert_eq!(params.multiple_connection_chance, 0.0);
        assert_eq!(params.min_middle_rooms, 1);
        assert!(params.monster_pool.is_empty());
    }

    #[test]
    fn test_generation_deterministic_per_seed() {
        let params = LevelParams::default();
        let a = generate_level(&params, 77);
        let b = generate_level(&params, 77);
        assert_eq!(a.player_start, b.player_start);
        assert_eq!(a.critters, b.critters);
        assert_eq!(a.items, b.items);
        assert_eq!(a.tiles, b.tiles);
        assert_eq!(a.seed, 77);
    }

    #[test]
    fn test_level_index_becomes_z() {
        let params = LevelParams {
            level: 3,
            target_room_count: 3,
            ..LevelParams::default()
        };
        let level = generate_level(&params, 1);
        assert!(level.tiles.keys().all(|p| p.z == 3));
        assert_eq!(level.player_start.z, 3);
    }
}
