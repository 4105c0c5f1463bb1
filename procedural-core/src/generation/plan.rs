//! Generation-time data: the tile plan, room metadata and placements handed
//! to the gameplay layer.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use super::connect::ConnectionTracker;
use crate::grid::GridPos;

/// Lock variants for colored doors. The chain never uses more locks than
/// there are colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LockColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl LockColor {
    pub const ALL: [LockColor; 4] = [
        LockColor::Red,
        LockColor::Blue,
        LockColor::Green,
        LockColor::Yellow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LockColor::Red => "red",
            LockColor::Blue => "blue",
            LockColor::Green => "green",
            LockColor::Yellow => "yellow",
        }
    }

    /// Item name of the key that opens this lock
    pub fn key_name(&self) -> String {
        format!("{}_key", self.as_str())
    }

    /// Inverse of [`LockColor::key_name`]
    pub fn from_key_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key_name() == name)
    }
}

impl fmt::Display for LockColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terrain tag of a planned cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Wall,
    Floor,
    Door,
    LockedDoor(LockColor),
    Stairs,
}

impl TileKind {
    /// Walkable once every lock is open
    pub fn is_open(&self) -> bool {
        !matches!(self, TileKind::Wall)
    }

    pub fn is_door(&self) -> bool {
        matches!(self, TileKind::Door | TileKind::LockedDoor(_))
    }
}

/// One planned cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePlan {
    pub kind: TileKind,
    /// Owning room; `None` for corridors and corridor walls
    pub room: Option<usize>,
    pub theme: Option<usize>,
}

impl TilePlan {
    pub fn new(kind: TileKind, room: Option<usize>) -> Self {
        Self {
            kind,
            room,
            theme: None,
        }
    }

    /// Lock color a walker must hold a key for, if any
    pub fn needs_key(&self) -> Option<LockColor> {
        match self.kind {
            TileKind::LockedDoor(color) => Some(color),
            _ => None,
        }
    }
}

/// Sparse tile plan keyed by position
pub type TileGrid = HashMap<GridPos, TilePlan>;

/// Cells reachable from `from` over 4-neighbors that `can_enter` accepts.
/// `from` itself is always included.
pub fn flood_fill(
    tiles: &TileGrid,
    from: GridPos,
    can_enter: impl Fn(GridPos, &TilePlan) -> bool,
) -> HashSet<GridPos> {
    let mut reached = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(pos) = queue.pop_front() {
        for next in pos.cardinal_neighbors() {
            let Some(tile) = tiles.get(&next) else {
                continue;
            };
            if can_enter(next, tile) && reached.insert(next) {
                queue.push_back(next);
            }
        }
    }
    reached
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomClass {
    /// Few walls opened; used for lock rooms and bonus loot
    Deadend,
    /// Everything else; player start and roaming monsters
    Middle,
}

/// Room metadata recorded while carving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomData {
    pub id: usize,
    pub center: GridPos,
    /// Inclusive bounding box corners (perimeter included)
    pub min: GridPos,
    pub max: GridPos,
    pub expected_walls: usize,
    pub expected_floors: usize,
    pub doors: Vec<GridPos>,
    /// Interior floor cells
    pub spots: Vec<GridPos>,
    pub theme: Option<usize>,
    pub class: RoomClass,
}

impl RoomData {
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.z == self.min.z
            && pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
    }

    pub fn is_perimeter(&self, pos: GridPos) -> bool {
        self.contains(pos)
            && (pos.x == self.min.x
                || pos.x == self.max.x
                || pos.y == self.min.y
                || pos.y == self.max.y)
    }

    pub fn perimeter(&self) -> impl Iterator<Item = GridPos> + '_ {
        let z = self.min.z;
        (self.min.x..=self.max.x)
            .flat_map(move |x| (self.min.y..=self.max.y).map(move |y| GridPos::new(x, y, z)))
            .filter(move |p| self.is_perimeter(*p))
    }

    pub fn is_deadend(&self) -> bool {
        self.class == RoomClass::Deadend
    }
}

/// Something the gameplay layer should instantiate at a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub pos: GridPos,
    pub name: String,
}

impl Placement {
    pub fn new(pos: GridPos, name: impl Into<String>) -> Self {
        Self {
            pos,
            name: name.into(),
        }
    }
}

/// What a lock room guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reward {
    Stairs,
    Guardian,
    Key(LockColor),
}

/// One link of the lock chain, in the order the generator built it
/// (the first stage guards the final reward)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStage {
    pub color: LockColor,
    pub room: usize,
    pub doors: Vec<GridPos>,
    /// What sits behind this lock
    pub guarded: Reward,
    pub guarded_pos: GridPos,
}

/// Complete output of one generation run
#[derive(Debug, Clone)]
pub struct GeneratedLevel {
    pub seed: u64,
    pub level: i32,
    pub tiles: TileGrid,
    pub rooms: Vec<RoomData>,
    pub connections: ConnectionTracker,
    pub player_start: GridPos,
    pub decorations: Vec<Placement>,
    pub items: Vec<Placement>,
    pub critters: Vec<Placement>,
    pub objects: Vec<Placement>,
    pub lock_chain: Vec<LockStage>,
    /// Where the outermost reward (last key, or stairs/guardian when
    /// nothing is locked) was dropped
    pub free_reward: Option<(Reward, GridPos)>,
}

impl GeneratedLevel {
    pub fn tile(&self, pos: GridPos) -> Option<&TilePlan> {
        self.tiles.get(&pos)
    }

    pub fn count_kind(&self, kind: TileKind) -> usize {
        self.tiles.values().filter(|t| t.kind == kind).count()
    }

    pub fn stairs(&self) -> Option<GridPos> {
        let mut stairs: Vec<GridPos> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.kind == TileKind::Stairs)
            .map(|(p, _)| *p)
            .collect();
        stairs.sort();
        stairs.first().copied()
    }

    /// Every placement that occupies its cell (decorations excluded)
    pub fn occupying_placements(&self) -> impl Iterator<Item = &Placement> {
        self.items
            .iter()
            .chain(self.critters.iter())
            .chain(self.objects.iter())
    }
}
