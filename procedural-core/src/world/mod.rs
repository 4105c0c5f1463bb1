//! Runtime level state: the tile store and the entity arena.
//!
//! Tiles and entities reference each other by position and [`EntityId`].
//! Every move, spawn and despawn updates both sides together, so
//! `tile.occupant == Some(id)` holds exactly when `entity(id).pos` is that
//! tile.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_MAX_EXPANSIONS, OCCUPIED_STEP_COST, UNSEEN_LIGHT};
use crate::generation::content::GUARDIAN_KIND;
use crate::generation::{GeneratedLevel, LockColor, Placement, TileKind};
use crate::grid::GridPos;
use crate::pathfinding::{manhattan, Pathfinder};
use crate::visibility::LightMap;

/// Handle into the entity arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// What happens when something walks into an occupied or locked cell.
/// The gameplay layer owns one handler per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// Read or open (notes, containers)
    Open,
    /// Attack the occupant
    Violence,
    /// Shove furniture one cell along the step
    Push,
    /// Trade places with a loose item
    Swap,
    /// Locked door; needs the matching key
    Unlock(LockColor),
    /// Reaching this ends the run
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Critter,
    Item,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub pos: Option<GridPos>,
    pub interaction: Interaction,
    pub blocks_path: bool,
    pub blocks_vision: bool,
    /// Mirrors the light of the tile it stands on after each refresh
    pub visible: bool,
    pub light: f32,
}

impl Entity {
    fn new(name: impl Into<String>, kind: EntityKind, interaction: Interaction) -> Self {
        Self {
            name: name.into(),
            kind,
            pos: None,
            interaction,
            blocks_path: true,
            blocks_vision: false,
            visible: false,
            light: UNSEEN_LIGHT,
        }
    }

    pub fn player() -> Self {
        Self::new("player", EntityKind::Player, Interaction::Violence)
    }

    pub fn critter(name: impl Into<String>) -> Self {
        let name = name.into();
        let interaction = if name == GUARDIAN_KIND {
            Interaction::Win
        } else {
            Interaction::Violence
        };
        Self::new(name, EntityKind::Critter, interaction)
    }

    pub fn item(name: impl Into<String>) -> Self {
        Self {
            blocks_path: false,
            ..Self::new(name, EntityKind::Item, Interaction::Swap)
        }
    }

    /// Furniture is pushed; notes are read in place
    pub fn object(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.starts_with("note:") {
            Self {
                blocks_path: false,
                ..Self::new(name, EntityKind::Object, Interaction::Open)
            }
        } else {
            Self::new(name, EntityKind::Object, Interaction::Push)
        }
    }

    pub fn is_placed(&self) -> bool {
        self.pos.is_some()
    }
}

/// One runtime cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: TileKind,
    pub passable: bool,
    pub see_through: bool,
    /// Light in [0, 1] while visible, [`UNSEEN_LIGHT`] otherwise
    pub light: f32,
    pub visible: bool,
    /// Has ever been visible
    pub seen: bool,
    pub occupant: Option<EntityId>,
    pub theme: Option<usize>,
}

impl Tile {
    pub fn new(terrain: TileKind, theme: Option<usize>) -> Self {
        let open = matches!(terrain, TileKind::Floor | TileKind::Door | TileKind::Stairs);
        Self {
            terrain,
            passable: open,
            see_through: open,
            light: UNSEEN_LIGHT,
            visible: false,
            seen: false,
            occupant: None,
            theme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathingConfig {
    pub max_expansions: usize,
    /// Cost multiplier for stepping onto a cell holding a non-blocking entity
    pub occupied_step_cost: f32,
}

impl Default for PathingConfig {
    fn default() -> Self {
        Self {
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            occupied_step_cost: OCCUPIED_STEP_COST,
        }
    }
}

/// Result of trying to step an entity by one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved { from: GridPos, to: GridPos },
    /// Missing tile, wall, or an entity that is not placed
    Blocked,
    /// Something is in the way; the caller resolves it
    Interact {
        target: Target,
        interaction: Interaction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Entity(EntityId),
    Tile(GridPos),
}

#[derive(Debug, Clone, Default)]
pub struct World {
    tiles: HashMap<GridPos, Tile>,
    entities: Vec<Entity>,
    player: Option<EntityId>,
    /// Non-occupying dressing, render only
    decorations: Vec<Placement>,
    pathing: PathingConfig,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pathing(mut self, pathing: PathingConfig) -> Self {
        self.pathing = pathing;
        self
    }

    /// Build the runtime world for a generated level. Placements that cannot
    /// be spawned (cell taken or not walkable) are skipped with a warning.
    pub fn from_level(level: &GeneratedLevel) -> Self {
        let mut world = Self::new();
        for (pos, plan) in &level.tiles {
            world.insert_tile(*pos, Tile::new(plan.kind, plan.theme));
        }

        world.player = world.spawn(Entity::player(), level.player_start);
        if world.player.is_none() {
            warn!(pos = %level.player_start, "player start is not walkable");
        }

        let placements = level
            .critters
            .iter()
            .map(|p| (p, Entity::critter(p.name.as_str())))
            .chain(level.items.iter().map(|p| (p, Entity::item(p.name.as_str()))))
            .chain(level.objects.iter().map(|p| (p, Entity::object(p.name.as_str()))));
        for (placement, entity) in placements {
            if world.spawn(entity, placement.pos).is_none() {
                warn!(name = %placement.name, pos = %placement.pos, "placement skipped");
            }
        }

        world.decorations = level.decorations.clone();
        debug!(
            tiles = world.tiles.len(),
            entities = world.entities.len(),
            "world built"
        );
        world
    }

    pub fn insert_tile(&mut self, pos: GridPos, tile: Tile) {
        self.tiles.insert(pos, tile);
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (&GridPos, &Tile)> {
        self.tiles.iter()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn decorations(&self) -> &[Placement] {
        &self.decorations
    }

    pub fn occupant(&self, pos: GridPos) -> Option<EntityId> {
        self.tiles.get(&pos).and_then(|t| t.occupant)
    }

    fn can_enter(&self, pos: GridPos) -> bool {
        self.tiles
            .get(&pos)
            .is_some_and(|t| t.passable && t.occupant.is_none())
    }

    /// Place a new entity. `None` when the cell is missing, impassable or
    /// already occupied.
    pub fn spawn(&mut self, mut entity: Entity, pos: GridPos) -> Option<EntityId> {
        if !self.can_enter(pos) {
            return None;
        }
        let id = EntityId(self.entities.len());
        entity.pos = Some(pos);
        self.entities.push(entity);
        if let Some(tile) = self.tiles.get_mut(&pos) {
            tile.occupant = Some(id);
        }
        Some(id)
    }

    /// Take an entity off the map. Its id stays valid, with no position.
    pub fn despawn(&mut self, id: EntityId) {
        let Some(pos) = self.entities.get_mut(id.0).and_then(|e| e.pos.take()) else {
            return;
        };
        if let Some(tile) = self.tiles.get_mut(&pos) {
            if tile.occupant == Some(id) {
                tile.occupant = None;
            }
        }
    }

    /// Move to any free, passable cell. Returns false and changes nothing
    /// otherwise.
    pub fn move_entity(&mut self, id: EntityId, to: GridPos) -> bool {
        let Some(from) = self.entity(id).and_then(|e| e.pos) else {
            return false;
        };
        if from == to {
            return true;
        }
        if !self.can_enter(to) {
            return false;
        }
        if let Some(tile) = self.tiles.get_mut(&from) {
            tile.occupant = None;
        }
        if let Some(tile) = self.tiles.get_mut(&to) {
            tile.occupant = Some(id);
        }
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.pos = Some(to);
        }
        true
    }

    /// Step one cell. Occupied or locked destinations are reported, not
    /// resolved.
    pub fn step(&mut self, id: EntityId, dx: i32, dy: i32) -> StepOutcome {
        let Some(from) = self.entity(id).and_then(|e| e.pos) else {
            return StepOutcome::Blocked;
        };
        let to = from.offset(dx, dy);
        let Some(tile) = self.tiles.get(&to) else {
            return StepOutcome::Blocked;
        };
        if let TileKind::LockedDoor(color) = tile.terrain {
            return StepOutcome::Interact {
                target: Target::Tile(to),
                interaction: Interaction::Unlock(color),
            };
        }
        if !tile.passable {
            return StepOutcome::Blocked;
        }
        if let Some(other) = tile.occupant {
            let interaction = self
                .entity(other)
                .map_or(Interaction::Violence, |e| e.interaction);
            return StepOutcome::Interact {
                target: Target::Entity(other),
                interaction,
            };
        }
        if self.move_entity(id, to) {
            StepOutcome::Moved { from, to }
        } else {
            StepOutcome::Blocked
        }
    }

    /// Open a locked door with a key of `color`.
    pub fn unlock(&mut self, pos: GridPos, color: LockColor) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) if tile.terrain == TileKind::LockedDoor(color) => {
                tile.terrain = TileKind::Door;
                tile.passable = true;
                tile.see_through = true;
                debug!(%pos, %color, "door unlocked");
                true
            }
            _ => false,
        }
    }

    /// Shove `target` one cell along (dx, dy), then move `actor` into the
    /// freed cell.
    pub fn push(&mut self, actor: EntityId, target: EntityId, dx: i32, dy: i32) -> bool {
        let Some(at) = self.entity(target).and_then(|e| e.pos) else {
            return false;
        };
        if !self.move_entity(target, at.offset(dx, dy)) {
            return false;
        }
        self.move_entity(actor, at)
    }

    /// Exchange the cells of two placed entities.
    pub fn swap(&mut self, a: EntityId, b: EntityId) -> bool {
        let (Some(pa), Some(pb)) = (
            self.entity(a).and_then(|e| e.pos),
            self.entity(b).and_then(|e| e.pos),
        ) else {
            return false;
        };
        if a == b {
            return true;
        }
        for (id, pos) in [(a, pb), (b, pa)] {
            if let Some(tile) = self.tiles.get_mut(&pos) {
                tile.occupant = Some(id);
            }
            if let Some(entity) = self.entities.get_mut(id.0) {
                entity.pos = Some(pos);
            }
        }
        true
    }

    fn blocks_path(&self, pos: GridPos) -> bool {
        self.occupant(pos)
            .and_then(|id| self.entity(id))
            .is_some_and(|e| e.blocks_path)
    }

    /// Route over passable cells with 4-directional steps. Cells holding a
    /// path-blocking entity are avoided unless they are the goal; other
    /// occupied cells cost more. Ordered goal first; pop from the back.
    pub fn find_path(&self, from: GridPos, to: GridPos) -> Vec<GridPos> {
        let occupied_cost = self.pathing.occupied_step_cost;
        let finder = Pathfinder::new(
            manhattan,
            |pos: GridPos| {
                pos.cardinal_neighbors()
                    .filter(|n| {
                        self.tiles.get(n).is_some_and(|t| t.passable)
                            && (*n == to || !self.blocks_path(*n))
                    })
                    .collect()
            },
            |pos: GridPos| {
                if pos != to && self.occupant(pos).is_some() {
                    occupied_cost
                } else {
                    1.0
                }
            },
        )
        .with_max_expansions(self.pathing.max_expansions);
        finder.find_path(from, to)
    }

    /// Is the cell lit right now?
    pub fn can_see(&self, pos: GridPos) -> bool {
        self.tiles.get(&pos).is_some_and(|t| t.visible)
    }
}

impl LightMap for World {
    fn see_through(&self, pos: GridPos) -> Option<bool> {
        let tile = self.tiles.get(&pos)?;
        let occluded = tile
            .occupant
            .and_then(|id| self.entity(id))
            .is_some_and(|e| e.blocks_vision);
        Some(tile.see_through && !occluded)
    }

    fn light(&mut self, pos: GridPos, value: f32) {
        if let Some(tile) = self.tiles.get_mut(&pos) {
            tile.light = value;
            tile.visible = true;
            tile.seen = true;
        }
    }

    fn unsee(&mut self, pos: GridPos) {
        if let Some(tile) = self.tiles.get_mut(&pos) {
            tile.light = UNSEEN_LIGHT;
            tile.visible = false;
        }
    }

    fn sync_occupant(&mut self, pos: GridPos) {
        let Some((id, visible, light)) = self
            .tiles
            .get(&pos)
            .and_then(|t| t.occupant.map(|id| (id, t.visible, t.light)))
        else {
            return;
        };
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.visible = visible;
            entity.light = light;
        }
    }
}
