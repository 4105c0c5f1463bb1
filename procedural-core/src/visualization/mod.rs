//! ASCII rendering for diagnostics.
//!
//! Renders generated plans and lit runtime views as text, one character per
//! cell, rows from low y to high y.

use std::collections::HashMap;

use crate::generation::content::GUARDIAN_KIND;
use crate::generation::{GeneratedLevel, LockColor, TileGrid, TileKind};
use crate::grid::GridPos;
use crate::world::{EntityKind, World};

/// Shading ramp from dim to bright
const LIGHT_RAMP: &[u8] = b".:-=+*#%@";

pub fn tile_glyph(kind: TileKind) -> char {
    match kind {
        TileKind::Wall => '#',
        TileKind::Floor => '.',
        TileKind::Door => '+',
        TileKind::LockedDoor(LockColor::Red) => 'R',
        TileKind::LockedDoor(LockColor::Blue) => 'B',
        TileKind::LockedDoor(LockColor::Green) => 'G',
        TileKind::LockedDoor(LockColor::Yellow) => 'Y',
        TileKind::Stairs => '>',
    }
}

fn placement_glyph(kind: EntityKind, name: &str) -> char {
    match kind {
        EntityKind::Player => '@',
        EntityKind::Critter if name == GUARDIAN_KIND => '&',
        EntityKind::Critter => 'm',
        EntityKind::Item if LockColor::from_key_name(name).is_some() => 'k',
        EntityKind::Item => '!',
        EntityKind::Object if name.starts_with("note:") => '?',
        EntityKind::Object => 'o',
    }
}

/// Light in [0, 1] to a ramp character; unlit cells are blank
pub fn light_glyph(light: f32) -> char {
    if light < 0.0 {
        return ' ';
    }
    let last = LIGHT_RAMP.len() - 1;
    let index = ((light.min(1.0) * last as f32).round() as usize).min(last);
    LIGHT_RAMP[index] as char
}

/// Inclusive (min, max) corners of every cell at level `z`
fn bounds<'a>(cells: impl Iterator<Item = &'a GridPos>, z: i32) -> Option<(GridPos, GridPos)> {
    cells.filter(|p| p.z == z).fold(None, |acc, p| {
        Some(match acc {
            None => (*p, *p),
            Some((lo, hi)) => (
                GridPos::new(lo.x.min(p.x), lo.y.min(p.y), z),
                GridPos::new(hi.x.max(p.x), hi.y.max(p.y), z),
            ),
        })
    })
}

fn render_grid(min: GridPos, max: GridPos, glyph: impl Fn(GridPos) -> char) -> String {
    let mut out = String::new();
    for y in min.y..=max.y {
        let row: String = (min.x..=max.x)
            .map(|x| glyph(GridPos::new(x, y, min.z)))
            .collect();
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

/// Terrain only
pub fn render_tiles(tiles: &TileGrid, z: i32) -> String {
    let Some((min, max)) = bounds(tiles.keys(), z) else {
        return String::new();
    };
    render_grid(min, max, |p| tiles.get(&p).map_or(' ', |t| tile_glyph(t.kind)))
}

/// Terrain with the player start and every occupying placement
pub fn render_plan(level: &GeneratedLevel) -> String {
    let Some((min, max)) = bounds(level.tiles.keys(), level.level) else {
        return String::new();
    };
    let mut overlay: HashMap<GridPos, char> = HashMap::new();
    for p in &level.objects {
        overlay.insert(p.pos, placement_glyph(EntityKind::Object, &p.name));
    }
    for p in &level.items {
        overlay.insert(p.pos, placement_glyph(EntityKind::Item, &p.name));
    }
    for p in &level.critters {
        overlay.insert(p.pos, placement_glyph(EntityKind::Critter, &p.name));
    }
    overlay.insert(level.player_start, '@');

    render_grid(min, max, |p| {
        overlay
            .get(&p)
            .copied()
            .or_else(|| level.tile(p).map(|t| tile_glyph(t.kind)))
            .unwrap_or(' ')
    })
}

/// What the player knows: visible cells with their occupants, remembered
/// cells as bare terrain, everything else blank.
pub fn render_view(world: &World, z: i32) -> String {
    let Some((min, max)) = bounds(world.tiles().map(|(p, _)| p), z) else {
        return String::new();
    };
    render_grid(min, max, |p| {
        let Some(tile) = world.tile(p) else {
            return ' ';
        };
        if tile.visible {
            tile.occupant
                .and_then(|id| world.entity(id))
                .map(|e| placement_glyph(e.kind, &e.name))
                .unwrap_or_else(|| tile_glyph(tile.terrain))
        } else if tile.seen {
            match tile.terrain {
                TileKind::Wall => '%',
                _ => ',',
            }
        } else {
            ' '
        }
    })
}

/// Per-cell light intensity as a shading ramp
pub fn render_light(world: &World, z: i32) -> String {
    let Some((min, max)) = bounds(world.tiles().map(|(p, _)| p), z) else {
        return String::new();
    };
    render_grid(min, max, |p| world.tile(p).map_or(' ', |t| light_glyph(t.light)))
}
