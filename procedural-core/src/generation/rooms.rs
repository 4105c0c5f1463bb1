//! Phase 1: room placement by dropping.
//!
//! Each room picks a size and an x offset, starts above everything placed so
//! far and falls toward y = 0 until one more step would break the clearance
//! ring around existing cells. No global layout planning is involved.

use rand::Rng;
use tracing::debug;

use super::plan::{RoomClass, RoomData, TileGrid, TileKind, TilePlan};
use super::LevelParams;
use crate::constants::ROOM_CLEARANCE;
use crate::grid::GridPos;

/// Width of the strip rooms are dropped into
pub fn map_width(params: &LevelParams) -> i32 {
    let rooms = params.target_room_count.max(1) as f32;
    (params.max_room_size as f32 * rooms.sqrt()).ceil() as i32
}

fn roll_side<R: Rng>(min: i32, max: i32, rng: &mut R) -> i32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Does a `w`×`h` room at (`x`, `y`) come within the clearance ring of any
/// placed cell?
fn collides(tiles: &TileGrid, x: i32, y: i32, w: i32, h: i32, z: i32) -> bool {
    for cx in (x - ROOM_CLEARANCE)..(x + w + ROOM_CLEARANCE) {
        for cy in (y - ROOM_CLEARANCE)..(y + h + ROOM_CLEARANCE) {
            if tiles.contains_key(&GridPos::new(cx, cy, z)) {
                return true;
            }
        }
    }
    false
}

/// Drop `params.target_room_count` rooms into `tiles`.
pub fn drop_rooms<R: Rng>(params: &LevelParams, tiles: &mut TileGrid, rng: &mut R) -> Vec<RoomData> {
    let z = params.level;
    let width = map_width(params);
    let mut rooms = Vec::with_capacity(params.target_room_count);
    let mut max_y = 0;

    for id in 0..params.target_room_count {
        let w = roll_side(params.min_room_size, params.max_room_size, rng);
        let h = roll_side(params.min_room_size, params.max_room_size, rng);
        let x = rng.gen_range(0..(width - w).max(1));

        let mut y = max_y;
        while y > 0 && !collides(tiles, x, y - 1, w, h, z) {
            y -= 1;
        }

        let room = stamp_room(tiles, id, x, y, w, h, z);
        debug!(
            room = id,
            x,
            y,
            w,
            h,
            "room settled"
        );
        max_y = max_y.max(y + h + ROOM_CLEARANCE);
        rooms.push(room);
    }

    rooms
}

/// Write walls and floor for one room. Perimeter cells that land on existing
/// floor become doors; existing walls are left alone.
fn stamp_room(tiles: &mut TileGrid, id: usize, x: i32, y: i32, w: i32, h: i32, z: i32) -> RoomData {
    let mut walls = 0;
    let mut doors = Vec::new();
    let mut spots = Vec::new();

    for i in 0..w {
        for j in 0..h {
            let pos = GridPos::new(x + i, y + j, z);
            let edge = i == 0 || j == 0 || i == w - 1 || j == h - 1;
            if edge {
                match tiles.get(&pos).map(|t| t.kind) {
                    None => {
                        tiles.insert(pos, TilePlan::new(TileKind::Wall, Some(id)));
                        walls += 1;
                    }
                    Some(TileKind::Floor) => {
                        tiles.insert(pos, TilePlan::new(TileKind::Door, Some(id)));
                        doors.push(pos);
                    }
                    Some(_) => {}
                }
            } else {
                tiles.insert(pos, TilePlan::new(TileKind::Floor, Some(id)));
                spots.push(pos);
            }
        }
    }

    RoomData {
        id,
        center: GridPos::new(x + w / 2, y + h / 2, z),
        min: GridPos::new(x, y, z),
        max: GridPos::new(x + w - 1, y + h - 1, z),
        expected_walls: walls,
        expected_floors: spots.len(),
        doors,
        spots,
        theme: None,
        class: RoomClass::Middle,
    }
}
