//! Phases 2 and 3: corridor carving, the connectivity guarantee, and door
//! pruning.
//!
//! Corridors are carved with the shared [`Pathfinder`]. Its neighbor closure
//! keeps corridors out of unrelated rooms' interiors and its cost closure
//! makes cutting walls expensive, foreign walls most of all. Once every room
//! has had its turn, reachability from room 0 is checked over the
//! [`ConnectionTracker`] and extra rounds run until every room is reached.

use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::plan::{RoomData, TileGrid, TileKind, TilePlan};
use crate::constants::{
    CARVE_MAX_EXPANSIONS, FOREIGN_WALL_CUT_COST, PAIR_WALL_CUT_COST, PATHFINDER_RETRY_ROUNDS,
};
use crate::grid::GridPos;
use crate::pathfinding::{manhattan, Pathfinder};

/// Nearest reached rooms tried per unreached room in a retry round
const RETRY_TARGETS: usize = 3;

/// Room id → connected room ids, one edge per carved corridor
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    graph: UnGraphMap<usize, ()>,
}

impl ConnectionTracker {
    pub fn new(room_count: usize) -> Self {
        let mut graph = UnGraphMap::new();
        for id in 0..room_count {
            graph.add_node(id);
        }
        Self { graph }
    }

    pub fn connect(&mut self, a: usize, b: usize) {
        if a != b {
            self.graph.add_edge(a, b, ());
        }
    }

    pub fn is_linked(&self, a: usize, b: usize) -> bool {
        self.graph.contains_edge(a, b)
    }

    /// Directly connected rooms, ascending
    pub fn neighbors(&self, room: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.graph.neighbors(room).collect();
        out.sort_unstable();
        out
    }

    pub fn room_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn reachable_from(&self, root: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        if !self.graph.contains_node(root) {
            return reached;
        }
        let mut bfs = Bfs::new(&self.graph, root);
        while let Some(room) = bfs.next(&self.graph) {
            reached.insert(room);
        }
        reached
    }

    /// True when every room can reach room 0
    pub fn is_fully_connected(&self) -> bool {
        self.reachable_from(0).len() == self.graph.node_count()
    }
}

fn carve_neighbors(tiles: &TileGrid, pos: GridPos, a: usize, b: usize) -> Vec<GridPos> {
    pos.cardinal_neighbors()
        .filter(|n| match tiles.get(n) {
            Some(TilePlan {
                kind,
                room: Some(owner),
                ..
            }) => *owner == a || *owner == b || *kind == TileKind::Wall,
            _ => true,
        })
        .collect()
}

fn carve_cost(tiles: &TileGrid, pos: GridPos, a: usize, b: usize) -> f32 {
    match tiles.get(&pos) {
        Some(TilePlan {
            kind: TileKind::Wall,
            room: Some(owner),
            ..
        }) => {
            if *owner == a || *owner == b {
                PAIR_WALL_CUT_COST
            } else {
                FOREIGN_WALL_CUT_COST
            }
        }
        _ => 1.0,
    }
}

/// Open every cell of `path`: owned walls become doors, empty space and
/// corridor walls become floor, and fresh corridor floor gets walled in.
fn carve_cells(tiles: &mut TileGrid, rooms: &mut [RoomData], path: &[GridPos]) {
    let mut corridor = Vec::new();
    for &pos in path {
        match tiles.get(&pos).copied() {
            Some(TilePlan {
                kind: TileKind::Wall,
                room: Some(owner),
                ..
            }) => {
                tiles.insert(pos, TilePlan::new(TileKind::Door, Some(owner)));
                let doors = &mut rooms[owner].doors;
                if !doors.contains(&pos) {
                    doors.push(pos);
                }
            }
            Some(TilePlan {
                kind: TileKind::Wall,
                room: None,
                ..
            })
            | None => {
                tiles.insert(pos, TilePlan::new(TileKind::Floor, None));
                corridor.push(pos);
            }
            Some(_) => {}
        }
    }

    for pos in corridor {
        for around in pos.compass_neighbors() {
            tiles
                .entry(around)
                .or_insert_with(|| TilePlan::new(TileKind::Wall, None));
        }
    }
}

/// Carve a corridor between two room centers with the pathfinder.
fn carve_between(tiles: &mut TileGrid, rooms: &mut [RoomData], a: usize, b: usize) -> bool {
    let path = {
        let grid: &TileGrid = tiles;
        let finder = Pathfinder::new(
            manhattan,
            move |p| carve_neighbors(grid, p, a, b),
            move |p| carve_cost(grid, p, a, b),
        )
        .with_max_expansions(CARVE_MAX_EXPANSIONS);
        finder.find_path(rooms[a].center, rooms[b].center)
    };
    if path.is_empty() {
        debug!(from = a, to = b, "no corridor route within budget");
        return false;
    }
    carve_cells(tiles, rooms, &path);
    true
}

/// Straight-then-turn corridor between two centers. Cannot fail.
fn forced_corridor(tiles: &mut TileGrid, rooms: &mut [RoomData], a: usize, b: usize) {
    let start = rooms[a].center;
    let target = rooms[b].center;
    let (mut x, mut y) = (start.x, start.y);
    let mut cells = Vec::new();

    let x_first = (target.x - x).abs() < (target.y - y).abs();
    for along_x in [x_first, !x_first] {
        if along_x {
            while x != target.x {
                x += (target.x - x).signum();
                cells.push(GridPos::new(x, y, start.z));
            }
        } else {
            while y != target.y {
                y += (target.y - y).signum();
                cells.push(GridPos::new(x, y, start.z));
            }
        }
    }

    warn!(from = a, to = b, cells = cells.len(), "forcing L-shaped corridor");
    carve_cells(tiles, rooms, &cells);
}

fn nearest_rooms(rooms: &[RoomData], from: usize, candidates: impl Iterator<Item = usize>) -> Vec<usize> {
    let center = rooms[from].center;
    let mut ordered: Vec<usize> = candidates.filter(|&j| j != from).collect();
    ordered.sort_by_key(|&j| (center.sq_distance(rooms[j].center), j));
    ordered
}

/// Phase 2: link every room to its nearest unlinked neighbors, then keep
/// adding corridors until room 0 reaches every room.
pub fn connect_rooms<R: Rng>(
    tiles: &mut TileGrid,
    rooms: &mut [RoomData],
    multiple_connection_chance: f32,
    rng: &mut R,
) -> ConnectionTracker {
    let count = rooms.len();
    let mut tracker = ConnectionTracker::new(count);

    for i in 0..count {
        let wanted = if rng.gen::<f32>() < multiple_connection_chance {
            2
        } else {
            1
        };
        let candidates = nearest_rooms(rooms, i, (0..count).filter(|&j| !tracker.is_linked(i, j)));
        let mut made = 0;
        for j in candidates {
            if made == wanted {
                break;
            }
            if carve_between(tiles, rooms, i, j) {
                tracker.connect(i, j);
                made += 1;
            }
        }
    }

    let mut round = 0;
    loop {
        let mut reached = tracker.reachable_from(0);
        if reached.len() >= count {
            break;
        }
        round += 1;
        let force = round > PATHFINDER_RETRY_ROUNDS;
        debug!(
            round,
            reached = reached.len(),
            rooms = count,
            force,
            "connectivity round"
        );

        for room in 0..count {
            if reached.contains(&room) {
                continue;
            }
            let targets = nearest_rooms(rooms, room, reached.iter().copied());
            let linked = if force {
                match targets.first() {
                    Some(&target) => {
                        forced_corridor(tiles, rooms, room, target);
                        tracker.connect(room, target);
                        true
                    }
                    None => false,
                }
            } else {
                let mut linked = false;
                for &target in targets.iter().take(RETRY_TARGETS) {
                    if carve_between(tiles, rooms, room, target) {
                        tracker.connect(room, target);
                        linked = true;
                        break;
                    }
                }
                linked
            };
            if linked {
                reached = tracker.reachable_from(0);
            }
        }
    }

    tracker
}

/// Phase 3: no two doors side by side. Returns how many were demoted.
pub fn prune_doors(tiles: &mut TileGrid, rooms: &mut [RoomData]) -> usize {
    let mut doors: Vec<GridPos> = tiles
        .iter()
        .filter(|(_, t)| t.kind == TileKind::Door)
        .map(|(p, _)| *p)
        .collect();
    doors.sort();

    let mut demoted = 0;
    for door in doors {
        if tiles.get(&door).map(|t| t.kind) != Some(TileKind::Door) {
            continue;
        }
        for n in door.cardinal_neighbors() {
            if let Some(tile) = tiles.get_mut(&n) {
                if tile.kind == TileKind::Door {
                    tile.kind = TileKind::Floor;
                    if let Some(owner) = tile.room {
                        rooms[owner].doors.retain(|p| *p != n);
                    }
                    demoted += 1;
                }
            }
        }
    }
    demoted
}
