//! Grid pathfinding.
//!
//! `Pathfinder` is a weighted best-first search that knows nothing about
//! rooms, monsters or tiles. Callers hand it three closures:
//! - a heuristic over the delta vector to the goal,
//! - a neighbor enumerator (the only place passability lives),
//! - a per-target-cell edge cost multiplier.
//!
//! The generator uses it to carve corridors, gameplay AI uses it to chase and
//! patrol. Results are near-shortest: heuristics are not required to be
//! admissible.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::trace;

use crate::constants::{DEFAULT_MAX_EXPANSIONS, DIAGONAL_STEP_COST};
use crate::grid::GridPos;

/// `|dx| + |dy|`
pub fn manhattan(dx: i32, dy: i32) -> f32 {
    (dx.abs() + dy.abs()) as f32
}

/// `dx² + dy²`. Strongly greedy, not admissible.
pub fn squared_euclidean(dx: i32, dy: i32) -> f32 {
    (dx * dx + dy * dy) as f32
}

/// `max(|dx|, |dy|)`
pub fn chebyshev(dx: i32, dy: i32) -> f32 {
    dx.abs().max(dy.abs()) as f32
}

/// Base cost of a single step before the caller's edge multiplier.
pub fn step_cost(dx: i32, dy: i32) -> f32 {
    if dx != 0 && dy != 0 {
        DIAGONAL_STEP_COST
    } else {
        1.0
    }
}

#[derive(Debug, Clone)]
struct SearchNode {
    pos: GridPos,
    cost: f32,
    heuristic: f32,
    previous: Option<usize>,
    closed: bool,
}

/// Open-set entry. Entries are invalidated lazily: when a node is relaxed its
/// old entry stays in the heap and is skipped on pop.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    total: f32,
    heuristic: f32,
    cost: f32,
    seq: u64,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on every key: BinaryHeap is a max-heap
        other
            .total
            .total_cmp(&self.total)
            .then_with(|| other.heuristic.total_cmp(&self.heuristic))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best-first grid search parameterized by caller-supplied closures.
pub struct Pathfinder<H, N, C> {
    heuristic: H,
    neighbors: N,
    edge_cost: C,
    max_expansions: usize,
}

impl<H, N, C> Pathfinder<H, N, C>
where
    H: Fn(i32, i32) -> f32,
    N: Fn(GridPos) -> Vec<GridPos>,
    C: Fn(GridPos) -> f32,
{
    pub fn new(heuristic: H, neighbors: N, edge_cost: C) -> Self {
        Self {
            heuristic,
            neighbors,
            edge_cost,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }

    /// Override the expansion cap.
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    pub fn max_expansions(&self) -> usize {
        self.max_expansions
    }

    /// Find a route from `start` to `end`.
    ///
    /// Returns the cells from `end` back to the first step, excluding
    /// `start`; callers `pop()` to advance one step at a time. An empty
    /// vector means no path: unreachable, budget exhausted, or already there.
    pub fn find_path(&self, start: GridPos, end: GridPos) -> Vec<GridPos> {
        if start == end {
            return Vec::new();
        }

        let mut nodes: Vec<SearchNode> = Vec::new();
        let mut index: HashMap<GridPos, usize> = HashMap::new();
        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut seq: u64 = 0;

        let (dx, dy) = start.delta_to(end);
        let start_h = (self.heuristic)(dx, dy);
        nodes.push(SearchNode {
            pos: start,
            cost: 0.0,
            heuristic: start_h,
            previous: None,
            closed: false,
        });
        index.insert(start, 0);
        open.push(OpenEntry {
            total: start_h,
            heuristic: start_h,
            cost: 0.0,
            seq,
            node: 0,
        });

        let mut expansions = 0usize;
        while let Some(entry) = open.pop() {
            let current = entry.node;
            if nodes[current].closed || entry.cost > nodes[current].cost {
                continue;
            }
            nodes[current].closed = true;

            let pos = nodes[current].pos;
            if pos == end {
                return Self::trace_back(&nodes, current);
            }

            expansions += 1;
            if expansions > self.max_expansions {
                trace!(
                    %start,
                    %end,
                    expansions,
                    "path search budget exhausted"
                );
                return Vec::new();
            }

            let base_cost = nodes[current].cost;
            for neighbor in (self.neighbors)(pos) {
                let (sx, sy) = pos.delta_to(neighbor);
                let cost = base_cost + step_cost(sx, sy) * (self.edge_cost)(neighbor);

                let slot = match index.get(&neighbor).copied() {
                    Some(existing) => {
                        let node = &mut nodes[existing];
                        if node.closed || cost >= node.cost {
                            continue;
                        }
                        // Cheaper route to a known cell: overwrite in place
                        node.cost = cost;
                        node.previous = Some(current);
                        existing
                    }
                    None => {
                        let (hx, hy) = neighbor.delta_to(end);
                        nodes.push(SearchNode {
                            pos: neighbor,
                            cost,
                            heuristic: (self.heuristic)(hx, hy),
                            previous: Some(current),
                            closed: false,
                        });
                        let fresh = nodes.len() - 1;
                        index.insert(neighbor, fresh);
                        fresh
                    }
                };

                seq += 1;
                let node = &nodes[slot];
                open.push(OpenEntry {
                    total: node.cost + node.heuristic,
                    heuristic: node.heuristic,
                    cost: node.cost,
                    seq,
                    node: slot,
                });
            }
        }

        Vec::new()
    }

    fn trace_back(nodes: &[SearchNode], goal: usize) -> Vec<GridPos> {
        let mut path = Vec::new();
        let mut cursor = goal;
        while let Some(previous) = nodes[cursor].previous {
            path.push(nodes[cursor].pos);
            cursor = previous;
        }
        path
    }
}
