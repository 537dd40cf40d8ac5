//! A* search over the grid.
//!
//! Stateless 8-directional search with unit step cost and a Euclidean
//! heuristic. Diagonal steps also cost one unit, which makes the heuristic
//! slightly overestimate diagonal travel; downstream battery budgets are
//! Manhattan-based and assume integer-ish step costs, so this behavior is
//! kept deliberately rather than "fixed".
//!
//! The search carries a hard iteration budget of `2 * width * height`
//! expansions. Exhausting it is reported as a failure, never as a partial
//! path.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use rand::Rng;
use skyguard_types::Position;

use crate::error::WorldError;
use crate::grid::Grid;

/// The eight neighbor offsets, cardinals first.
const NEIGHBORS: [(i64, i64); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Entry in the A* open set.
///
/// Ordered so the smallest `f = g + h` surfaces first from the max-heap,
/// with ties broken by insertion order (`seq`).
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    seq: u64,
    cell: (i64, i64),
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Inverted: BinaryHeap pops the maximum, we want the minimum f
        // and, among equals, the earliest insertion.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a step sequence from `start` to `goal`, avoiding blocking cells.
///
/// Both endpoints are floored to grid cells; the returned path consists of
/// cell centers from the start cell to the goal cell inclusive.
///
/// # Errors
///
/// - [`WorldError::OutOfBounds`] if either endpoint lies outside the grid.
/// - [`WorldError::NoPath`] if the open set empties (goal unreachable).
/// - [`WorldError::SearchBudgetExhausted`] if `2 * width * height` nodes
///   were expanded without reaching the goal.
pub fn find_path(start: &Position, goal: &Position, grid: &Grid) -> Result<Vec<Position>, WorldError> {
    let (width, height) = (grid.width(), grid.height());
    if !start.in_bounds(width, height) {
        return Err(WorldError::out_of_bounds(*start, width, height));
    }
    if !goal.in_bounds(width, height) {
        return Err(WorldError::out_of_bounds(*goal, width, height));
    }

    let start_cell = start.cell();
    let goal_cell = goal.cell();
    if start_cell == goal_cell {
        return Ok(vec![cell_center(goal_cell)]);
    }
    if !grid.is_walkable(goal_cell) {
        return Err(WorldError::NoPath {
            from: start_cell,
            to: goal_cell,
        });
    }

    let budget = 2_u64
        .saturating_mul(u64::from(width))
        .saturating_mul(u64::from(height));

    let mut open = BinaryHeap::new();
    let mut g_score: BTreeMap<(i64, i64), f64> = BTreeMap::new();
    let mut came_from: BTreeMap<(i64, i64), (i64, i64)> = BTreeMap::new();
    let mut seq: u64 = 0;

    g_score.insert(start_cell, 0.0);
    open.push(OpenNode {
        f: heuristic(start_cell, goal_cell),
        seq,
        cell: start_cell,
    });

    let mut expanded: u64 = 0;
    while let Some(node) = open.pop() {
        expanded = expanded.saturating_add(1);
        if expanded > budget {
            return Err(WorldError::SearchBudgetExhausted { expanded });
        }

        if node.cell == goal_cell {
            return Ok(reconstruct(&came_from, start_cell, goal_cell));
        }

        let current_g = g_score.get(&node.cell).copied().unwrap_or(f64::INFINITY);
        for (dx, dy) in NEIGHBORS {
            let next = (node.cell.0.saturating_add(dx), node.cell.1.saturating_add(dy));
            if !grid.is_walkable(next) {
                continue;
            }
            // Unit cost per step, diagonals included.
            let tentative = current_g + 1.0;
            let best = g_score.get(&next).copied().unwrap_or(f64::INFINITY);
            if tentative < best {
                g_score.insert(next, tentative);
                came_from.insert(next, node.cell);
                seq = seq.saturating_add(1);
                open.push(OpenNode {
                    f: tentative + heuristic(next, goal_cell),
                    seq,
                    cell: next,
                });
            }
        }
    }

    Err(WorldError::NoPath {
        from: start_cell,
        to: goal_cell,
    })
}

/// Like [`find_path`], but offsets each returned cell by a small random
/// sub-cell amount so co-located agents do not occupy identical points.
///
/// The jitter never crosses a cell boundary: every jittered position still
/// quantizes to the same grid cell as the unjittered path.
pub fn find_path_jittered<R: Rng>(
    start: &Position,
    goal: &Position,
    grid: &Grid,
    rng: &mut R,
) -> Result<Vec<Position>, WorldError> {
    let mut path = find_path(start, goal, grid)?;
    for pos in &mut path {
        let cell = pos.cell();
        pos.x += rng.random_range(-0.3..0.3);
        pos.y += rng.random_range(-0.3..0.3);
        debug_assert_eq!(pos.cell(), cell);
    }
    Ok(path)
}

/// Number of steps in a path (cells visited minus one).
pub fn path_steps(path: &[Position]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        path.len().saturating_sub(1) as f64
    }
}

/// Euclidean heuristic between two cells.
fn heuristic(a: (i64, i64), b: (i64, i64)) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        let dx = (a.0 - b.0) as f64;
        let dy = (a.1 - b.1) as f64;
        dx.hypot(dy)
    }
}

/// Center point of a cell.
fn cell_center(cell: (i64, i64)) -> Position {
    #[allow(clippy::cast_precision_loss)]
    Position::new(cell.0 as f64 + 0.5, cell.1 as f64 + 0.5)
}

/// Rebuild the cell sequence from the predecessor map.
fn reconstruct(
    came_from: &BTreeMap<(i64, i64), (i64, i64)>,
    start: (i64, i64),
    goal: (i64, i64),
) -> Vec<Position> {
    let mut cells = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(prev) => {
                current = *prev;
                cells.push(current);
            }
            // Unreachable by construction; bail out rather than loop.
            None => break,
        }
    }
    cells.reverse();
    cells.into_iter().map(cell_center).collect()
}
