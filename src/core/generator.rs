//! Randomized depth-first maze carving on the all-odd sublattice.
//!
//! Nodes are cells whose coordinates are all odd and strictly inside the
//! border. Two nodes are adjacent when they differ by 2 along one axis; the
//! cell between them is the wall that gets knocked down. Every carved cell is
//! reached from the start through the carve itself, so the open region is
//! connected by construction.

use crate::grid::{Action, Cell, Coord, Dims, Grid};
use crate::prng::{Prng, RandomSource};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the goal cell is picked once a grid is carved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GoalRule {
    /// Open cell with the largest Manhattan distance from the start.
    #[default]
    Farthest,
    /// `(sx-2, sy-2, sz-2)`, moved to the nearest open cell if it is a wall.
    FarCorner,
}

impl GoalRule {
    pub fn name(self) -> &'static str {
        match self {
            GoalRule::Farthest => "farthest",
            GoalRule::FarCorner => "far_corner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farthest" | "far" => Some(GoalRule::Farthest),
            "far_corner" | "corner" | "far-corner" => Some(GoalRule::FarCorner),
            _ => None,
        }
    }
}

/// A carved grid together with its start and goal.
#[derive(Debug, Clone)]
pub struct MazeLayout {
    pub grid: Grid,
    pub start: Coord,
    pub goal: Coord,
}

/// The carving origin: `(1, 1, 1)`, except that an axis of extent 1 only has
/// coordinate 0.
pub fn start_cell(dims: Dims) -> Coord {
    let axis = |extent: usize| if extent > 1 { 1 } else { 0 };
    Coord::new(axis(dims.x), axis(dims.y), axis(dims.z))
}

#[inline]
fn is_node(dims: Dims, c: Coord) -> bool {
    let inside = |v: i32, extent: usize| v >= 1 && (v as i64) < extent as i64 - 1;
    inside(c.x, dims.x) && inside(c.y, dims.y) && inside(c.z, dims.z)
}

/// Carve a maze. Requested extents are rounded up to odd values.
pub fn generate<R: RandomSource>(requested: Dims, rng: &mut R) -> Grid {
    let dims = Dims::odd(requested.x, requested.y, requested.z);
    let mut grid = Grid::new(dims);

    let start = start_cell(dims);
    let Some(start_idx) = grid.index(start) else {
        return grid;
    };
    grid.set_index(start_idx, Cell::Open);

    let mut visited = vec![false; dims.cell_count()];
    visited[start_idx] = true;

    let mut stack: Vec<Coord> = vec![start];

    while let Some(&cur) = stack.last() {
        let mut candidates: [(Coord, Coord); 6] = [(cur, cur); 6];
        let mut n = 0usize;

        for a in Action::ALL {
            let [dx, dy, dz] = a.delta();
            let next = cur.offset([dx * 2, dy * 2, dz * 2]);
            if !is_node(dims, next) {
                continue;
            }
            let Some(ni) = grid.index(next) else {
                continue;
            };
            if visited[ni] {
                continue;
            }
            candidates[n] = (cur.offset([dx, dy, dz]), next);
            n += 1;
        }

        if n == 0 {
            stack.pop();
            continue;
        }

        let (between, next) = candidates[rng.index_below(n)];
        if let (Some(bi), Some(ni)) = (grid.index(between), grid.index(next)) {
            grid.set_index(bi, Cell::Open);
            grid.set_index(ni, Cell::Open);
            visited[ni] = true;
            stack.push(next);
        }
    }

    grid
}

pub fn generate_seeded(requested: Dims, seed: u64) -> Grid {
    let mut rng = Prng::new(seed);
    generate(requested, &mut rng)
}

/// Carve a grid and resolve its start and goal.
pub fn generate_layout<R: RandomSource>(requested: Dims, rule: GoalRule, rng: &mut R) -> MazeLayout {
    let grid = generate(requested, rng);
    let start = start_cell(grid.dims());
    let goal = choose_goal(&grid, start, rule);
    MazeLayout { grid, start, goal }
}

pub fn choose_goal(grid: &Grid, start: Coord, rule: GoalRule) -> Coord {
    match rule {
        GoalRule::Farthest => farthest_open(grid, start),
        GoalRule::FarCorner => far_corner_goal(grid, start),
    }
}

/// Scan x-major, then y, then z; the first cell at the maximum distance wins.
/// Falls back to `start` when no cell is open.
pub fn farthest_open(grid: &Grid, start: Coord) -> Coord {
    let dims = grid.dims();
    let mut best = start;
    let mut best_d: i64 = -1;
    for x in 0..dims.x as i32 {
        for y in 0..dims.y as i32 {
            for z in 0..dims.z as i32 {
                let c = Coord::new(x, y, z);
                if !grid.is_open(c) {
                    continue;
                }
                let d = c.manhattan(start) as i64;
                if d > best_d {
                    best_d = d;
                    best = c;
                }
            }
        }
    }
    best
}

pub fn far_corner_goal(grid: &Grid, start: Coord) -> Coord {
    let dims = grid.dims();
    let corner = Coord::new(
        (dims.x as i32 - 2).max(0),
        (dims.y as i32 - 2).max(0),
        (dims.z as i32 - 2).max(0),
    );
    if grid.is_open(corner) {
        return corner;
    }
    grid.open_cells()
        .min_by_key(|c| c.manhattan(corner))
        .unwrap_or(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::is_fully_connected;

    #[test]
    fn maze_regenerates_deterministically() {
        let a = generate_seeded(Dims::new(7, 7, 5), 123);
        let b = generate_seeded(Dims::new(7, 7, 5), 123);
        assert_eq!(a, b);

        let c = generate_seeded(Dims::new(7, 7, 5), 124);
        assert_ne!(a.cells(), c.cells());
    }

    #[test]
    fn even_extents_are_rounded_up() {
        let g = generate_seeded(Dims::new(10, 4, 6), 1);
        assert_eq!(g.dims(), Dims::new(11, 5, 7));
    }

    #[test]
    fn every_open_cell_reachable_from_start() {
        for seed in 0..40u64 {
            for &(x, y, z) in &[(3, 3, 3), (5, 5, 5), (11, 11, 5), (9, 3, 7), (13, 7, 3)] {
                let g = generate_seeded(Dims::new(x, y, z), seed);
                assert!(
                    is_fully_connected(&g, Coord::new(1, 1, 1)),
                    "seed {seed} dims {}",
                    g.dims()
                );
            }
        }
    }

    #[test]
    fn every_odd_node_is_carved() {
        let g = generate_seeded(Dims::new(9, 7, 5), 99);
        let dims = g.dims();
        for x in (1..dims.x as i32 - 1).step_by(2) {
            for y in (1..dims.y as i32 - 1).step_by(2) {
                for z in (1..dims.z as i32 - 1).step_by(2) {
                    assert!(g.is_open(Coord::new(x, y, z)));
                }
            }
        }
    }

    #[test]
    fn border_stays_walled() {
        let g = generate_seeded(Dims::new(7, 7, 7), 5);
        for c in g.open_cells() {
            assert!(c.x >= 1 && c.x <= 5);
            assert!(c.y >= 1 && c.y <= 5);
            assert!(c.z >= 1 && c.z <= 5);
        }
    }

    #[test]
    fn carve_is_a_tree() {
        // A perfect maze over n nodes opens n nodes plus n-1 connectors.
        let g = generate_seeded(Dims::new(9, 9, 5), 17);
        let nodes = 4 * 4 * 2;
        assert_eq!(g.open_count(), nodes + nodes - 1);
    }

    #[test]
    fn degenerate_extent_leaves_only_start_open() {
        for dims in [Dims::new(1, 1, 1), Dims::new(1, 9, 9), Dims::new(7, 1, 7), Dims::new(0, 0, 0)] {
            let g = generate_seeded(dims, 8);
            assert_eq!(g.open_count(), 1, "dims {}", g.dims());
            assert!(g.is_open(start_cell(g.dims())));
        }
    }

    #[test]
    fn flat_three_high_axis_still_carves() {
        // z extent 3 keeps a single node layer; x/y still carve.
        let g = generate_seeded(Dims::new(11, 11, 3), 4);
        assert!(g.open_count() > 1);
        assert!(is_fully_connected(&g, Coord::new(1, 1, 1)));
    }

    #[test]
    fn farthest_goal_maximises_distance() {
        let mut rng = Prng::new(77);
        let layout = generate_layout(Dims::new(11, 11, 5), GoalRule::Farthest, &mut rng);
        let d = layout.goal.manhattan(layout.start);
        for c in layout.grid.open_cells() {
            assert!(c.manhattan(layout.start) <= d);
        }
        assert!(layout.grid.is_open(layout.goal));
    }

    #[test]
    fn far_corner_goal_is_open() {
        let mut rng = Prng::new(78);
        let layout = generate_layout(Dims::new(11, 11, 5), GoalRule::FarCorner, &mut rng);
        assert_eq!(layout.goal, Coord::new(9, 9, 3));
        assert!(layout.grid.is_open(layout.goal));
    }

    #[test]
    fn far_corner_falls_back_to_nearest_open() {
        let mut g = Grid::new(Dims::new(5, 5, 5));
        g.set(Coord::new(1, 1, 1), Cell::Open).unwrap();
        g.set(Coord::new(2, 1, 1), Cell::Open).unwrap();
        assert_eq!(
            far_corner_goal(&g, Coord::new(1, 1, 1)),
            Coord::new(2, 1, 1)
        );
    }

    #[test]
    fn goal_rule_parses_names() {
        for rule in [GoalRule::Farthest, GoalRule::FarCorner] {
            assert_eq!(GoalRule::parse(rule.name()), Some(rule));
        }
        assert_eq!(GoalRule::parse("nowhere"), None);
    }
}
