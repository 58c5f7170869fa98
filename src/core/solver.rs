//! Breadth-first shortest paths over open cells, plus the path-follow navigator.

use std::collections::VecDeque;

use crate::grid::{Action, Coord, Grid};

/// Ordered cells from start to goal inclusive. Empty means "no path".
pub type Path = Vec<Coord>;

const UNSET: usize = usize::MAX;

/// Shortest path from `start` to `goal` by edge count.
///
/// Returns an empty path when either endpoint is a wall or outside the grid,
/// or when the goal is unreachable. Never panics on bad input.
pub fn solve(grid: &Grid, start: Coord, goal: Coord) -> Path {
    let (Some(si), Some(gi)) = (grid.index(start), grid.index(goal)) else {
        return Vec::new();
    };
    if !grid.is_open(start) || !grid.is_open(goal) {
        return Vec::new();
    }
    if si == gi {
        return vec![start];
    }

    let mut pred = vec![UNSET; grid.dims().cell_count()];
    pred[si] = si;
    let mut frontier = VecDeque::new();
    frontier.push_back(start);

    let mut found = false;
    while let Some(cur) = frontier.pop_front() {
        if cur == goal {
            found = true;
            break;
        }
        let Some(ci) = grid.index(cur) else {
            continue;
        };
        for (_, next) in grid.open_neighbors(cur) {
            if let Some(ni) = grid.index(next) {
                if pred[ni] == UNSET {
                    pred[ni] = ci;
                    frontier.push_back(next);
                }
            }
        }
    }

    if !found || pred[gi] == UNSET {
        return Vec::new();
    }

    let mut path = Vec::new();
    let mut i = gi;
    loop {
        path.push(grid.coord_of(i));
        if i == si {
            break;
        }
        i = pred[i];
    }
    path.reverse();
    path
}

/// The single action that moves from `a` to an adjacent `b`.
/// `None` when the cells are not exactly one unit apart on one axis.
pub fn action_between(a: Coord, b: Coord) -> Option<Action> {
    match (b.x - a.x, b.y - a.y, b.z - a.z) {
        (1, 0, 0) => Some(Action::PosX),
        (-1, 0, 0) => Some(Action::NegX),
        (0, 1, 0) => Some(Action::PosY),
        (0, -1, 0) => Some(Action::NegY),
        (0, 0, 1) => Some(Action::PosZ),
        (0, 0, -1) => Some(Action::NegZ),
        _ => None,
    }
}

/// Action sequence along a path. Stops at the first non-adjacent pair.
pub fn path_actions(path: &[Coord]) -> Vec<Action> {
    path.windows(2)
        .map_while(|w| action_between(w[0], w[1]))
        .collect()
}

/// Open cells reachable from `from`, as a mask over cell indices.
pub fn reachable(grid: &Grid, from: Coord) -> Vec<bool> {
    let mut seen = vec![false; grid.dims().cell_count()];
    let Some(fi) = grid.index(from) else {
        return seen;
    };
    if !grid.is_open(from) {
        return seen;
    }
    seen[fi] = true;
    let mut frontier = VecDeque::from([from]);
    while let Some(cur) = frontier.pop_front() {
        for (_, next) in grid.open_neighbors(cur) {
            if let Some(ni) = grid.index(next) {
                if !seen[ni] {
                    seen[ni] = true;
                    frontier.push_back(next);
                }
            }
        }
    }
    seen
}

/// True when every open cell of `grid` can be reached from `from`.
pub fn is_fully_connected(grid: &Grid, from: Coord) -> bool {
    let seen = reachable(grid, from);
    grid.open_cells()
        .all(|c| grid.index(c).map(|i| seen[i]).unwrap_or(false))
}

/// Walks a precomputed route.
///
/// The cursor moves past the agent's cell whenever that cell appears on the
/// rest of the route, so an agent that rejoins further along (say after a
/// stretch under the policy) picks up from there. The emitted action heads for
/// the cell after it. Once the route is used up, or the agent has drifted off
/// it, `next_action` yields `None` and the caller falls back to its policy.
#[derive(Debug, Clone, Default)]
pub struct PathFollower {
    path: Path,
    cursor: usize,
}

impl PathFollower {
    pub fn new(path: Path) -> Self {
        Self { path, cursor: 0 }
    }

    pub fn path(&self) -> &[Coord] {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.path.len()
    }

    pub fn next_action(&mut self, position: Coord) -> Option<Action> {
        let ahead = self
            .path
            .get(self.cursor..)
            .and_then(|rest| rest.iter().position(|&c| c == position));
        if let Some(k) = ahead {
            self.cursor += k + 1;
        }
        let target = *self.path.get(self.cursor)?;
        action_between(position, target)
    }
}
