//! Flattened 3D wall/open lattice.
//!
//! Cells are stored x-fastest: `index(x, y, z) = x + sx * (y + sy * z)`.
//! A `Grid` is a plain value: tests may build any layout with [`Grid::new`]
//! and [`Grid::set`] without going through the generator.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer lattice coordinate. Signed so that a candidate one step outside the
/// grid is representable and can be rejected by bounds checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, d: [i32; 3]) -> Self {
        Self::new(self.x + d[0], self.y + d[1], self.z + d[2])
    }

    #[inline]
    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) + self.z.abs_diff(other.z)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Grid extents. Always at least 1 along every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dims {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Dims {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self {
            x: x.max(1),
            y: y.max(1),
            z: z.max(1),
        }
    }

    /// Extents rounded up to the next odd value (even -> +1, so 0 -> 1).
    ///
    /// The carving lattice needs odd extents so that every all-odd node has a
    /// wall ring around the border.
    pub fn odd(x: usize, y: usize, z: usize) -> Self {
        fn up(v: usize) -> usize {
            if v % 2 == 0 {
                v + 1
            } else {
                v
            }
        }
        Self::new(up(x), up(y), up(z))
    }

    pub fn as_array(self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }

    pub fn cell_count(self) -> usize {
        self.x * self.y * self.z
    }

    /// Largest Manhattan distance between any two cells of this grid.
    pub fn max_manhattan(self) -> u32 {
        (self.x.saturating_sub(1) + self.y.saturating_sub(1) + self.z.saturating_sub(1)) as u32
    }

    #[inline]
    pub fn contains(self, c: Coord) -> bool {
        c.x >= 0
            && c.y >= 0
            && c.z >= 0
            && (c.x as usize) < self.x
            && (c.y as usize) < self.y
            && (c.z as usize) < self.z
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cell {
    Wall,
    Open,
}

/// The six axis-aligned unit moves. Discriminants are the action indices the
/// inference boundary speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

pub const ACTION_COUNT: usize = 6;

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::PosX,
        Action::NegX,
        Action::PosY,
        Action::NegY,
        Action::PosZ,
        Action::NegZ,
    ];

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// Total over all integers: anything below 0 maps to `PosX`, anything
    /// above 5 maps to `NegZ`.
    pub fn clamped(raw: i64) -> Self {
        Self::ALL[raw.clamp(0, ACTION_COUNT as i64 - 1) as usize]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn delta(self) -> [i32; 3] {
        match self {
            Action::PosX => [1, 0, 0],
            Action::NegX => [-1, 0, 0],
            Action::PosY => [0, 1, 0],
            Action::NegY => [0, -1, 0],
            Action::PosZ => [0, 0, 1],
            Action::NegZ => [0, 0, -1],
        }
    }

    pub fn from_action_str(action: &str) -> Option<Self> {
        match action {
            "+x" | "px" => Some(Action::PosX),
            "-x" | "nx" => Some(Action::NegX),
            "+y" | "py" => Some(Action::PosY),
            "-y" | "ny" => Some(Action::NegY),
            "+z" | "pz" => Some(Action::PosZ),
            "-z" | "nz" => Some(Action::NegZ),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::PosX => "+x",
            Action::NegX => "-x",
            Action::PosY => "+y",
            Action::NegY => "-y",
            Action::PosZ => "+z",
            Action::NegZ => "-z",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("grid {dims} needs {expected} cells, got {actual}")]
    CellCountMismatch {
        dims: Dims,
        expected: usize,
        actual: usize,
    },
    #[error("coordinate {coord} is outside grid {dims}")]
    OutOfBounds { coord: Coord, dims: Dims },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "GridRepr"))]
pub struct Grid {
    dims: Dims,
    cells: Vec<Cell>,
}

/// Unchecked wire form; goes through `Grid::from_cells` on the way in.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct GridRepr {
    dims: Dims,
    cells: Vec<Cell>,
}

#[cfg(feature = "serde")]
impl TryFrom<GridRepr> for Grid {
    type Error = GridError;

    fn try_from(raw: GridRepr) -> Result<Self, Self::Error> {
        Grid::from_cells(raw.dims, raw.cells)
    }
}

impl Grid {
    /// All-wall grid of exactly `dims` (no odd coercion).
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            cells: vec![Cell::Wall; dims.cell_count()],
        }
    }

    pub fn from_cells(dims: Dims, cells: Vec<Cell>) -> Result<Self, GridError> {
        let expected = dims.cell_count();
        if cells.len() != expected {
            return Err(GridError::CellCountMismatch {
                dims,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { dims, cells })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Flattened open mask, `true` = open. This is what renderers consume.
    pub fn open_mask(&self) -> Vec<bool> {
        self.cells.iter().map(|c| *c == Cell::Open).collect()
    }

    #[inline]
    pub fn index(&self, c: Coord) -> Option<usize> {
        if !self.dims.contains(c) {
            return None;
        }
        let (x, y, z) = (c.x as usize, c.y as usize, c.z as usize);
        Some(x + self.dims.x * (y + self.dims.y * z))
    }

    #[inline]
    pub fn coord_of(&self, index: usize) -> Coord {
        let x = index % self.dims.x;
        let y = (index / self.dims.x) % self.dims.y;
        let z = index / (self.dims.x * self.dims.y);
        Coord::new(x as i32, y as i32, z as i32)
    }

    pub fn get(&self, c: Coord) -> Option<Cell> {
        self.index(c).map(|i| self.cells[i])
    }

    /// Out-of-bounds counts as not open.
    #[inline]
    pub fn is_open(&self, c: Coord) -> bool {
        matches!(self.get(c), Some(Cell::Open))
    }

    /// Out-of-bounds counts as wall.
    #[inline]
    pub fn is_wall(&self, c: Coord) -> bool {
        !self.is_open(c)
    }

    pub fn set(&mut self, c: Coord, cell: Cell) -> Result<(), GridError> {
        let dims = self.dims;
        let i = self
            .index(c)
            .ok_or(GridError::OutOfBounds { coord: c, dims })?;
        self.cells[i] = cell;
        Ok(())
    }

    pub(crate) fn set_index(&mut self, i: usize, cell: Cell) {
        self.cells[i] = cell;
    }

    pub fn open_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Open).count()
    }

    /// Open cells in index order.
    pub fn open_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Open)
            .map(|(i, _)| self.coord_of(i))
    }

    /// Open 6-neighbours of `c`, tagged with the action that reaches them.
    pub fn open_neighbors(&self, c: Coord) -> impl Iterator<Item = (Action, Coord)> + '_ {
        Action::ALL.into_iter().filter_map(move |a| {
            let n = c.offset(a.delta());
            self.is_open(n).then_some((a, n))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_rejects_wrong_cell_count() {
        let bad = r#"{"dims":{"x":3,"y":3,"z":3},"cells":["Open"]}"#;
        let err = serde_json::from_str::<Grid>(bad).unwrap_err();
        assert!(err.to_string().contains("needs 27 cells"), "{err}");

        let mut g = Grid::new(Dims::new(3, 3, 3));
        g.set(Coord::new(1, 1, 1), Cell::Open).unwrap();
        let json = serde_json::to_string(&g).unwrap();
        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert!(back.is_open(Coord::new(1, 1, 1)));
        assert!(!back.is_open(Coord::new(2, 2, 2)));
    }

    #[test]
    fn odd_coercion_bumps_even_extents() {
        assert_eq!(Dims::odd(10, 11, 4), Dims::new(11, 11, 5));
        assert_eq!(Dims::odd(0, 1, 2), Dims::new(1, 1, 3));
    }

    #[test]
    fn index_round_trips_through_coord() {
        let g = Grid::new(Dims::new(5, 3, 7));
        for i in 0..g.dims().cell_count() {
            let c = g.coord_of(i);
            assert_eq!(g.index(c), Some(i));
        }
        assert_eq!(g.index(Coord::new(1, 2, 3)), Some(1 + 5 * (2 + 3 * 3)));
    }

    #[test]
    fn out_of_bounds_is_wall() {
        let mut g = Grid::new(Dims::new(3, 3, 3));
        g.set(Coord::new(1, 1, 1), Cell::Open).unwrap();
        assert!(g.is_open(Coord::new(1, 1, 1)));
        assert!(g.is_wall(Coord::new(-1, 1, 1)));
        assert!(g.is_wall(Coord::new(1, 3, 1)));
        assert!(g.set(Coord::new(3, 0, 0), Cell::Open).is_err());
    }

    #[test]
    fn from_cells_checks_length() {
        let dims = Dims::new(2, 2, 2);
        assert!(Grid::from_cells(dims, vec![Cell::Wall; 7]).is_err());
        assert!(Grid::from_cells(dims, vec![Cell::Open; 8]).is_ok());
    }

    #[test]
    fn clamped_action_is_total() {
        assert_eq!(Action::clamped(-40), Action::PosX);
        assert_eq!(Action::clamped(3), Action::NegY);
        assert_eq!(Action::clamped(i64::MAX), Action::NegZ);
        for a in Action::ALL {
            assert_eq!(Action::from_index(a.index()), Some(a));
            assert_eq!(Action::from_action_str(a.as_str()), Some(a));
        }
    }

    #[test]
    fn open_neighbors_skip_walls() {
        let mut g = Grid::new(Dims::new(3, 3, 3));
        let centre = Coord::new(1, 1, 1);
        g.set(centre, Cell::Open).unwrap();
        g.set(Coord::new(2, 1, 1), Cell::Open).unwrap();
        g.set(Coord::new(1, 1, 0), Cell::Open).unwrap();
        let found: Vec<Action> = g.open_neighbors(centre).map(|(a, _)| a).collect();
        assert_eq!(found, vec![Action::PosX, Action::NegZ]);
    }
}
