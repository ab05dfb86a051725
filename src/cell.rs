//! Integer lattice cells and cell sets.
//!
//! Everything in the engine lives on the unit cube lattice, so all
//! coordinates are `i32` and no floating point is involved anywhere.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest absolute coordinate accepted in a shape. Sums and differences of
/// two in-range coordinates always fit in `i32`.
pub const COORD_LIMIT: i32 = 1 << 20;

/// A unit cube position in 3D space.
///
/// The derived ordering is lexicographic on `(x, y, z)`, which the solver
/// relies on for reproducible tie-breaking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cell {
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// True if every component lies in `-limit..=limit`.
    #[inline]
    pub fn within(self, limit: i32) -> bool {
        self.to_array().iter().all(|c| (-limit..=limit).contains(c))
    }

    #[inline]
    pub const fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Cell {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Cell {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Cell {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl From<(i32, i32, i32)> for Cell {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[i32; 3]> for Cell {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Inclusive axis-aligned bounding box of a set of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub min: Cell,
    pub max: Cell,
}

impl Extent {
    /// Computes the bounding box of `cells`, or `None` if there are none.
    pub fn of<I: IntoIterator<Item = Cell>>(cells: I) -> Option<Self> {
        let mut cells = cells.into_iter();
        let first = cells.next()?;
        Some(cells.fold(Self { min: first, max: first }, |extent, cell| Self {
            min: extent.min.min(cell),
            max: extent.max.max(cell),
        }))
    }

    /// Number of cells spanned along each axis.
    #[inline]
    pub fn size(&self) -> Cell {
        self.max - self.min + Cell::new(1, 1, 1)
    }

    /// Number of lattice positions inside the box.
    pub fn volume(&self) -> usize {
        let size = self.size();
        size.x as usize * size.y as usize * size.z as usize
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x)
            && (self.min.y..=self.max.y).contains(&cell.y)
            && (self.min.z..=self.max.z).contains(&cell.z)
    }
}

/// A non-empty set of cells, kept sorted and free of duplicates.
///
/// Keeping the cells sorted makes equality a plain slice comparison, so two
/// shapes compare equal exactly when they cover the same lattice positions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Cell>", into = "Vec<Cell>")]
pub struct Shape {
    cells: Vec<Cell>,
}

impl Shape {
    /// Builds a shape from an unordered list of cells.
    ///
    /// Fails with [`Error::InvalidShape`] if the list is empty, names the
    /// same cell twice, or has a coordinate beyond [`COORD_LIMIT`].
    pub fn new<I: IntoIterator<Item = Cell>>(cells: I) -> Result<Self> {
        let mut cells: Vec<Cell> = cells.into_iter().collect();
        if cells.is_empty() {
            return Err(Error::InvalidShape("shape has no cells".into()));
        }
        if let Some(cell) = cells.iter().find(|cell| !cell.within(COORD_LIMIT)) {
            return Err(Error::InvalidShape(format!("cell {cell} is out of range")));
        }
        cells.sort_unstable();
        if let Some(pair) = cells.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::InvalidShape(format!("cell {} listed twice", pair[0])));
        }
        Ok(Self { cells })
    }

    /// Builds a shape from cells the caller guarantees are distinct.
    pub(crate) fn from_distinct(mut cells: Vec<Cell>) -> Self {
        debug_assert!(!cells.is_empty());
        cells.sort_unstable();
        debug_assert!(cells.windows(2).all(|pair| pair[0] != pair[1]));
        Self { cells }
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    /// Number of unit cubes in the shape (its volume).
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; shapes are non-empty by construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.binary_search(&cell).is_ok()
    }

    pub fn extent(&self) -> Extent {
        let first = self.cells[0];
        self.cells.iter().fold(Extent { min: first, max: first }, |extent, &cell| Extent {
            min: extent.min.min(cell),
            max: extent.max.max(cell),
        })
    }

    /// Shifts every cell by `offset`. Translation preserves the sort order.
    pub fn translate(&self, offset: Cell) -> Self {
        Self {
            cells: self.cells.iter().map(|&cell| cell + offset).collect(),
        }
    }
}

impl TryFrom<Vec<Cell>> for Shape {
    type Error = Error;

    fn try_from(cells: Vec<Cell>) -> Result<Self> {
        Self::new(cells)
    }
}

impl From<Shape> for Vec<Cell> {
    fn from(shape: Shape) -> Self {
        shape.cells
    }
}

impl<'a> IntoIterator for &'a Shape {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
