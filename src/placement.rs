//! Enumerating where an orientation fits inside a container.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Shape};
use crate::geometry::Orientation;
use crate::grid::Container;
use crate::pieces::PieceId;

/// One orientation of one piece, translated to a concrete position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub piece_id: PieceId,
    pub orientation_index: usize,
    /// Translation applied to the orientation's origin-normalized cells.
    pub offset: Cell,
    /// Absolute cells covered by the piece.
    pub cells: Shape,
}

impl Placement {
    pub fn new(orientation: &Orientation, offset: Cell) -> Self {
        Self {
            piece_id: orientation.piece_id,
            orientation_index: orientation.index,
            offset,
            cells: orientation.shape.translate(offset),
        }
    }

    #[inline]
    pub fn covers(&self, cell: Cell) -> bool {
        self.cells.contains(cell)
    }
}

/// Lazily yields every placement of an orientation whose cells stay inside
/// the container's bounding box.
///
/// Offsets are visited in lexicographic `(x, y, z)` order. Only bounds are
/// checked; holes in the container and other pieces are the solver's
/// concern.
#[derive(Clone, Debug)]
pub struct Placements<'a> {
    orientation: &'a Orientation,
    first: Cell,
    last: Cell,
    next: Option<Cell>,
}

impl Iterator for Placements<'_> {
    type Item = Placement;

    fn next(&mut self) -> Option<Placement> {
        let offset = self.next?;
        self.next = self.successor(offset);
        Some(Placement::new(self.orientation, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Placements<'_> {}

impl Placements<'_> {
    /// Advances an offset with z varying fastest.
    fn successor(&self, mut offset: Cell) -> Option<Cell> {
        if offset.z < self.last.z {
            offset.z += 1;
            return Some(offset);
        }
        offset.z = self.first.z;
        if offset.y < self.last.y {
            offset.y += 1;
            return Some(offset);
        }
        offset.y = self.first.y;
        if offset.x < self.last.x {
            offset.x += 1;
            return Some(offset);
        }
        None
    }

    fn remaining(&self) -> usize {
        let Some(next) = self.next else {
            return 0;
        };
        let span = self.last - self.first + Cell::new(1, 1, 1);
        let position = next - self.first;
        let total = span.x as usize * span.y as usize * span.z as usize;
        let done = (position.x as usize * span.y as usize + position.y as usize) * span.z as usize
            + position.z as usize;
        total - done
    }
}

/// Enumerates all bounds-respecting placements of `orientation` in `container`.
///
/// The returned iterator is finite, and calling this again restarts the
/// enumeration from the first offset.
pub fn placements<'a>(orientation: &'a Orientation, container: &Container) -> Placements<'a> {
    let bounds = container.extent();
    let shape = orientation.shape.extent();

    let first = bounds.min - shape.min;
    let last = bounds.max - shape.max;
    let fits = first.x <= last.x && first.y <= last.y && first.z <= last.z;

    Placements {
        orientation,
        first,
        last,
        next: fits.then_some(first),
    }
}

/// Total number of placements across a piece's orientations.
pub fn placement_count(orientations: &[Orientation], container: &Container) -> usize {
    orientations
        .iter()
        .map(|orientation| placements(orientation, container).len())
        .sum()
}
