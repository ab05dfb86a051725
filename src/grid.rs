//! Containers, occupancy, and text rendering of solutions.
//!
//! A container is an arbitrary non-empty set of lattice cells, so cuboids
//! with holes or irregular targets work the same way as plain boxes. Cells
//! are kept in lexicographic order and each one gets a dense index that the
//! solver uses for its occupancy slots.

use rustc_hash::FxHashMap;

use crate::cell::{Cell, Extent, Shape};
use crate::error::{Error, Result};
use crate::pieces::PieceId;
use crate::placement::Placement;
use crate::solver::Solution;

/// The target volume a puzzle must fill exactly.
#[derive(Clone, Debug)]
pub struct Container {
    shape: Shape,
    extent: Extent,
    index: FxHashMap<Cell, usize>,
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

impl Eq for Container {}

impl Container {
    /// Builds a container from an explicit set of cells.
    pub fn from_cells<I: IntoIterator<Item = Cell>>(cells: I) -> Result<Self> {
        Ok(Self::from_shape(Shape::new(cells)?))
    }

    pub fn from_shape(shape: Shape) -> Self {
        let extent = shape.extent();
        let index = shape.iter().enumerate().map(|(i, cell)| (cell, i)).collect();
        Self { shape, extent, index }
    }

    /// An `dx` x `dy` x `dz` box with its minimum corner at the origin.
    pub fn cuboid(dx: i32, dy: i32, dz: i32) -> Result<Self> {
        if dx <= 0 || dy <= 0 || dz <= 0 {
            return Err(Error::InvalidShape(format!(
                "container dimensions must be positive, got {dx}x{dy}x{dz}"
            )));
        }
        let cells = (0..dx).flat_map(|x| (0..dy).flat_map(move |y| (0..dz).map(move |z| Cell::new(x, y, z))));
        Self::from_cells(cells)
    }

    /// An `n` x `n` x `n` cube.
    pub fn cube(n: i32) -> Result<Self> {
        Self::cuboid(n, n, n)
    }

    /// The same container with the given cells removed.
    pub fn without<I: IntoIterator<Item = Cell>>(&self, holes: I) -> Result<Self> {
        let mut keep = vec![true; self.len()];
        for hole in holes {
            if let Some(i) = self.index_of(hole) {
                keep[i] = false;
            }
        }
        Self::from_cells(self.shape.iter().zip(keep).filter_map(|(cell, kept)| kept.then_some(cell)))
    }

    /// Number of cells to fill.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    /// Always false; containers are non-empty by construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Cells in lexicographic order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        self.shape.cells()
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        self.index.contains_key(&cell)
    }

    /// Dense index of a cell, in lexicographic order.
    #[inline]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        self.index.get(&cell).copied()
    }

    /// True if the container fills its whole bounding box.
    pub fn is_cuboid(&self) -> bool {
        self.extent.volume() == self.len()
    }
}

/// Which piece covers each cell, for incremental (manual) play.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Occupancy {
    cells: FxHashMap<Cell, PieceId>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn piece_at(&self, cell: Cell) -> Option<PieceId> {
        self.cells.get(&cell).copied()
    }

    #[inline]
    pub fn is_free(&self, cell: Cell) -> bool {
        !self.cells.contains_key(&cell)
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Marks the placement's cells as covered by its piece.
    ///
    /// Returns `false` and changes nothing if any cell is already covered.
    /// Containment is not checked here; see [`is_valid_placement`].
    pub fn occupy(&mut self, placement: &Placement) -> bool {
        if !placement.cells.iter().all(|cell| self.is_free(cell)) {
            return false;
        }
        for cell in placement.cells.iter() {
            self.cells.insert(cell, placement.piece_id);
        }
        true
    }

    /// Clears the cells of a placement that are covered by its piece.
    pub fn vacate(&mut self, placement: &Placement) {
        for cell in placement.cells.iter() {
            if self.cells.get(&cell) == Some(&placement.piece_id) {
                self.cells.remove(&cell);
            }
        }
    }

    /// True when every container cell is covered.
    pub fn is_complete(&self, container: &Container) -> bool {
        container.cells().iter().all(|&cell| !self.is_free(cell))
    }
}

/// Checks whether a placement can be added: every cell must be inside the
/// container and not already covered.
pub fn is_valid_placement(placement: &Placement, container: &Container, occupancy: &Occupancy) -> bool {
    placement
        .cells
        .iter()
        .all(|cell| container.contains(cell) && occupancy.is_free(cell))
}

/// Label used for the n-th placed piece (0-based) in rendered output.
fn piece_label(position: usize) -> char {
    match position {
        0..=8 => char::from(b'1' + position as u8),
        // letters for pieces past the ninth
        9..=34 => char::from(b'A' + (position - 9) as u8),
        _ => '#',
    }
}

/// Formats a solution as a human-readable string.
///
/// Displays the container's z-slices side by side, rows from top (highest
/// y) to bottom, with each piece labelled by its position in the solution.
/// Uncovered container cells show as '.', cells outside the container as
/// blanks. A legend mapping labels to pieces follows the slices.
pub fn format_solution(solution: &Solution, container: &Container) -> String {
    let extent = container.extent();
    let mut labels: FxHashMap<Cell, char> = FxHashMap::default();
    for (position, placed) in solution.pieces().iter().enumerate() {
        for cell in placed.placement.cells.iter() {
            labels.insert(cell, piece_label(position));
        }
    }

    let slice_width = extent.size().x as usize;
    let headers: Vec<String> = (extent.min.z..=extent.max.z).map(|z| format!("z={z}")).collect();
    let column_width = headers.iter().map(String::len).max().unwrap_or(0).max(slice_width);

    let mut lines = Vec::new();
    lines.push(
        headers
            .iter()
            .map(|header| format!("{header:<column_width$}"))
            .collect::<Vec<_>>()
            .join("  "),
    );

    for y in (extent.min.y..=extent.max.y).rev() {
        let row = (extent.min.z..=extent.max.z)
            .map(|z| {
                let slice: String = (extent.min.x..=extent.max.x)
                    .map(|x| {
                        let cell = Cell::new(x, y, z);
                        match labels.get(&cell) {
                            Some(&label) => label,
                            None if container.contains(cell) => '.',
                            None => ' ',
                        }
                    })
                    .collect();
                format!("{slice:<column_width$}")
            })
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(row);
    }

    for (position, placed) in solution.pieces().iter().enumerate() {
        lines.push(format!(
            "{}: {} (id {}, orientation {}, offset {})",
            piece_label(position),
            placed.meta.name,
            placed.placement.piece_id,
            placed.placement.orientation_index,
            placed.placement.offset,
        ));
    }

    let mut output = String::new();
    for line in lines {
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::orient;
    use crate::pieces::PieceMeta;
    use crate::solver::PlacedPiece;

    fn shape(cells: &[(i32, i32, i32)]) -> Shape {
        Shape::new(cells.iter().map(|&c| Cell::from(c))).unwrap()
    }

    fn square_layer(id: PieceId, z: i32) -> PlacedPiece {
        let square = orient(id, &shape(&[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0)]));
        PlacedPiece {
            placement: Placement::new(&square[0], Cell::new(0, 0, z)),
            meta: PieceMeta {
                name: format!("Square {id}"),
                color: "rgb(0, 0, 0)".into(),
            },
        }
    }

    #[test]
    fn test_cuboid_cells_are_indexed_in_order() {
        let container = Container::cuboid(2, 3, 4).unwrap();
        assert_eq!(container.len(), 24);
        assert!(container.is_cuboid());
        for (i, &cell) in container.cells().iter().enumerate() {
            assert_eq!(container.index_of(cell), Some(i));
        }
        assert_eq!(container.index_of(Cell::new(0, 0, 1)), Some(1));
        assert_eq!(container.index_of(Cell::new(1, 0, 0)), Some(12));
        assert_eq!(container.index_of(Cell::new(2, 0, 0)), None);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(Container::cuboid(0, 2, 2), Err(Error::InvalidShape(_))));
        assert!(matches!(Container::from_cells(Vec::new()), Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_container_with_hole() {
        let container = Container::cube(3).unwrap().without([Cell::new(1, 1, 1)]).unwrap();
        assert_eq!(container.len(), 26);
        assert!(!container.contains(Cell::new(1, 1, 1)));
        assert!(!container.is_cuboid());
        assert_eq!(container.extent(), Container::cube(3).unwrap().extent());
    }

    #[test]
    fn test_valid_placement_checks_bounds_holes_and_overlap() {
        let container = Container::cube(2).unwrap().without([Cell::new(1, 1, 1)]).unwrap();
        let domino = orient(2, &shape(&[(0, 0, 0), (1, 0, 0)]));
        let mut occupancy = Occupancy::new();

        let bottom = Placement::new(&domino[0], Cell::new(0, 0, 0));
        assert!(is_valid_placement(&bottom, &container, &occupancy));
        assert!(occupancy.occupy(&bottom));
        assert_eq!(occupancy.piece_at(Cell::new(1, 0, 0)), Some(2));

        // overlaps the first domino
        assert!(!is_valid_placement(&bottom, &container, &occupancy));
        assert!(!occupancy.occupy(&bottom));

        // touches the hole
        let over_hole = Placement::new(&domino[0], Cell::new(0, 1, 1));
        assert!(!is_valid_placement(&over_hole, &container, &Occupancy::new()));

        // leaves the box
        let outside = Placement::new(&domino[0], Cell::new(1, 0, 0));
        assert!(!is_valid_placement(&outside, &container, &Occupancy::new()));

        occupancy.vacate(&bottom);
        assert!(occupancy.is_empty());
    }

    #[test]
    fn test_occupancy_completion() {
        let container = Container::cube(2).unwrap();
        let mut occupancy = Occupancy::new();
        let lower = square_layer(1, 0);
        let upper = square_layer(2, 1);
        assert!(occupancy.occupy(&lower.placement));
        assert!(!occupancy.is_complete(&container));
        assert!(occupancy.occupy(&upper.placement));
        assert!(occupancy.is_complete(&container));
        assert_eq!(occupancy.len(), 8);
    }

    #[test]
    fn test_format_solution_snapshot() {
        let container = Container::cuboid(2, 2, 3).unwrap();
        let solution = Solution::new(vec![square_layer(7, 0), square_layer(9, 2)]);
        insta::assert_snapshot!(format_solution(&solution, &container), @r"
        z=0  z=1  z=2
        11   ..   22
        11   ..   22
        1: Square 7 (id 7, orientation 0, offset (0, 0, 0))
        2: Square 9 (id 9, orientation 0, offset (0, 0, 2))
        ");
    }

    #[test]
    fn test_format_marks_holes_blank() {
        let container = Container::cube(2).unwrap().without([Cell::new(0, 1, 0)]).unwrap();
        let rendered = format_solution(&Solution::new(Vec::new()), &container);
        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows[1], " .   ..");
        assert_eq!(rows[2], "..   ..");
    }

    #[test]
    fn test_piece_labels() {
        assert_eq!(piece_label(0), '1');
        assert_eq!(piece_label(8), '9');
        assert_eq!(piece_label(9), 'A');
        assert_eq!(piece_label(34), 'Z');
        assert_eq!(piece_label(35), '#');
    }
}
