//! 3D rotation and shape normalization utilities.
//!
//! A cube has 24 possible orientations in 3D space (the rotation group of a cube).
//! These are the 6 ways to choose which face points up, times 4 rotations around
//! the vertical axis. Rather than listing them by hand, the group is generated
//! as the closure of the three quarter-turns about X, Y and Z.

use std::sync::OnceLock;

use rustc_hash::FxHashSet;

use crate::cell::{Cell, Shape};
use crate::pieces::PieceId;

/// Number of proper rotations of the cube.
pub const NUM_ROTATIONS: usize = 24;

/// A proper rotation of the integer lattice, stored as a 3x3 matrix with
/// entries in {-1, 0, 1}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rotation([[i32; 3]; 3]);

impl Rotation {
    pub const IDENTITY: Self = Self([[1, 0, 0], [0, 1, 0], [0, 0, 1]]);

    /// 90 degrees about the X axis: (x, y, z) -> (x, -z, y).
    const QUARTER_X: Self = Self([[1, 0, 0], [0, 0, -1], [0, 1, 0]]);
    /// 90 degrees about the Y axis: (x, y, z) -> (z, y, -x).
    const QUARTER_Y: Self = Self([[0, 0, 1], [0, 1, 0], [-1, 0, 0]]);
    /// 90 degrees about the Z axis: (x, y, z) -> (-y, x, z).
    const QUARTER_Z: Self = Self([[0, -1, 0], [1, 0, 0], [0, 0, 1]]);

    #[inline]
    pub fn matrix(&self) -> [[i32; 3]; 3] {
        self.0
    }

    /// Rotates a single cell about the origin.
    #[inline]
    pub fn apply(&self, cell: Cell) -> Cell {
        let [a, b, c] = self.0;
        Cell::new(
            a[0] * cell.x + a[1] * cell.y + a[2] * cell.z,
            b[0] * cell.x + b[1] * cell.y + b[2] * cell.z,
            c[0] * cell.x + c[1] * cell.y + c[2] * cell.z,
        )
    }

    /// Returns the rotation that applies `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        let mut product = [[0; 3]; 3];
        for (row, product_row) in product.iter_mut().enumerate() {
            for (col, entry) in product_row.iter_mut().enumerate() {
                *entry = (0..3).map(|k| self.0[row][k] * other.0[k][col]).sum();
            }
        }
        Self(product)
    }

    /// The inverse rotation (the transpose, since the matrix is orthogonal).
    pub fn inverse(&self) -> Self {
        let m = self.0;
        Self([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    pub fn determinant(&self) -> i32 {
        let m = self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }
}

/// Returns the 24 proper rotations of the cube.
///
/// The group is built once per process and shared. The identity is always
/// first; the rest follow in breadth-first discovery order from the
/// quarter-turn generators, which keeps orientation numbering stable.
pub fn rotations() -> &'static [Rotation] {
    static ROTATIONS: OnceLock<Vec<Rotation>> = OnceLock::new();
    ROTATIONS.get_or_init(generate_rotation_group)
}

fn generate_rotation_group() -> Vec<Rotation> {
    let generators = [Rotation::QUARTER_X, Rotation::QUARTER_Y, Rotation::QUARTER_Z];
    let mut group = vec![Rotation::IDENTITY];

    let mut frontier = 0;
    while frontier < group.len() {
        let current = group[frontier];
        for generator in &generators {
            let candidate = generator.compose(&current);
            if !group.contains(&candidate) {
                group.push(candidate);
            }
        }
        frontier += 1;
    }

    debug_assert_eq!(group.len(), NUM_ROTATIONS);
    group
}

/// Translates a shape so the minimum x, y, z values are all zero.
///
/// This normalization ensures that two shapes that differ only by
/// translation will be recognized as identical.
pub fn canonicalize(shape: &Shape) -> Shape {
    let min = shape.extent().min;
    if min == Cell::ORIGIN {
        return shape.clone();
    }
    shape.translate(-min)
}

/// Rotates a shape about the origin. Rotations are bijections, so no cells
/// collapse onto each other.
fn rotate(shape: &Shape, rotation: &Rotation) -> Shape {
    Shape::from_distinct(shape.iter().map(|cell| rotation.apply(cell)).collect())
}

/// Generates all unique orientations of a shape.
///
/// Applies all 24 rotations to the shape, normalizes each result so that
/// the minimum coordinates are at the origin, then removes duplicates while
/// keeping first-seen order. Symmetric shapes have fewer than 24 unique
/// orientations.
pub fn orientations(shape: &Shape) -> Vec<Shape> {
    unique_rotations(shape)
        .into_iter()
        .map(|(_, oriented)| oriented)
        .collect()
}

fn unique_rotations(shape: &Shape) -> Vec<(Rotation, Shape)> {
    let mut seen: FxHashSet<Shape> = FxHashSet::default();
    let mut unique = Vec::new();

    for rotation in rotations() {
        let oriented = canonicalize(&rotate(shape, rotation));
        if seen.insert(oriented.clone()) {
            unique.push((*rotation, oriented));
        }
    }

    unique
}

/// One rotation-distinct, origin-normalized form of a piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Orientation {
    /// The piece this orientation belongs to.
    pub piece_id: PieceId,
    /// Position in the piece's deduplicated orientation list.
    pub index: usize,
    /// The first rotation (in group order) that produces this orientation.
    pub rotation: Rotation,
    /// Cells of the oriented piece, minimum corner at the origin.
    pub shape: Shape,
}

/// Computes the orientations of a piece's base shape, tagged with the piece id.
pub fn orient(piece_id: PieceId, shape: &Shape) -> Vec<Orientation> {
    unique_rotations(shape)
        .into_iter()
        .enumerate()
        .map(|(index, (rotation, shape))| Orientation {
            piece_id,
            index,
            rotation,
            shape,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shape(cells: &[(i32, i32, i32)]) -> Shape {
        Shape::new(cells.iter().map(|&c| Cell::from(c))).unwrap()
    }

    #[test]
    fn test_rotation_group_has_24_distinct_elements() {
        let group = rotations();
        assert_eq!(group.len(), NUM_ROTATIONS);
        let distinct: FxHashSet<Rotation> = group.iter().copied().collect();
        assert_eq!(distinct.len(), NUM_ROTATIONS);
        assert_eq!(group[0], Rotation::IDENTITY);
    }

    #[test]
    fn test_rotations_are_proper_and_orthogonal() {
        for rotation in rotations() {
            assert_eq!(rotation.determinant(), 1, "{rotation:?} is a reflection");
            assert_eq!(rotation.compose(&rotation.inverse()), Rotation::IDENTITY);
            for row in rotation.matrix() {
                assert_eq!(row.iter().filter(|&&v| v != 0).count(), 1);
                assert!(row.iter().all(|v| (-1..=1).contains(v)));
            }
        }
    }

    #[test]
    fn test_rotation_group_is_closed() {
        let group = rotations();
        for a in group {
            for b in group {
                assert!(group.contains(&a.compose(b)), "{a:?} * {b:?} left the group");
            }
        }
    }

    #[test]
    fn test_quarter_turn_has_order_four() {
        let mut r = Rotation::IDENTITY;
        for _ in 0..4 {
            r = Rotation::QUARTER_Z.compose(&r);
        }
        assert_eq!(r, Rotation::IDENTITY);
        assert_eq!(Rotation::QUARTER_Z.apply(Cell::new(1, 0, 0)), Cell::new(0, 1, 0));
    }

    #[test]
    fn test_canonicalize_moves_minimum_to_origin() {
        let s = shape(&[(3, -1, 2), (4, -1, 2), (3, 0, 5)]);
        assert_eq!(canonicalize(&s), shape(&[(0, 0, 0), (1, 0, 0), (0, 1, 3)]));
    }

    #[test]
    fn test_single_cell_has_one_orientation() {
        assert_eq!(orientations(&shape(&[(0, 0, 0)])).len(), 1);
    }

    #[test]
    fn test_domino_has_three_orientations() {
        assert_eq!(orientations(&shape(&[(0, 0, 0), (1, 0, 0)])).len(), 3);
    }

    #[test]
    fn test_straight_tricube_has_three_orientations() {
        // one per axis; reversing a line along its own axis is a translation
        let line = shape(&[(0, 0, 0), (1, 0, 0), (2, 0, 0)]);
        let all = orientations(&line);
        assert_eq!(all.len(), 3);
        assert!(all.contains(&shape(&[(0, 0, 0), (0, 1, 0), (0, 2, 0)])));
        assert!(all.contains(&shape(&[(0, 0, 0), (0, 0, 1), (0, 0, 2)])));
    }

    #[test]
    fn test_tetracube_orientation_counts() {
        let square = shape(&[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0)]);
        let l_piece = shape(&[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]);
        let t_piece = shape(&[(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0)]);
        let tripod = shape(&[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)]);
        assert_eq!(orientations(&square).len(), 3);
        assert_eq!(orientations(&l_piece).len(), 24);
        assert_eq!(orientations(&t_piece).len(), 12);
        assert_eq!(orientations(&tripod).len(), 8);
    }

    #[test]
    fn test_first_orientation_is_canonical_base_shape() {
        let s = shape(&[(5, 5, 5), (6, 5, 5), (6, 6, 5)]);
        let all = orient(9, &s);
        assert_eq!(all[0].shape, canonicalize(&s));
        assert_eq!(all[0].rotation, Rotation::IDENTITY);
        assert!(all.iter().enumerate().all(|(i, o)| o.index == i && o.piece_id == 9));
    }

    #[test]
    fn test_orientation_rotation_reproduces_shape() {
        let s = shape(&[(0, 0, 0), (1, 0, 0), (1, 1, 0), (1, 1, 1)]);
        for orientation in orient(1, &s) {
            assert_eq!(canonicalize(&rotate(&s, &orientation.rotation)), orientation.shape);
        }
    }

    fn arbitrary_shape() -> impl Strategy<Value = Shape> {
        prop::collection::btree_set((-3i32..4, -3i32..4, -3i32..4), 1..8)
            .prop_map(|cells| Shape::new(cells.into_iter().map(Cell::from)).unwrap())
    }

    proptest! {
        #[test]
        fn prop_canonicalize_is_idempotent(s in arbitrary_shape()) {
            let once = canonicalize(&s);
            prop_assert_eq!(canonicalize(&once), once.clone());
            prop_assert_eq!(once.extent().min, Cell::ORIGIN);
        }

        #[test]
        fn prop_orientations_preserve_volume(s in arbitrary_shape()) {
            let all = orientations(&s);
            prop_assert!(!all.is_empty() && all.len() <= NUM_ROTATIONS);
            prop_assert_eq!(NUM_ROTATIONS % all.len(), 0);
            for oriented in &all {
                prop_assert_eq!(oriented.len(), s.len());
            }
            let distinct: FxHashSet<&Shape> = all.iter().collect();
            prop_assert_eq!(distinct.len(), all.len());
        }

        #[test]
        fn prop_orientations_are_rotation_invariant(s in arbitrary_shape(), r in 0usize..NUM_ROTATIONS) {
            let rotated = rotate(&s, &rotations()[r]);
            let mut a = orientations(&s);
            let mut b = orientations(&rotated);
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }
    }
}
