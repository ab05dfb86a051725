//! Polycube geometry and packing engine.
//!
//! Pieces are rigid sets of unit cubes. The engine enumerates their 24
//! proper rotations, finds every way they fit inside a container, and
//! searches for exact covers of the container by a chosen set of pieces.

pub mod cell;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod partition;
pub mod persistence;
pub mod pieces;
pub mod placement;
pub mod solver;

pub use cell::{Cell, Extent, Shape};
pub use error::{Error, Result};
pub use geometry::{canonicalize, orientations, rotations, Orientation, Rotation};
pub use grid::{format_solution, is_valid_placement, Container, Occupancy};
pub use partition::{survey, Sample, Survey};
pub use pieces::{build_orientations, load_catalog, Catalog, CatalogRecord, Piece, PieceId, PieceMeta};
pub use placement::{placements, Placement};
pub use solver::{run, solve, solve_all, CancelToken, PlacedPiece, SearchMode, Solution, SolutionIter, SolverConfig};
