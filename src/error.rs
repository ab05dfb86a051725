//! Error types for the packing engine.

use thiserror::Error;

use crate::pieces::PieceId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading pieces or searching for tilings.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or malformed cell set.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Declared volume disagrees with the number of cells.
    #[error("Piece {id} declares volume {declared} but has {actual} cells")]
    VolumeMismatch {
        id: PieceId,
        declared: usize,
        actual: usize,
    },

    /// Two catalog entries share an identifier.
    #[error("Duplicate piece id: {0}")]
    DuplicateId(PieceId),

    /// A piece id was referenced that the catalog does not contain.
    #[error("Unknown piece id: {0}")]
    UnknownPiece(PieceId),

    /// The search tree was exhausted without finding a tiling.
    #[error("No solution exists")]
    NoSolution,

    /// The caller's cancellation signal or deadline fired during search.
    #[error("Search cancelled")]
    Cancelled,

    /// Malformed catalog or configuration JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
