//! Puzzle piece definitions and the catalog adapter.
//!
//! Each piece is defined as a set of unit cube positions in 3D space. The
//! catalog adapter turns raw records (id, name, color, volume, shape) into
//! validated [`Piece`]s; it is the only part of the engine that knows the
//! record format.

use std::sync::{Arc, OnceLock};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Shape};
use crate::error::{Error, Result};
use crate::geometry::{orient, Orientation};

/// Catalog identifier of a piece.
pub type PieceId = u32;

/// A 3D coordinate as it appears in catalog records.
pub type Coord = [i32; 3];

/// Display metadata carried through the engine untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceMeta {
    pub name: String,
    pub color: String,
}

/// A catalog entry: identifier, display metadata and base shape.
///
/// Orientations are derived lazily on first use and cached for the lifetime
/// of the piece; they are never mutated afterwards, so a piece can be shared
/// across threads behind an `Arc`.
#[derive(Debug)]
pub struct Piece {
    id: PieceId,
    meta: PieceMeta,
    shape: Shape,
    orientations: OnceLock<Vec<Orientation>>,
}

impl Piece {
    /// Creates a piece, checking the shape against the declared volume.
    pub fn new(id: PieceId, meta: PieceMeta, shape: Shape, declared_volume: usize) -> Result<Self> {
        if shape.len() != declared_volume {
            return Err(Error::VolumeMismatch {
                id,
                declared: declared_volume,
                actual: shape.len(),
            });
        }
        Ok(Self::from_shape(id, meta, shape))
    }

    /// Creates a piece whose volume is simply its cell count.
    pub fn from_shape(id: PieceId, meta: PieceMeta, shape: Shape) -> Self {
        Self {
            id,
            meta,
            shape,
            orientations: OnceLock::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> PieceId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    #[inline]
    pub fn color(&self) -> &str {
        &self.meta.color
    }

    #[inline]
    pub fn meta(&self) -> &PieceMeta {
        &self.meta
    }

    /// The base shape as given by the catalog.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.shape.len()
    }

    /// Number of cells spanned along the piece's longest axis.
    pub fn max_length(&self) -> i32 {
        let size = self.shape.extent().size();
        size.x.max(size.y).max(size.z)
    }

    /// The distinct orientations of this piece, computed on first call.
    pub fn orientations(&self) -> &[Orientation] {
        self.orientations.get_or_init(|| {
            let built = build_orientations(self);
            log::debug!("piece {} ({}) has {} orientations", self.id, self.meta.name, built.len());
            built
        })
    }
}

/// Computes a piece's orientations without touching its cache.
pub fn build_orientations(piece: &Piece) -> Vec<Orientation> {
    orient(piece.id, &piece.shape)
}

/// A raw catalog entry, as stored in the external block list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: PieceId,
    pub name: String,
    pub color: String,
    pub volume: usize,
    pub shape: Vec<Coord>,
}

impl CatalogRecord {
    fn into_piece(self) -> Result<Piece> {
        let shape = Shape::new(self.shape.into_iter().map(Cell::from))
            .map_err(|err| match err {
                Error::InvalidShape(reason) => Error::InvalidShape(format!("piece {}: {}", self.id, reason)),
                other => other,
            })?;
        Piece::new(
            self.id,
            PieceMeta {
                name: self.name,
                color: self.color,
            },
            shape,
            self.volume,
        )
    }
}

/// The set of pieces available to a puzzle session, in catalog order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pieces: Vec<Arc<Piece>>,
    by_id: FxHashMap<PieceId, usize>,
}

impl Catalog {
    /// The built-in 36-block catalog.
    pub fn builtin() -> Result<Self> {
        load_catalog(builtin_records())
    }

    /// Parses a JSON array of catalog records and loads it.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
        load_catalog(records)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Piece>> {
        self.pieces.iter()
    }

    pub fn pieces(&self) -> &[Arc<Piece>] {
        &self.pieces
    }

    pub fn get(&self, id: PieceId) -> Option<&Arc<Piece>> {
        self.by_id.get(&id).map(|&index| &self.pieces[index])
    }

    /// Picks the pieces with the given ids, in the order requested.
    pub fn select(&self, ids: &[PieceId]) -> Result<Vec<Arc<Piece>>> {
        ids.iter()
            .map(|&id| self.get(id).cloned().ok_or(Error::UnknownPiece(id)))
            .collect()
    }
}

/// Translates raw catalog records into validated pieces.
///
/// Fails on the first malformed record: an empty or self-overlapping shape
/// ([`Error::InvalidShape`]), a declared volume that disagrees with the cell
/// count ([`Error::VolumeMismatch`]), or a repeated id ([`Error::DuplicateId`]).
pub fn load_catalog<I>(records: I) -> Result<Catalog>
where
    I: IntoIterator<Item = CatalogRecord>,
{
    let mut seen: FxHashSet<PieceId> = FxHashSet::default();
    let mut catalog = Catalog::default();

    for record in records {
        if !seen.insert(record.id) {
            return Err(Error::DuplicateId(record.id));
        }
        let piece = record.into_piece()?;
        catalog.by_id.insert(piece.id(), catalog.pieces.len());
        catalog.pieces.push(Arc::new(piece));
    }

    log::debug!("loaded catalog with {} pieces", catalog.len());
    Ok(catalog)
}

/// A built-in block definition.
struct BlockDef {
    id: PieceId,
    color: &'static str,
    shape: &'static [Coord],
}

const ORANGE: &str = "rgb(239, 139, 27)";
const GREEN: &str = "rgb(106, 194, 84)";
const PINK: &str = "rgb(244, 195, 203)";
const YELLOW: &str = "rgb(252, 221, 80)";
const BLUE: &str = "rgb(87, 194, 230)";
const PLUM: &str = "rgb(167, 99, 137)";

/// The 36 blocks of the physical puzzle, grouped by volume.
///
/// Several ids share both a shape and a color; they are distinct physical
/// blocks and stay distinct pieces.
const BLOCKS: &[BlockDef] = &[
    // volume 1
    BlockDef { id: 1, color: ORANGE, shape: &[[0, 0, 0]] },
    // volume 2
    BlockDef { id: 2, color: GREEN, shape: &[[0, 0, 0], [1, 0, 0]] },
    // volume 3
    BlockDef { id: 3, color: PINK, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0]] },
    BlockDef { id: 4, color: YELLOW, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0]] },
    // volume 4
    BlockDef { id: 5, color: "purple-blue", shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [2, 1, 0]] },
    BlockDef { id: 6, color: ORANGE, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 2, 0]] },
    BlockDef { id: 7, color: ORANGE, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 2, 0]] },
    BlockDef { id: 8, color: ORANGE, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 0, 0]] },
    BlockDef { id: 9, color: YELLOW, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0]] },
    BlockDef { id: 10, color: PINK, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 2, 0]] },
    BlockDef { id: 11, color: ORANGE, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [2, 0, 0]] },
    // volume 5
    BlockDef { id: 12, color: GREEN, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 13, color: YELLOW, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0], [3, 1, 0]] },
    BlockDef { id: 14, color: ORANGE, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [1, 1, 0], [2, 1, 0]] },
    BlockDef { id: 15, color: YELLOW, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 16, color: GREEN, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 17, color: GREEN, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 18, color: PINK, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 1, 0], [2, 1, 0]] },
    BlockDef { id: 19, color: PINK, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 0, 0], [2, 0, 0]] },
    BlockDef { id: 20, color: GREEN, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 21, color: GREEN, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 22, color: YELLOW, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 23, color: ORANGE, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [1, 1, 0], [1, 2, 0]] },
    BlockDef { id: 24, color: YELLOW, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 1, 0], [2, 1, 0]] },
    BlockDef { id: 25, color: PINK, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 26, color: PINK, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 27, color: BLUE, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0], [3, 1, 0]] },
    BlockDef { id: 28, color: PLUM, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 29, color: BLUE, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 30, color: PLUM, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [1, 1, 0], [2, 1, 0]] },
    BlockDef { id: 31, color: BLUE, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 2, 0], [2, 2, 0]] },
    BlockDef { id: 32, color: PLUM, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 33, color: BLUE, shape: &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 34, color: PLUM, shape: &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 35, color: BLUE, shape: &[[0, 0, 0], [0, 1, 0], [1, 1, 0], [2, 1, 0], [2, 2, 0]] },
    BlockDef { id: 36, color: PLUM, shape: &[[0, 0, 0], [0, 1, 0], [0, 2, 0], [1, 2, 0], [2, 2, 0]] },
];

/// The built-in blocks as catalog records.
pub fn builtin_records() -> Vec<CatalogRecord> {
    BLOCKS
        .iter()
        .map(|block| CatalogRecord {
            id: block.id,
            name: format!("Block {:02}", block.id),
            color: block.color.to_string(),
            volume: block.shape.len(),
            shape: block.shape.to_vec(),
        })
        .collect()
}
