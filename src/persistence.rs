//! File I/O for saving and loading solutions.
//!
//! A placement is stored by piece id, orientation index and offset; the
//! cells are re-derived from the catalog when loading.
//!
//! Binary format for `solutions.bin` (little endian):
//! - u32: solution count
//! - repeat per solution:
//!   - u32: placement count
//!   - repeat per placement:
//!     - u32: piece id
//!     - u32: orientation index
//!     - 3 x i32: offset (x, y, z)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, COORD_LIMIT};
use crate::error::{Error, Result};
use crate::grid::{format_solution, Container};
use crate::pieces::{Catalog, PieceId};
use crate::placement::Placement;
use crate::solver::{PlacedPiece, Solution};

pub const SOLUTIONS_BIN: &str = "solutions.bin";
pub const SOLUTIONS_TXT: &str = "solutions.txt";

/// The stored form of one placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPlacement {
    pub piece_id: PieceId,
    pub orientation: usize,
    pub offset: Cell,
}

impl From<&Placement> for SavedPlacement {
    fn from(placement: &Placement) -> Self {
        Self {
            piece_id: placement.piece_id,
            orientation: placement.orientation_index,
            offset: placement.offset,
        }
    }
}

/// Saves solutions under `dir` in both binary and text form.
pub fn save(dir: &Path, solutions: &[Solution], container: &Container) -> Result<()> {
    save_text(dir, solutions, container)?;
    save_binary(dir, solutions)?;
    log::info!("saved {} solutions to {}", solutions.len(), dir.display());
    Ok(())
}

/// Saves solutions in human-readable text format.
fn save_text(dir: &Path, solutions: &[Solution], container: &Container) -> Result<()> {
    let mut file = BufWriter::new(File::create(dir.join(SOLUTIONS_TXT))?);
    writeln!(file, "Found {} solutions:\n", solutions.len())?;
    for (i, solution) in solutions.iter().enumerate() {
        writeln!(file, "Solution {}:", i + 1)?;
        writeln!(file, "{}", format_solution(solution, container))?;
        writeln!(file)?;
    }
    file.flush()?;
    Ok(())
}

/// Saves solutions in compact binary format for fast loading.
fn save_binary(dir: &Path, solutions: &[Solution]) -> Result<()> {
    let mut file = BufWriter::new(File::create(dir.join(SOLUTIONS_BIN))?);

    file.write_all(&(solutions.len() as u32).to_le_bytes())?;

    for solution in solutions {
        file.write_all(&(solution.len() as u32).to_le_bytes())?;
        for placed in solution.pieces() {
            let saved = SavedPlacement::from(&placed.placement);
            file.write_all(&saved.piece_id.to_le_bytes())?;
            file.write_all(&(saved.orientation as u32).to_le_bytes())?;
            for component in saved.offset.to_array() {
                file.write_all(&component.to_le_bytes())?;
            }
        }
    }

    file.flush()?;
    Ok(())
}

fn read_u32(reader: &mut impl Read) -> Option<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer).ok()?;
    Some(u32::from_le_bytes(buffer))
}

fn read_i32(reader: &mut impl Read) -> Option<i32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer).ok()?;
    Some(i32::from_le_bytes(buffer))
}

/// Loads all solutions from the binary file under `dir`.
///
/// Returns `None` if the file is missing or truncated.
pub fn load_all(dir: &Path) -> Option<Vec<Vec<SavedPlacement>>> {
    let mut file = BufReader::new(File::open(dir.join(SOLUTIONS_BIN)).ok()?);

    // counts are untrusted; never preallocate from them
    let solution_count = read_u32(&mut file)? as usize;
    let mut solutions = Vec::new();

    for _ in 0..solution_count {
        let placement_count = read_u32(&mut file)? as usize;
        let mut solution = Vec::new();
        for _ in 0..placement_count {
            let piece_id = read_u32(&mut file)?;
            let orientation = read_u32(&mut file)? as usize;
            let offset = Cell::new(read_i32(&mut file)?, read_i32(&mut file)?, read_i32(&mut file)?);
            solution.push(SavedPlacement {
                piece_id,
                orientation,
                offset,
            });
        }
        solutions.push(solution);
    }

    Some(solutions)
}

/// Returns the number of saved solutions without loading them all.
pub fn count(dir: &Path) -> Option<usize> {
    let mut file = File::open(dir.join(SOLUTIONS_BIN)).ok()?;
    read_u32(&mut file).map(|n| n as usize)
}

/// Re-derives a full solution from its stored placements.
pub fn rebuild(saved: &[SavedPlacement], catalog: &Catalog) -> Result<Solution> {
    saved
        .iter()
        .map(|entry| {
            let piece = catalog
                .get(entry.piece_id)
                .ok_or(Error::UnknownPiece(entry.piece_id))?;
            let orientation = piece.orientations().get(entry.orientation).ok_or_else(|| {
                Error::InvalidShape(format!(
                    "piece {} has no orientation {}",
                    entry.piece_id, entry.orientation
                ))
            })?;
            if !entry.offset.within(COORD_LIMIT) {
                return Err(Error::InvalidShape(format!(
                    "piece {} offset {} is out of range",
                    entry.piece_id, entry.offset
                )));
            }
            Ok(PlacedPiece {
                placement: Placement::new(orientation, entry.offset),
                meta: piece.meta().clone(),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Solution::new)
}
