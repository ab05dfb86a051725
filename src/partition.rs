//! Volume partitions and piece-set sampling.
//!
//! Before solving a container with a subset of the catalog, the candidate
//! subsets are narrowed down by volume alone: the piece volumes must form
//! an integer partition of the container volume, and each part size can
//! only be used as often as the catalog has distinct pieces of that volume.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Container;
use crate::pieces::{Catalog, Piece, PieceId};
use crate::placement::placements;
use crate::solver::{solve, CancelToken, SearchMode, Solution, SolverConfig};

/// All partitions of `n` into parts no larger than `max_part`.
///
/// Each partition lists its parts in non-increasing order; partitions come
/// out with larger leading parts first.
pub fn integer_partitions(n: usize, max_part: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    extend_partitions(n, max_part.min(n), &mut current, &mut out);
    out
}

fn extend_partitions(remaining: usize, max_part: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for part in (1..=max_part.min(remaining)).rev() {
        current.push(part);
        extend_partitions(remaining - part, part, current, out);
        current.pop();
    }
}

/// Catalog piece ids grouped by volume.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeIndex {
    by_volume: BTreeMap<usize, Vec<PieceId>>,
}

impl VolumeIndex {
    /// Indexes every catalog piece of volume at most `max_volume`.
    pub fn new(catalog: &Catalog, max_volume: Option<usize>) -> Self {
        Self::build(catalog.iter(), max_volume)
    }

    /// Like [`VolumeIndex::new`], but skips pieces that have no placement
    /// at all inside `container`.
    pub fn fitting(catalog: &Catalog, max_volume: Option<usize>, container: &Container) -> Self {
        let fits = |piece: &&Arc<Piece>| {
            piece
                .orientations()
                .iter()
                .any(|orientation| placements(orientation, container).next().is_some())
        };
        Self::build(catalog.iter().filter(fits), max_volume)
    }

    fn build<'a, I>(pieces: I, max_volume: Option<usize>) -> Self
    where
        I: Iterator<Item = &'a Arc<Piece>>,
    {
        let mut by_volume: BTreeMap<usize, Vec<PieceId>> = BTreeMap::new();
        for piece in pieces {
            if max_volume.is_some_and(|max| piece.volume() > max) {
                continue;
            }
            by_volume.entry(piece.volume()).or_default().push(piece.id());
        }
        Self { by_volume }
    }

    /// Piece ids of the given volume, in catalog order.
    pub fn ids(&self, volume: usize) -> &[PieceId] {
        self.by_volume.get(&volume).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Largest indexed volume, or 0 when empty.
    pub fn max_volume(&self) -> usize {
        self.by_volume.keys().next_back().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_volume.is_empty()
    }

    /// `(volume, number of pieces)` pairs in ascending volume order.
    pub fn counts(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.by_volume.iter().map(|(&volume, ids)| (volume, ids.len()))
    }
}

/// Groups a partition into `(part, multiplicity)` pairs, largest part first.
fn part_counts(partition: &[usize]) -> Vec<(usize, usize)> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for &part in partition {
        match counts.last_mut() {
            Some((last, count)) if *last == part => *count += 1,
            _ => counts.push((part, 1)),
        }
    }
    counts
}

/// Partitions of `n` that the indexed pieces could realize with distinct
/// pieces.
pub fn feasible_partitions(n: usize, index: &VolumeIndex) -> Vec<Vec<usize>> {
    integer_partitions(n, index.max_volume())
        .into_iter()
        .filter(|partition| {
            part_counts(partition)
                .into_iter()
                .all(|(part, count)| count <= index.ids(part).len())
        })
        .collect()
}

/// A set of distinct pieces whose volumes sum to the container volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Position of the partition in [`feasible_partitions`] order.
    pub partition: usize,
    /// Piece ids, largest volume first, ascending id within a volume.
    pub pieces: Vec<PieceId>,
}

/// Every `k`-element subset of `items`, preserving order.
fn combinations(items: &[PieceId], k: usize) -> Vec<Vec<PieceId>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if items.len() < k {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        for mut rest in combinations(&items[i + 1..], k - 1) {
            rest.insert(0, first);
            out.push(rest);
        }
    }
    out
}

/// Enumerates every sample of distinct pieces whose volumes form a
/// feasible partition of `n`.
pub fn piece_samples(n: usize, index: &VolumeIndex) -> Vec<Sample> {
    let mut samples = Vec::new();

    for (partition_index, partition) in feasible_partitions(n, index).iter().enumerate() {
        let mut partial: Vec<Vec<PieceId>> = vec![Vec::new()];
        for (part, count) in part_counts(partition) {
            let choices = combinations(index.ids(part), count);
            partial = partial
                .iter()
                .flat_map(|prefix| {
                    choices.iter().map(move |choice| {
                        let mut next = prefix.clone();
                        next.extend_from_slice(choice);
                        next
                    })
                })
                .collect();
        }
        samples.extend(partial.into_iter().map(|pieces| Sample {
            partition: partition_index,
            pieces,
        }));
    }

    samples
}

/// The outcome of solving one sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyEntry {
    pub sample: Sample,
    pub solution: Option<Solution>,
    /// The per-sample time limit ran out before the search finished.
    pub timed_out: bool,
}

/// Results of solving every sample against one container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub partitions: Vec<Vec<usize>>,
    pub entries: Vec<SurveyEntry>,
}

impl Survey {
    /// Entries that have a tiling.
    pub fn solvable(&self) -> impl Iterator<Item = &SurveyEntry> + '_ {
        self.entries.iter().filter(|entry| entry.solution.is_some())
    }

    /// Entries whose search hit the time limit, so solvability is unknown.
    pub fn timed_out(&self) -> impl Iterator<Item = &SurveyEntry> + '_ {
        self.entries.iter().filter(|entry| entry.timed_out)
    }
}

/// Solves every sample of fitting catalog pieces against `container`.
///
/// Each sample is searched in first mode with its own pieces used once.
/// `time_limit_ms` applies to each sample separately; a sample that runs
/// out of time is recorded as timed out and the survey moves on. Only the
/// caller's cancellation token aborts the whole survey. With
/// `config.parallel` the samples themselves are distributed over the rayon
/// pool and each search runs sequentially.
pub fn survey(container: &Container, catalog: &Catalog, max_volume: Option<usize>, config: &SolverConfig) -> Result<Survey> {
    let index = VolumeIndex::fitting(catalog, max_volume, container);
    let partitions = feasible_partitions(container.len(), &index);
    let samples = piece_samples(container.len(), &index);
    log::info!(
        "surveying {} samples over {} partitions of volume {}",
        samples.len(),
        partitions.len(),
        container.len()
    );

    let sample_config = SolverConfig {
        mode: SearchMode::First,
        multiplicity: BTreeMap::new(),
        default_multiplicity: 1,
        parallel: false,
        ..config.clone()
    };
    let cancelled = || config.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
    let attempt = |sample: Sample| -> Result<SurveyEntry> {
        let pieces = catalog.select(&sample.pieces)?;
        let (solution, timed_out) = match solve(container, &pieces, &sample_config) {
            Ok(solution) => (Some(solution), false),
            Err(Error::NoSolution) => (None, false),
            Err(Error::Cancelled) if !cancelled() => {
                log::warn!("sample {:?} ran out of time", sample.pieces);
                (None, true)
            }
            Err(err) => return Err(err),
        };
        Ok(SurveyEntry {
            sample,
            solution,
            timed_out,
        })
    };

    let entries: Vec<SurveyEntry> = if config.parallel {
        samples.into_par_iter().map(attempt).collect::<Result<Vec<_>>>()?
    } else {
        samples.into_iter().map(attempt).collect::<Result<Vec<_>>>()?
    };

    let survey = Survey { partitions, entries };
    log::info!(
        "{} of {} samples are solvable, {} timed out",
        survey.solvable().count(),
        survey.entries.len(),
        survey.timed_out().count()
    );
    Ok(survey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::CatalogRecord;

    fn record(id: PieceId, shape: &[[i32; 3]]) -> CatalogRecord {
        CatalogRecord {
            id,
            name: format!("Piece {id}"),
            color: "gray".into(),
            volume: shape.len(),
            shape: shape.to_vec(),
        }
    }

    #[test]
    fn test_integer_partitions_of_small_numbers() {
        assert_eq!(integer_partitions(1, 5), vec![vec![1]]);
        assert_eq!(
            integer_partitions(4, 4),
            vec![vec![4], vec![3, 1], vec![2, 2], vec![2, 1, 1], vec![1, 1, 1, 1]]
        );
        assert_eq!(integer_partitions(4, 2), vec![vec![2, 2], vec![2, 1, 1], vec![1, 1, 1, 1]]);
        assert_eq!(integer_partitions(0, 3), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_partition_count_matches_known_values() {
        // p(10) = 42, p(15) = 176
        assert_eq!(integer_partitions(10, 10).len(), 42);
        assert_eq!(integer_partitions(15, 15).len(), 176);
    }

    #[test]
    fn test_builtin_volume_index() {
        let catalog = Catalog::builtin().unwrap();
        let index = VolumeIndex::new(&catalog, None);
        let counts: Vec<(usize, usize)> = index.counts().collect();
        assert_eq!(counts, vec![(1, 1), (2, 1), (3, 2), (4, 7), (5, 25)]);
        assert_eq!(index.ids(3), &[3, 4]);
        assert_eq!(index.max_volume(), 5);

        let small = VolumeIndex::new(&catalog, Some(2));
        assert_eq!(small.max_volume(), 2);
        assert!(small.ids(3).is_empty());
    }

    #[test]
    fn test_fitting_index_drops_oversized_pieces() {
        let catalog = Catalog::builtin().unwrap();
        let container = Container::cube(2).unwrap();
        let index = VolumeIndex::fitting(&catalog, None, &container);
        // every builtin block above volume 2 spans three cells somewhere
        let counts: Vec<(usize, usize)> = index.counts().collect();
        assert_eq!(counts, vec![(1, 1), (2, 1)]);

        let index = VolumeIndex::fitting(&catalog, None, &Container::cube(3).unwrap());
        assert_eq!(index.ids(5).len(), 23);
    }

    #[test]
    fn test_feasible_partitions_of_nine() {
        let catalog = Catalog::builtin().unwrap();
        let index = VolumeIndex::new(&catalog, None);
        assert_eq!(
            feasible_partitions(9, &index),
            vec![vec![5, 4], vec![5, 3, 1], vec![4, 4, 1], vec![4, 3, 2], vec![3, 3, 2, 1]]
        );
    }

    #[test]
    fn test_feasible_partitions_of_twenty_seven() {
        let catalog = Catalog::builtin().unwrap();
        let index = VolumeIndex::new(&catalog, Some(5));
        let partitions = feasible_partitions(27, &index);
        assert_eq!(partitions.len(), 16);
        assert!(partitions.iter().all(|p| p.iter().sum::<usize>() == 27));
        assert_eq!(partitions[0], vec![5, 5, 5, 5, 5, 2]);
    }

    #[test]
    fn test_samples_of_nine() {
        let catalog = Catalog::builtin().unwrap();
        let index = VolumeIndex::new(&catalog, None);
        let samples = piece_samples(9, &index);
        // 25*7 + 25*2*1 + C(7,2)*1 + 7*2*1 + 1
        assert_eq!(samples.len(), 175 + 50 + 21 + 14 + 1);
        assert_eq!(samples[0], Sample { partition: 0, pieces: vec![12, 5] });
        assert_eq!(samples.last().unwrap().pieces, vec![3, 4, 2, 1]);
        for sample in &samples {
            let volume: usize = sample.pieces.iter().map(|&id| catalog.get(id).unwrap().volume()).sum();
            assert_eq!(volume, 9);
        }
    }

    #[test]
    fn test_two_cube_samples() {
        let catalog = Catalog::builtin().unwrap();
        let container = Container::cube(2).unwrap();

        let unfiltered = VolumeIndex::new(&catalog, Some(3));
        let samples = piece_samples(8, &unfiltered);
        assert_eq!(samples, vec![Sample { partition: 0, pieces: vec![3, 4, 2] }]);
        assert!(piece_samples(8, &VolumeIndex::new(&catalog, Some(2))).is_empty());
        assert!(piece_samples(8, &VolumeIndex::new(&catalog, Some(1))).is_empty());

        let result = survey(&container, &catalog, Some(3), &SolverConfig::default()).unwrap();
        assert!(result.entries.is_empty());
        assert_eq!(result.solvable().count(), 0);
    }

    #[test]
    fn test_survey_small_square() {
        let catalog = crate::pieces::load_catalog(vec![
            record(1, &[[0, 0, 0]]),
            record(2, &[[0, 0, 0], [1, 0, 0]]),
            record(3, &[[0, 0, 0], [0, 1, 0]]),
            record(4, &[[0, 0, 0], [1, 0, 0], [0, 1, 0]]),
        ])
        .unwrap();
        let container = Container::cuboid(2, 2, 1).unwrap();

        for parallel in [false, true] {
            let config = SolverConfig::default().with_parallel(parallel);
            let result = survey(&container, &catalog, None, &config).unwrap();
            assert_eq!(result.partitions, vec![vec![3, 1], vec![2, 2]]);
            let pieces: Vec<Vec<PieceId>> = result.entries.iter().map(|e| e.sample.pieces.clone()).collect();
            assert_eq!(pieces, vec![vec![4, 1], vec![2, 3]]);
            assert_eq!(result.solvable().count(), 2);
            for entry in &result.entries {
                assert!(entry.solution.as_ref().unwrap().is_exact_cover(&container));
            }
        }
    }

    fn small_square_catalog() -> Catalog {
        crate::pieces::load_catalog(vec![
            record(1, &[[0, 0, 0]]),
            record(2, &[[0, 0, 0], [1, 0, 0]]),
            record(3, &[[0, 0, 0], [0, 1, 0]]),
            record(4, &[[0, 0, 0], [1, 0, 0], [0, 1, 0]]),
        ])
        .unwrap()
    }

    #[test]
    fn test_survey_records_timeouts_per_sample() {
        let catalog = small_square_catalog();
        let container = Container::cuboid(2, 2, 1).unwrap();

        for parallel in [false, true] {
            let config = SolverConfig::default().with_parallel(parallel).with_time_limit(0);
            let result = survey(&container, &catalog, None, &config).unwrap();
            assert_eq!(result.entries.len(), 2);
            assert_eq!(result.timed_out().count(), 2);
            assert_eq!(result.solvable().count(), 0);
            assert!(result.entries.iter().all(|e| e.solution.is_none()));
        }
    }

    #[test]
    fn test_survey_aborts_on_cancel_token() {
        let catalog = small_square_catalog();
        let container = Container::cuboid(2, 2, 1).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let config = SolverConfig::default().with_cancel_token(token);
        assert!(matches!(
            survey(&container, &catalog, None, &config),
            Err(Error::Cancelled)
        ));
    }
}
