//! Backtracking exact-cover solver.
//!
//! Key points:
//! - Candidate placements are precomputed once per run and indexed by the
//!   container cell they cover, so collision checks are slot lookups
//! - The next cell to fill is the empty cell with the fewest open
//!   candidates, ties broken by lexicographic cell order
//! - The search runs on an explicit stack and mutates a single occupancy
//!   state in place, undoing each placement on the way back up; this makes
//!   [`SolutionIter`] a lazy iterator
//! - Optional parallel mode fans the root branches out over rayon, with a
//!   shared stop flag once any branch finds a tiling

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::grid::Container;
use crate::pieces::{Piece, PieceId, PieceMeta};
use crate::placement::{placements, Placement};

/// Whether to stop at the first tiling or enumerate all of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    First,
    All,
}

/// Cooperative cancellation flag shared between a caller and a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Solver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// First solution or all solutions.
    pub mode: SearchMode,

    /// Allowed uses per piece id; ids not listed use `default_multiplicity`.
    pub multiplicity: BTreeMap<PieceId, usize>,

    /// Allowed uses for pieces missing from `multiplicity`.
    pub default_multiplicity: usize,

    /// Stop after this many solutions (all mode only).
    pub max_solutions: Option<usize>,

    /// Give up with `Cancelled` after this many milliseconds.
    pub time_limit_ms: Option<u64>,

    /// Search the root branches on the rayon pool (first mode only).
    pub parallel: bool,

    /// External cancellation signal.
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::First,
            multiplicity: BTreeMap::new(),
            default_multiplicity: 1,
            max_solutions: None,
            time_limit_ms: None,
            parallel: false,
            cancel: None,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Allows piece `id` to be used up to `count` times.
    pub fn with_multiplicity(mut self, id: PieceId, count: usize) -> Self {
        self.multiplicity.insert(id, count);
        self
    }

    pub fn with_default_multiplicity(mut self, count: usize) -> Self {
        self.default_multiplicity = count;
        self
    }

    pub fn with_max_solutions(mut self, max: usize) -> Self {
        self.max_solutions = Some(max);
        self
    }

    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// How many times piece `id` may appear in one solution.
    pub fn multiplicity_of(&self, id: PieceId) -> usize {
        self.multiplicity
            .get(&id)
            .copied()
            .unwrap_or(self.default_multiplicity)
    }
}

/// A placement together with the piece's display metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedPiece {
    pub placement: Placement,
    pub meta: PieceMeta,
}

/// A complete tiling: placements whose cells partition the container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pieces: Vec<PlacedPiece>,
}

impl Solution {
    pub fn new(pieces: Vec<PlacedPiece>) -> Self {
        Self { pieces }
    }

    /// Placed pieces in the order the search placed them.
    pub fn pieces(&self) -> &[PlacedPiece] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// The `(piece id, orientation index, offset)` encoding of each placement.
    pub fn to_tuples(&self) -> Vec<(PieceId, usize, Cell)> {
        self.pieces
            .iter()
            .map(|placed| {
                let p = &placed.placement;
                (p.piece_id, p.orientation_index, p.offset)
            })
            .collect()
    }

    /// True if the placements are pairwise disjoint and cover exactly the
    /// container's cells.
    pub fn is_exact_cover(&self, container: &Container) -> bool {
        let mut covered: FxHashSet<Cell> = FxHashSet::default();
        for placed in &self.pieces {
            for cell in placed.placement.cells.iter() {
                if !container.contains(cell) || !covered.insert(cell) {
                    return false;
                }
            }
        }
        covered.len() == container.len()
    }
}

/// One precomputed placement, with its cells as container indices.
#[derive(Debug)]
struct Candidate {
    /// Position of the piece in the solver's piece list.
    piece: usize,
    orientation: usize,
    offset: Cell,
    cells: Vec<usize>,
}

/// Immutable search input, shared by every branch of a run.
#[derive(Debug)]
struct Problem {
    pieces: Vec<Arc<Piece>>,
    candidates: Vec<Candidate>,
    /// Candidate indices covering each container cell, in candidate order.
    covering: Vec<Vec<usize>>,
    /// Allowed uses per piece.
    availability: Vec<usize>,
}

impl Problem {
    /// Builds the candidate table for a container.
    ///
    /// Candidates are created piece by piece, orientation by orientation,
    /// offset by offset, so each cell's covering list inherits that order.
    fn build(container: &Container, pieces: &[Arc<Piece>], config: &SolverConfig) -> Result<Self> {
        let mut ids: FxHashSet<PieceId> = FxHashSet::default();
        for piece in pieces {
            if !ids.insert(piece.id()) {
                return Err(Error::DuplicateId(piece.id()));
            }
        }

        let availability: Vec<usize> = pieces
            .iter()
            .map(|piece| config.multiplicity_of(piece.id()))
            .collect();

        let mut candidates = Vec::new();
        let mut covering = vec![Vec::new(); container.len()];

        for (piece_index, piece) in pieces.iter().enumerate() {
            if availability[piece_index] == 0 {
                continue;
            }
            for orientation in piece.orientations() {
                for placement in placements(orientation, container) {
                    // placements only respect the bounding box; drop ones over holes
                    let Some(cells) = placement
                        .cells
                        .iter()
                        .map(|cell| container.index_of(cell))
                        .collect::<Option<Vec<usize>>>()
                    else {
                        continue;
                    };
                    let candidate_index = candidates.len();
                    for &cell in &cells {
                        covering[cell].push(candidate_index);
                    }
                    candidates.push(Candidate {
                        piece: piece_index,
                        orientation: orientation.index,
                        offset: placement.offset,
                        cells,
                    });
                }
            }
        }

        log::debug!(
            "{} candidate placements for {} pieces over {} cells",
            candidates.len(),
            pieces.len(),
            container.len()
        );

        Ok(Self {
            pieces: pieces.to_vec(),
            candidates,
            covering,
            availability,
        })
    }

    /// Total cells the available pieces could cover.
    fn available_volume(&self) -> usize {
        self.pieces
            .iter()
            .zip(&self.availability)
            .map(|(piece, &count)| piece.volume().saturating_mul(count))
            .fold(0, usize::saturating_add)
    }

    fn placed_piece(&self, candidate: usize) -> PlacedPiece {
        let candidate = &self.candidates[candidate];
        let piece = &self.pieces[candidate.piece];
        let orientation = &piece.orientations()[candidate.orientation];
        PlacedPiece {
            placement: Placement::new(orientation, candidate.offset),
            meta: piece.meta().clone(),
        }
    }
}

/// Mutable occupancy for one search branch.
#[derive(Clone, Debug)]
struct SearchState {
    /// Piece (by list position) covering each container cell.
    slots: Vec<Option<usize>>,
    /// Uses left per piece.
    remaining: Vec<usize>,
    /// Candidates currently applied, in placement order.
    placed: Vec<usize>,
    empty: usize,
}

impl SearchState {
    fn new(problem: &Problem) -> Self {
        Self {
            slots: vec![None; problem.covering.len()],
            remaining: problem.availability.clone(),
            placed: Vec::new(),
            empty: problem.covering.len(),
        }
    }

    #[inline]
    fn is_open(&self, problem: &Problem, candidate: usize) -> bool {
        let candidate = &problem.candidates[candidate];
        self.remaining[candidate.piece] > 0 && candidate.cells.iter().all(|&cell| self.slots[cell].is_none())
    }

    fn apply(&mut self, problem: &Problem, candidate: usize) {
        let c = &problem.candidates[candidate];
        for &cell in &c.cells {
            debug_assert!(self.slots[cell].is_none());
            self.slots[cell] = Some(c.piece);
        }
        self.remaining[c.piece] -= 1;
        self.empty -= c.cells.len();
        self.placed.push(candidate);
    }

    fn undo(&mut self, problem: &Problem, candidate: usize) {
        let c = &problem.candidates[candidate];
        for &cell in &c.cells {
            self.slots[cell] = None;
        }
        self.remaining[c.piece] += 1;
        self.empty += c.cells.len();
        let popped = self.placed.pop();
        debug_assert_eq!(popped, Some(candidate));
    }

    /// Picks the most constrained empty cell and returns its open candidates.
    ///
    /// Returns `None` only when no cell is empty. A cell with no open
    /// candidates is returned immediately, since that branch is dead.
    fn select_cell(&self, problem: &Problem) -> Option<(usize, Vec<usize>)> {
        let mut best: Option<(usize, usize)> = None;

        for (cell, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                continue;
            }
            let open = problem.covering[cell]
                .iter()
                .filter(|&&candidate| self.is_open(problem, candidate))
                .count();
            if best.map_or(true, |(_, fewest)| open < fewest) {
                best = Some((cell, open));
                if open == 0 {
                    break;
                }
            }
        }

        best.map(|(cell, _)| {
            let options = problem.covering[cell]
                .iter()
                .copied()
                .filter(|&candidate| self.is_open(problem, candidate))
                .collect();
            (cell, options)
        })
    }

    fn solution(&self, problem: &Problem) -> Solution {
        Solution::new(self.placed.iter().map(|&c| problem.placed_piece(c)).collect())
    }
}

/// Reasons for a search to stop early.
#[derive(Clone, Debug, Default)]
struct Signals {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
    /// Raised by a sibling worker that already found a solution.
    halt: Option<Arc<AtomicBool>>,
}

enum Interrupt {
    Halt,
    Cancel,
}

impl Signals {
    fn from_config(config: &SolverConfig) -> Self {
        Self {
            cancel: config.cancel.clone(),
            deadline: config
                .time_limit_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
            halt: None,
        }
    }

    fn with_halt(&self, halt: Arc<AtomicBool>) -> Self {
        Self {
            halt: Some(halt),
            ..self.clone()
        }
    }

    fn check(&self) -> Option<Interrupt> {
        if self.halt.as_ref().is_some_and(|halt| halt.load(Ordering::Relaxed)) {
            return Some(Interrupt::Halt);
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Interrupt::Cancel);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(Interrupt::Cancel);
        }
        None
    }
}

/// A decision point: the open candidates for one cell and how far we got.
#[derive(Debug)]
struct Frame {
    options: Vec<usize>,
    next: usize,
    applied: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Fresh,
    Running,
    Done,
}

/// Lazy sequence of solutions, produced in deterministic search order.
///
/// Yields `Err(Error::Cancelled)` once if the cancellation token or time
/// limit fires, then ends.
pub struct SolutionIter {
    problem: Arc<Problem>,
    state: SearchState,
    stack: Vec<Frame>,
    signals: Signals,
    status: Status,
    max_solutions: Option<usize>,
    found: usize,
    nodes: u64,
}

impl SolutionIter {
    fn new(problem: Arc<Problem>, state: SearchState, signals: Signals, max_solutions: Option<usize>) -> Self {
        Self {
            problem,
            state,
            stack: Vec::new(),
            signals,
            status: Status::Fresh,
            max_solutions,
            found: 0,
            nodes: 0,
        }
    }

    /// An iterator that yields nothing.
    fn exhausted(problem: Arc<Problem>) -> Self {
        let state = SearchState::new(&problem);
        let mut iter = Self::new(problem, state, Signals::default(), None);
        iter.status = Status::Done;
        iter
    }

    /// Number of placements tried so far.
    pub fn nodes_explored(&self) -> u64 {
        self.nodes
    }

    /// Number of solutions yielded so far.
    pub fn solutions_found(&self) -> usize {
        self.found
    }

    fn push_frame(&mut self) {
        if let Some((_, options)) = self.state.select_cell(&self.problem) {
            self.stack.push(Frame {
                options,
                next: 0,
                applied: None,
            });
        }
    }

    fn emit(&mut self) -> Option<Result<Solution>> {
        self.found += 1;
        let solution = self.state.solution(&self.problem);
        log::debug!(
            "solution {} found after {} nodes ({} pieces)",
            self.found,
            self.nodes,
            solution.len()
        );
        Some(Ok(solution))
    }
}

impl Iterator for SolutionIter {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_solutions.is_some_and(|max| self.found >= max) {
            self.status = Status::Done;
        }
        match self.status {
            Status::Done => return None,
            Status::Fresh => {
                self.status = Status::Running;
                if self.state.empty == 0 {
                    self.status = Status::Done;
                    return self.emit();
                }
                self.push_frame();
            }
            Status::Running => {}
        }

        loop {
            match self.signals.check() {
                Some(Interrupt::Halt) => {
                    self.status = Status::Done;
                    return None;
                }
                Some(Interrupt::Cancel) => {
                    log::warn!("search cancelled after {} nodes", self.nodes);
                    self.status = Status::Done;
                    return Some(Err(Error::Cancelled));
                }
                None => {}
            }

            let Some(frame) = self.stack.last_mut() else {
                self.status = Status::Done;
                return None;
            };

            // backtrack out of the previous choice at this level
            if let Some(applied) = frame.applied.take() {
                self.state.undo(&self.problem, applied);
            }

            if frame.next == frame.options.len() {
                self.stack.pop();
                continue;
            }

            let candidate = frame.options[frame.next];
            frame.next += 1;
            frame.applied = Some(candidate);
            self.state.apply(&self.problem, candidate);
            self.nodes += 1;

            if self.state.empty == 0 {
                return self.emit();
            }
            self.push_frame();
        }
    }
}

/// Builds the problem and reports whether the volume check already rules
/// out a tiling.
fn prepare(container: &Container, pieces: &[Arc<Piece>], config: &SolverConfig) -> Result<(Arc<Problem>, bool)> {
    let problem = Problem::build(container, pieces, config)?;
    let available = problem.available_volume();
    let feasible = available >= container.len();
    if !feasible {
        log::debug!(
            "available piece volume {} is below container volume {}, skipping search",
            available,
            container.len()
        );
    }
    Ok((Arc::new(problem), feasible))
}

/// Lazily enumerates every tiling of `container` by `pieces`.
///
/// Solutions come out in the same order on every run. Respects
/// `max_solutions`, the time limit and the cancellation token; `mode` and
/// `parallel` are ignored.
pub fn solve_all(container: &Container, pieces: &[Arc<Piece>], config: &SolverConfig) -> Result<SolutionIter> {
    let (problem, feasible) = prepare(container, pieces, config)?;
    if !feasible {
        return Ok(SolutionIter::exhausted(problem));
    }
    let state = SearchState::new(&problem);
    Ok(SolutionIter::new(
        problem,
        state,
        Signals::from_config(config),
        config.max_solutions,
    ))
}

/// Finds one tiling of `container` by `pieces`.
///
/// Single-threaded runs return the first solution in search order. With
/// `parallel` set, the returned solution is whichever branch finished
/// first, which may differ between runs.
pub fn solve(container: &Container, pieces: &[Arc<Piece>], config: &SolverConfig) -> Result<Solution> {
    let (problem, feasible) = prepare(container, pieces, config)?;
    if !feasible {
        return Err(Error::NoSolution);
    }
    let signals = Signals::from_config(config);

    let found = if config.parallel {
        solve_parallel(problem, signals)
    } else {
        let state = SearchState::new(&problem);
        SolutionIter::new(problem, state, signals, None).next()
    };

    match found {
        Some(Ok(solution)) => {
            log::info!("found a tiling with {} pieces", solution.len());
            Ok(solution)
        }
        Some(Err(err)) => Err(err),
        None => Err(Error::NoSolution),
    }
}

/// Runs the root branches concurrently; each worker owns a private copy of
/// the search state.
fn solve_parallel(problem: Arc<Problem>, signals: Signals) -> Option<Result<Solution>> {
    let root = SearchState::new(&problem);
    let (cell, options) = root.select_cell(&problem)?;
    log::debug!("parallel search over {} root branches at cell {}", options.len(), cell);

    let halt = Arc::new(AtomicBool::new(false));
    options.par_iter().find_map_any(|&candidate| {
        let mut state = root.clone();
        state.apply(&problem, candidate);
        let mut branch = SolutionIter::new(problem.clone(), state, signals.with_halt(halt.clone()), None);
        let outcome = branch.next();
        if outcome.is_some() {
            halt.store(true, Ordering::Relaxed);
        }
        outcome
    })
}

/// Runs the search according to `config.mode`.
///
/// First mode returns a single solution or `NoSolution`; all mode returns
/// every solution (up to `max_solutions`), possibly none.
pub fn run(container: &Container, pieces: &[Arc<Piece>], config: &SolverConfig) -> Result<Vec<Solution>> {
    match config.mode {
        SearchMode::First => solve(container, pieces, config).map(|solution| vec![solution]),
        SearchMode::All => solve_all(container, pieces, config)?.collect(),
    }
}
