//! Polycube packing CLI
//!
//! Lists the block catalog, solves containers with chosen pieces, surveys
//! which piece sets can fill a cube, and shows saved solutions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use blokk::partition::{feasible_partitions, piece_samples, VolumeIndex};
use blokk::{format_solution, persistence, run, survey, Catalog, Container, Error, PieceId, Result, SearchMode, SolverConfig};

/// Solves polycube packing puzzles.
#[derive(Parser, Debug)]
#[command(name = "blokk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON catalog file to use instead of the built-in blocks.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the pieces in the catalog.
    Catalog,
    /// Tile a container with the chosen pieces.
    Solve(SolveArgs),
    /// List the piece sets whose volumes could fill a container.
    Samples(SampleArgs),
    /// Solve every piece set that could fill a container.
    Survey(SurveyArgs),
    /// Show the number of saved solutions.
    Count {
        /// Directory holding solutions.bin.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Print saved solutions.
    Show {
        /// Directory holding solutions.bin.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ContainerArgs {
    /// Edge length of a cube container.
    #[arg(long, conflicts_with = "dims")]
    size: Option<i32>,

    /// Box dimensions.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    dims: Option<Vec<i32>>,
}

impl ContainerArgs {
    /// The requested box, a 3x3x3 cube by default.
    fn container(&self) -> Result<Container> {
        match (&self.dims, self.size) {
            (Some(dims), _) => Container::cuboid(dims[0], dims[1], dims[2]),
            (None, Some(size)) => Container::cube(size),
            (None, None) => Container::cube(3),
        }
    }
}

#[derive(Args, Debug)]
struct SolveArgs {
    #[command(flatten)]
    container: ContainerArgs,

    /// Piece ids to use (comma separated); defaults to the whole catalog.
    #[arg(long, value_delimiter = ',')]
    pieces: Vec<PieceId>,

    /// Enumerate all solutions instead of stopping at the first.
    #[arg(long)]
    all: bool,

    /// Stop after this many solutions.
    #[arg(long)]
    max: Option<usize>,

    /// Search root branches in parallel.
    #[arg(long)]
    parallel: bool,

    /// Give up after this many milliseconds.
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// JSON solver configuration; flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write solutions.txt and solutions.bin to this directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

impl SolveArgs {
    fn solver_config(&self) -> Result<SolverConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => SolverConfig::default(),
        };
        if self.all {
            config.mode = SearchMode::All;
        }
        if self.max.is_some() {
            config.max_solutions = self.max;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.time_limit_ms.is_some() {
            config.time_limit_ms = self.time_limit_ms;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SampleArgs {
    #[command(flatten)]
    container: ContainerArgs,

    /// Ignore pieces larger than this volume.
    #[arg(long)]
    max_volume: Option<usize>,

    /// Print every sample, not just the totals.
    #[arg(long)]
    list: bool,
}

#[derive(Args, Debug)]
struct SurveyArgs {
    #[command(flatten)]
    container: ContainerArgs,

    /// Ignore pieces larger than this volume.
    #[arg(long)]
    max_volume: Option<usize>,

    /// Solve samples in parallel.
    #[arg(long)]
    parallel: bool,

    /// Give up on each sample after this many milliseconds.
    #[arg(long)]
    time_limit_ms: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let catalog = load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Command::Catalog => print_catalog(&catalog),
        Command::Solve(args) => run_solve(&catalog, &args)?,
        Command::Samples(args) => run_samples(&catalog, &args)?,
        Command::Survey(args) => run_survey(&catalog, &args)?,
        Command::Count { dir } => run_count(&dir),
        Command::Show { dir } => run_show(&catalog, &dir)?,
    }
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_json(&std::fs::read_to_string(path)?),
        None => Catalog::builtin(),
    }
}

fn print_catalog(catalog: &Catalog) {
    println!("{:>4}  {:<10} {:>6} {:>12}  color", "id", "name", "volume", "orientations");
    for piece in catalog.iter() {
        println!(
            "{:>4}  {:<10} {:>6} {:>12}  {}",
            piece.id(),
            piece.name(),
            piece.volume(),
            piece.orientations().len(),
            piece.color()
        );
    }
}

fn run_solve(catalog: &Catalog, args: &SolveArgs) -> Result<()> {
    let container = args.container.container()?;
    let pieces = if args.pieces.is_empty() {
        catalog.pieces().to_vec()
    } else {
        catalog.select(&args.pieces)?
    };
    let config = args.solver_config()?;

    let solutions = match run(&container, &pieces, &config) {
        Ok(solutions) => solutions,
        Err(Error::NoSolution) => Vec::new(),
        Err(err) => return Err(err),
    };

    if solutions.is_empty() {
        println!("No solution");
        return Ok(());
    }

    for (i, solution) in solutions.iter().enumerate() {
        println!("Solution {}:", i + 1);
        println!("{}", format_solution(solution, &container));
        println!();
    }
    println!("Found {} solutions", solutions.len());

    if let Some(dir) = &args.out {
        persistence::save(dir, &solutions, &container)?;
        println!("Wrote {} and {}", persistence::SOLUTIONS_TXT, persistence::SOLUTIONS_BIN);
    }
    Ok(())
}

fn run_samples(catalog: &Catalog, args: &SampleArgs) -> Result<()> {
    let container = args.container.container()?;
    let index = VolumeIndex::fitting(catalog, args.max_volume, &container);
    let partitions = feasible_partitions(container.len(), &index);
    let samples = piece_samples(container.len(), &index);

    for (i, partition) in partitions.iter().enumerate() {
        let count = samples.iter().filter(|sample| sample.partition == i).count();
        println!("{:?}: {} samples", partition, count);
    }
    if args.list {
        for sample in &samples {
            println!("{:?}", sample.pieces);
        }
    }
    println!("{} partitions, {} samples", partitions.len(), samples.len());
    Ok(())
}

fn run_survey(catalog: &Catalog, args: &SurveyArgs) -> Result<()> {
    let container = args.container.container()?;
    let mut config = SolverConfig::default().with_parallel(args.parallel);
    config.time_limit_ms = args.time_limit_ms;

    let result = survey(&container, catalog, args.max_volume, &config)?;
    for entry in result.solvable() {
        println!("{:?}", entry.sample.pieces);
    }
    for entry in result.timed_out() {
        println!("{:?} (timed out)", entry.sample.pieces);
    }
    println!(
        "{} of {} samples are solvable, {} timed out",
        result.solvable().count(),
        result.entries.len(),
        result.timed_out().count()
    );
    Ok(())
}

fn run_count(dir: &Path) {
    match persistence::count(dir) {
        Some(count) => println!("{} solutions", count),
        None => eprintln!("No solutions.bin found. Run 'blokk solve --out DIR' first."),
    }
}

fn run_show(catalog: &Catalog, dir: &Path) -> Result<()> {
    let Some(saved) = persistence::load_all(dir) else {
        eprintln!("No solutions.bin found. Run 'blokk solve --out DIR' first.");
        return Ok(());
    };

    println!("Loaded {} solutions", saved.len());
    for (i, placements) in saved.iter().enumerate() {
        let solution = persistence::rebuild(placements, catalog)?;
        // the covered cells are exactly the container that was solved
        let container = Container::from_cells(
            solution
                .pieces()
                .iter()
                .flat_map(|placed| placed.placement.cells.iter()),
        )?;
        println!("Solution {}:", i + 1);
        println!("{}", format_solution(&solution, &container));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_solve_flags() {
        let cli = Cli::try_parse_from([
            "blokk", "solve", "--dims", "2", "2", "4", "--pieces", "3,5,11", "--all", "--max", "10",
        ])
        .unwrap();
        let Command::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.pieces, vec![3, 5, 11]);
        assert_eq!(args.container.container().unwrap(), Container::cuboid(2, 2, 4).unwrap());

        let config = args.solver_config().unwrap();
        assert_eq!(config.mode, SearchMode::All);
        assert_eq!(config.max_solutions, Some(10));
        assert!(!config.parallel);
    }

    #[test]
    fn test_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"multiplicity": {"7": 2}, "time_limit_ms": 500}"#).unwrap();

        let cli = Cli::try_parse_from([
            "blokk",
            "solve",
            "--size",
            "2",
            "--parallel",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        let config = args.solver_config().unwrap();
        assert_eq!(config.multiplicity_of(7), 2);
        assert_eq!(config.time_limit_ms, Some(500));
        assert!(config.parallel);
        assert_eq!(config.mode, SearchMode::First);
    }

    #[test]
    fn test_default_container_is_three_cube() {
        let cli = Cli::try_parse_from(["blokk", "samples"]).unwrap();
        let Command::Samples(args) = cli.command else {
            panic!("expected samples");
        };
        assert_eq!(args.container.container().unwrap().len(), 27);
    }

    #[test]
    fn test_size_and_dims_conflict() {
        assert!(Cli::try_parse_from(["blokk", "solve", "--size", "2", "--dims", "1", "2", "3"]).is_err());
    }

    #[test]
    fn test_show_renders_saved_solutions() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin().unwrap();
        let container = Container::cube(2).unwrap();
        let pieces = catalog.select(&[2]).unwrap();
        let config = SolverConfig::default().with_multiplicity(2, 4);
        let solutions = run(&container, &pieces, &config).unwrap();
        persistence::save(dir.path(), &solutions, &container).unwrap();

        run_show(&catalog, dir.path()).unwrap();
        run_count(dir.path());
    }
}
