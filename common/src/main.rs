use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use minesweeper_inference::game::{Difficulty, GameState, Minefield, RevealOutcome};
use minesweeper_inference::{
    AccuracyTracker, BoardSnapshot, Coord, EngineConfig, FileSink, Suggestions, advise,
};
use rand::SeedableRng;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "minesweeper-inference")]
#[command(about = "Deduce provable mines and safe cells on minesweeper boards")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Let a bot play a generated game using only proven deductions
    Play {
        #[arg(short, long, value_enum, default_value = "easy")]
        difficulty: DifficultyArg,
        /// Seed for mine placement and guesses
        #[arg(short, long)]
        seed: Option<u64>,
        /// Accuracy log, appended to across runs
        #[arg(long, default_value = "accuracy_data.txt")]
        accuracy_log: PathBuf,
        /// Budget for a single oracle query, in milliseconds. Checked once the
        /// query returns: a slow query still runs to completion, then its cell
        /// is reported as undetermined
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Tell the engine how many mines the board holds
        #[arg(long)]
        use_mine_count: bool,
        /// Pause between moves, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
        /// Write the final board here
        #[arg(long)]
        save_snapshot: Option<PathBuf>,
    },
    /// Print suggestions for a saved board snapshot
    Analyze {
        /// Snapshot written by `play --save-snapshot`
        snapshot: PathBuf,
        /// Budget for a single oracle query, in milliseconds. Checked once the
        /// query returns: a slow query still runs to completion, then its cell
        /// is reported as undetermined
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    /// 8x8, 10 mines
    Easy,
    /// 16x16, 40 mines
    Medium,
    /// 16x30, 99 mines
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

/// Directives from `var`, or `info` when it is unset or unparsable.
fn log_filter(var: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::DEFAULT_ENV))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            difficulty,
            seed,
            accuracy_log,
            timeout_ms,
            use_mine_count,
            delay_ms,
            save_snapshot,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let difficulty = Difficulty::from(difficulty);
            let (rows, cols, _) = difficulty.dimensions();
            let start = Coord::new(rows / 2, cols / 2);
            let mut field = Minefield::from_difficulty(difficulty, start, &mut rng)?;

            let mut config = EngineConfig::default();
            if let Some(ms) = timeout_ms {
                config = config.with_query_timeout(Duration::from_millis(ms));
            }
            if use_mine_count {
                config = config.with_total_mines(field.total_mines());
            }

            let tracker = AccuracyTracker::start(FileSink::new(&accuracy_log))?;
            play(&mut field, start, &config, tracker, &mut rng, delay_ms)?;

            if let Some(path) = save_snapshot {
                std::fs::write(&path, field.snapshot().to_bytes()?)?;
                println!("Saved final board to {}", path.display());
            }
        }
        Commands::Analyze {
            snapshot,
            timeout_ms,
        } => {
            let bytes = std::fs::read(&snapshot)?;
            let board = BoardSnapshot::from_bytes(&bytes)?;
            let mut config = EngineConfig::default();
            if let Some(ms) = timeout_ms {
                config = config.with_query_timeout(Duration::from_millis(ms));
            }

            print_board(&board);
            let suggestions = advise(&board, &config)?;
            print_suggestions(&suggestions);
        }
    }

    Ok(())
}

/// Bot loop: reveal proven-safe cells, flag proven mines, guess only when
/// nothing is proven.
fn play(
    field: &mut Minefield,
    start: Coord,
    config: &EngineConfig,
    mut tracker: AccuracyTracker<FileSink>,
    rng: &mut StdRng,
    delay_ms: u64,
) -> anyhow::Result<()> {
    println!("--- Autonomous Minesweeper Bot ---");
    println!("Opening at {start}");
    field.reveal(start)?;
    print_board(&field.snapshot());

    let actual_mines = field.mine_positions();
    let mut move_count = 0;

    while field.state() == GameState::Playing {
        move_count += 1;
        println!("\n--- Move #{move_count} ---");

        let snapshot = field.snapshot();
        let suggestions = advise(&snapshot, config)?;

        let predicted: HashSet<Coord> = suggestions.mine_cells.iter().copied().collect();
        let precision = tracker.record(&actual_mines, &predicted)?;
        tracing::info!(
            move_count,
            safe = suggestions.safe_cells.len(),
            mines = suggestions.mine_cells.len(),
            unknown = suggestions.unknown_cells.len(),
            precision,
            "engine suggestions"
        );

        for &at in &suggestions.mine_cells {
            if !field.cell(at).is_flagged {
                field.toggle_flag(at)?;
            }
        }

        let target = match suggestions.safe_cells.first() {
            Some(&at) => {
                println!("Logic found a guaranteed safe cell.");
                at
            }
            None => {
                let unknown: Vec<Coord> = suggestions.unknown_cells.iter().copied().collect();
                match unknown.choose(rng) {
                    Some(&at) => {
                        println!("No logically safe move found. Making a random guess...");
                        at
                    }
                    None => {
                        println!("No valid moves left for the bot to make.");
                        break;
                    }
                }
            }
        };

        println!("Bot reveals {target}...");
        if field.reveal(target)? == RevealOutcome::Exploded {
            println!("Boom.");
        }
        print_board(&field.snapshot());

        if delay_ms > 0 {
            thread::sleep(Duration::from_millis(delay_ms));
        }
    }

    let ledger = tracker.finish();
    println!("\n--- Game Over ---");
    match field.state() {
        GameState::Won => println!("Result: The bot won!"),
        GameState::Lost => println!("Result: The bot hit a mine and lost."),
        GameState::Playing => println!("Result: The game ended unexpectedly."),
    }
    println!(
        "Mine precision: {:.4} ({} of {} predictions correct)",
        ledger.precision(),
        ledger.true_positives,
        ledger.total_predictions
    );
    Ok(())
}

fn print_board(board: &BoardSnapshot) {
    print!("   ");
    for col in 0..board.cols() {
        print!("{:^3}", col);
    }
    println!("\n  +{}", "---".repeat(board.cols()));

    for row in 0..board.rows() {
        print!("{:^2}|", row);
        for col in 0..board.cols() {
            let cell = board.cell(Coord::new(row, col));
            let display = match (cell.is_revealed, cell.is_flagged, cell.is_mine) {
                (true, _, true) => " * ".to_string(),
                (true, _, false) => format!(" {} ", cell.adjacent_mines),
                (false, true, _) => " F ".to_string(),
                (false, false, _) => " ■ ".to_string(),
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}

fn print_suggestions(suggestions: &Suggestions) {
    let list = |cells: &BTreeSet<Coord>| {
        cells
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    println!("Safe:    {}", list(&suggestions.safe_cells));
    println!("Mines:   {}", list(&suggestions.mine_cells));
    println!("Unknown: {}", list(&suggestions.unknown_cells));
}
