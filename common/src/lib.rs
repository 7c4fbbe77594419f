//! Mine inference for minesweeper boards.
//!
//! Given a partially revealed board, the engine works out which hidden cells
//! are provably mines, which are provably safe, and which the visible numbers
//! cannot decide. A request runs leaf-first:
//!
//! 1. [`constraints::build`] turns a [`BoardSnapshot`] into count constraints
//!    and unit pins.
//! 2. [`VarisatOracle`] encodes that system to CNF once.
//! 3. [`classify()`] asks the oracle, per frontier cell, whether the cell
//!    *can* be a mine and whether it *can* be safe.
//! 4. [`suggest`] sorts the hidden cells into safe, mine and unknown buckets.
//!
//! [`AccuracyTracker`] judges suggested mines against the real layout over a
//! game session, and [`game::Minefield`] provides that real layout.

pub mod accuracy;
pub mod advisor;
pub mod board;
pub mod classify;
pub mod config;
pub mod constraints;
pub mod error;
pub mod game;
pub mod oracle;

pub use accuracy::{AccuracyLedger, AccuracySink, AccuracyTracker, FileSink};
pub use advisor::{Suggestions, advise, suggest};
pub use board::{BoardSnapshot, Cell, Coord};
pub use classify::{CellClass, Classification, Classifier, classify};
pub use config::EngineConfig;
pub use constraints::{ConstraintSystem, CountConstraint, build};
pub use error::{EngineError, EngineResult};
pub use oracle::{Literal, Oracle, VarisatOracle, Verdict, Witness};
