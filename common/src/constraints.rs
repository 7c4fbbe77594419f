//! Translates a board snapshot into boolean constraints over one
//! "is a mine" variable per cell.

use std::collections::{BTreeMap, HashSet};

use crate::board::{BoardSnapshot, Coord};
use crate::error::{EngineError, EngineResult};

/// "Exactly `mines` of `cells` are mines", contributed by a revealed number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountConstraint {
    /// The revealed cell showing the number.
    pub origin: Coord,
    /// Every in-bounds neighbour of `origin`, pinned or not.
    pub cells: Vec<Coord>,
    pub mines: usize,
}

/// The conjunction of count constraints and unit pins for one snapshot.
///
/// Rebuilt for every request and never mutated once built.
#[derive(Debug, Clone)]
pub struct ConstraintSystem {
    rows: usize,
    cols: usize,
    counts: Vec<CountConstraint>,
    pinned: BTreeMap<Coord, bool>,
    unrevealed: Vec<Coord>,
    total_mines: Option<usize>,
}

/// Builds the constraint system for `board`.
///
/// Revealed numbers become count constraints; flags, revealed cells and the
/// neighbours of revealed zeros become unit pins. Fails with `MalformedBoard`
/// when the snapshot is structurally broken and with `InconsistentBoard` when
/// two pins disagree about the same cell.
pub fn build(board: &BoardSnapshot) -> EngineResult<ConstraintSystem> {
    board.validate()?;

    let mut system = ConstraintSystem {
        rows: board.rows(),
        cols: board.cols(),
        counts: Vec::new(),
        pinned: BTreeMap::new(),
        unrevealed: board.unrevealed(),
        total_mines: None,
    };

    for at in board.coords() {
        let cell = board.cell(at);

        if cell.is_flagged {
            system.pin(at, true)?;
        } else if cell.is_revealed && cell.is_mine {
            system.pin(at, true)?;
        } else if cell.is_revealed {
            system.pin(at, false)?;

            if cell.adjacent_mines == 0 {
                // Nothing around a zero can be a mine.
                for neighbour in board.neighbors(at) {
                    system.pin(neighbour, false)?;
                }
            } else {
                system.counts.push(CountConstraint {
                    origin: at,
                    cells: board.neighbors(at).collect(),
                    mines: usize::from(cell.adjacent_mines),
                });
            }
        }
    }

    Ok(system)
}

impl ConstraintSystem {
    /// Adds the global "exactly `total` mines on the board" constraint.
    pub fn with_total_mines(mut self, total: usize) -> Self {
        self.total_mines = Some(total);
        self
    }

    fn pin(&mut self, at: Coord, is_mine: bool) -> EngineResult<()> {
        match self.pinned.insert(at, is_mine) {
            Some(previous) if previous != is_mine => Err(EngineError::InconsistentBoard(format!(
                "cell {at} is forced to be both a mine and safe"
            ))),
            _ => Ok(()),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn counts(&self) -> &[CountConstraint] {
        &self.counts
    }

    pub fn total_mines(&self) -> Option<usize> {
        self.total_mines
    }

    /// The value a unit constraint fixes for `at`, if any.
    pub fn pinned(&self, at: Coord) -> Option<bool> {
        self.pinned.get(&at).copied()
    }

    pub fn pins(&self) -> impl Iterator<Item = (Coord, bool)> + '_ {
        self.pinned.iter().map(|(&at, &is_mine)| (at, is_mine))
    }

    /// Cells the snapshot had not revealed, in row-major order.
    pub fn unrevealed(&self) -> &[Coord] {
        &self.unrevealed
    }

    /// Unrevealed, unpinned cells that some constraint actually mentions.
    ///
    /// Only these need oracle queries: anything else is free in every model.
    pub fn frontier(&self) -> Vec<Coord> {
        let constrained: HashSet<Coord> = self
            .counts
            .iter()
            .flat_map(|count| count.cells.iter().copied())
            .collect();

        self.unrevealed
            .iter()
            .copied()
            .filter(|at| !self.pinned.contains_key(at))
            .filter(|at| self.total_mines.is_some() || constrained.contains(at))
            .collect()
    }

    /// Whether a full assignment satisfies every constraint in the system.
    pub fn is_satisfied_by(&self, is_mine: impl Fn(Coord) -> bool) -> bool {
        let pins_hold = self.pins().all(|(at, value)| is_mine(at) == value);
        let counts_hold = self
            .counts
            .iter()
            .all(|count| count.cells.iter().filter(|&&at| is_mine(at)).count() == count.mines);
        let total_holds = self.total_mines.is_none_or(|total| {
            (0..self.rows)
                .flat_map(|row| (0..self.cols).map(move |col| Coord { row, col }))
                .filter(|&at| is_mine(at))
                .count()
                == total
        });
        pins_hold && counts_hold && total_holds
    }
}
