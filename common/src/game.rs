//! Headless game harness: a minefield with ground truth that produces the
//! snapshots the engine reasons about.

use std::collections::{HashSet, VecDeque};

use rand::Rng;

use crate::board::{BoardSnapshot, Cell, Coord, neighbors};

/// Preset board sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    /// 8x8, 10 mines.
    Easy,
    /// 16x16, 40 mines.
    Medium,
    /// 16x30, 99 mines.
    Hard,
}

impl Difficulty {
    /// `(rows, cols, mines)`.
    pub fn dimensions(self) -> (usize, usize, usize) {
        match self {
            Difficulty::Easy => (8, 8, 10),
            Difficulty::Medium => (16, 16, 40),
            Difficulty::Hard => (16, 30, 99),
        }
    }
}

/// Represents the current state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Won,
    Lost,
}

/// What a reveal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// The cell was already revealed or is flagged.
    Ignored,
    /// Safe; this many cells were opened, cascade included.
    Opened(usize),
    /// A mine. The game is lost.
    Exploded,
}

/// A board with known mine positions.
pub struct Minefield {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
    total_mines: usize,
    state: GameState,
}

impl Minefield {
    /// Places `mines` at random, keeping `safe_start` and its neighbours clear
    /// so the opening move never loses.
    pub fn generate(
        rows: usize,
        cols: usize,
        mines: usize,
        safe_start: Coord,
        rng: &mut impl Rng,
    ) -> anyhow::Result<Self> {
        if safe_start.row >= rows || safe_start.col >= cols {
            anyhow::bail!("start {safe_start} is outside the {rows}x{cols} board");
        }

        let mut safe_zone: HashSet<Coord> = neighbors(rows, cols, safe_start).collect();
        safe_zone.insert(safe_start);

        let candidates: Vec<Coord> = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| Coord { row, col }))
            .filter(|at| !safe_zone.contains(at))
            .collect();
        if mines > candidates.len() {
            anyhow::bail!("{mines} mines do not fit on a {rows}x{cols} board with a clear start");
        }

        let positions: Vec<Coord> = rand::seq::index::sample(rng, candidates.len(), mines)
            .into_iter()
            .map(|index| candidates[index])
            .collect();
        Self::with_mines(rows, cols, &positions)
    }

    pub fn from_difficulty(
        difficulty: Difficulty,
        safe_start: Coord,
        rng: &mut impl Rng,
    ) -> anyhow::Result<Self> {
        let (rows, cols, mines) = difficulty.dimensions();
        Self::generate(rows, cols, mines, safe_start, rng)
    }

    /// A fully hidden board with mines exactly at `mines`.
    pub fn with_mines(rows: usize, cols: usize, mines: &[Coord]) -> anyhow::Result<Self> {
        if rows == 0 || cols == 0 {
            anyhow::bail!("board must be at least 1x1");
        }

        let mut cells = vec![vec![Cell::hidden(); cols]; rows];
        for &at in mines {
            if at.row >= rows || at.col >= cols {
                anyhow::bail!("mine {at} is outside the {rows}x{cols} board");
            }
            cells[at.row][at.col].is_mine = true;
        }

        for row in 0..rows {
            for col in 0..cols {
                let at = Coord { row, col };
                let count = neighbors(rows, cols, at)
                    .filter(|n| cells[n.row][n.col].is_mine)
                    .count();
                cells[row][col].adjacent_mines = count as u8;
            }
        }

        let total_mines = cells.iter().flatten().filter(|cell| cell.is_mine).count();
        Ok(Minefield {
            rows,
            cols,
            cells,
            total_mines,
            state: GameState::Playing,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn total_mines(&self) -> usize {
        self.total_mines
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn cell(&self, at: Coord) -> &Cell {
        &self.cells[at.row][at.col]
    }

    /// Reveals `at`, cascading through zero cells.
    pub fn reveal(&mut self, at: Coord) -> anyhow::Result<RevealOutcome> {
        self.check_bounds(at)?;
        if self.state != GameState::Playing {
            anyhow::bail!("game_ended");
        }

        let cell = self.cells[at.row][at.col];
        if cell.is_revealed || cell.is_flagged {
            return Ok(RevealOutcome::Ignored);
        }
        if cell.is_mine {
            self.state = GameState::Lost;
            self.reveal_all_mines();
            return Ok(RevealOutcome::Exploded);
        }

        let opened = self.flood_fill_reveal(at);
        if self.is_won() {
            self.state = GameState::Won;
        }
        Ok(RevealOutcome::Opened(opened))
    }

    /// Opens `start` and, through every zero reached, its neighbours.
    /// Uses an explicit queue so large empty regions cannot exhaust the stack.
    fn flood_fill_reveal(&mut self, start: Coord) -> usize {
        let mut opened = 0;
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(at) = queue.pop_front() {
            let cell = &mut self.cells[at.row][at.col];
            if cell.is_revealed || cell.is_flagged || cell.is_mine {
                continue;
            }
            cell.is_revealed = true;
            opened += 1;

            if cell.adjacent_mines == 0 {
                for neighbour in neighbors(self.rows, self.cols, at) {
                    if visited.insert(neighbour) {
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        opened
    }

    fn reveal_all_mines(&mut self) {
        for cell in self.cells.iter_mut().flatten() {
            if cell.is_mine {
                cell.is_flagged = false;
                cell.is_revealed = true;
            }
        }
    }

    /// Flips the flag on a hidden cell and returns whether it is now flagged.
    /// Revealed cells are left alone.
    pub fn toggle_flag(&mut self, at: Coord) -> anyhow::Result<bool> {
        self.check_bounds(at)?;
        let cell = &mut self.cells[at.row][at.col];
        if !cell.is_revealed {
            cell.is_flagged = !cell.is_flagged;
        }
        Ok(cell.is_flagged)
    }

    pub fn flag_count(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| cell.is_flagged).count()
    }

    /// Every non-mine cell has been revealed.
    pub fn is_won(&self) -> bool {
        self.cells
            .iter()
            .flatten()
            .all(|cell| cell.is_mine || cell.is_revealed)
    }

    pub fn mine_positions(&self) -> HashSet<Coord> {
        (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| Coord { row, col }))
            .filter(|&at| self.cell(at).is_mine)
            .collect()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::from_rows(self.cells.clone())
    }

    fn check_bounds(&self, at: Coord) -> anyhow::Result<()> {
        if at.row >= self.rows || at.col >= self.cols {
            anyhow::bail!("{at} is outside the {}x{} board", self.rows, self.cols);
        }
        Ok(())
    }
}
