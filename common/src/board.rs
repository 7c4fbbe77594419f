use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// A position on the board, zero-based from the top-left corner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Coord { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One board position as the game sees it.
///
/// `is_mine` is ground truth. The engine only reads it to tell a revealed
/// safe cell from a revealed (exploded) mine; hidden cells are never inspected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cell {
    pub is_mine: bool,
    pub is_revealed: bool,
    pub is_flagged: bool,
    /// Number of mines among the 8 neighbours. Only meaningful once revealed.
    pub adjacent_mines: u8,
}

impl Cell {
    pub fn hidden() -> Self {
        Cell::default()
    }

    pub fn revealed(adjacent_mines: u8) -> Self {
        Cell {
            is_revealed: true,
            adjacent_mines,
            ..Cell::default()
        }
    }

    pub fn flagged() -> Self {
        Cell {
            is_flagged: true,
            ..Cell::default()
        }
    }

    /// A revealed cell that carries a usable count.
    pub fn is_revealed_safe(&self) -> bool {
        self.is_revealed && !self.is_mine
    }
}

/// Read-only view of the board handed to the engine for one request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoardSnapshot {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl BoardSnapshot {
    /// Wraps row vectors without checking their shape; see [`BoardSnapshot::validate`].
    pub fn from_rows(cells: Vec<Vec<Cell>>) -> Self {
        let rows = cells.len();
        let cols = cells.first().map_or(0, Vec::len);
        BoardSnapshot { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell(&self, at: Coord) -> &Cell {
        &self.cells[at.row][at.col]
    }

    pub fn contains(&self, at: Coord) -> bool {
        at.row < self.rows && at.col < self.cols
    }

    /// Checks the structural invariants the engine relies on.
    pub fn validate(&self) -> EngineResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(EngineError::MalformedBoard(format!(
                "board must be at least 1x1, got {}x{}",
                self.rows, self.cols
            )));
        }
        if let Some(row) = self.cells.iter().position(|r| r.len() != self.cols) {
            return Err(EngineError::MalformedBoard(format!(
                "row {row} has {} cells, expected {}",
                self.cells[row].len(),
                self.cols
            )));
        }

        for at in self.coords() {
            let cell = self.cell(at);
            if cell.is_revealed && cell.is_flagged {
                return Err(EngineError::MalformedBoard(format!(
                    "cell {at} is both revealed and flagged"
                )));
            }
            if cell.is_revealed_safe() {
                let neighbours = self.neighbors(at).count();
                if cell.adjacent_mines > 8 || usize::from(cell.adjacent_mines) > neighbours {
                    return Err(EngineError::MalformedBoard(format!(
                        "cell {at} shows {} but has {neighbours} neighbours",
                        cell.adjacent_mines
                    )));
                }
            }
        }
        Ok(())
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + use<> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| Coord { row, col }))
    }

    pub fn unrevealed(&self) -> Vec<Coord> {
        self.coords()
            .filter(|&at| !self.cell(at).is_revealed)
            .collect()
    }

    /// The 8-connected neighbourhood of `at`, clipped to the board.
    pub fn neighbors(&self, at: Coord) -> impl Iterator<Item = Coord> + use<> {
        neighbors(self.rows, self.cols, at)
    }

    pub fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        Ok(bcs::to_bytes(self)?)
    }

    /// Decodes a snapshot and checks it before handing it out.
    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        let snapshot: BoardSnapshot = bcs::from_bytes(bytes)?;
        let derived = BoardSnapshot::from_rows(snapshot.cells.clone());
        if derived.rows != snapshot.rows || derived.cols != snapshot.cols {
            return Err(EngineError::MalformedBoard(format!(
                "declared {}x{} does not match the encoded cells",
                snapshot.rows, snapshot.cols
            )));
        }
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Neighbours of `at` on a `rows` x `cols` grid. Edges and corners get fewer.
pub(crate) fn neighbors(rows: usize, cols: usize, at: Coord) -> impl Iterator<Item = Coord> {
    (-1isize..=1).flat_map(move |dr| {
        (-1isize..=1).filter_map(move |dc| {
            if dr == 0 && dc == 0 {
                return None;
            }
            let row = at.row.checked_add_signed(dr)?;
            let col = at.col.checked_add_signed(dc)?;
            (row < rows && col < cols).then_some(Coord { row, col })
        })
    })
}

/// Text form used by tests and tooling.
///
/// `#` hidden, `*` hidden mine, `F` flag, `X` revealed mine, `0`-`8` revealed count.
impl FromStr for BoardSnapshot {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells = s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.chars()
                    .filter(|ch| !ch.is_whitespace())
                    .map(|ch| match ch {
                        '#' => Ok(Cell::hidden()),
                        '*' => Ok(Cell {
                            is_mine: true,
                            ..Cell::hidden()
                        }),
                        'F' => Ok(Cell::flagged()),
                        'X' => Ok(Cell {
                            is_mine: true,
                            is_revealed: true,
                            ..Cell::default()
                        }),
                        '0'..='8' => Ok(Cell::revealed(ch as u8 - b'0')),
                        other => Err(EngineError::MalformedBoard(format!(
                            "unexpected character {other:?}"
                        ))),
                    })
                    .collect::<EngineResult<Vec<Cell>>>()
            })
            .collect::<EngineResult<Vec<Vec<Cell>>>>()?;
        Ok(BoardSnapshot::from_rows(cells))
    }
}

impl fmt::Display for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for cell in row {
                let ch = match (cell.is_revealed, cell.is_flagged, cell.is_mine) {
                    (true, _, true) => 'X',
                    (true, _, false) => char::from(b'0' + cell.adjacent_mines.min(9)),
                    (false, true, _) => 'F',
                    (false, false, true) => '*',
                    (false, false, false) => '#',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
