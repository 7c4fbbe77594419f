use std::collections::BTreeSet;

use crate::board::{BoardSnapshot, Coord};
use crate::classify::{CellClass, Classification, classify};
use crate::config::EngineConfig;
use crate::constraints::build;
use crate::error::EngineResult;
use crate::oracle::VarisatOracle;

/// Suggested moves, split so "provably safe" never gets mixed up with "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    /// Provably safe: reveal these.
    pub safe_cells: BTreeSet<Coord>,
    /// Provably mines: flag these.
    pub mine_cells: BTreeSet<Coord>,
    /// Everything else that is still hidden.
    pub unknown_cells: BTreeSet<Coord>,
}

/// Sorts the board's unrevealed cells into the three buckets.
///
/// Cells missing from `classification` are treated as unknown.
pub fn suggest(board: &BoardSnapshot, classification: &Classification) -> Suggestions {
    let mut suggestions = Suggestions::default();
    for at in board.unrevealed() {
        let bucket = match classification.get(at) {
            Some(CellClass::Mine) => &mut suggestions.mine_cells,
            Some(CellClass::Safe) => &mut suggestions.safe_cells,
            Some(CellClass::Undetermined) | None => &mut suggestions.unknown_cells,
        };
        bucket.insert(at);
    }
    suggestions
}

/// Runs one full inference request: build, classify, suggest.
pub fn advise(board: &BoardSnapshot, config: &EngineConfig) -> EngineResult<Suggestions> {
    let mut system = build(board)?;
    if let Some(total) = config.total_mines {
        system = system.with_total_mines(total);
    }

    let oracle = VarisatOracle::new(&system).with_query_timeout(config.query_timeout);
    let classification = classify(&system, system.unrevealed(), oracle)?;
    let suggestions = suggest(board, &classification);

    tracing::debug!(
        safe = suggestions.safe_cells.len(),
        mines = suggestions.mine_cells.len(),
        unknown = suggestions.unknown_cells.len(),
        "suggestions ready"
    );
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn coords(cells: &[(usize, usize)]) -> BTreeSet<Coord> {
        cells.iter().map(|&cell| Coord::from(cell)).collect()
    }

    #[test]
    fn test_undetermined_cells_are_not_reported_safe() {
        let board: BoardSnapshot = "1#1##\n111##".parse().unwrap();
        let suggestions = advise(&board, &EngineConfig::default()).unwrap();

        assert_eq!(suggestions.mine_cells, coords(&[(0, 1)]));
        assert_eq!(suggestions.safe_cells, coords(&[(0, 3), (1, 3)]));
        // Nothing revealed touches the last column.
        assert_eq!(suggestions.unknown_cells, coords(&[(0, 4), (1, 4)]));
    }

    #[test]
    fn test_unconstrained_board_has_only_unknowns_and_flags() {
        let board: BoardSnapshot = "##\n#F".parse().unwrap();
        let suggestions = advise(&board, &EngineConfig::default()).unwrap();

        assert!(suggestions.safe_cells.is_empty());
        assert_eq!(suggestions.mine_cells, coords(&[(1, 1)]));
        assert_eq!(suggestions.unknown_cells, coords(&[(0, 0), (0, 1), (1, 0)]));
    }

    #[test]
    fn test_mine_total_on_hard_board_stays_fast() {
        use std::time::{Duration, Instant};

        use rand::SeedableRng;
        use rand::rngs::StdRng;

        use crate::game::{Difficulty, Minefield};

        let mut rng = StdRng::seed_from_u64(3);
        let start = Coord::new(8, 15);
        let mut field = Minefield::from_difficulty(Difficulty::Hard, start, &mut rng).unwrap();
        field.reveal(start).unwrap();
        let config = EngineConfig::default().with_total_mines(field.total_mines());

        let started = Instant::now();
        let suggestions = advise(&field.snapshot(), &config).unwrap();
        assert!(started.elapsed() < Duration::from_secs(30));

        let mines = field.mine_positions();
        assert!(suggestions.mine_cells.iter().all(|at| mines.contains(at)));
        assert!(suggestions.safe_cells.iter().all(|at| !mines.contains(at)));
    }

    #[test]
    fn test_total_mines_resolves_remaining_cells() {
        // Without a mine total the far cell is unconstrained.
        let board: BoardSnapshot = "1#1#".parse().unwrap();
        let plain = advise(&board, &EngineConfig::default()).unwrap();
        assert_eq!(plain.mine_cells, coords(&[(0, 1)]));
        assert_eq!(plain.safe_cells, coords(&[(0, 3)]));

        let board: BoardSnapshot = "1##".parse().unwrap();
        let plain = advise(&board, &EngineConfig::default()).unwrap();
        assert_eq!(plain.unknown_cells, coords(&[(0, 2)]));

        let counted = advise(&board, &EngineConfig::default().with_total_mines(2)).unwrap();
        assert_eq!(counted.mine_cells, coords(&[(0, 1), (0, 2)]));
    }

    #[test]
    fn test_errors_propagate() {
        let board: BoardSnapshot = "0F".parse().unwrap();
        assert!(matches!(
            advise(&board, &EngineConfig::default()),
            Err(EngineError::InconsistentBoard(_))
        ));
    }
}
