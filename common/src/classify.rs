//! Entailment classification of unrevealed cells.
//!
//! A cell is a mine only if it is a mine in *every* model of the constraint
//! system, and safe only if it is safe in every model. Each frontier cell is
//! therefore checked with two complementary assumption queries; the witness
//! the oracle hands back is never consulted.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::board::Coord;
use crate::constraints::ConstraintSystem;
use crate::error::{EngineError, EngineResult};
use crate::oracle::{Literal, Oracle, Verdict};

/// What the visible constraints say about one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellClass {
    /// Every model has a mine here.
    Mine,
    /// No model has a mine here.
    Safe,
    /// Models disagree, or the oracle ran out of time.
    Undetermined,
}

/// Per-cell classes for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    cells: BTreeMap<Coord, CellClass>,
    timed_out: Vec<Coord>,
    queries: usize,
}

impl Classification {
    pub fn get(&self, at: Coord) -> Option<CellClass> {
        self.cells.get(&at).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, CellClass)> + '_ {
        self.cells.iter().map(|(&at, &class)| (at, class))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn with_class(&self, wanted: CellClass) -> impl Iterator<Item = Coord> + '_ {
        self.iter()
            .filter(move |&(_, class)| class == wanted)
            .map(|(at, _)| at)
    }

    pub fn mines(&self) -> impl Iterator<Item = Coord> + '_ {
        self.with_class(CellClass::Mine)
    }

    pub fn safe(&self) -> impl Iterator<Item = Coord> + '_ {
        self.with_class(CellClass::Safe)
    }

    pub fn undetermined(&self) -> impl Iterator<Item = Coord> + '_ {
        self.with_class(CellClass::Undetermined)
    }

    /// Cells left undetermined because a query ran out of time.
    pub fn timed_out(&self) -> &[Coord] {
        &self.timed_out
    }

    /// Oracle queries issued, including the initial consistency check.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

/// One classification pass over a fixed constraint system.
pub struct Classifier<'c, O> {
    system: &'c ConstraintSystem,
    oracle: O,
    cancel: Option<&'c AtomicBool>,
}

impl<'c, O: Oracle> Classifier<'c, O> {
    pub fn new(system: &'c ConstraintSystem, oracle: O) -> Self {
        Classifier {
            system,
            oracle,
            cancel: None,
        }
    }

    /// Aborts the pass with `Cancelled` once `flag` is set. Polled between cells.
    pub fn with_cancel(mut self, flag: &'c AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn classify(mut self, cells: &[Coord]) -> EngineResult<Classification> {
        let mut result = Classification::default();

        result.queries += 1;
        match self.oracle.check(&[]) {
            Ok(Verdict::Satisfiable(_)) => {}
            Ok(Verdict::Unsatisfiable) => {
                tracing::warn!("constraint system has no model");
                return Err(EngineError::InconsistentBoard(
                    "no mine assignment satisfies the revealed numbers".to_string(),
                ));
            }
            // The per-cell queries still catch an inconsistent board.
            Err(EngineError::OracleTimeout { elapsed }) => {
                tracing::warn!(?elapsed, "consistency check timed out");
            }
            Err(err) => return Err(err),
        }

        let frontier: HashSet<Coord> = self.system.frontier().into_iter().collect();
        let counted: HashSet<Coord> = self
            .system
            .counts()
            .iter()
            .flat_map(|count| count.cells.iter().copied())
            .collect();
        // Frontier cells outside every count only appear in the mine total, so
        // they are interchangeable and one of them speaks for all.
        let mut interior: Option<(CellClass, bool)> = None;

        for &at in cells {
            if at.row >= self.system.rows() || at.col >= self.system.cols() {
                return Err(EngineError::MalformedBoard(format!(
                    "cell {at} is outside the {}x{} board",
                    self.system.rows(),
                    self.system.cols()
                )));
            }

            let class = match self.system.pinned(at) {
                Some(true) => CellClass::Mine,
                Some(false) => CellClass::Safe,
                None if !frontier.contains(&at) => CellClass::Undetermined,
                None if counted.contains(&at) => {
                    self.check_cancelled(&result)?;
                    self.query_cell(at, &mut result)?
                }
                None => match interior {
                    Some((class, timed_out)) => {
                        if timed_out {
                            result.timed_out.push(at);
                        }
                        class
                    }
                    None => {
                        self.check_cancelled(&result)?;
                        let timeouts = result.timed_out.len();
                        let class = self.query_cell(at, &mut result)?;
                        interior = Some((class, result.timed_out.len() > timeouts));
                        class
                    }
                },
            };
            result.cells.insert(at, class);
        }

        tracing::debug!(
            cells = result.cells.len(),
            frontier = frontier.len(),
            queries = result.queries,
            timed_out = result.timed_out.len(),
            "classification finished"
        );
        Ok(result)
    }

    fn check_cancelled(&self, result: &Classification) -> EngineResult<()> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(EngineError::Cancelled {
                completed: result.cells.len(),
            });
        }
        Ok(())
    }

    fn query_cell(&mut self, at: Coord, result: &mut Classification) -> EngineResult<CellClass> {
        let Some(can_be_mine) = self.can_hold(Literal::mine(at), result)? else {
            result.timed_out.push(at);
            return Ok(CellClass::Undetermined);
        };
        let Some(can_be_safe) = self.can_hold(Literal::safe(at), result)? else {
            result.timed_out.push(at);
            return Ok(CellClass::Undetermined);
        };

        match (can_be_mine, can_be_safe) {
            (true, false) => Ok(CellClass::Mine),
            (false, true) => Ok(CellClass::Safe),
            (true, true) => Ok(CellClass::Undetermined),
            (false, false) => {
                tracing::warn!(%at, "cell can be neither mine nor safe");
                Err(EngineError::InconsistentBoard(format!(
                    "cell {at} can be neither a mine nor safe"
                )))
            }
        }
    }

    /// `None` when the query ran out of time.
    fn can_hold(
        &mut self,
        literal: Literal,
        result: &mut Classification,
    ) -> EngineResult<Option<bool>> {
        result.queries += 1;
        match self.oracle.check(&[literal]) {
            Ok(verdict) => Ok(Some(verdict.is_satisfiable())),
            Err(EngineError::OracleTimeout { elapsed }) => {
                tracing::warn!(cell = %literal.cell, ?elapsed, "oracle query timed out");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Classifies `cells` against `system`, querying `oracle` only for frontier cells.
pub fn classify<O: Oracle>(
    system: &ConstraintSystem,
    cells: &[Coord],
    oracle: O,
) -> EngineResult<Classification> {
    Classifier::new(system, oracle).classify(cells)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::board::BoardSnapshot;
    use crate::constraints::build;
    use crate::oracle::{VarisatOracle, Witness};

    fn run(text: &str) -> EngineResult<Classification> {
        let board: BoardSnapshot = text.parse().unwrap();
        let system = build(&board)?;
        classify(&system, system.unrevealed(), VarisatOracle::new(&system))
    }

    /// Answers from a fixed script and counts calls.
    struct Scripted {
        calls: usize,
        answer: fn(&[Literal]) -> EngineResult<Verdict>,
    }

    impl Oracle for Scripted {
        fn check(&mut self, assumptions: &[Literal]) -> EngineResult<Verdict> {
            self.calls += 1;
            (self.answer)(assumptions)
        }
    }

    #[test]
    fn test_forced_mine_and_safe() {
        // The corner 1 sees only (0, 1) hidden, so (0, 1) is a mine and the
        // other 1s are already satisfied, clearing the right-hand column.
        let result = run("1#1#\n111#").unwrap();

        assert_eq!(result.get(Coord::new(0, 1)), Some(CellClass::Mine));
        assert_eq!(result.get(Coord::new(0, 3)), Some(CellClass::Safe));
        assert_eq!(result.get(Coord::new(1, 3)), Some(CellClass::Safe));
        // Consistency check plus two queries per frontier cell.
        assert_eq!(result.queries(), 7);
    }

    #[test]
    fn test_shared_mine_is_undetermined() {
        let result = run("1##\n###").unwrap();
        // Three hidden neighbours share one mine.
        for at in [Coord::new(0, 1), Coord::new(1, 0), Coord::new(1, 1)] {
            assert_eq!(result.get(at), Some(CellClass::Undetermined));
        }
        // Not a neighbour of any number.
        assert_eq!(result.get(Coord::new(0, 2)), Some(CellClass::Undetermined));
    }

    #[test]
    fn test_cells_only_in_mine_total_share_one_query() {
        let board: BoardSnapshot = "1##\n###\n###".parse().unwrap();
        let system = build(&board).unwrap().with_total_mines(2);
        let result = classify(&system, system.unrevealed(), VarisatOracle::new(&system)).unwrap();

        assert_eq!(result.undetermined().count(), 8);
        // Consistency check, three counted cells, and one of the five others.
        assert_eq!(result.queries(), 1 + 2 * 3 + 2);
    }

    #[test]
    fn test_zero_constraint_board_needs_no_per_cell_queries() {
        let board: BoardSnapshot = "###\n#F#\n###".parse().unwrap();
        let system = build(&board).unwrap();
        let mut oracle = Scripted {
            calls: 0,
            answer: |_| Ok(Verdict::Unsatisfiable),
        };
        // Only the consistency check reaches the oracle, and it says "no".
        let result = classify(&system, system.unrevealed(), &mut oracle);
        assert!(matches!(result, Err(EngineError::InconsistentBoard(_))));
        assert_eq!(oracle.calls, 1);

        let result = classify(&system, system.unrevealed(), VarisatOracle::new(&system)).unwrap();
        assert_eq!(result.get(Coord::new(1, 1)), Some(CellClass::Mine));
        assert_eq!(result.undetermined().count(), 8);
        assert_eq!(result.queries(), 1);
    }

    #[test]
    fn test_flag_next_to_zero_is_inconsistent() {
        assert!(matches!(
            run("0F#\n###"),
            Err(EngineError::InconsistentBoard(_))
        ));
    }

    #[test]
    fn test_impossible_numbers_are_inconsistent() {
        // The 2 has a single hidden neighbour.
        assert!(matches!(
            run("12\n#1"),
            Err(EngineError::InconsistentBoard(_))
        ));
    }

    #[test]
    fn test_both_queries_unsat_is_inconsistent() {
        let board: BoardSnapshot = "1#".parse().unwrap();
        let system = build(&board).unwrap();
        let oracle = Scripted {
            calls: 0,
            answer: |assumptions| {
                if assumptions.is_empty() {
                    Ok(Verdict::Satisfiable(Witness::new(2, vec![false, true])))
                } else {
                    Ok(Verdict::Unsatisfiable)
                }
            },
        };
        let result = classify(&system, system.unrevealed(), oracle);
        assert!(matches!(result, Err(EngineError::InconsistentBoard(_))));
    }

    #[test]
    fn test_timeout_marks_cell_undetermined() {
        let board: BoardSnapshot = "1#1#\n111#".parse().unwrap();
        let system = build(&board).unwrap();
        let oracle = Scripted {
            calls: 0,
            answer: |_| {
                Err(EngineError::OracleTimeout {
                    elapsed: Duration::from_millis(5),
                })
            },
        };

        let result = classify(&system, system.unrevealed(), oracle).unwrap();
        assert_eq!(result.get(Coord::new(0, 1)), Some(CellClass::Undetermined));
        assert_eq!(
            result.timed_out(),
            &[Coord::new(0, 1), Coord::new(0, 3), Coord::new(1, 3)]
        );
    }

    #[test]
    fn test_cancel_aborts_between_cells() {
        let board: BoardSnapshot = "1#1#\n111#".parse().unwrap();
        let system = build(&board).unwrap();
        let cancel = AtomicBool::new(true);

        let result = Classifier::new(&system, VarisatOracle::new(&system))
            .with_cancel(&cancel)
            .classify(system.unrevealed());
        assert!(matches!(result, Err(EngineError::Cancelled { completed: 0 })));
    }

    #[test]
    fn test_out_of_bounds_cell_is_rejected() {
        let board: BoardSnapshot = "1#".parse().unwrap();
        let system = build(&board).unwrap();
        let result = classify(&system, &[Coord::new(3, 3)], VarisatOracle::new(&system));
        assert!(matches!(result, Err(EngineError::MalformedBoard(_))));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let text = "1#1#\n111#\n####";
        assert_eq!(run(text).unwrap(), run(text).unwrap());
    }
}
