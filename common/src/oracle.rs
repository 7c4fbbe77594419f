//! Satisfiability oracle: the narrow interface the classifier queries, and
//! its implementation on top of the `varisat` CDCL solver.

use std::time::{Duration, Instant};

use itertools::Itertools;
use varisat::{CnfFormula, ExtendFormula, Lit, Solver, Var};

use crate::board::Coord;
use crate::constraints::ConstraintSystem;
use crate::error::{EngineError, EngineResult};

/// Constraints with at most this many literals use the direct encoding.
const DIRECT_ENCODING_LIMIT: usize = 10;

/// An assumption about one cell for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub cell: Coord,
    pub is_mine: bool,
}

impl Literal {
    pub fn mine(cell: Coord) -> Self {
        Literal {
            cell,
            is_mine: true,
        }
    }

    pub fn safe(cell: Coord) -> Self {
        Literal {
            cell,
            is_mine: false,
        }
    }
}

/// One satisfying assignment. Not unique; never used to classify on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    cols: usize,
    mines: Vec<bool>,
}

impl Witness {
    /// A witness over a board `cols` wide, from row-major mine flags.
    pub fn new(cols: usize, mines: Vec<bool>) -> Self {
        Witness { cols, mines }
    }

    pub fn is_mine(&self, at: Coord) -> bool {
        self.mines[at.row * self.cols + at.col]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Satisfiable(Witness),
    Unsatisfiable,
}

impl Verdict {
    pub fn is_satisfiable(&self) -> bool {
        matches!(self, Verdict::Satisfiable(_))
    }
}

/// Answers satisfiability of a fixed base system under extra assumptions.
///
/// The verdict must be deterministic for a given base system and assumption
/// set; the witness may differ between calls.
pub trait Oracle {
    fn check(&mut self, assumptions: &[Literal]) -> EngineResult<Verdict>;
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn check(&mut self, assumptions: &[Literal]) -> EngineResult<Verdict> {
        (**self).check(assumptions)
    }
}

/// Incremental oracle backed by `varisat`.
///
/// The base system is encoded once; each query only swaps the assumptions.
pub struct VarisatOracle<'a> {
    solver: Solver<'a>,
    vars: Vec<Var>,
    cols: usize,
    query_timeout: Option<Duration>,
}

impl VarisatOracle<'_> {
    pub fn new(system: &ConstraintSystem) -> Self {
        let mut solver = Solver::new();
        let cols = system.cols();

        // One variable per cell, row-major.
        let vars: Vec<Var> = (0..system.rows() * cols)
            .map(|_| solver.new_var())
            .collect();
        let lit = |at: Coord| Lit::from_var(vars[at.row * cols + at.col], true);

        let mut formula = CnfFormula::new();
        for (at, is_mine) in system.pins() {
            formula.add_clause(&[if is_mine { lit(at) } else { !lit(at) }]);
        }
        for count in system.counts() {
            let lits: Vec<Lit> = count.cells.iter().map(|&at| lit(at)).collect();
            encode_exactly_k(&mut formula, &mut solver, &lits, count.mines, DIRECT_ENCODING_LIMIT);
        }
        if let Some(total) = system.total_mines() {
            // Pinned cells are fixed by unit clauses, so only the free cells
            // need counting, against what the pinned mines leave over.
            let pinned_mines = system.pins().filter(|&(_, is_mine)| is_mine).count();
            let free: Vec<Lit> = system
                .unrevealed()
                .iter()
                .filter(|&&at| system.pinned(at).is_none())
                .map(|&at| lit(at))
                .collect();
            match total.checked_sub(pinned_mines) {
                Some(remaining) => encode_exactly_k(
                    &mut formula,
                    &mut solver,
                    &free,
                    remaining,
                    DIRECT_ENCODING_LIMIT,
                ),
                None => formula.add_clause(&[]),
            }
        }
        solver.add_formula(&formula);

        VarisatOracle {
            solver,
            vars,
            cols,
            query_timeout: None,
        }
    }

    /// Sets the per-query budget.
    ///
    /// varisat cannot interrupt a search, so the budget is checked once the
    /// search returns. A slow query still runs to completion, and its verdict
    /// is then dropped in favour of `OracleTimeout`.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    fn lit(&self, literal: Literal) -> Lit {
        let var = self.vars[literal.cell.row * self.cols + literal.cell.col];
        Lit::from_var(var, literal.is_mine)
    }
}

impl Oracle for VarisatOracle<'_> {
    fn check(&mut self, assumptions: &[Literal]) -> EngineResult<Verdict> {
        let lits: Vec<Lit> = assumptions.iter().map(|&literal| self.lit(literal)).collect();

        let started = Instant::now();
        self.solver.assume(&lits);
        let outcome = self.solver.solve();
        let model = match outcome {
            Ok(true) => self.solver.model(),
            _ => None,
        };
        self.solver.assume(&[]);
        let elapsed = started.elapsed();

        let satisfiable = outcome.map_err(|err| EngineError::Oracle(err.to_string()))?;
        if self.query_timeout.is_some_and(|limit| elapsed > limit) {
            return Err(EngineError::OracleTimeout { elapsed });
        }
        if !satisfiable {
            return Ok(Verdict::Unsatisfiable);
        }

        let model =
            model.ok_or_else(|| EngineError::Oracle("solver returned no model".to_string()))?;
        let mut positive = Vec::new();
        for lit in model {
            let index = lit.var().index();
            if index >= positive.len() {
                positive.resize(index + 1, false);
            }
            positive[index] = lit.is_positive();
        }
        let mines = self
            .vars
            .iter()
            .map(|var| positive.get(var.index()).copied().unwrap_or(false))
            .collect();
        Ok(Verdict::Satisfiable(Witness {
            cols: self.cols,
            mines,
        }))
    }
}

/// Encodes "exactly `k` of `lits` are true".
///
/// Sets of at most `direct_limit` literals get the direct encoding; larger
/// ones get a sequential counter.
fn encode_exactly_k(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    lits: &[Lit],
    k: usize,
    direct_limit: usize,
) {
    let n = lits.len();
    if k > n {
        formula.add_clause(&[]);
    } else if k == 0 || k == n {
        for &lit in lits {
            formula.add_clause(&[if k == 0 { !lit } else { lit }]);
        }
    } else if n <= direct_limit {
        encode_at_most_k(formula, lits, k);
        encode_at_least_k(formula, lits, k);
    } else {
        encode_sequential_counter(formula, solver, lits, k);
    }
}

/// No `k + 1` of `lits` are true together.
fn encode_at_most_k(formula: &mut CnfFormula, lits: &[Lit], k: usize) {
    for combo in lits.iter().copied().combinations(k + 1) {
        let clause: Vec<Lit> = combo.iter().map(|&lit| !lit).collect();
        formula.add_clause(&clause);
    }
}

/// At least `k` true is at most `n - k` false.
fn encode_at_least_k(formula: &mut CnfFormula, lits: &[Lit], k: usize) {
    let negated: Vec<Lit> = lits.iter().map(|&lit| !lit).collect();
    encode_at_most_k(formula, &negated, lits.len() - k);
}

/// Sequential counter for "exactly `k` of `lits`", `0 < k < n`.
///
/// `r[i][j]` holds exactly when at least `j + 1` of `lits[..=i]` are true,
/// for `j` in `0..=k`. Both directions of that equivalence are encoded, so a
/// single counter of width `k + 1` gives the lower and the upper bound.
fn encode_sequential_counter(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    lits: &[Lit],
    k: usize,
) {
    let n = lits.len();
    let r: Vec<Vec<Lit>> = (0..n)
        .map(|_| (0..=k).map(|_| Lit::from_var(solver.new_var(), true)).collect())
        .collect();

    formula.add_clause(&[!lits[0], r[0][0]]);
    formula.add_clause(&[!r[0][0], lits[0]]);
    for j in 1..=k {
        formula.add_clause(&[!r[0][j]]);
    }

    for i in 1..n {
        let (x, prev, cur) = (lits[i], &r[i - 1], &r[i]);

        // r[i][0] <-> prev[0] | x
        formula.add_clause(&[!prev[0], cur[0]]);
        formula.add_clause(&[!x, cur[0]]);
        formula.add_clause(&[!cur[0], prev[0], x]);

        // r[i][j] <-> prev[j] | (x & prev[j - 1])
        for j in 1..=k {
            formula.add_clause(&[!prev[j], cur[j]]);
            formula.add_clause(&[!x, !prev[j - 1], cur[j]]);
            formula.add_clause(&[!cur[j], prev[j], x]);
            formula.add_clause(&[!cur[j], prev[j], prev[j - 1]]);
        }
    }

    formula.add_clause(&[r[n - 1][k - 1]]);
    formula.add_clause(&[!r[n - 1][k]]);
}
