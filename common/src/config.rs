use std::time::Duration;

/// Knobs for one inference request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Budget for a single oracle query. `None` waits for every query.
    pub query_timeout: Option<Duration>,
    /// Total number of mines on the board. When set, the constraint system
    /// also requires exactly this many mines overall.
    pub total_mines: Option<usize>,
}

impl EngineConfig {
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_total_mines(mut self, total_mines: usize) -> Self {
        self.total_mines = Some(total_mines);
        self
    }
}
