/// Engine tuning knobs.
///
/// The defaults are meant to be left alone; tests and benchmarks tighten the
/// budgets to exercise the resource-exhaustion paths deterministically.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Give-up bound on frame levels; exceeding it yields UNKNOWN with all
    /// learned lemmas retained for a resumed solve.
    pub max_level: usize,
    /// Budget on obligation expansions across the whole solve.
    pub max_expansions: u64,
    /// Expansions between search restarts; `None` disables restarting.
    /// The effective threshold doubles after each restart.
    pub restart_threshold: Option<u64>,
    /// Residual ordering of equal-priority obligations.
    pub tie_break: TieBreak,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_level: 64,
            max_expansions: 1_000_000,
            restart_threshold: Some(256),
            tie_break: TieBreak::InsertionOrder,
        }
    }
}

/// Residual tie-break between obligations of equal level and depth.
///
/// Both policies are deterministic; the verdict must not depend on the
/// choice, and the test suite runs the same problems under each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First-in, first-out among equals.
    #[default]
    InsertionOrder,
    /// Last-in, first-out among equals.
    ReverseInsertion,
}
