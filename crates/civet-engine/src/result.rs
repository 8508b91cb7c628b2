use std::fmt;

use civet_smt::model::Value;
use civet_smt::terms::Term;
use serde::Serialize;

/// Final verdict of a solve run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SolveResult {
    /// The query relation is reachable; a ground derivation witnesses it.
    Sat,
    /// The query relation is unreachable; an inductive invariant certifies it.
    Unsat,
    /// The run was inconclusive (oracle indecision, cancellation, or an
    /// exhausted budget). Learned lemmas and reachability facts survive for
    /// a resumed solve.
    Unknown { reason: String },
}

impl SolveResult {
    /// Machine-readable verdict class, independent of reasons or witnesses.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            SolveResult::Sat => "sat",
            SolveResult::Unsat => "unsat",
            SolveResult::Unknown { .. } => "unknown",
        }
    }
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveResult::Sat => write!(f, "RESULT: SAT (query reachable)"),
            SolveResult::Unsat => write!(f, "RESULT: UNSAT (query unreachable)"),
            SolveResult::Unknown { reason } => {
                writeln!(f, "RESULT: UNKNOWN")?;
                write!(f, "Reason: {reason}")
            }
        }
    }
}

/// One ground rule instantiation in a reachability witness.
#[derive(Debug, Clone)]
pub struct GroundInstance {
    pub relation: String,
    /// Display name of the rule that fired, when the input named it.
    pub rule: Option<String>,
    pub args: Vec<Value>,
}

impl fmt::Display for GroundInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")?;
        if let Some(rule) = &self.rule {
            write!(f, " [{rule}]")?;
        }
        Ok(())
    }
}

/// Per-relation piece of an inductive invariant.
#[derive(Debug, Clone)]
pub struct RelationInvariant {
    pub relation: String,
    pub formula: Term,
}

/// The inductive invariant extracted at the saturated level on UNSAT.
///
/// For every relation, `formula` over-approximates its reachable states and
/// is closed under every rule; the query relation's formula is
/// unsatisfiable.
#[derive(Debug, Clone)]
pub struct InvariantCertificate {
    pub level: usize,
    pub invariants: Vec<RelationInvariant>,
}

impl fmt::Display for InvariantCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inductive invariant (saturated at level {}):", self.level)?;
        for inv in &self.invariants {
            writeln!(f, "  {}: {}", inv.relation, inv.formula)?;
        }
        Ok(())
    }
}

/// Observability counters for one engine instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Reachability queries issued for proof obligations.
    pub queries: u64,
    /// Search restarts performed.
    pub restarts: u64,
    /// Obligation expansions.
    pub expansions: u64,
    /// Lemmas recorded (new formulas or level raises).
    pub lemmas: u64,
    /// Highest obligation level examined.
    pub max_query_level: usize,
    /// Deepest obligation examined.
    pub max_depth: usize,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queries={} restarts={} expansions={} lemmas={} max_level={} max_depth={}",
            self.queries,
            self.restarts,
            self.expansions,
            self.lemmas,
            self.max_query_level,
            self.max_depth
        )
    }
}
