//! Lemma generalization: an ordered chain of strategies turning the unsat
//! core of a blocked obligation into a stronger learned lemma.

use civet_smt::solver::TheorySolver;
use civet_smt::terms::Term;
use tracing::trace;

use crate::error::EngineError;
use crate::frames::{FrameSet, QueryOutcome};
use crate::obligation::ProofObligation;

/// One generalization strategy.
///
/// A strategy receives the implicated post conjuncts (`core`) of a blocked
/// obligation together with the frame level the refutation supports, and
/// returns a refined pair. Strategies are best-effort: an indecisive oracle
/// re-check skips the refinement rather than surfacing UNKNOWN, and a
/// refinement is only accepted when its re-check supports at least the
/// current level — redundancy is permitted, unsoundness is not.
pub trait Generalizer<S: TheorySolver> {
    fn name(&self) -> &'static str;

    fn generalize(
        &mut self,
        frames: &FrameSet,
        solver: &mut S,
        pob: &ProofObligation,
        core: Vec<Term>,
        level: usize,
    ) -> Result<(Vec<Term>, usize), EngineError>;
}

/// Fixed ordered chain of generalization strategies.
///
/// New strategies are added as new pipeline entries, not new inheritance
/// depth; the engine runs the chain once per blocked obligation.
pub struct GeneralizerPipeline<S: TheorySolver> {
    steps: Vec<Box<dyn Generalizer<S>>>,
}

impl<S: TheorySolver> GeneralizerPipeline<S> {
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The default chain: drop implicated literals, then widen point
    /// equalities into half-spaces.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                Box::new(DropLiterals::default()),
                Box::new(WeakenRanges::default()),
            ],
        }
    }

    pub fn push(&mut self, step: Box<dyn Generalizer<S>>) {
        self.steps.push(step);
    }

    pub fn generalize(
        &mut self,
        frames: &FrameSet,
        solver: &mut S,
        pob: &ProofObligation,
        mut core: Vec<Term>,
        mut level: usize,
    ) -> Result<(Vec<Term>, usize), EngineError> {
        for step in &mut self.steps {
            let (refined_core, refined_level) =
                step.generalize(frames, solver, pob, core, level)?;
            trace!(step = step.name(), level = refined_level, "generalization step");
            core = refined_core;
            level = refined_level;
        }
        Ok((core, level))
    }
}

/// How often an obligation may fail before deep generalization is skipped
/// for it.
const WEAKNESS_CUTOFF: u32 = 4;

/// Deletion-based core shrinking: try dropping each literal in turn and keep
/// it out while the remainder is still blocked at the obligation's level.
#[derive(Debug, Default)]
pub struct DropLiterals;

impl<S: TheorySolver> Generalizer<S> for DropLiterals {
    fn name(&self) -> &'static str {
        "drop-literals"
    }

    fn generalize(
        &mut self,
        frames: &FrameSet,
        solver: &mut S,
        pob: &ProofObligation,
        mut core: Vec<Term>,
        mut level: usize,
    ) -> Result<(Vec<Term>, usize), EngineError> {
        if core.len() <= 1 || pob.weakness() > WEAKNESS_CUTOFF {
            return Ok((core, level));
        }
        let mut i = 0;
        while i < core.len() && core.len() > 1 {
            let mut candidate = core.clone();
            candidate.remove(i);
            let post = Term::and(candidate.clone()).simplify();
            match frames.check_blocked(pob.relation(), pob.level(), &post, solver)? {
                QueryOutcome::Blocked { uses, .. } if uses.insert_level() >= level => {
                    core = candidate;
                    level = uses.insert_level();
                }
                _ => i += 1,
            }
        }
        Ok((core, level))
    }
}

/// Interval widening: replace a point equality `v = c` with the half-space
/// (`v <= c` or `v >= c`) that remains blocked, turning a single bad value
/// into a bad ray. This is what lets point counterexamples converge to
/// inequality invariants.
#[derive(Debug, Default)]
pub struct WeakenRanges;

impl<S: TheorySolver> Generalizer<S> for WeakenRanges {
    fn name(&self) -> &'static str {
        "weaken-ranges"
    }

    fn generalize(
        &mut self,
        frames: &FrameSet,
        solver: &mut S,
        pob: &ProofObligation,
        mut core: Vec<Term>,
        mut level: usize,
    ) -> Result<(Vec<Term>, usize), EngineError> {
        for i in 0..core.len() {
            let Term::Eq(lhs, rhs) = &core[i] else {
                continue;
            };
            let (Term::Var(var), Term::IntLit(c)) = (&**lhs, &**rhs) else {
                continue;
            };
            let widenings = [
                Term::var(var.clone()).le(Term::int(*c)),
                Term::var(var.clone()).ge(Term::int(*c)),
            ];
            for widened in widenings {
                let mut candidate = core.clone();
                candidate[i] = widened.clone();
                let post = Term::and(candidate.clone()).simplify();
                match frames.check_blocked(pob.relation(), pob.level(), &post, solver)? {
                    QueryOutcome::Blocked { uses, .. } if uses.insert_level() >= level => {
                        core = candidate;
                        level = uses.insert_level();
                        break;
                    }
                    _ => {}
                }
            }
        }
        Ok((core, level))
    }
}
