//! The top-level PDR loop: level deepening, frame propagation, frontier
//! draining, lemma learning, restarts and answer extraction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use civet_ir::{ChcSystem, RelationId};
use civet_smt::model::Value;
use civet_smt::project::{ModelProjector, SubstitutionProjector};
use civet_smt::solver::TheorySolver;
use civet_smt::terms::Term;
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::frames::{FrameSet, QueryOutcome, ReachFactId};
use crate::generalize::GeneralizerPipeline;
use crate::obligation::{PobRef, ProofObligation, SearchFrontier};
use crate::result::{
    EngineStats, GroundInstance, InvariantCertificate, RelationInvariant, SolveResult,
};

enum Propagation {
    Continue,
    FixedPoint(usize),
    Unknown(String),
}

enum Drained {
    Sat,
    Exhausted,
    Unknown(String),
}

enum Expansion {
    Progress,
    RootConcrete,
    Unknown(String),
}

/// Decides satisfiability of a validated CHC system.
///
/// The engine owns every frame, fact and obligation; execution is
/// single-threaded and the oracle call blocks it. A solve may be resumed:
/// everything learned by an interrupted run remains valid input to the next
/// [`Engine::solve_from_level`].
pub struct Engine<S: TheorySolver> {
    system: ChcSystem,
    frames: FrameSet,
    frontier: SearchFrontier,
    solver: S,
    projector: Box<dyn ModelProjector>,
    pipeline: GeneralizerPipeline<S>,
    config: EngineConfig,
    stats: EngineStats,
    cancel: Arc<AtomicBool>,
    sat_witness: Option<ReachFactId>,
    inductive_level: Option<usize>,
    restart_budget: u64,
    since_restart: u64,
}

impl<S: TheorySolver> Engine<S> {
    pub fn new(system: ChcSystem, solver: S, config: EngineConfig) -> Self {
        let frames = FrameSet::new(&system);
        let frontier = SearchFrontier::new(config.tie_break);
        Self {
            system,
            frames,
            frontier,
            solver,
            projector: Box::new(SubstitutionProjector),
            pipeline: GeneralizerPipeline::standard(),
            config,
            stats: EngineStats::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            sat_witness: None,
            inductive_level: None,
            restart_budget: u64::MAX,
            since_restart: 0,
        }
    }

    /// Swap in a different model-based projection service.
    pub fn with_projector(mut self, projector: Box<dyn ModelProjector>) -> Self {
        self.projector = projector;
        self
    }

    /// Swap in a different generalizer pipeline.
    pub fn with_pipeline(mut self, pipeline: GeneralizerPipeline<S>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    /// Cooperative cancellation token; setting it makes the engine unwind to
    /// UNKNOWN at the next checkpoint, with all learned content retained.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn solve(&mut self) -> Result<SolveResult, EngineError> {
        self.solve_from_level(0)
    }

    /// Run the PDR loop starting at the given level bound.
    ///
    /// Lemmas and reachability facts from earlier runs are kept and reused;
    /// only the search tree is rebuilt.
    pub fn solve_from_level(&mut self, from_level: usize) -> Result<SolveResult, EngineError> {
        info!(
            query = self.frames.name_of(self.system.query()),
            from_level, "starting solve"
        );
        self.sat_witness = None;
        self.inductive_level = None;
        self.since_restart = 0;
        self.restart_budget = self.config.restart_threshold.unwrap_or(u64::MAX);

        let root = ProofObligation::new(None, self.system.query(), from_level, 0, Term::bool(true));
        self.frontier = SearchFrontier::new(self.config.tie_break);
        self.frontier.set_root(root);

        loop {
            if self.cancelled() {
                return Ok(self.unknown("cancelled"));
            }
            match self.propagate()? {
                Propagation::Unknown(reason) => return Ok(self.unknown(&reason)),
                Propagation::FixedPoint(level) => {
                    self.inductive_level = Some(level);
                    info!(level, stats = %self.stats, "inductive invariant found");
                    return Ok(SolveResult::Unsat);
                }
                Propagation::Continue => {}
            }
            match self.check_reachability()? {
                Drained::Sat => {
                    info!(stats = %self.stats, "query reachable");
                    return Ok(SolveResult::Sat);
                }
                Drained::Unknown(reason) => return Ok(self.unknown(&reason)),
                Drained::Exhausted => {}
            }
            if self.frontier.max_level() >= self.config.max_level {
                return Ok(self.unknown(&format!(
                    "level bound {} reached without an answer",
                    self.config.max_level
                )));
            }
            self.frontier.inc_level();
            debug!(level = self.frontier.max_level(), "deepening level bound");
        }
    }

    /// Ordered ground rule instantiations proving reachability, leaves
    /// first; `None` unless the previous solve answered SAT.
    pub fn get_ground_sat_answer(&mut self) -> Result<Option<Vec<GroundInstance>>, EngineError> {
        let Some(root_fact) = self.sat_witness else {
            return Ok(None);
        };
        let args = self.concretize_fact(root_fact)?;
        let mut out = Vec::new();
        self.emit_ground(root_fact, args, &mut out)?;
        Ok(Some(out))
    }

    /// The inductive invariant at the saturated level; `None` unless the
    /// previous solve answered UNSAT.
    pub fn invariant_certificate(&self) -> Option<InvariantCertificate> {
        let level = self.inductive_level?;
        let invariants = self
            .system
            .relations()
            .map(|(rid, relation)| RelationInvariant {
                relation: relation.name.clone(),
                formula: self.frames.get_formulas(rid, level),
            })
            .collect();
        Some(InvariantCertificate { level, invariants })
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn unknown(&self, reason: &str) -> SolveResult {
        SolveResult::Unknown {
            reason: format!("{reason}; learned lemmas and facts are retained for resumption"),
        }
    }

    /// Push every lemma one level forward where it remains valid. A level
    /// strictly below the bound left with no lemma at all — while the query
    /// relation is excluded there — witnesses the fixed point.
    fn propagate(&mut self) -> Result<Propagation, EngineError> {
        let relation_ids: Vec<RelationId> = self.system.relations().map(|(rid, _)| rid).collect();
        let max = self.frontier.max_level();
        for level in 0..max {
            let mut saturated = true;
            for &rid in &relation_ids {
                match self
                    .frames
                    .propagate_to_next_level(rid, level, &mut self.solver)?
                {
                    crate::frames::PropagationStatus::Unknown(reason) => {
                        return Ok(Propagation::Unknown(reason));
                    }
                    crate::frames::PropagationStatus::Done => {}
                }
                if self.frames.lemma_count_at(rid, level) > 0 {
                    saturated = false;
                }
            }
            if saturated && self.frames.excluded_at(self.system.query(), level) {
                for &rid in &relation_ids {
                    self.frames.propagate_to_infinity(rid, level);
                }
                return Ok(Propagation::FixedPoint(level));
            }
        }
        Ok(Propagation::Continue)
    }

    /// Drain the frontier at the current bound.
    fn check_reachability(&mut self) -> Result<Drained, EngineError> {
        while let Some(pob) = self.frontier.pop() {
            if self.cancelled() {
                return Ok(Drained::Unknown("cancelled".to_string()));
            }
            if self.stats.expansions >= self.config.max_expansions {
                return Ok(Drained::Unknown(format!(
                    "expansion budget of {} exhausted",
                    self.config.max_expansions
                )));
            }
            if self.since_restart >= self.restart_budget {
                self.stats.restarts += 1;
                self.since_restart = 0;
                self.restart_budget = self.restart_budget.saturating_mul(2);
                debug!(
                    restarts = self.stats.restarts,
                    next_budget = self.restart_budget,
                    "restarting the search"
                );
                self.frontier.restart();
                continue;
            }
            match self.expand_node(&pob)? {
                Expansion::RootConcrete => return Ok(Drained::Sat),
                Expansion::Unknown(reason) => return Ok(Drained::Unknown(reason)),
                Expansion::Progress => {}
            }
        }
        Ok(Drained::Exhausted)
    }

    /// Expand one obligation: learn a lemma and close it, or unroll it one
    /// rule deeper under the model's guidance.
    fn expand_node(&mut self, pob: &PobRef) -> Result<Expansion, EngineError> {
        self.stats.expansions += 1;
        self.since_restart += 1;
        self.stats.queries += 1;
        self.stats.max_query_level = self.stats.max_query_level.max(pob.level());
        self.stats.max_depth = self.stats.max_depth.max(pob.depth());
        trace!(
            relation = self.frames.name_of(pob.relation()),
            level = pob.level(),
            depth = pob.depth(),
            "expanding obligation"
        );

        match self.frames.is_reachable(pob, &mut self.solver)? {
            QueryOutcome::Unknown { reason } => Ok(Expansion::Unknown(reason)),
            QueryOutcome::Blocked { core, uses } => {
                let seed_level = uses.insert_level();
                let (core, level) = self.pipeline.generalize(
                    &self.frames,
                    &mut self.solver,
                    pob,
                    core,
                    seed_level,
                )?;
                let lemma = Term::and(core).not().simplify();
                if self.frames.add_lemma(pob.relation(), lemma, level) {
                    self.stats.lemmas += 1;
                }
                pob.close();
                if !self.frontier.is_root(pob) {
                    if let Some(parent) = pob.parent() {
                        if !parent.is_closed() {
                            parent.bump_weakness();
                            self.frontier.push(&parent);
                        }
                    }
                }
                Ok(Expansion::Progress)
            }
            QueryOutcome::Reachable { model, rule } => {
                let mut derivation =
                    self.frames
                        .build_derivation(pob.relation(), rule, pob.level(), &model);
                match derivation.create_first_child(&model, self.projector.as_ref()) {
                    None => {
                        let justification = derivation.must_fact_ids();
                        let fact = self.frames.mk_reach_fact(
                            pob.relation(),
                            rule,
                            &model,
                            self.projector.as_ref(),
                            justification,
                        );
                        let fact_id = self.frames.add_reach_fact(pob.relation(), fact);
                        Ok(self.close_with_fact(pob, fact_id))
                    }
                    Some(spec) => {
                        pob.set_derivation(derivation);
                        let child = self.reuse_or_spawn(pob, spec.relation, spec.post);
                        self.frontier.push(&child);
                        Ok(Expansion::Progress)
                    }
                }
            }
        }
    }

    /// Close an obligation on a concrete witness and propagate the closure
    /// toward the root: the parent's derivation advances past the premise
    /// this child discharged, or the parent is re-examined afresh.
    fn close_with_fact(&mut self, pob: &PobRef, fact_id: ReachFactId) -> Expansion {
        pob.close();
        if self.frontier.is_root(pob) {
            self.sat_witness = Some(fact_id);
            return Expansion::RootConcrete;
        }
        let Some(parent) = pob.parent() else {
            return Expansion::Progress;
        };
        if parent.is_closed() {
            return Expansion::Progress;
        }

        let fact_formula = self.frames.fact(fact_id).formula().clone();
        let next = {
            let mut derivation = parent.derivation_mut();
            match derivation.as_mut() {
                Some(d) => {
                    d.discharge_active(fact_id, &fact_formula);
                    d.create_next_child(self.projector.as_ref())
                }
                None => None,
            }
        };
        match next {
            Some(spec) => {
                let child = self.reuse_or_spawn(&parent, spec.relation, spec.post);
                self.frontier.push(&child);
            }
            // The rule is out of may premises; stale models are never used
            // to fabricate a witness, so the parent is examined afresh.
            None => self.frontier.push(&parent),
        }
        Expansion::Progress
    }

    /// Reuse an existing open child node for the same question when one is
    /// still alive, scheduling the replacement post lazily; otherwise spawn
    /// a fresh node one level below the parent.
    fn reuse_or_spawn(&mut self, parent: &PobRef, relation: RelationId, post: Term) -> PobRef {
        let level = parent.level().saturating_sub(1);
        let depth = parent.depth() + 1;
        for child in parent.live_children() {
            if !child.is_closed() && child.relation() == relation && child.level() == level {
                child.new_post(post);
                return child;
            }
        }
        ProofObligation::new(Some(parent), relation, level, depth, post)
    }

    /// Pick concrete argument values satisfying a fact's formula.
    fn concretize_fact(&mut self, fact_id: ReachFactId) -> Result<Vec<Value>, EngineError> {
        let fact = self.frames.fact(fact_id);
        let formula = fact.formula().clone();
        let relation = fact_id.relation;
        let aux: Vec<(String, civet_smt::sorts::Sort)> = fact.aux_vars().to_vec();
        let head_vars: Vec<(String, civet_smt::sorts::Sort)> =
            self.frames.frame(relation).head_vars().to_vec();

        self.solver
            .reset()
            .map_err(|e| EngineError::Solver(e.to_string()))?;
        for (name, sort) in head_vars.iter().chain(aux.iter()) {
            self.solver
                .declare_var(name, sort)
                .map_err(|e| EngineError::Solver(e.to_string()))?;
        }
        self.solver
            .assert(&formula)
            .map_err(|e| EngineError::Solver(e.to_string()))?;
        let model_vars: Vec<(&str, &civet_smt::sorts::Sort)> = head_vars
            .iter()
            .map(|(name, sort)| (name.as_str(), sort))
            .collect();
        match self
            .solver
            .check(&[], &model_vars)
            .map_err(|e| EngineError::Solver(e.to_string()))?
        {
            civet_smt::solver::CheckResult::Sat(model) => head_vars
                .iter()
                .map(|(name, _)| {
                    model.get(name).ok_or_else(|| {
                        EngineError::Solver(format!("witness model misses `{name}`"))
                    })
                })
                .collect(),
            _ => Err(EngineError::Solver(
                "failed to concretize a reachability fact".to_string(),
            )),
        }
    }

    /// Emit the ground derivation rooted at `fact_id` with the head fixed to
    /// `args`, children before parents.
    fn emit_ground(
        &mut self,
        fact_id: ReachFactId,
        args: Vec<Value>,
        out: &mut Vec<GroundInstance>,
    ) -> Result<(), EngineError> {
        let fact = self.frames.fact(fact_id);
        let rule_id = fact.rule();
        let justification = fact.justifications().to_vec();
        let relation_name = self.frames.name_of(fact_id.relation).to_string();
        let rule_name = self.system.rule(rule_id).name.clone();

        if !justification.is_empty() {
            let origins = self
                .frames
                .ground_step(fact_id.relation, rule_id, &args, &justification, &mut self.solver)?
                .ok_or_else(|| {
                    EngineError::Solver("failed to replay a ground derivation step".to_string())
                })?;
            for (child_fact, child_args) in justification.into_iter().zip(origins) {
                self.emit_ground(child_fact, child_args, out)?;
            }
        }

        out.push(GroundInstance {
            relation: relation_name,
            rule: rule_name,
            args,
        });
        Ok(())
    }
}
