//! Per-relation leveled frames: lemmas, reachability facts, and the
//! oracle-backed reachability queries that drive the search.

use std::collections::{HashMap, HashSet};

use civet_ir::{ChcSystem, RelationId, RuleId};
use civet_smt::model::{evaluate_bool, Model, Value};
use civet_smt::project::ModelProjector;
use civet_smt::solver::{CheckResult, TheorySolver};
use civet_smt::sorts::Sort;
use civet_smt::terms::Term;
use tracing::debug;

use crate::derivation::Derivation;
use crate::error::EngineError;
use crate::obligation::ProofObligation;

/// Sentinel level of a permanently-valid invariant lemma.
pub const INFINITE_LEVEL: usize = usize::MAX;

/// Canonical name of head variable `j` of a relation.
///
/// Lemmas, reachability facts and obligation post-conditions are all
/// expressed over these names; queries rename them per body occurrence.
pub fn head_var(relation: RelationId, j: usize) -> String {
    format!("p{}_v{}", relation.index(), j)
}

fn sel_var(relation: RelationId, k: usize) -> String {
    format!("p{}_sel{}", relation.index(), k)
}

fn local_var(relation: RelationId, k: usize, i: usize) -> String {
    format!("p{}_r{}_x{}", relation.index(), k, i)
}

fn origin_var(relation: RelationId, k: usize, occ: usize, j: usize) -> String {
    format!("p{}_r{}_o{}_v{}", relation.index(), k, occ, j)
}

fn frame_asm(relation: RelationId, k: usize, occ: usize, level: usize) -> String {
    format!("asm_p{}_r{}_o{}_l{}", relation.index(), k, occ, level)
}

fn value_term(value: Value) -> Term {
    match value {
        Value::Int(n) => Term::IntLit(n),
        Value::Bool(b) => Term::BoolLit(b),
    }
}

/// Identifier of a reachability fact: per-relation arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReachFactId {
    pub relation: RelationId,
    pub index: usize,
}

/// A formula proven to contain the relation's reachable states at every
/// frame up to its level.
///
/// Levels only ever increase; [`INFINITE_LEVEL`] marks an invariant. Ground
/// lemmas have empty bindings; a quantified lemma carries its bindings here
/// and is skipped by the query builder.
#[derive(Debug, Clone)]
pub struct Lemma {
    formula: Term,
    level: usize,
    bindings: Vec<(String, Sort)>,
}

impl Lemma {
    fn new(formula: Term, level: usize) -> Self {
        Self {
            formula,
            level,
            bindings: Vec::new(),
        }
    }

    pub fn formula(&self) -> &Term {
        &self.formula
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn bindings(&self) -> &[(String, Sort)] {
        &self.bindings
    }

    pub fn is_ground(&self) -> bool {
        self.bindings.is_empty()
    }

    fn raise_level(&mut self, level: usize) {
        debug_assert!(level >= self.level, "lemma levels never decrease");
        self.level = level;
    }
}

/// A formula witnessing concretely reachable states of a relation.
///
/// Justifications cite facts created earlier (for the rule's body atoms in
/// origin order), so the reference graph is acyclic by construction.
/// Residual `aux_vars` are implicitly existential.
#[derive(Debug, Clone)]
pub struct ReachFact {
    formula: Term,
    rule: RuleId,
    justification: Vec<ReachFactId>,
    aux_vars: Vec<(String, Sort)>,
    init: bool,
}

impl ReachFact {
    pub fn formula(&self) -> &Term {
        &self.formula
    }

    pub fn rule(&self) -> RuleId {
        self.rule
    }

    pub fn justifications(&self) -> &[ReachFactId] {
        &self.justification
    }

    pub fn aux_vars(&self) -> &[(String, Sort)] {
        &self.aux_vars
    }

    pub fn is_init(&self) -> bool {
        self.init
    }
}

/// One body occurrence inside a rule's transition encoding.
#[derive(Debug, Clone)]
struct OriginAtom {
    relation: RelationId,
    vars: Vec<(String, Sort)>,
}

/// Pre-computed encoding of one defining rule.
///
/// The transition binds the head variables and each occurrence's origin
/// variables to the rule's argument terms, conjoined with the rule's
/// constraint; a fresh boolean selector tags the disjunct so the oracle can
/// report which rule fired.
#[derive(Debug, Clone)]
struct RuleInfo {
    rule: RuleId,
    selector: String,
    transition: Term,
    origins: Vec<OriginAtom>,
    locals: Vec<(String, Sort)>,
    is_init: bool,
}

/// State of one relation: its rule encodings, leveled lemmas and
/// reachability facts.
#[derive(Debug)]
pub struct RelationFrame {
    relation: RelationId,
    name: String,
    head_vars: Vec<(String, Sort)>,
    rules: Vec<RuleInfo>,
    lemmas: Vec<Lemma>,
    facts: Vec<ReachFact>,
}

impl RelationFrame {
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head_vars(&self) -> &[(String, Sort)] {
        &self.head_vars
    }

    pub fn lemmas(&self) -> &[Lemma] {
        &self.lemmas
    }

    pub fn facts(&self) -> &[ReachFact] {
        &self.facts
    }
}

/// Outcome of a reachability query.
#[derive(Debug)]
pub enum QueryOutcome {
    /// Satisfiable: the model realizes the post through the given rule.
    Reachable { model: Model, rule: RuleId },
    /// Unsatisfiable: `core` is the implicated subset of post conjuncts and
    /// `uses` the lowest frame level the refutation leaned on.
    Blocked { core: Vec<Term>, uses: CoreLevel },
    /// The oracle was indecisive; the search halts on this branch.
    Unknown { reason: String },
}

/// Lowest frame level implicated by a refutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreLevel {
    /// Only the level-0 restriction to initial rules was involved.
    Boundary,
    /// The smallest frame level whose assumption appears in the core.
    Frame(usize),
    /// No frame assumption was involved: the blocking holds at every level.
    Unbounded,
}

impl CoreLevel {
    /// Frame level at which the learned lemma may be inserted.
    pub fn insert_level(&self) -> usize {
        match self {
            CoreLevel::Boundary => 0,
            CoreLevel::Frame(level) => level.saturating_add(1),
            CoreLevel::Unbounded => INFINITE_LEVEL,
        }
    }
}

/// All relation frames of one engine instance.
#[derive(Debug)]
pub struct FrameSet {
    frames: Vec<RelationFrame>,
    rule_pos: HashMap<RuleId, (usize, usize)>,
}

impl FrameSet {
    /// Build the frames for a validated system and seed the initial
    /// reachability facts from its initial rules.
    pub fn new(system: &ChcSystem) -> Self {
        let mut frames = Vec::with_capacity(system.num_relations());
        let mut rule_pos = HashMap::new();

        for (rid, relation) in system.relations() {
            let head_vars: Vec<(String, Sort)> = relation
                .signature
                .iter()
                .enumerate()
                .map(|(j, sort)| (head_var(rid, j), *sort))
                .collect();

            let mut infos = Vec::with_capacity(relation.rules.len());
            for (k, rule_id) in relation.rules.iter().enumerate() {
                rule_pos.insert(*rule_id, (rid.index(), k));
                infos.push(Self::build_rule_info(system, rid, k, *rule_id, &head_vars));
            }

            frames.push(RelationFrame {
                relation: rid,
                name: relation.name.clone(),
                head_vars,
                rules: infos,
                lemmas: Vec::new(),
                facts: Vec::new(),
            });
        }

        let mut set = Self { frames, rule_pos };
        set.seed_init_facts();
        set
    }

    fn build_rule_info(
        system: &ChcSystem,
        rid: RelationId,
        k: usize,
        rule_id: RuleId,
        head_vars: &[(String, Sort)],
    ) -> RuleInfo {
        let rule = system.rule(rule_id);

        let rename: HashMap<String, String> = rule
            .vars
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), local_var(rid, k, i)))
            .collect();
        let locals: Vec<(String, Sort)> = rule
            .vars
            .iter()
            .enumerate()
            .map(|(i, (_, sort))| (local_var(rid, k, i), *sort))
            .collect();

        let mut conjuncts = Vec::new();
        for (j, arg) in rule.head_args.iter().enumerate() {
            conjuncts.push(Term::var(head_vars[j].0.clone()).eq(arg.rename(&rename)));
        }

        let mut origins = Vec::with_capacity(rule.body.len());
        for (occ, atom) in rule.body.iter().enumerate() {
            let signature = &system.relation(atom.relation).signature;
            let vars: Vec<(String, Sort)> = signature
                .iter()
                .enumerate()
                .map(|(j, sort)| (origin_var(rid, k, occ, j), *sort))
                .collect();
            for (j, arg) in atom.args.iter().enumerate() {
                conjuncts.push(Term::var(vars[j].0.clone()).eq(arg.rename(&rename)));
            }
            origins.push(OriginAtom {
                relation: atom.relation,
                vars,
            });
        }
        conjuncts.push(rule.constraint.rename(&rename));

        RuleInfo {
            rule: rule_id,
            selector: sel_var(rid, k),
            transition: Term::and(conjuncts).simplify(),
            origins,
            locals,
            is_init: rule.is_init(),
        }
    }

    /// Every initial rule contributes a reachability fact up front; its
    /// locals are eliminated by equality solving where possible and kept as
    /// existential aux variables otherwise.
    fn seed_init_facts(&mut self) {
        for frame in &mut self.frames {
            for info in &frame.rules {
                if !info.is_init {
                    continue;
                }
                let (formula, aux_vars) =
                    eliminate_by_equalities(info.transition.conjuncts(), &info.locals);
                frame.facts.push(ReachFact {
                    formula,
                    rule: info.rule,
                    justification: Vec::new(),
                    aux_vars,
                    init: true,
                });
            }
        }
    }

    pub fn frame(&self, rid: RelationId) -> &RelationFrame {
        &self.frames[rid.index()]
    }

    pub fn frames(&self) -> &[RelationFrame] {
        &self.frames
    }

    pub fn name_of(&self, rid: RelationId) -> &str {
        &self.frames[rid.index()].name
    }

    pub fn fact(&self, id: ReachFactId) -> &ReachFact {
        &self.frames[id.relation.index()].facts[id.index]
    }

    pub fn add_reach_fact(&mut self, rid: RelationId, fact: ReachFact) -> ReachFactId {
        let frame = &mut self.frames[rid.index()];
        debug!(relation = %frame.name, fact = %fact.formula, "recording reachability fact");
        frame.facts.push(fact);
        ReachFactId {
            relation: rid,
            index: frame.facts.len() - 1,
        }
    }

    /// Record a lemma unless a syntactically identical one already covers
    /// the level; an identical lemma below the level is raised instead.
    /// Returns whether anything was recorded.
    pub fn add_lemma(&mut self, rid: RelationId, formula: Term, level: usize) -> bool {
        let frame = &mut self.frames[rid.index()];
        if let Some(existing) = frame.lemmas.iter_mut().find(|l| l.formula == formula) {
            if existing.level >= level {
                return false;
            }
            existing.raise_level(level);
            return true;
        }
        debug!(relation = %frame.name, lemma = %formula, level, "learning lemma");
        frame.lemmas.push(Lemma::new(formula, level));
        true
    }

    /// Conjunction of all ground lemmas valid at `level` — the current
    /// over-approximation of the relation's states reachable within `level`
    /// unrollings.
    pub fn get_formulas(&self, rid: RelationId, level: usize) -> Term {
        let frame = &self.frames[rid.index()];
        let parts: Vec<Term> = frame
            .lemmas
            .iter()
            .filter(|l| l.is_ground() && l.level >= level)
            .map(|l| l.formula.clone())
            .collect();
        Term::and(parts).simplify()
    }

    pub fn lemma_count_at(&self, rid: RelationId, level: usize) -> usize {
        self.frames[rid.index()]
            .lemmas
            .iter()
            .filter(|l| l.level == level)
            .count()
    }

    /// True when the relation carries a `false` lemma at or above `level`,
    /// i.e. the frame at `level` excludes it entirely.
    pub fn excluded_at(&self, rid: RelationId, level: usize) -> bool {
        self.frames[rid.index()]
            .lemmas
            .iter()
            .any(|l| l.level >= level && l.formula == Term::BoolLit(false))
    }

    /// Answer the obligation's reachability question against the oracle.
    pub fn is_reachable<S: TheorySolver>(
        &self,
        pob: &ProofObligation,
        solver: &mut S,
    ) -> Result<QueryOutcome, EngineError> {
        self.check_blocked(pob.relation(), pob.level(), &pob.post(), solver)
    }

    /// Direct form of the reachability query, used by obligation expansion,
    /// lemma propagation and the generalizer pipeline alike: can `post` be
    /// realized for `rid` within `level` unrollings, with every body atom
    /// constrained by its frame at `level - 1`?
    pub fn check_blocked<S: TheorySolver>(
        &self,
        rid: RelationId,
        level: usize,
        post: &Term,
        solver: &mut S,
    ) -> Result<QueryOutcome, EngineError> {
        let frame = &self.frames[rid.index()];
        let enabled: Vec<usize> = frame
            .rules
            .iter()
            .enumerate()
            .filter(|(_, info)| level > 0 || info.is_init)
            .map(|(k, _)| k)
            .collect();
        let excluded_non_init = level == 0 && frame.rules.iter().any(|info| !info.is_init);

        if enabled.is_empty() {
            let uses = if excluded_non_init {
                CoreLevel::Boundary
            } else {
                CoreLevel::Unbounded
            };
            return Ok(QueryOutcome::Blocked { core: vec![], uses });
        }

        solver.reset().map_err(|e| EngineError::Solver(e.to_string()))?;
        let mut declared: Vec<(String, Sort)> = Vec::new();
        let mut declare =
            |solver: &mut S, declared: &mut Vec<(String, Sort)>, name: &str, sort: Sort| {
                declared.push((name.to_string(), sort));
                solver
                    .declare_var(name, &sort)
                    .map_err(|e| EngineError::Solver(e.to_string()))
            };

        for (name, sort) in &frame.head_vars {
            declare(solver, &mut declared, name, *sort)?;
        }

        let mut frame_lits: Vec<(String, usize)> = Vec::new();
        let mut selectors = Vec::with_capacity(enabled.len());

        for &k in &enabled {
            let info = &frame.rules[k];
            declare(solver, &mut declared, &info.selector, Sort::Bool)?;
            selectors.push(Term::var(info.selector.clone()));
            for (name, sort) in &info.locals {
                declare(solver, &mut declared, name, *sort)?;
            }
            for origin in &info.origins {
                for (name, sort) in &origin.vars {
                    declare(solver, &mut declared, name, *sort)?;
                }
            }
            solver
                .assert(&Term::var(info.selector.clone()).implies(info.transition.clone()))
                .map_err(|e| EngineError::Solver(e.to_string()))?;

            if level > 0 {
                let body_level = level - 1;
                for (occ, origin) in info.origins.iter().enumerate() {
                    let target = &self.frames[origin.relation.index()];
                    let rename: HashMap<String, String> = target
                        .head_vars
                        .iter()
                        .zip(&origin.vars)
                        .map(|((from, _), (to, _))| (from.clone(), to.clone()))
                        .collect();

                    let mut levels: Vec<usize> = target
                        .lemmas
                        .iter()
                        .filter(|l| l.is_ground())
                        .map(Lemma::level)
                        .filter(|v| *v >= body_level && *v != INFINITE_LEVEL)
                        .collect();
                    levels.sort_unstable();
                    levels.dedup();

                    for lemma in &target.lemmas {
                        if !lemma.is_ground() || lemma.level != INFINITE_LEVEL {
                            continue;
                        }
                        let guarded = Term::var(info.selector.clone())
                            .implies(lemma.formula.rename(&rename));
                        solver
                            .assert(&guarded)
                            .map_err(|e| EngineError::Solver(e.to_string()))?;
                    }

                    for v in levels {
                        let asm = frame_asm(rid, k, occ, v);
                        declare(solver, &mut declared, &asm, Sort::Bool)?;
                        frame_lits.push((asm.clone(), v));
                        for lemma in &target.lemmas {
                            if !lemma.is_ground() || lemma.level != v {
                                continue;
                            }
                            let guarded = Term::var(asm.clone()).implies(
                                Term::var(info.selector.clone())
                                    .implies(lemma.formula.rename(&rename)),
                            );
                            solver
                                .assert(&guarded)
                                .map_err(|e| EngineError::Solver(e.to_string()))?;
                        }
                    }
                }
            }
        }

        solver
            .assert(&Term::or(selectors))
            .map_err(|e| EngineError::Solver(e.to_string()))?;

        let mut post_lits: Vec<(String, Term)> = Vec::new();
        for (i, conjunct) in post.conjuncts().into_iter().enumerate() {
            let name = format!("post_{i}");
            declare(solver, &mut declared, &name, Sort::Bool)?;
            solver
                .assert(&Term::var(name.clone()).implies(conjunct.clone()))
                .map_err(|e| EngineError::Solver(e.to_string()))?;
            post_lits.push((name, conjunct));
        }

        let assumptions: Vec<String> = frame_lits
            .iter()
            .map(|(name, _)| name.clone())
            .chain(post_lits.iter().map(|(name, _)| name.clone()))
            .collect();
        let model_vars: Vec<(&str, &Sort)> = declared
            .iter()
            .map(|(name, sort)| (name.as_str(), sort))
            .collect();

        match solver
            .check(&assumptions, &model_vars)
            .map_err(|e| EngineError::Solver(e.to_string()))?
        {
            CheckResult::Unknown(reason) => Ok(QueryOutcome::Unknown { reason }),
            CheckResult::Sat(model) => {
                for &k in &enabled {
                    let info = &frame.rules[k];
                    if model.get_bool(&info.selector) == Some(true) {
                        return Ok(QueryOutcome::Reachable {
                            model,
                            rule: info.rule,
                        });
                    }
                }
                Ok(QueryOutcome::Unknown {
                    reason: "model assigns no rule selector".to_string(),
                })
            }
            CheckResult::Unsat(core) => {
                let core_set: HashSet<&str> = core.iter().map(String::as_str).collect();
                let min_frame = frame_lits
                    .iter()
                    .filter(|(name, _)| core_set.contains(name.as_str()))
                    .map(|(_, v)| *v)
                    .min();
                let uses = match min_frame {
                    Some(v) => CoreLevel::Frame(v),
                    None if excluded_non_init => CoreLevel::Boundary,
                    None => CoreLevel::Unbounded,
                };
                let core_terms: Vec<Term> = post_lits
                    .into_iter()
                    .filter(|(name, _)| core_set.contains(name.as_str()))
                    .map(|(_, term)| term)
                    .collect();
                Ok(QueryOutcome::Blocked {
                    core: core_terms,
                    uses,
                })
            }
        }
    }

    /// Re-check every lemma sitting at exactly `level` for validity one
    /// level up (by asking whether its negation is reachable there); valid
    /// lemmas move up, and a refutation that leaned on no finite frame moves
    /// its lemma straight to the infinite level.
    pub fn propagate_to_next_level<S: TheorySolver>(
        &mut self,
        rid: RelationId,
        level: usize,
        solver: &mut S,
    ) -> Result<PropagationStatus, EngineError> {
        let candidates: Vec<(usize, Term)> = self.frames[rid.index()]
            .lemmas
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_ground() && l.level == level)
            .map(|(idx, l)| (idx, l.formula.clone()))
            .collect();

        let mut raised = Vec::new();
        for (idx, formula) in candidates {
            let post = formula.not().simplify();
            match self.check_blocked(rid, level + 1, &post, solver)? {
                QueryOutcome::Blocked { uses, .. } => {
                    let target = uses.insert_level().max(level + 1);
                    raised.push((idx, target));
                }
                QueryOutcome::Reachable { .. } => {}
                QueryOutcome::Unknown { reason } => {
                    return Ok(PropagationStatus::Unknown(reason));
                }
            }
        }
        for (idx, target) in raised {
            self.frames[rid.index()].lemmas[idx].raise_level(target);
        }
        Ok(PropagationStatus::Done)
    }

    /// Promote every lemma at or above `level` to the infinite level; used
    /// once a frame is known inductive.
    pub fn propagate_to_infinity(&mut self, rid: RelationId, level: usize) {
        for lemma in &mut self.frames[rid.index()].lemmas {
            if lemma.level >= level && lemma.level != INFINITE_LEVEL {
                lemma.raise_level(INFINITE_LEVEL);
            }
        }
    }

    /// Build the derivation for a rule reported by a satisfiable query:
    /// per body atom, a must summary where an existing reachability fact is
    /// satisfied under the model, otherwise a may summary from the atom's
    /// frame at `level - 1`.
    pub fn build_derivation(
        &self,
        rid: RelationId,
        rule: RuleId,
        level: usize,
        model: &Model,
    ) -> Derivation {
        let (_ridx, k) = self.rule_pos[&rule];
        debug_assert_eq!(_ridx, rid.index());
        let info = &self.frames[rid.index()].rules[k];

        let mut derivation = Derivation::new(rule, info.transition.clone());
        for (occ, origin) in info.origins.iter().enumerate() {
            let target = &self.frames[origin.relation.index()];
            let rename: HashMap<String, String> = target
                .head_vars
                .iter()
                .zip(&origin.vars)
                .map(|((from, _), (to, _))| (from.clone(), to.clone()))
                .collect();

            let mut must: Option<(ReachFactId, Term)> = None;
            for (index, fact) in target.facts.iter().enumerate() {
                let renamed = fact.formula.rename(&rename);
                // A fact with residual aux variables fails evaluation and is
                // simply not usable as a witness under this model.
                if evaluate_bool(&renamed, model) == Ok(true) {
                    must = Some((
                        ReachFactId {
                            relation: origin.relation,
                            index,
                        },
                        renamed,
                    ));
                    break;
                }
            }

            match must {
                Some((fact, summary)) => derivation.add_premise(
                    origin.relation,
                    occ,
                    origin.vars.clone(),
                    summary,
                    true,
                    Vec::new(),
                    Some(fact),
                ),
                None => {
                    let frame_formula =
                        self.get_formulas(origin.relation, level.saturating_sub(1));
                    derivation.add_premise(
                        origin.relation,
                        occ,
                        origin.vars.clone(),
                        frame_formula.rename(&rename),
                        false,
                        Vec::new(),
                        None,
                    );
                }
            }
        }
        derivation
    }

    /// Synthesize the reachability fact for a concretely-witnessed
    /// obligation: the rule's transition projected onto the head variables
    /// under the model.
    pub fn mk_reach_fact(
        &self,
        rid: RelationId,
        rule: RuleId,
        model: &Model,
        projector: &dyn ModelProjector,
        justification: Vec<ReachFactId>,
    ) -> ReachFact {
        let (_ridx, k) = self.rule_pos[&rule];
        debug_assert_eq!(_ridx, rid.index());
        let frame = &self.frames[rid.index()];
        let info = &frame.rules[k];

        let keep: Vec<String> = frame.head_vars.iter().map(|(n, _)| n.clone()).collect();
        let formula = projector.project(model, &keep, &info.transition);

        let mut sorts: HashMap<&str, Sort> = HashMap::new();
        for (name, sort) in info.locals.iter().chain(
            info.origins
                .iter()
                .flat_map(|origin| origin.vars.iter()),
        ) {
            sorts.insert(name.as_str(), *sort);
        }
        let aux_vars: Vec<(String, Sort)> = formula
            .free_vars()
            .into_iter()
            .filter(|name| !keep.contains(name))
            .filter_map(|name| sorts.get(name.as_str()).map(|sort| (name, *sort)))
            .collect();

        ReachFact {
            formula,
            rule,
            justification,
            aux_vars,
            init: false,
        }
    }

    /// Concretize one derivation step of a ground witness: with the head
    /// fixed to `head_values` and each body occurrence constrained by its
    /// justification fact, return the origin values chosen by the oracle.
    pub fn ground_step<S: TheorySolver>(
        &self,
        rid: RelationId,
        rule: RuleId,
        head_values: &[Value],
        justification: &[ReachFactId],
        solver: &mut S,
    ) -> Result<Option<Vec<Vec<Value>>>, EngineError> {
        let (_ridx, k) = self.rule_pos[&rule];
        debug_assert_eq!(_ridx, rid.index());
        let frame = &self.frames[rid.index()];
        let info = &frame.rules[k];

        solver.reset().map_err(|e| EngineError::Solver(e.to_string()))?;
        let mut declared: Vec<(String, Sort)> = Vec::new();
        let mut declare =
            |solver: &mut S, declared: &mut Vec<(String, Sort)>, name: &str, sort: Sort| {
                declared.push((name.to_string(), sort));
                solver
                    .declare_var(name, &sort)
                    .map_err(|e| EngineError::Solver(e.to_string()))
            };

        for ((name, sort), value) in frame.head_vars.iter().zip(head_values) {
            declare(solver, &mut declared, name, *sort)?;
            solver
                .assert(&Term::var(name.clone()).eq(value_term(*value)))
                .map_err(|e| EngineError::Solver(e.to_string()))?;
        }
        for (name, sort) in &info.locals {
            declare(solver, &mut declared, name, *sort)?;
        }
        for origin in &info.origins {
            for (name, sort) in &origin.vars {
                declare(solver, &mut declared, name, *sort)?;
            }
        }
        solver
            .assert(&info.transition)
            .map_err(|e| EngineError::Solver(e.to_string()))?;

        for (origin, fact_id) in info.origins.iter().zip(justification) {
            let fact = self.fact(*fact_id);
            let target = &self.frames[origin.relation.index()];
            let rename: HashMap<String, String> = target
                .head_vars
                .iter()
                .zip(&origin.vars)
                .map(|((from, _), (to, _))| (from.clone(), to.clone()))
                .collect();
            for (name, sort) in fact.aux_vars() {
                declare(solver, &mut declared, name, *sort)?;
            }
            solver
                .assert(&fact.formula.rename(&rename))
                .map_err(|e| EngineError::Solver(e.to_string()))?;
        }

        let model_vars: Vec<(&str, &Sort)> = declared
            .iter()
            .map(|(name, sort)| (name.as_str(), sort))
            .collect();
        match solver
            .check(&[], &model_vars)
            .map_err(|e| EngineError::Solver(e.to_string()))?
        {
            CheckResult::Sat(model) => {
                let mut per_occurrence = Vec::with_capacity(info.origins.len());
                for origin in &info.origins {
                    let mut values = Vec::with_capacity(origin.vars.len());
                    for (name, _) in &origin.vars {
                        match model.get(name) {
                            Some(value) => values.push(value),
                            None => return Ok(None),
                        }
                    }
                    per_occurrence.push(values);
                }
                Ok(Some(per_occurrence))
            }
            CheckResult::Unsat(_) | CheckResult::Unknown(_) => Ok(None),
        }
    }
}

/// Status of one propagation pass over a relation's lemmas at one level.
#[derive(Debug)]
pub enum PropagationStatus {
    Done,
    Unknown(String),
}

/// Eliminate `targets` from a conjunction by solving defining equalities
/// `t = rhs` whose right-hand side mentions no remaining target. Returns
/// the residual formula and the targets still occurring in it.
fn eliminate_by_equalities(
    mut conjuncts: Vec<Term>,
    targets: &[(String, Sort)],
) -> (Term, Vec<(String, Sort)>) {
    let mut remaining: Vec<String> = targets.iter().map(|(n, _)| n.clone()).collect();

    loop {
        let mut found: Option<(usize, String, Term)> = None;
        'scan: for (idx, conjunct) in conjuncts.iter().enumerate() {
            if let Term::Eq(lhs, rhs) = conjunct {
                for (a, b) in [(lhs, rhs), (rhs, lhs)] {
                    if let Term::Var(name) = &**a {
                        if remaining.contains(name)
                            && b.free_vars().iter().all(|v| !remaining.contains(v))
                        {
                            found = Some((idx, name.clone(), (**b).clone()));
                            break 'scan;
                        }
                    }
                }
            }
        }
        let Some((idx, name, rhs)) = found else {
            break;
        };
        conjuncts.remove(idx);
        let mut subst = HashMap::new();
        subst.insert(name.clone(), rhs);
        for conjunct in &mut conjuncts {
            *conjunct = conjunct.substitute(&subst);
        }
        remaining.retain(|n| *n != name);
    }

    let formula = Term::and(conjuncts).simplify();
    let free = formula.free_vars();
    let aux: Vec<(String, Sort)> = targets
        .iter()
        .filter(|(name, _)| remaining.contains(name) && free.contains(name))
        .cloned()
        .collect();
    (formula, aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use civet_ir::{BodyAtom, Rule, SystemBuilder};

    fn int_var(name: &str) -> (String, Sort) {
        (name.to_string(), Sort::Int)
    }

    /// Init() :- true.  Query() :- Init().
    fn tiny_system() -> ChcSystem {
        let mut builder = SystemBuilder::new();
        let init = builder.declare_relation("Init", vec![]);
        let query = builder.declare_relation("Query", vec![]);
        builder.add_rule(Rule {
            head: init,
            head_args: vec![],
            body: vec![],
            constraint: Term::bool(true),
            vars: vec![],
            name: Some("init".to_string()),
        });
        builder.add_rule(Rule {
            head: query,
            head_args: vec![],
            body: vec![BodyAtom {
                relation: init,
                args: vec![],
            }],
            constraint: Term::bool(true),
            vars: vec![],
            name: Some("step".to_string()),
        });
        builder.set_query(query);
        builder.finish().expect("well-formed")
    }

    #[test]
    fn initial_rules_seed_reachability_facts() {
        let system = tiny_system();
        let frames = FrameSet::new(&system);
        let init = system.relation_id("Init").expect("declared");
        let facts = frames.frame(init).facts();
        assert_eq!(facts.len(), 1);
        assert!(facts[0].is_init());
        assert_eq!(facts[0].formula(), &Term::bool(true));
        assert!(frames.frame(system.query()).facts().is_empty());
    }

    #[test]
    fn init_fact_locals_are_eliminated_through_equalities() {
        let mut builder = SystemBuilder::new();
        let p = builder.declare_relation("P", vec![Sort::Int]);
        builder.add_rule(Rule {
            head: p,
            head_args: vec![Term::var("x")],
            body: vec![],
            constraint: Term::var("x").ge(Term::int(0)),
            vars: vec![int_var("x")],
            name: None,
        });
        builder.set_query(p);
        let system = builder.finish().expect("well-formed");

        let frames = FrameSet::new(&system);
        let fact = &frames.frame(p).facts()[0];
        assert!(fact.aux_vars().is_empty());
        assert_eq!(
            fact.formula(),
            &Term::var(head_var(p, 0)).ge(Term::int(0))
        );
    }

    #[test]
    fn add_lemma_dedups_syntactically_and_raises_levels() {
        let system = tiny_system();
        let mut frames = FrameSet::new(&system);
        let query = system.query();
        let lemma = Term::bool(false);

        assert!(frames.add_lemma(query, lemma.clone(), 2));
        // Same formula at a covered level: nothing new.
        assert!(!frames.add_lemma(query, lemma.clone(), 1));
        assert_eq!(frames.frame(query).lemmas()[0].level(), 2);
        // Same formula above: the existing lemma is raised, never duplicated.
        assert!(frames.add_lemma(query, lemma.clone(), 5));
        assert_eq!(frames.frame(query).lemmas().len(), 1);
        assert_eq!(frames.frame(query).lemmas()[0].level(), 5);
    }

    #[test]
    fn get_formulas_collects_lemmas_at_or_above_the_level() {
        let system = tiny_system();
        let mut frames = FrameSet::new(&system);
        let query = system.query();
        let low = Term::var("a").ge(Term::int(0));
        let high = Term::var("a").le(Term::int(9));
        frames.add_lemma(query, low.clone(), 1);
        frames.add_lemma(query, high.clone(), INFINITE_LEVEL);

        let at_zero = frames.get_formulas(query, 0);
        assert_eq!(at_zero.conjuncts().len(), 2);
        let at_two = frames.get_formulas(query, 2);
        assert_eq!(at_two, high);
    }
}
