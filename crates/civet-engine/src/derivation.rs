//! Model-guided unrolling of a single rule into child obligations.

use std::collections::HashMap;

use civet_ir::{RelationId, RuleId};
use civet_smt::model::Model;
use civet_smt::project::ModelProjector;
use civet_smt::sorts::Sort;
use civet_smt::terms::Term;

use crate::frames::{head_var, ReachFactId};

/// Summary of one body atom of the rule being tried.
///
/// A *must* premise carries an exact witness drawn from a reachability fact;
/// a *may* premise carries the atom's current frame formula, an approximation
/// a child obligation has to refine. Both are expressed over the atom's own
/// origin variables.
#[derive(Debug, Clone)]
pub struct Premise {
    relation: RelationId,
    origin_index: usize,
    ovars: Vec<(String, Sort)>,
    summary: Term,
    must: bool,
    aux_vars: Vec<(String, Sort)>,
    fact: Option<ReachFactId>,
}

impl Premise {
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    pub fn origin_index(&self) -> usize {
        self.origin_index
    }

    pub fn is_must(&self) -> bool {
        self.must
    }

    pub fn summary(&self) -> &Term {
        &self.summary
    }

    pub fn ovars(&self) -> &[(String, Sort)] {
        &self.ovars
    }

    pub fn aux_vars(&self) -> &[(String, Sort)] {
        &self.aux_vars
    }

    pub fn fact(&self) -> Option<ReachFactId> {
        self.fact
    }

    fn set_summary(&mut self, summary: Term, must: bool, fact: Option<ReachFactId>) {
        self.summary = summary;
        self.must = must;
        self.fact = fact;
    }
}

/// Specification of a child obligation to spawn: the premise's relation and
/// a post-condition over that relation's canonical head variables.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub relation: RelationId,
    pub post: Term,
}

/// One attempt to realize an obligation through a specific rule.
///
/// The premises are fixed when the derivation is built; the active index
/// walks the non-must premises in order, giving depth-first, in-rule
/// backtracking before the engine switches rules. The guiding model is
/// captured by [`Derivation::create_first_child`] and re-used to instantiate
/// later children.
#[derive(Debug)]
pub struct Derivation {
    rule: RuleId,
    premises: Vec<Premise>,
    active: Option<usize>,
    trans: Term,
    model: Option<Model>,
}

impl Derivation {
    pub fn new(rule: RuleId, trans: Term) -> Self {
        Self {
            rule,
            premises: Vec::new(),
            active: None,
            trans,
            model: None,
        }
    }

    pub fn rule(&self) -> RuleId {
        self.rule
    }

    pub fn premises(&self) -> &[Premise] {
        &self.premises
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_premise(
        &mut self,
        relation: RelationId,
        origin_index: usize,
        ovars: Vec<(String, Sort)>,
        summary: Term,
        must: bool,
        aux_vars: Vec<(String, Sort)>,
        fact: Option<ReachFactId>,
    ) {
        self.premises.push(Premise {
            relation,
            origin_index,
            ovars,
            summary,
            must,
            aux_vars,
            fact,
        });
    }

    /// Spawn the child for the first non-must premise, guided by `model`.
    ///
    /// Returns `None` when every premise is must — the obligation is already
    /// concretely witnessed and the caller synthesizes a reachability fact
    /// instead of recursing.
    pub fn create_first_child(
        &mut self,
        model: &Model,
        projector: &dyn ModelProjector,
    ) -> Option<ChildSpec> {
        self.model = Some(model.clone());
        self.active = None;
        self.advance(projector)
    }

    /// Advance to the next non-must premise and spawn its child.
    ///
    /// Returns `None` once exhausted: this rule cannot presently realize the
    /// obligation and the caller re-examines it afresh.
    pub fn create_next_child(&mut self, projector: &dyn ModelProjector) -> Option<ChildSpec> {
        self.advance(projector)
    }

    /// The premise the most recent child was spawned for.
    pub fn active_premise(&self) -> Option<&Premise> {
        self.active.map(|idx| &self.premises[idx])
    }

    /// Upgrade the active premise to a must summary backed by `fact`, whose
    /// formula is over the premise relation's canonical head variables.
    pub fn discharge_active(&mut self, fact: ReachFactId, formula: &Term) {
        let Some(idx) = self.active else {
            return;
        };
        if idx >= self.premises.len() {
            return;
        }
        let premise = &mut self.premises[idx];
        let map: HashMap<String, String> = premise
            .ovars
            .iter()
            .enumerate()
            .map(|(j, (name, _))| (head_var(premise.relation, j), name.clone()))
            .collect();
        let summary = formula.rename(&map);
        premise.set_summary(summary, true, Some(fact));
    }

    /// True when every premise carries an exact witness.
    pub fn is_all_must(&self) -> bool {
        self.premises.iter().all(Premise::is_must)
    }

    /// Reachability facts backing the must premises, in origin order.
    pub fn must_fact_ids(&self) -> Vec<ReachFactId> {
        self.premises.iter().filter_map(|p| p.fact).collect()
    }

    fn advance(&mut self, projector: &dyn ModelProjector) -> Option<ChildSpec> {
        let start = match self.active {
            None => 0,
            Some(idx) => idx + 1,
        };
        for idx in start..self.premises.len() {
            if !self.premises[idx].must {
                self.active = Some(idx);
                return self.child_spec(idx, projector);
            }
        }
        self.active = Some(self.premises.len());
        None
    }

    /// Post-condition for premise `idx`: the transition conjoined with every
    /// premise summary, projected onto the premise's origin variables under
    /// the guiding model, then renamed to the child relation's head
    /// variables.
    fn child_spec(&self, idx: usize, projector: &dyn ModelProjector) -> Option<ChildSpec> {
        let model = self.model.as_ref()?;
        let premise = &self.premises[idx];

        let mut parts = vec![self.trans.clone()];
        for p in &self.premises {
            parts.push(p.summary.clone());
        }
        let formula = Term::and(parts);

        let keep: Vec<String> = premise.ovars.iter().map(|(name, _)| name.clone()).collect();
        let projected = projector.project(model, &keep, &formula);

        let map: HashMap<String, String> = premise
            .ovars
            .iter()
            .enumerate()
            .map(|(j, (name, _))| (name.clone(), head_var(premise.relation, j)))
            .collect();
        Some(ChildSpec {
            relation: premise.relation,
            post: projected.rename(&map).simplify(),
        })
    }
}
