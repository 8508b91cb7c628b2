use civet_smt::sorts::Sort;
use civet_smt::terms::Term;
use indexmap::IndexMap;

use crate::errors::ChcError;
use crate::validation::validate;

/// Identifier of a relation (uninterpreted predicate) within one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) usize);

impl RelationId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identifier of a rule within one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An uninterpreted predicate being solved for.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub signature: Vec<Sort>,
    /// Rules whose head is this relation, in declaration order.
    pub rules: Vec<RuleId>,
}

/// One predicate occurrence in a rule body.
#[derive(Debug, Clone)]
pub struct BodyAtom {
    pub relation: RelationId,
    /// Argument terms over the rule's variables.
    pub args: Vec<Term>,
}

/// A Constrained Horn Clause: `body atoms ∧ constraint ⇒ head(head_args)`.
///
/// All variables are rule-local and must be listed in `vars`; a rule with no
/// body atoms is an *initial* rule of its head relation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub head: RelationId,
    pub head_args: Vec<Term>,
    pub body: Vec<BodyAtom>,
    pub constraint: Term,
    pub vars: Vec<(String, Sort)>,
    /// Optional display name used in counterexample reporting.
    pub name: Option<String>,
}

impl Rule {
    pub fn is_init(&self) -> bool {
        self.body.is_empty()
    }
}

/// A validated CHC satisfiability problem.
///
/// Construction goes through [`SystemBuilder`]; a value of this type is
/// guaranteed well-formed (declared relations, bound variables, matching
/// arities and sorts, a designated query relation).
#[derive(Debug, Clone)]
pub struct ChcSystem {
    relations: Vec<Relation>,
    names: IndexMap<String, RelationId>,
    rules: Vec<Rule>,
    query: RelationId,
}

impl ChcSystem {
    pub fn relation(&self, id: RelationId) -> &Relation {
        &self.relations[id.0]
    }

    pub fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.names.get(name).copied()
    }

    pub fn relations(&self) -> impl Iterator<Item = (RelationId, &Relation)> {
        self.relations
            .iter()
            .enumerate()
            .map(|(i, r)| (RelationId(i), r))
    }

    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate().map(|(i, r)| (RuleId(i), r))
    }

    /// The designated query relation whose reachability is being decided.
    pub fn query(&self) -> RelationId {
        self.query
    }
}

/// Incremental builder for [`ChcSystem`]; all validation happens in
/// [`SystemBuilder::finish`].
#[derive(Debug, Default)]
pub struct SystemBuilder {
    decls: Vec<(String, Vec<Sort>)>,
    rules: Vec<Rule>,
    query: Option<RelationId>,
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation; duplicate names are reported by `finish`.
    pub fn declare_relation(&mut self, name: impl Into<String>, signature: Vec<Sort>) -> RelationId {
        let id = RelationId(self.decls.len());
        self.decls.push((name.into(), signature));
        id
    }

    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len());
        self.rules.push(rule);
        id
    }

    pub fn set_query(&mut self, query: RelationId) {
        self.query = Some(query);
    }

    /// Validate and produce the system.
    pub fn finish(self) -> Result<ChcSystem, ChcError> {
        let mut names: IndexMap<String, RelationId> = IndexMap::new();
        for (idx, (name, _)) in self.decls.iter().enumerate() {
            if names.insert(name.clone(), RelationId(idx)).is_some() {
                return Err(ChcError::DuplicateRelation(name.clone()));
            }
        }

        let mut relations: Vec<Relation> = self
            .decls
            .iter()
            .map(|(name, signature)| Relation {
                name: name.clone(),
                signature: signature.clone(),
                rules: Vec::new(),
            })
            .collect();

        let query = self.query.ok_or(ChcError::MissingQuery)?;
        if query.0 >= relations.len() {
            return Err(ChcError::MissingQuery);
        }

        validate(&relations, &self.rules)?;

        for (idx, rule) in self.rules.iter().enumerate() {
            relations[rule.head.0].rules.push(RuleId(idx));
        }

        Ok(ChcSystem {
            relations,
            names,
            rules: self.rules,
            query,
        })
    }
}
