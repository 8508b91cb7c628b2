use std::collections::HashMap;

use crate::model::Model;
use crate::terms::Term;

/// Model-based projection seam.
///
/// Given a model of `formula`, `project` returns a formula over (at most)
/// `keep` whose models include the restriction of the guiding model — the
/// model-preserving contract the engine relies on when it instantiates child
/// obligations and reachability witnesses.
pub trait ModelProjector {
    fn project(&self, model: &Model, keep: &[String], formula: &Term) -> Term;
}

/// The trivial model-based projection: every variable outside `keep` is
/// replaced by its value in the guiding model, then the result is folded.
///
/// Variables absent from the model are left untouched; the caller treats any
/// residual variables as implicitly existential.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionProjector;

impl ModelProjector for SubstitutionProjector {
    fn project(&self, model: &Model, keep: &[String], formula: &Term) -> Term {
        let mut subst: HashMap<String, Term> = HashMap::new();
        for name in formula.free_vars() {
            if keep.iter().any(|k| *k == name) {
                continue;
            }
            if let Some(value) = model.get(&name) {
                subst.insert(name, value_term(value));
            }
        }
        formula.substitute(&subst).simplify()
    }
}

fn value_term(value: crate::model::Value) -> Term {
    match value {
        crate::model::Value::Int(n) => Term::IntLit(n),
        crate::model::Value::Bool(b) => Term::BoolLit(b),
    }
}
