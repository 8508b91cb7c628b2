//! Well-formedness checks run once, before any search begins.

use std::collections::HashMap;

use civet_smt::sorts::Sort;
use civet_smt::terms::Term;

use crate::errors::ChcError;
use crate::system::{Relation, Rule};

pub(crate) fn validate(relations: &[Relation], rules: &[Rule]) -> Result<(), ChcError> {
    for (idx, rule) in rules.iter().enumerate() {
        validate_rule(relations, idx, rule)?;
    }
    Ok(())
}

fn validate_rule(relations: &[Relation], idx: usize, rule: &Rule) -> Result<(), ChcError> {
    let mut scope: HashMap<&str, Sort> = HashMap::new();
    for (name, sort) in &rule.vars {
        if scope.insert(name.as_str(), *sort).is_some() {
            return Err(ChcError::DuplicateVariable {
                rule: idx,
                var: name.clone(),
            });
        }
    }

    let head = relations
        .get(rule.head.index())
        .ok_or_else(|| ChcError::UndeclaredRelation {
            rule: idx,
            position: "head".to_string(),
        })?;
    check_application(idx, head, &rule.head_args, &scope, "head")?;

    for (occ, atom) in rule.body.iter().enumerate() {
        let relation = relations.get(atom.relation.index()).ok_or_else(|| {
            ChcError::UndeclaredRelation {
                rule: idx,
                position: format!("body atom {occ}"),
            }
        })?;
        check_application(idx, relation, &atom.args, &scope, &format!("body atom {occ}"))?;
    }

    let constraint_sort = sort_of(idx, &rule.constraint, &scope, "constraint")?;
    if constraint_sort != Sort::Bool {
        return Err(ChcError::SortMismatch {
            rule: idx,
            context: "constraint".to_string(),
            got: constraint_sort.to_string(),
            expected: Sort::Bool.to_string(),
        });
    }
    Ok(())
}

fn check_application(
    idx: usize,
    relation: &Relation,
    args: &[Term],
    scope: &HashMap<&str, Sort>,
    position: &str,
) -> Result<(), ChcError> {
    if args.len() != relation.signature.len() {
        return Err(ChcError::ArityMismatch {
            rule: idx,
            relation: relation.name.clone(),
            got: args.len(),
            expected: relation.signature.len(),
        });
    }
    for (j, (arg, expected)) in args.iter().zip(&relation.signature).enumerate() {
        let context = format!("argument {j} of `{}` in {position}", relation.name);
        let got = sort_of(idx, arg, scope, &context)?;
        if got != *expected {
            return Err(ChcError::SortMismatch {
                rule: idx,
                context,
                got: got.to_string(),
                expected: expected.to_string(),
            });
        }
    }
    Ok(())
}

/// Infer the sort of a term over the rule's variable scope.
fn sort_of(
    idx: usize,
    term: &Term,
    scope: &HashMap<&str, Sort>,
    context: &str,
) -> Result<Sort, ChcError> {
    let int_pair = |a: &Term, b: &Term| -> Result<(), ChcError> {
        expect_sort(idx, a, scope, context, Sort::Int)?;
        expect_sort(idx, b, scope, context, Sort::Int)
    };
    match term {
        Term::Var(name) => scope
            .get(name.as_str())
            .copied()
            .ok_or_else(|| ChcError::UnboundVariable {
                rule: idx,
                var: name.clone(),
            }),
        Term::IntLit(_) => Ok(Sort::Int),
        Term::BoolLit(_) => Ok(Sort::Bool),
        Term::Add(a, b) | Term::Sub(a, b) | Term::Mul(a, b) => {
            int_pair(a, b)?;
            Ok(Sort::Int)
        }
        Term::Lt(a, b) | Term::Le(a, b) | Term::Gt(a, b) | Term::Ge(a, b) => {
            int_pair(a, b)?;
            Ok(Sort::Bool)
        }
        Term::Eq(a, b) => {
            let sa = sort_of(idx, a, scope, context)?;
            expect_sort(idx, b, scope, context, sa)?;
            Ok(Sort::Bool)
        }
        Term::And(parts) | Term::Or(parts) => {
            for p in parts {
                expect_sort(idx, p, scope, context, Sort::Bool)?;
            }
            Ok(Sort::Bool)
        }
        Term::Not(inner) => {
            expect_sort(idx, inner, scope, context, Sort::Bool)?;
            Ok(Sort::Bool)
        }
        Term::Implies(a, b) => {
            expect_sort(idx, a, scope, context, Sort::Bool)?;
            expect_sort(idx, b, scope, context, Sort::Bool)?;
            Ok(Sort::Bool)
        }
        Term::Ite(c, t, e) => {
            expect_sort(idx, c, scope, context, Sort::Bool)?;
            let st = sort_of(idx, t, scope, context)?;
            expect_sort(idx, e, scope, context, st)?;
            Ok(st)
        }
    }
}

fn expect_sort(
    idx: usize,
    term: &Term,
    scope: &HashMap<&str, Sort>,
    context: &str,
    expected: Sort,
) -> Result<(), ChcError> {
    let got = sort_of(idx, term, scope, context)?;
    if got != expected {
        return Err(ChcError::SortMismatch {
            rule: idx,
            context: context.to_string(),
            got: got.to_string(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}
