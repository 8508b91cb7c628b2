use std::collections::BTreeMap;

use thiserror::Error;

use crate::terms::Term;

/// A variable assignment extracted from a satisfiable check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, Value>,
}

/// A concrete value in a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Assigned names and values in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Failure while evaluating a term under a model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("variable `{0}` has no value in the model")]
    UnboundVariable(String),
    #[error("sort mismatch while evaluating `{0}`")]
    SortMismatch(String),
    #[error("integer overflow while evaluating `{0}`")]
    Overflow(String),
}

/// Evaluate a quantifier-free term under a model.
///
/// Evaluation is total over fully-assigned terms; an unassigned variable is
/// an error rather than a default, so callers can distinguish "fact does not
/// apply under this model" from "fact evaluates to false".
pub fn evaluate(term: &Term, model: &Model) -> Result<Value, EvalError> {
    match term {
        Term::Var(name) => model
            .get(name)
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        Term::IntLit(n) => Ok(Value::Int(*n)),
        Term::BoolLit(b) => Ok(Value::Bool(*b)),
        Term::Add(a, b) => int_op(term, a, b, model, i64::checked_add),
        Term::Sub(a, b) => int_op(term, a, b, model, i64::checked_sub),
        Term::Mul(a, b) => int_op(term, a, b, model, i64::checked_mul),
        Term::Eq(a, b) => {
            let (va, vb) = (evaluate(a, model)?, evaluate(b, model)?);
            match (va, vb) {
                (Value::Int(x), Value::Int(y)) => Ok(Value::Bool(x == y)),
                (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x == y)),
                _ => Err(EvalError::SortMismatch(term.to_string())),
            }
        }
        Term::Lt(a, b) => cmp_op(term, a, b, model, |x, y| x < y),
        Term::Le(a, b) => cmp_op(term, a, b, model, |x, y| x <= y),
        Term::Gt(a, b) => cmp_op(term, a, b, model, |x, y| x > y),
        Term::Ge(a, b) => cmp_op(term, a, b, model, |x, y| x >= y),
        Term::And(parts) => {
            for p in parts {
                if !as_bool(p, model)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Term::Or(parts) => {
            for p in parts {
                if as_bool(p, model)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Term::Not(inner) => Ok(Value::Bool(!as_bool(inner, model)?)),
        Term::Implies(a, b) => Ok(Value::Bool(!as_bool(a, model)? || as_bool(b, model)?)),
        Term::Ite(c, t, e) => {
            if as_bool(c, model)? {
                evaluate(t, model)
            } else {
                evaluate(e, model)
            }
        }
    }
}

/// Evaluate a term expected to be boolean.
pub fn evaluate_bool(term: &Term, model: &Model) -> Result<bool, EvalError> {
    as_bool(term, model)
}

fn as_bool(term: &Term, model: &Model) -> Result<bool, EvalError> {
    match evaluate(term, model)? {
        Value::Bool(b) => Ok(b),
        Value::Int(_) => Err(EvalError::SortMismatch(term.to_string())),
    }
}

fn int_op(
    whole: &Term,
    a: &Term,
    b: &Term,
    model: &Model,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Value, EvalError> {
    match (evaluate(a, model)?, evaluate(b, model)?) {
        (Value::Int(x), Value::Int(y)) => op(x, y)
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow(whole.to_string())),
        _ => Err(EvalError::SortMismatch(whole.to_string())),
    }
}

fn cmp_op(
    whole: &Term,
    a: &Term,
    b: &Term,
    model: &Model,
    cmp: impl Fn(i64, i64) -> bool,
) -> Result<Value, EvalError> {
    match (evaluate(a, model)?, evaluate(b, model)?) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Bool(cmp(x, y))),
        _ => Err(EvalError::SortMismatch(whole.to_string())),
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(pairs: &[(&str, Value)]) -> Model {
        let mut m = Model::new();
        for (k, v) in pairs {
            m.insert(*k, *v);
        }
        m
    }

    #[test]
    fn evaluates_arithmetic_and_comparison() {
        let m = model(&[("x", Value::Int(3)), ("y", Value::Int(-1))]);
        let t = Term::var("x").add(Term::var("y")).ge(Term::int(2));
        assert_eq!(evaluate(&t, &m), Ok(Value::Bool(true)));
    }

    #[test]
    fn unbound_variable_is_an_error_not_a_default() {
        let m = model(&[]);
        let t = Term::var("x").ge(Term::int(0));
        assert_eq!(
            evaluate(&t, &m),
            Err(EvalError::UnboundVariable("x".to_string()))
        );
    }

    #[test]
    fn sort_mismatch_is_detected() {
        let m = model(&[("p", Value::Bool(true))]);
        let t = Term::var("p").add(Term::int(1));
        assert!(matches!(evaluate(&t, &m), Err(EvalError::SortMismatch(_))));
    }

    #[test]
    fn short_circuit_conjunction_skips_unbound_tail() {
        let m = model(&[("p", Value::Bool(false))]);
        let t = Term::and(vec![Term::var("p"), Term::var("q")]);
        assert_eq!(evaluate(&t, &m), Ok(Value::Bool(false)));
    }
}
