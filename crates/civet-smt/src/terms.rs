use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Quantifier-free term representation, solver-agnostic.
///
/// Every backend and the engine exchange formulas in this shape; quantified
/// lemmas carry their bindings separately, so the term language itself stays
/// quantifier-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),

    // Comparison
    Eq(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),

    // Boolean structure
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Box<Term>),
    Implies(Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Term::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        Term::BoolLit(b)
    }

    pub fn add(self, other: Term) -> Self {
        Term::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Term) -> Self {
        Term::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Term) -> Self {
        Term::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: Term) -> Self {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Self {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Self {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Self {
        Term::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Term) -> Self {
        Term::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<Term>) -> Self {
        Term::And(terms)
    }

    pub fn or(terms: Vec<Term>) -> Self {
        Term::Or(terms)
    }

    pub fn not(self) -> Self {
        Term::Not(Box::new(self))
    }

    pub fn implies(self, other: Term) -> Self {
        Term::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: Term, then_term: Term, else_term: Term) -> Self {
        Term::Ite(Box::new(cond), Box::new(then_term), Box::new(else_term))
    }

    /// Top-level conjuncts of the term.
    ///
    /// `And` nodes are flattened one level deep, `true` contributes nothing,
    /// and any other term is a single conjunct.
    pub fn conjuncts(&self) -> Vec<Term> {
        match self {
            Term::BoolLit(true) => Vec::new(),
            Term::And(parts) => parts.iter().flat_map(|p| p.conjuncts()).collect(),
            other => vec![other.clone()],
        }
    }

    /// Collect the free variable names of the term into `out`.
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Var(name) => {
                out.insert(name.clone());
            }
            Term::IntLit(_) | Term::BoolLit(_) => {}
            Term::Add(a, b)
            | Term::Sub(a, b)
            | Term::Mul(a, b)
            | Term::Eq(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Gt(a, b)
            | Term::Ge(a, b)
            | Term::Implies(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Term::And(parts) | Term::Or(parts) => {
                for p in parts {
                    p.collect_vars(out);
                }
            }
            Term::Not(inner) => inner.collect_vars(out),
            Term::Ite(c, t, e) => {
                c.collect_vars(out);
                t.collect_vars(out);
                e.collect_vars(out);
            }
        }
    }

    /// Free variable names of the term, deterministically ordered.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    /// Rename variables according to `map`; unmapped names are kept.
    pub fn rename(&self, map: &HashMap<String, String>) -> Term {
        self.transform(&|name| map.get(name).map(|n| Term::Var(n.clone())))
    }

    /// Replace variables by terms according to `map`; unmapped names are kept.
    pub fn substitute(&self, map: &HashMap<String, Term>) -> Term {
        self.transform(&|name| map.get(name).cloned())
    }

    fn transform(&self, subst: &dyn Fn(&str) -> Option<Term>) -> Term {
        match self {
            Term::Var(name) => subst(name).unwrap_or_else(|| Term::Var(name.clone())),
            Term::IntLit(n) => Term::IntLit(*n),
            Term::BoolLit(b) => Term::BoolLit(*b),
            Term::Add(a, b) => Term::Add(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Sub(a, b) => Term::Sub(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Mul(a, b) => Term::Mul(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Eq(a, b) => Term::Eq(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Lt(a, b) => Term::Lt(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Le(a, b) => Term::Le(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Gt(a, b) => Term::Gt(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Ge(a, b) => Term::Ge(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::And(parts) => Term::And(parts.iter().map(|p| p.transform(subst)).collect()),
            Term::Or(parts) => Term::Or(parts.iter().map(|p| p.transform(subst)).collect()),
            Term::Not(inner) => Term::Not(Box::new(inner.transform(subst))),
            Term::Implies(a, b) => Term::Implies(
                Box::new(a.transform(subst)),
                Box::new(b.transform(subst)),
            ),
            Term::Ite(c, t, e) => Term::Ite(
                Box::new(c.transform(subst)),
                Box::new(t.transform(subst)),
                Box::new(e.transform(subst)),
            ),
        }
    }

    /// Light structural simplification: constant folding, flattening of
    /// nested conjunctions/disjunctions, unit elimination, and trivial
    /// (in)equality reduction. Semantics-preserving only.
    pub fn simplify(&self) -> Term {
        match self {
            Term::Var(_) | Term::IntLit(_) | Term::BoolLit(_) => self.clone(),
            Term::Add(a, b) => match (a.simplify(), b.simplify()) {
                (Term::IntLit(x), Term::IntLit(y)) => match x.checked_add(y) {
                    Some(v) => Term::IntLit(v),
                    None => Term::IntLit(x).add(Term::IntLit(y)),
                },
                (Term::IntLit(0), t) | (t, Term::IntLit(0)) => t,
                (a, b) => a.add(b),
            },
            Term::Sub(a, b) => match (a.simplify(), b.simplify()) {
                (Term::IntLit(x), Term::IntLit(y)) => match x.checked_sub(y) {
                    Some(v) => Term::IntLit(v),
                    None => Term::IntLit(x).sub(Term::IntLit(y)),
                },
                (t, Term::IntLit(0)) => t,
                (a, b) => a.sub(b),
            },
            Term::Mul(a, b) => match (a.simplify(), b.simplify()) {
                (Term::IntLit(x), Term::IntLit(y)) => match x.checked_mul(y) {
                    Some(v) => Term::IntLit(v),
                    None => Term::IntLit(x).mul(Term::IntLit(y)),
                },
                (Term::IntLit(1), t) | (t, Term::IntLit(1)) => t,
                (Term::IntLit(0), _) | (_, Term::IntLit(0)) => Term::IntLit(0),
                (a, b) => a.mul(b),
            },
            Term::Eq(a, b) => match (a.simplify(), b.simplify()) {
                (Term::IntLit(x), Term::IntLit(y)) => Term::BoolLit(x == y),
                (Term::BoolLit(x), Term::BoolLit(y)) => Term::BoolLit(x == y),
                (a, b) if a == b => Term::BoolLit(true),
                (a, b) => a.eq(b),
            },
            Term::Lt(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), |x, y| x < y, Term::lt),
            Term::Le(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), |x, y| x <= y, Term::le),
            Term::Gt(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), |x, y| x > y, Term::gt),
            Term::Ge(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), |x, y| x >= y, Term::ge),
            Term::And(parts) => {
                let mut flat = Vec::new();
                for p in parts {
                    match p.simplify() {
                        Term::BoolLit(true) => {}
                        Term::BoolLit(false) => return Term::BoolLit(false),
                        Term::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Term::BoolLit(true),
                    1 => flat.pop().unwrap_or(Term::BoolLit(true)),
                    _ => Term::And(flat),
                }
            }
            Term::Or(parts) => {
                let mut flat = Vec::new();
                for p in parts {
                    match p.simplify() {
                        Term::BoolLit(false) => {}
                        Term::BoolLit(true) => return Term::BoolLit(true),
                        Term::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Term::BoolLit(false),
                    1 => flat.pop().unwrap_or(Term::BoolLit(false)),
                    _ => Term::Or(flat),
                }
            }
            Term::Not(inner) => match inner.simplify() {
                Term::BoolLit(b) => Term::BoolLit(!b),
                Term::Not(nested) => *nested,
                other => other.not(),
            },
            Term::Implies(a, b) => match (a.simplify(), b.simplify()) {
                (Term::BoolLit(false), _) => Term::BoolLit(true),
                (Term::BoolLit(true), t) => t,
                (_, Term::BoolLit(true)) => Term::BoolLit(true),
                (a, Term::BoolLit(false)) => a.not(),
                (a, b) => a.implies(b),
            },
            Term::Ite(c, t, e) => match c.simplify() {
                Term::BoolLit(true) => t.simplify(),
                Term::BoolLit(false) => e.simplify(),
                c => Term::ite(c, t.simplify(), e.simplify()),
            },
        }
    }

    fn fold_cmp(
        a: Term,
        b: Term,
        cmp: impl Fn(i64, i64) -> bool,
        rebuild: impl Fn(Term, Term) -> Term,
    ) -> Term {
        match (a, b) {
            (Term::IntLit(x), Term::IntLit(y)) => Term::BoolLit(cmp(x, y)),
            (a, b) => rebuild(a, b),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "{name}"),
            Term::IntLit(n) => write!(f, "{n}"),
            Term::BoolLit(b) => write!(f, "{b}"),
            Term::Add(a, b) => write!(f, "(+ {a} {b})"),
            Term::Sub(a, b) => write!(f, "(- {a} {b})"),
            Term::Mul(a, b) => write!(f, "(* {a} {b})"),
            Term::Eq(a, b) => write!(f, "(= {a} {b})"),
            Term::Lt(a, b) => write!(f, "(< {a} {b})"),
            Term::Le(a, b) => write!(f, "(<= {a} {b})"),
            Term::Gt(a, b) => write!(f, "(> {a} {b})"),
            Term::Ge(a, b) => write!(f, "(>= {a} {b})"),
            Term::And(parts) => {
                write!(f, "(and")?;
                for p in parts {
                    write!(f, " {p}")?;
                }
                write!(f, ")")
            }
            Term::Or(parts) => {
                write!(f, "(or")?;
                for p in parts {
                    write!(f, " {p}")?;
                }
                write!(f, ")")
            }
            Term::Not(inner) => write!(f, "(not {inner})"),
            Term::Implies(a, b) => write!(f, "(=> {a} {b})"),
            Term::Ite(c, t, e) => write!(f, "(ite {c} {t} {e})"),
        }
    }
}
