//! Syntactic unification of formulas

use cycle_types::{Formula, Substitution, Term};

/// Most general unifier of `left` and `right` extending `subst`, if any.
pub fn unify(left: &Formula, right: &Formula, subst: &Substitution) -> Option<Substitution> {
    let mut out = subst.clone();
    if unify_formulas(left, right, &mut out) {
        Some(out)
    } else {
        None
    }
}

/// Whether `pattern` matches `fact` under `subst`.
pub fn matches(pattern: &Formula, fact: &Formula, subst: &Substitution) -> bool {
    unify(pattern, fact, subst).is_some()
}

fn unify_formulas(left: &Formula, right: &Formula, subst: &mut Substitution) -> bool {
    left.functor == right.functor
        && left.args.len() == right.args.len()
        && left
            .args
            .iter()
            .zip(right.args.iter())
            .all(|(a, b)| unify_terms(a, b, subst))
}

fn walk(term: &Term, subst: &Substitution) -> Term {
    let mut current = term.clone();
    while let Term::Var(v) = &current {
        match subst.get(v) {
            Some(bound) if bound != &current => current = bound.clone(),
            _ => break,
        }
    }
    current
}

fn occurs(var: &str, term: &Term, subst: &Substitution) -> bool {
    match walk(term, subst) {
        Term::Var(v) => v == var,
        Term::Compound(f) => f.args.iter().any(|a| occurs(var, a, subst)),
        Term::List(items) => items.iter().any(|a| occurs(var, a, subst)),
        Term::Atom(_) | Term::Int(_) => false,
    }
}

fn bind(var: &str, term: Term, subst: &mut Substitution) -> bool {
    // `_` is anonymous: it matches anything and is never bound
    if var == "_" {
        return true;
    }
    if occurs(var, &term, subst) {
        return false;
    }
    subst.bind(var, term);
    true
}

fn unify_terms(left: &Term, right: &Term, subst: &mut Substitution) -> bool {
    let left = walk(left, subst);
    let right = walk(right, subst);
    match (left, right) {
        (Term::Var(x), Term::Var(y)) if x == y => true,
        (Term::Var(x), other) | (other, Term::Var(x)) => bind(&x, other, subst),
        (Term::Atom(a), Term::Atom(b)) => a == b,
        (Term::Int(a), Term::Int(b)) => a == b,
        (Term::Atom(a), Term::Compound(f)) | (Term::Compound(f), Term::Atom(a)) => {
            f.args.is_empty() && f.functor == a
        }
        (Term::Compound(f), Term::Compound(g)) => unify_formulas(&f, &g, subst),
        (Term::List(xs), Term::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(a, b)| unify_terms(a, b, subst))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    #[test]
    fn test_binds_variables() {
        let s = unify(&f("at(X, Y)"), &f("at(home, 3)"), &Substitution::empty()).unwrap();
        assert_eq!(s.resolve("X"), Some(Term::atom("home")));
        assert_eq!(s.resolve("Y"), Some(Term::Int(3)));
    }

    #[test]
    fn test_respects_existing_bindings() {
        let mut seed = Substitution::empty();
        seed.bind("X", Term::atom("shop"));
        assert!(unify(&f("at(X)"), &f("at(home)"), &seed).is_none());
        assert!(unify(&f("at(X)"), &f("at(shop)"), &seed).is_some());
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        assert!(matches(&f("p(X, X)"), &f("p(a, a)"), &Substitution::empty()));
        assert!(!matches(&f("p(X, X)"), &f("p(a, b)"), &Substitution::empty()));
    }

    #[test]
    fn test_anonymous_variable_never_binds() {
        let s = unify(&f("p(_, _)"), &f("p(a, b)"), &Substitution::empty()).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_nested_mailbox_terms() {
        let s = unify(
            &f("received(S, imp(at(R)))"),
            &f("received(bob, imp(at(home)))"),
            &Substitution::empty(),
        )
        .unwrap();
        assert_eq!(s.resolve("S"), Some(Term::atom("bob")));
        assert_eq!(s.resolve("R"), Some(Term::atom("home")));
        assert!(!matches(&f("received(S, ok)"), &f("sent([bob], ok)"), &Substitution::empty()));
    }

    #[test]
    fn test_occurs_check() {
        assert!(!matches(&f("p(X)"), &f("p(g(X))"), &Substitution::empty()));
    }
}
