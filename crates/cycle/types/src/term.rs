//! Terms, formulas and substitutions
//!
//! The textual form follows the usual logic-programming conventions:
//! identifiers starting with a lowercase letter are constants, identifiers
//! starting with an uppercase letter or `_` are variables, `f(a, B)` is a
//! compound and `[a, b]` is a list.

use crate::errors::FormulaParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A term appearing as an argument of a formula
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Atom(String),
    Int(i64),
    Var(String),
    Compound(Formula),
    List(Vec<Term>),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    /// Embed a formula as a term; propositions become atoms so that the
    /// parsed and the constructed forms compare equal.
    pub fn from_formula(formula: Formula) -> Self {
        if formula.args.is_empty() {
            Term::Atom(formula.functor)
        } else {
            Term::Compound(formula)
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Term::Atom(_) | Term::Int(_) => true,
            Term::Var(_) => false,
            Term::Compound(f) => f.is_ground(),
            Term::List(items) => items.iter().all(Term::is_ground),
        }
    }

    fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Term::Var(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::Compound(f) => f.args.iter().for_each(|a| a.collect_vars(out)),
            Term::List(items) => items.iter().for_each(|a| a.collect_vars(out)),
            Term::Atom(_) | Term::Int(_) => {}
        }
    }

    /// Apply a substitution, resolving chains of variable bindings.
    pub fn apply(&self, subst: &Substitution) -> Term {
        match self {
            Term::Var(v) => match subst.get(v) {
                Some(bound) if bound != self => bound.apply(subst),
                _ => self.clone(),
            },
            Term::Compound(f) => Term::Compound(f.apply(subst)),
            Term::List(items) => Term::List(items.iter().map(|t| t.apply(subst)).collect()),
            Term::Atom(_) | Term::Int(_) => self.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(a) => write!(f, "{}", a),
            Term::Int(i) => write!(f, "{}", i),
            Term::Var(v) => write!(f, "{}", v),
            Term::Compound(c) => write!(f, "{}", c),
            Term::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// An atomic formula `functor(args...)`; a formula without arguments is a
/// plain proposition such as `ok`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    pub functor: String,
    pub args: Vec<Term>,
}

impl Formula {
    pub fn new(functor: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            functor: functor.into(),
            args,
        }
    }

    /// A proposition without arguments.
    pub fn prop(functor: impl Into<String>) -> Self {
        Self::new(functor, Vec::new())
    }

    pub fn parse(input: &str) -> Result<Self, FormulaParseError> {
        let mut parser = Parser::new(input);
        let formula = parser.formula()?;
        parser.skip_ws();
        // Tolerate a trailing full stop, as in `ok.`
        if parser.peek() == Some('.') {
            parser.bump();
            parser.skip_ws();
        }
        match parser.peek() {
            None => Ok(formula),
            Some(c) => Err(parser.unexpected(c)),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Term::is_ground)
    }

    /// Variables in order of first occurrence.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.args.iter().for_each(|a| a.collect_vars(&mut out));
        out
    }

    pub fn apply(&self, subst: &Substitution) -> Formula {
        if subst.is_empty() {
            return self.clone();
        }
        Formula {
            functor: self.functor.clone(),
            args: self.args.iter().map(|t| t.apply(subst)).collect(),
        }
    }

    /// Wrap this formula as the single argument of `functor`.
    pub fn wrap(&self, functor: &str) -> Formula {
        Formula::new(functor, vec![Term::from_formula(self.clone())])
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.functor)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            write_joined(f, &self.args)?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl FromStr for Formula {
    type Err = FormulaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Formula::parse(&value)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.to_string()
    }
}

/// Variable bindings produced by queries and applied to rule actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    bindings: BTreeMap<String, Term>,
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Bind `var`, returning the previous binding if any.
    pub fn bind(&mut self, var: impl Into<String>, term: Term) -> Option<Term> {
        self.bindings.insert(var.into(), term)
    }

    /// Fully resolved value of `var`.
    pub fn resolve(&self, var: &str) -> Option<Term> {
        self.bindings.get(var).map(|t| t.apply(self))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.bindings.iter()
    }

    /// Extend with the bindings of `other`; existing bindings win.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut out = self.clone();
        for (var, term) in other.iter() {
            out.bindings
                .entry(var.clone())
                .or_insert_with(|| term.apply(self));
        }
        out
    }

    /// Restrict to the given variables.
    pub fn restrict(&self, vars: &[String]) -> Substitution {
        Substitution {
            bindings: vars
                .iter()
                .filter_map(|v| self.resolve(v).map(|t| (v.clone(), t)))
                .collect(),
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}/{}", var, term)?;
        }
        write!(f, "]")
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn unexpected(&self, found: char) -> FormulaParseError {
        FormulaParseError::UnexpectedChar {
            input: self.input.to_string(),
            found,
            offset: self.pos,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FormulaParseError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= c.len_utf8();
                Err(self.unexpected(c))
            }
            None => Err(FormulaParseError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn formula(&mut self) -> Result<Formula, FormulaParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_lowercase() => {
                let functor = self.identifier();
                let args = self.arguments()?;
                Ok(Formula::new(functor, args))
            }
            Some(_) => Err(FormulaParseError::NotAFormula(self.input[self.pos..].to_string())),
            None => Err(FormulaParseError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Term>, FormulaParseError> {
        self.skip_ws();
        if self.peek() != Some('(') {
            return Ok(Vec::new());
        }
        self.bump();
        let args = self.term_list(')')?;
        self.expect(')')?;
        Ok(args)
    }

    fn term_list(&mut self, close: char) -> Result<Vec<Term>, FormulaParseError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            return Ok(items);
        }
        loop {
            items.push(self.term()?);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            } else {
                return Ok(items);
            }
        }
    }

    fn term(&mut self) -> Result<Term, FormulaParseError> {
        self.skip_ws();
        let c = self
            .peek()
            .ok_or_else(|| FormulaParseError::UnexpectedEnd(self.input.to_string()))?;
        if c == '[' {
            self.bump();
            let items = self.term_list(']')?;
            self.expect(']')?;
            Ok(Term::List(items))
        } else if c.is_ascii_digit() || c == '-' {
            let start = self.pos;
            self.bump();
            while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                self.bump();
            }
            self.input[start..self.pos]
                .parse()
                .map(Term::Int)
                .map_err(|_| self.unexpected(c))
        } else if c.is_uppercase() || c == '_' {
            Ok(Term::Var(self.identifier()))
        } else if c.is_lowercase() {
            let name = self.identifier();
            let args = self.arguments()?;
            if args.is_empty() {
                Ok(Term::Atom(name))
            } else {
                Ok(Term::Compound(Formula::new(name, args)))
            }
        } else {
            Err(self.unexpected(c))
        }
    }
}
