//! In-memory knowledge representation engine
//!
//! Facts are ground formulas held in ordered sets; queries are answered by
//! unifying the query against every stored fact of a base.

use crate::knowledge::{KnowledgeBase, KnowledgeBaseFactory};
use crate::unify::unify;
use cycle_types::{BaseKind, Formula, InitializationError, KnowledgeBaseError, Program, Substitution};
use std::collections::BTreeSet;

/// Language name served by [`MemoryKnowledgeBaseFactory`].
pub const MEMORY_LANGUAGE: &str = "memory";

/// The goals an agent currently pursues
///
/// Only goal-level operations are exposed; the backing set is private.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalBase {
    goals: BTreeSet<Formula>,
}

impl GoalBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the goal was already present.
    pub fn add_goal(&mut self, goal: Formula) -> bool {
        self.goals.insert(goal)
    }

    pub fn remove_goal(&mut self, goal: &Formula) -> bool {
        self.goals.remove(goal)
    }

    pub fn has_goal(&self, goal: &Formula) -> bool {
        self.goals.contains(goal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.goals.iter()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

/// Reference knowledge base for the `memory` language
#[derive(Debug, Default)]
pub struct MemoryKnowledgeBase {
    beliefs: BTreeSet<Formula>,
    goals: GoalBase,
    percepts: BTreeSet<Formula>,
    mailbox: BTreeSet<Formula>,
    disposed: bool,
}

impl MemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn goals(&self) -> &GoalBase {
        &self.goals
    }

    fn ensure_live(&self) -> Result<(), KnowledgeBaseError> {
        if self.disposed {
            Err(KnowledgeBaseError::Disposed)
        } else {
            Ok(())
        }
    }

    fn facts(&self, kind: BaseKind) -> Box<dyn Iterator<Item = &Formula> + '_> {
        match kind {
            BaseKind::Belief => Box::new(self.beliefs.iter()),
            BaseKind::Goal => Box::new(self.goals.iter()),
            BaseKind::Percept => Box::new(self.percepts.iter()),
            BaseKind::Mailbox => Box::new(self.mailbox.iter()),
        }
    }
}

impl KnowledgeBase for MemoryKnowledgeBase {
    fn insert(&mut self, kind: BaseKind, formula: &Formula) -> Result<bool, KnowledgeBaseError> {
        self.ensure_live()?;
        if !formula.is_ground() {
            return Err(KnowledgeBaseError::NonGround(formula.to_string()));
        }
        let inserted = match kind {
            BaseKind::Belief => self.beliefs.insert(formula.clone()),
            BaseKind::Goal => self.goals.add_goal(formula.clone()),
            BaseKind::Percept => self.percepts.insert(formula.clone()),
            BaseKind::Mailbox => self.mailbox.insert(formula.clone()),
        };
        Ok(inserted)
    }

    fn delete(&mut self, kind: BaseKind, formula: &Formula) -> Result<bool, KnowledgeBaseError> {
        self.ensure_live()?;
        let removed = match kind {
            BaseKind::Belief => self.beliefs.remove(formula),
            BaseKind::Goal => self.goals.remove_goal(formula),
            BaseKind::Percept => self.percepts.remove(formula),
            BaseKind::Mailbox => self.mailbox.remove(formula),
        };
        Ok(removed)
    }

    fn query(
        &self,
        kind: BaseKind,
        query: &Formula,
        subst: &Substitution,
    ) -> Result<Vec<Substitution>, KnowledgeBaseError> {
        self.ensure_live()?;
        Ok(self
            .facts(kind)
            .filter_map(|fact| unify(query, fact, subst))
            .collect())
    }

    fn contents(&self, kind: BaseKind) -> Result<Vec<Formula>, KnowledgeBaseError> {
        self.ensure_live()?;
        Ok(self.facts(kind).cloned().collect())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.beliefs.clear();
        self.goals = GoalBase::new();
        self.percepts.clear();
        self.mailbox.clear();
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Factory for [`MemoryKnowledgeBase`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryKnowledgeBaseFactory;

impl KnowledgeBaseFactory for MemoryKnowledgeBaseFactory {
    fn language(&self) -> &str {
        MEMORY_LANGUAGE
    }

    fn create(&self, program: &Program) -> Result<Box<dyn KnowledgeBase>, InitializationError> {
        self.check_language(program)?;
        Ok(Box::new(MemoryKnowledgeBase::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_types::Term;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    #[test]
    fn test_goal_base_operations() {
        let mut goals = GoalBase::new();
        assert!(goals.add_goal(f("at(shop)")));
        assert!(!goals.add_goal(f("at(shop)")));
        assert!(goals.has_goal(&f("at(shop)")));
        assert!(goals.remove_goal(&f("at(shop)")));
        assert!(goals.is_empty());
    }

    #[test]
    fn test_insert_rejects_non_ground() {
        let mut kb = MemoryKnowledgeBase::new();
        let err = kb.insert(BaseKind::Belief, &f("at(X)")).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::NonGround(_)));
    }

    #[test]
    fn test_query_returns_all_unifiers() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.insert(BaseKind::Belief, &f("at(home)")).unwrap();
        kb.insert(BaseKind::Belief, &f("at(shop)")).unwrap();
        kb.insert(BaseKind::Belief, &f("open(shop)")).unwrap();

        let answers = kb
            .query(BaseKind::Belief, &f("at(X)"), &Substitution::empty())
            .unwrap();
        let places: Vec<_> = answers.iter().filter_map(|s| s.resolve("X")).collect();
        assert_eq!(places, vec![Term::atom("home"), Term::atom("shop")]);
    }

    #[test]
    fn test_goal_holds_checks_beliefs() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.insert(BaseKind::Goal, &f("at(shop)")).unwrap();
        assert!(!kb.goal_holds(&f("at(shop)")).unwrap());
        kb.insert(BaseKind::Belief, &f("at(shop)")).unwrap();
        assert!(kb.goal_holds(&f("at(shop)")).unwrap());
    }

    #[test]
    fn test_disposed_base_refuses_operations() {
        let mut kb = MemoryKnowledgeBase::new();
        kb.insert(BaseKind::Percept, &f("light(on)")).unwrap();
        kb.dispose();
        kb.dispose();
        assert!(kb.is_disposed());
        assert!(matches!(
            kb.contents(BaseKind::Percept),
            Err(KnowledgeBaseError::Disposed)
        ));
    }

    #[test]
    fn test_factory_rejects_other_languages() {
        let factory = MemoryKnowledgeBaseFactory;
        let program = Program::new("p").with_language("swiprolog");
        let err = match factory.create(&program) {
            Err(e) => e,
            Ok(_) => panic!("expected unsupported language"),
        };
        assert!(matches!(
            err,
            InitializationError::UnsupportedLanguage { ref requested, .. } if requested == "swiprolog"
        ));
        assert!(factory.create(&Program::new("p")).is_ok());
    }
}
