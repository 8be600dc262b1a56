//! Knowledge-representation seam
//!
//! The reasoning cycle never evaluates formulas itself. Every belief, goal,
//! percept and mailbox operation goes through a [`KnowledgeBase`] created by
//! the [`KnowledgeBaseFactory`] registered for the program's declared
//! language.

use cycle_types::{BaseKind, Formula, InitializationError, KnowledgeBaseError, Program, Substitution};

/// The four bases of one (own or modelled) mental state.
pub trait KnowledgeBase: Send + Sync {
    /// Insert a ground formula; `Ok(false)` if it was already present.
    fn insert(&mut self, kind: BaseKind, formula: &Formula) -> Result<bool, KnowledgeBaseError>;

    /// Delete a formula; `Ok(false)` if it was absent.
    fn delete(&mut self, kind: BaseKind, formula: &Formula) -> Result<bool, KnowledgeBaseError>;

    /// All substitutions extending `subst` under which `query` holds in `kind`.
    fn query(
        &self,
        kind: BaseKind,
        query: &Formula,
        subst: &Substitution,
    ) -> Result<Vec<Substitution>, KnowledgeBaseError>;

    /// Current contents of a base.
    fn contents(&self, kind: BaseKind) -> Result<Vec<Formula>, KnowledgeBaseError>;

    /// Whether `goal` is entailed by the belief base.
    fn goal_holds(&self, goal: &Formula) -> Result<bool, KnowledgeBaseError> {
        Ok(!self
            .query(BaseKind::Belief, goal, &Substitution::empty())?
            .is_empty())
    }

    /// Release the underlying storage. Idempotent.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Creates knowledge bases for one representation language.
pub trait KnowledgeBaseFactory: Send + Sync {
    fn language(&self) -> &str;

    /// A fresh, empty knowledge base for `program`.
    ///
    /// Fails with [`InitializationError::UnsupportedLanguage`] when the
    /// program declares a language this factory does not implement.
    fn create(&self, program: &Program) -> Result<Box<dyn KnowledgeBase>, InitializationError>;

    fn check_language(&self, program: &Program) -> Result<(), InitializationError> {
        if program.kr_language == self.language() {
            Ok(())
        } else {
            Err(InitializationError::UnsupportedLanguage {
                requested: program.kr_language.clone(),
                available: self.language().to_string(),
            })
        }
    }
}
