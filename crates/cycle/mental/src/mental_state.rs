//! Mental state facade
//!
//! Owns the agent's own belief, goal, percept and mailbox bases, plus one
//! belief/goal model per other agent it knows about. All mutation goes
//! through this type so that change events are published consistently and
//! goal achievement can be re-checked after belief updates.

use crate::events::{MentalChange, MentalEvent, MentalEventBus};
use crate::knowledge::{KnowledgeBase, KnowledgeBaseFactory};
use crate::unify::matches;
use cycle_types::{
    AgentId, BaseKind, Formula, InitializationError, KnowledgeBaseError, LiteralKind,
    MentalLiteral, Message, Percept, Program, Substitution,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

type KbResult<T> = Result<T, KnowledgeBaseError>;

/// Serializable view of the agent's own bases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentalSnapshot {
    pub agent: AgentId,
    pub beliefs: Vec<Formula>,
    pub goals: Vec<Formula>,
    pub percepts: Vec<Formula>,
    pub mailbox: Vec<Formula>,
}

pub struct MentalState {
    agent: AgentId,
    program: Arc<Program>,
    factory: Arc<dyn KnowledgeBaseFactory>,
    own: Box<dyn KnowledgeBase>,
    models: BTreeMap<AgentId, Box<dyn KnowledgeBase>>,
    known_agents: BTreeSet<AgentId>,
    events: MentalEventBus,
    disposed: bool,
}

impl MentalState {
    /// Build the initial mental state of `agent` from its program.
    ///
    /// Static knowledge and initial beliefs go into the belief base; initial
    /// goals that are already believed are not adopted.
    pub fn new(
        agent: AgentId,
        program: Arc<Program>,
        factory: Arc<dyn KnowledgeBaseFactory>,
        events: MentalEventBus,
    ) -> Result<Self, InitializationError> {
        let own = initial_base(&program, factory.as_ref())?;
        let mut known_agents = BTreeSet::new();
        known_agents.insert(agent.clone());

        debug!(
            agent = %agent,
            program = %program.name,
            language = factory.language(),
            "Mental state created"
        );

        Ok(Self {
            agent,
            program,
            factory,
            own,
            models: BTreeMap::new(),
            known_agents,
            events,
            disposed: false,
        })
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn uses_mental_models(&self) -> bool {
        self.program.uses_mental_models
    }

    pub fn known_agents(&self) -> &BTreeSet<AgentId> {
        &self.known_agents
    }

    pub fn knows(&self, agent: &AgentId) -> bool {
        self.known_agents.contains(agent)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn events(&self) -> &MentalEventBus {
        &self.events
    }

    /// `None` for the own model, the other agent otherwise.
    fn model_key<'a>(&self, source: Option<&'a AgentId>) -> Option<&'a AgentId> {
        source.filter(|a| **a != self.agent)
    }

    fn base(&self, source: Option<&AgentId>) -> KbResult<&dyn KnowledgeBase> {
        if self.disposed {
            return Err(KnowledgeBaseError::Disposed);
        }
        match self.model_key(source) {
            None => Ok(self.own.as_ref()),
            Some(agent) => self
                .models
                .get(agent)
                .map(|kb| kb.as_ref())
                .ok_or_else(|| KnowledgeBaseError::UnknownModel(agent.clone())),
        }
    }

    fn base_mut(&mut self, source: Option<&AgentId>) -> KbResult<&mut dyn KnowledgeBase> {
        if self.disposed {
            return Err(KnowledgeBaseError::Disposed);
        }
        match self.model_key(source).cloned() {
            None => Ok(self.own.as_mut()),
            Some(agent) => match self.models.get_mut(&agent) {
                Some(kb) => Ok(kb.as_mut()),
                None => Err(KnowledgeBaseError::UnknownModel(agent)),
            },
        }
    }

    /// Models of other agents only hold beliefs and goals.
    fn check_base(&self, kind: BaseKind, source: Option<&AgentId>) -> KbResult<()> {
        if self.model_key(source).is_some() && !matches!(kind, BaseKind::Belief | BaseKind::Goal) {
            return Err(KnowledgeBaseError::UnsupportedBase(kind));
        }
        Ok(())
    }

    fn publish(&self, source: Option<&AgentId>, change: MentalChange) {
        self.events.publish(MentalEvent {
            agent: self.agent.clone(),
            model: self.model_key(source).cloned(),
            change,
        });
    }

    pub fn insert(
        &mut self,
        kind: BaseKind,
        formula: &Formula,
        source: Option<&AgentId>,
    ) -> KbResult<bool> {
        self.check_base(kind, source)?;
        let inserted = self.base_mut(source)?.insert(kind, formula)?;
        if inserted {
            trace!(agent = %self.agent, base = %kind, formula = %formula, "Inserted");
            self.publish(
                source,
                MentalChange::Inserted {
                    base: kind,
                    formula: formula.clone(),
                },
            );
        }
        Ok(inserted)
    }

    pub fn delete(
        &mut self,
        kind: BaseKind,
        formula: &Formula,
        source: Option<&AgentId>,
    ) -> KbResult<bool> {
        self.check_base(kind, source)?;
        let removed = self.base_mut(source)?.delete(kind, formula)?;
        if removed {
            trace!(agent = %self.agent, base = %kind, formula = %formula, "Deleted");
            self.publish(
                source,
                MentalChange::Deleted {
                    base: kind,
                    formula: formula.clone(),
                },
            );
        }
        Ok(removed)
    }

    /// Adopt `goal` unless it is already believed.
    pub fn adopt(&mut self, goal: &Formula, source: Option<&AgentId>) -> KbResult<bool> {
        if self.base(source)?.goal_holds(goal)? {
            return Ok(false);
        }
        self.insert(BaseKind::Goal, goal, source)
    }

    /// Remove every goal matching `pattern`.
    pub fn drop_goal(&mut self, pattern: &Formula, source: Option<&AgentId>) -> KbResult<Vec<Formula>> {
        let dropped: Vec<Formula> = self
            .base(source)?
            .contents(BaseKind::Goal)?
            .into_iter()
            .filter(|goal| matches(pattern, goal, &Substitution::empty()))
            .collect();
        for goal in &dropped {
            self.delete(BaseKind::Goal, goal, source)?;
        }
        Ok(dropped)
    }

    /// Remove every goal of the addressed model that its beliefs now entail.
    ///
    /// Must follow any belief change that could achieve a goal.
    pub fn update_goal_state(&mut self, source: Option<&AgentId>) -> KbResult<Vec<Formula>> {
        let base = self.base(source)?;
        let mut achieved = Vec::new();
        for goal in base.contents(BaseKind::Goal)? {
            if base.goal_holds(&goal)? {
                achieved.push(goal);
            }
        }
        for goal in &achieved {
            self.base_mut(source)?.delete(BaseKind::Goal, goal)?;
            debug!(agent = %self.agent, goal = %goal, "Goal achieved");
            self.publish(source, MentalChange::GoalAchieved { goal: goal.clone() });
        }
        Ok(achieved)
    }

    /// Apply a percept delta as one batch; deletions go first.
    pub fn update_percepts(
        &mut self,
        add: &BTreeSet<Percept>,
        delete: &BTreeSet<Percept>,
    ) -> KbResult<()> {
        if add.is_empty() && delete.is_empty() {
            return Ok(());
        }
        for percept in delete {
            self.delete(BaseKind::Percept, percept.formula(), None)?;
        }
        for percept in add {
            self.insert(BaseKind::Percept, percept.formula(), None)?;
        }
        debug!(
            agent = %self.agent,
            added = add.len(),
            deleted = delete.len(),
            "Percepts updated"
        );
        Ok(())
    }

    /// Record a received or sent message in the own mailbox.
    pub fn record_message(&mut self, message: &Message, received: bool) -> KbResult<bool> {
        self.insert(BaseKind::Mailbox, &message.mailbox_formula(received), None)
    }

    pub fn query(
        &self,
        kind: BaseKind,
        formula: &Formula,
        subst: &Substitution,
        source: Option<&AgentId>,
    ) -> KbResult<Vec<Substitution>> {
        self.check_base(kind, source)?;
        self.base(source)?.query(kind, formula, subst)
    }

    /// Solutions of one mental literal; negation is negation as failure.
    pub fn query_literal(
        &self,
        literal: &MentalLiteral,
        subst: &Substitution,
    ) -> KbResult<Vec<Substitution>> {
        let source = literal.agent.as_ref();
        let answers = match literal.kind {
            LiteralKind::True => vec![subst.clone()],
            LiteralKind::Belief => self.query(BaseKind::Belief, &literal.formula, subst, source)?,
            LiteralKind::Goal => self.query(BaseKind::Goal, &literal.formula, subst, source)?,
            LiteralKind::Percept => self.query(BaseKind::Percept, &literal.formula, subst, source)?,
            LiteralKind::Mailbox => self.query(BaseKind::Mailbox, &literal.formula, subst, source)?,
            LiteralKind::AchievementGoal | LiteralKind::GoalAchieved => {
                let want_achieved = literal.kind == LiteralKind::GoalAchieved;
                let base = self.base(source)?;
                let mut answers = Vec::new();
                for answer in base.query(BaseKind::Goal, &literal.formula, subst)? {
                    if base.goal_holds(&literal.formula.apply(&answer))? == want_achieved {
                        answers.push(answer);
                    }
                }
                answers
            }
        };

        if !literal.negated {
            return Ok(answers);
        }
        if answers.is_empty() {
            Ok(vec![subst.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    pub fn contents(&self, kind: BaseKind, source: Option<&AgentId>) -> KbResult<Vec<Formula>> {
        self.check_base(kind, source)?;
        self.base(source)?.contents(kind)
    }

    pub fn snapshot(&self) -> KbResult<MentalSnapshot> {
        Ok(MentalSnapshot {
            agent: self.agent.clone(),
            beliefs: self.own.contents(BaseKind::Belief)?,
            goals: self.own.contents(BaseKind::Goal)?,
            percepts: self.own.contents(BaseKind::Percept)?,
            mailbox: self.own.contents(BaseKind::Mailbox)?,
        })
    }

    /// Start tracking `agent`; creates an empty model for it. Idempotent.
    pub fn add_agent_model(&mut self, agent: AgentId) -> Result<bool, InitializationError> {
        if self.disposed {
            return Err(KnowledgeBaseError::Disposed.into());
        }
        if agent == self.agent || self.models.contains_key(&agent) {
            self.known_agents.insert(agent);
            return Ok(false);
        }
        let model = self.factory.create(&self.program)?;
        debug!(agent = %self.agent, model = %agent, "Mental model added");
        self.models.insert(agent.clone(), model);
        self.known_agents.insert(agent);
        Ok(true)
    }

    /// Replace every base with a fresh one derived from the program.
    ///
    /// Known agents are kept; their models start out empty again.
    pub fn reset(&mut self) -> Result<(), InitializationError> {
        let own = initial_base(&self.program, self.factory.as_ref())?;
        let mut models = BTreeMap::new();
        for agent in self.models.keys() {
            models.insert(agent.clone(), self.factory.create(&self.program)?);
        }

        self.dispose_bases();
        self.own = own;
        self.models = models;
        self.disposed = false;

        info!(agent = %self.agent, "Mental state reset");
        Ok(())
    }

    /// Release all bases. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.dispose_bases();
        self.disposed = true;
        debug!(agent = %self.agent, "Mental state disposed");
    }

    fn dispose_bases(&mut self) {
        self.own.dispose();
        for model in self.models.values_mut() {
            model.dispose();
        }
    }
}

impl fmt::Debug for MentalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MentalState")
            .field("agent", &self.agent)
            .field("program", &self.program.name)
            .field("known_agents", &self.known_agents)
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn initial_base(
    program: &Program,
    factory: &dyn KnowledgeBaseFactory,
) -> Result<Box<dyn KnowledgeBase>, InitializationError> {
    let mut kb = factory.create(program)?;
    for belief in program.knowledge.iter().chain(program.initial_beliefs.iter()) {
        kb.insert(BaseKind::Belief, belief)?;
    }
    for goal in &program.initial_goals {
        if !kb.goal_holds(goal)? {
            kb.insert(BaseKind::Goal, goal)?;
        }
    }
    Ok(kb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKnowledgeBaseFactory;
    use cycle_types::Term;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    fn state(program: Program) -> MentalState {
        MentalState::new(
            AgentId::new("alice"),
            Arc::new(program),
            Arc::new(MemoryKnowledgeBaseFactory),
            MentalEventBus::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_state_skips_believed_goals() {
        let program = Program::new("p")
            .with_beliefs([f("at(home)")])
            .with_goals([f("at(home)"), f("at(shop)")]);
        let ms = state(program);
        assert_eq!(ms.contents(BaseKind::Goal, None).unwrap(), vec![f("at(shop)")]);
        assert!(ms.knows(&AgentId::new("alice")));
    }

    #[test]
    fn test_update_goal_state_removes_achieved_goals() {
        let mut ms = state(Program::new("p").with_goals([f("at(shop)"), f("rich")]));
        ms.insert(BaseKind::Belief, &f("at(shop)"), None).unwrap();
        let achieved = ms.update_goal_state(None).unwrap();
        assert_eq!(achieved, vec![f("at(shop)")]);
        assert_eq!(ms.contents(BaseKind::Goal, None).unwrap(), vec![f("rich")]);
    }

    #[test]
    fn test_achievement_goal_literal() {
        let mut ms = state(Program::new("p").with_goals([f("at(shop)"), f("at(bank)")]));
        ms.insert(BaseKind::Belief, &f("at(bank)"), None).unwrap();

        let lit = MentalLiteral::a_goal(f("at(X)"));
        let answers = ms.query_literal(&lit, &Substitution::empty()).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].resolve("X"), Some(Term::atom("shop")));

        let achieved = MentalLiteral::new(LiteralKind::GoalAchieved, f("at(X)"));
        let answers = ms.query_literal(&achieved, &Substitution::empty()).unwrap();
        assert_eq!(answers[0].resolve("X"), Some(Term::atom("bank")));
    }

    #[test]
    fn test_negated_literal_is_negation_as_failure() {
        let ms = state(Program::new("p").with_beliefs([f("at(home)")]));
        let lit = MentalLiteral::bel(f("at(shop)")).negate();
        assert_eq!(ms.query_literal(&lit, &Substitution::empty()).unwrap().len(), 1);
        let lit = MentalLiteral::bel(f("at(home)")).negate();
        assert!(ms.query_literal(&lit, &Substitution::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_models_of_other_agents() {
        let mut ms = state(Program::new("p").with_mental_models(true));
        let bob = AgentId::new("bob");
        assert!(matches!(
            ms.insert(BaseKind::Belief, &f("ok"), Some(&bob)),
            Err(KnowledgeBaseError::UnknownModel(_))
        ));

        assert!(ms.add_agent_model(bob.clone()).unwrap());
        assert!(!ms.add_agent_model(bob.clone()).unwrap());
        ms.insert(BaseKind::Belief, &f("ok"), Some(&bob)).unwrap();

        assert!(ms.contents(BaseKind::Belief, None).unwrap().is_empty());
        let lit = MentalLiteral::bel(f("ok")).about(bob.clone());
        assert_eq!(ms.query_literal(&lit, &Substitution::empty()).unwrap().len(), 1);
        assert!(matches!(
            ms.insert(BaseKind::Mailbox, &f("ok"), Some(&bob)),
            Err(KnowledgeBaseError::UnsupportedBase(BaseKind::Mailbox))
        ));
    }

    #[test]
    fn test_drop_goal_by_pattern() {
        let mut ms = state(Program::new("p").with_goals([f("at(shop)"), f("at(bank)"), f("rich")]));
        let dropped = ms.drop_goal(&f("at(_)"), None).unwrap();
        assert_eq!(dropped.len(), 2);
        assert_eq!(ms.contents(BaseKind::Goal, None).unwrap(), vec![f("rich")]);
    }

    #[test]
    fn test_reset_restores_program_state() {
        let mut ms = state(Program::new("p").with_beliefs([f("at(home)")]));
        ms.add_agent_model(AgentId::new("bob")).unwrap();
        ms.delete(BaseKind::Belief, &f("at(home)"), None).unwrap();
        ms.insert(BaseKind::Percept, &f("light(on)"), None).unwrap();
        ms.insert(BaseKind::Belief, &f("x"), Some(&AgentId::new("bob"))).unwrap();

        ms.reset().unwrap();
        let snapshot = ms.snapshot().unwrap();
        assert_eq!(snapshot.beliefs, vec![f("at(home)")]);
        assert!(snapshot.percepts.is_empty());
        assert!(ms
            .contents(BaseKind::Belief, Some(&AgentId::new("bob")))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut ms = state(Program::new("p"));
        ms.dispose();
        ms.dispose();
        assert!(ms.is_disposed());
        assert!(matches!(
            ms.insert(BaseKind::Belief, &f("ok"), None),
            Err(KnowledgeBaseError::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let mut ms = state(Program::new("p").with_goals([f("done")]));
        let mut rx = ms.events().subscribe();
        ms.insert(BaseKind::Belief, &f("done"), None).unwrap();
        ms.update_goal_state(None).unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.change, MentalChange::Inserted { base: BaseKind::Belief, .. }));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.change, MentalChange::GoalAchieved { goal: f("done") });
    }
}
