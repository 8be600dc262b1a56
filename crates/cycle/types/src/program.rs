//! Agent programs: modules, rules, mental literals and actions
//!
//! Programs are produced by an external parser and are immutable once
//! loaded; modules are shared read-only through `Arc` across all cycles of
//! an agent and across agents running the same program.

use crate::ids::AgentId;
use crate::message::Mood;
use crate::term::Formula;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The four knowledge bases of a mental state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseKind {
    Belief,
    Goal,
    Percept,
    Mailbox,
}

impl BaseKind {
    pub const ALL: [BaseKind; 4] = [
        BaseKind::Belief,
        BaseKind::Goal,
        BaseKind::Percept,
        BaseKind::Mailbox,
    ];
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaseKind::Belief => "BELIEF",
            BaseKind::Goal => "GOAL",
            BaseKind::Percept => "PERCEPT",
            BaseKind::Mailbox => "MAILBOX",
        };
        write!(f, "{}", name)
    }
}

/// Module type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Init,
    Event,
    Main,
    Anonymous,
    User,
}

impl ModuleKind {
    /// One of the three built-in top-level phases.
    pub fn is_top_level(&self) -> bool {
        matches!(self, ModuleKind::Init | ModuleKind::Event | ModuleKind::Main)
    }

    pub fn default_exit(&self) -> ExitCondition {
        match self {
            ModuleKind::Main => ExitCondition::Never,
            _ => ExitCondition::Always,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::Init => "init",
            ModuleKind::Event => "event",
            ModuleKind::Main => "main",
            ModuleKind::Anonymous => "anonymous",
            ModuleKind::User => "user",
        };
        write!(f, "{}", name)
    }
}

/// When a module stops re-evaluating its rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCondition {
    /// After a single pass over the rules
    Always,
    /// Once the goal base is empty
    NoGoals,
    /// Once a pass performed no action
    NoAction,
    /// Never on its own; the caller decides
    Never,
}

/// Rule evaluation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEvaluationOrder {
    /// First applicable rule in order
    Linear,
    /// Every applicable rule, in order
    LinearAll,
    /// First applicable rule in a random order
    Random,
    /// Every applicable rule, in a random order
    RandomAll,
}

impl RuleEvaluationOrder {
    pub fn fires_all(&self) -> bool {
        matches!(self, RuleEvaluationOrder::LinearAll | RuleEvaluationOrder::RandomAll)
    }

    pub fn is_random(&self) -> bool {
        matches!(self, RuleEvaluationOrder::Random | RuleEvaluationOrder::RandomAll)
    }
}

/// Which base (and how) a literal in a rule condition is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    /// `bel(F)`
    Belief,
    /// `goal(F)`
    Goal,
    /// `a-goal(F)`: a goal not yet believed
    AchievementGoal,
    /// `goal-a(F)`: a goal that is also believed
    GoalAchieved,
    /// `percept(F)`
    Percept,
    /// `received(..)` / `sent(..)` facts in the mailbox
    Mailbox,
    /// Always satisfied
    True,
}

impl LiteralKind {
    pub fn is_goal_literal(&self) -> bool {
        matches!(self, LiteralKind::Goal | LiteralKind::AchievementGoal | LiteralKind::GoalAchieved)
    }
}

/// A (possibly negated) mental literal of a rule condition
///
/// `agent` selects the mental model the literal is evaluated against; `None`
/// is the agent's own mental state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentalLiteral {
    pub kind: LiteralKind,
    #[serde(default)]
    pub negated: bool,
    pub formula: Formula,
    #[serde(default)]
    pub agent: Option<AgentId>,
}

impl MentalLiteral {
    pub fn new(kind: LiteralKind, formula: Formula) -> Self {
        Self {
            kind,
            negated: false,
            formula,
            agent: None,
        }
    }

    pub fn bel(formula: Formula) -> Self {
        Self::new(LiteralKind::Belief, formula)
    }

    pub fn goal(formula: Formula) -> Self {
        Self::new(LiteralKind::Goal, formula)
    }

    pub fn a_goal(formula: Formula) -> Self {
        Self::new(LiteralKind::AchievementGoal, formula)
    }

    pub fn percept(formula: Formula) -> Self {
        Self::new(LiteralKind::Percept, formula)
    }

    pub fn truth() -> Self {
        Self::new(LiteralKind::True, Formula::prop("true"))
    }

    /// Evaluate against the model held of `agent`.
    pub fn about(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Receiver selector of a send action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Every known agent, including the sender
    All,
    /// Every known agent except the sender
    AllOther,
    /// The sender itself
    This,
    /// Explicitly named agents
    Agents(Vec<AgentId>),
    /// Agents bound to `variable` by the solutions of `condition`
    Condition {
        variable: String,
        condition: Vec<MentalLiteral>,
    },
}

/// A send action; content may contain variables bound by the rule condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAction {
    pub selector: Selector,
    pub mood: Mood,
    pub content: Formula,
}

impl SendAction {
    pub fn new(selector: Selector, mood: Mood, content: Formula) -> Self {
        Self {
            selector,
            mood,
            content,
        }
    }
}

/// An action forwarded to the environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvAction {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Formula>,
}

impl fmt::Display for EnvAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", params.join(", "))?;
        }
        Ok(())
    }
}

/// Module call target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleRef {
    Named(String),
    Inline(Arc<Module>),
}

/// Actions of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert(Formula),
    Delete(Formula),
    Adopt(Formula),
    Drop(Formula),
    Send(SendAction),
    Log(String),
    Call(ModuleRef),
    UserSpec(EnvAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Insert(_) => "insert",
            Action::Delete(_) => "delete",
            Action::Adopt(_) => "adopt",
            Action::Drop(_) => "drop",
            Action::Send(_) => "send",
            Action::Log(_) => "log",
            Action::Call(_) => "call",
            Action::UserSpec(_) => "user-spec",
        }
    }
}

/// `if condition then actions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub condition: Vec<MentalLiteral>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(condition: Vec<MentalLiteral>, actions: Vec<Action>) -> Self {
        Self { condition, actions }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub order: RuleEvaluationOrder,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(order: RuleEvaluationOrder, rules: Vec<Rule>) -> Self {
        Self { order, rules }
    }

    pub fn empty() -> Self {
        Self::new(RuleEvaluationOrder::Linear, Vec::new())
    }
}

/// A named or anonymous program unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ModuleKind,
    pub rules: RuleSet,
    #[serde(default)]
    pub exit: Option<ExitCondition>,
}

impl Module {
    pub fn new(name: impl Into<String>, kind: ModuleKind, rules: RuleSet) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            rules,
            exit: None,
        }
    }

    /// An inline module that executes without being tracked on the stack.
    pub fn anonymous(rules: RuleSet) -> Self {
        Self {
            name: None,
            kind: ModuleKind::Anonymous,
            rules,
            exit: None,
        }
    }

    /// Empty MAIN module used when a program does not declare one.
    pub fn placeholder_main() -> Self {
        Self::new("main", ModuleKind::Main, RuleSet::empty())
    }

    pub fn with_exit(mut self, exit: ExitCondition) -> Self {
        self.exit = Some(exit);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == ModuleKind::Anonymous
    }

    pub fn exit_condition(&self) -> ExitCondition {
        self.exit.unwrap_or_else(|| self.kind.default_exit())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

fn default_language() -> String {
    "memory".to_string()
}

/// A loaded agent program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    #[serde(default = "default_language")]
    pub kr_language: String,
    #[serde(default)]
    pub uses_mental_models: bool,
    /// Static knowledge, inserted into the belief base at start
    #[serde(default)]
    pub knowledge: Vec<Formula>,
    #[serde(default)]
    pub initial_beliefs: Vec<Formula>,
    #[serde(default)]
    pub initial_goals: Vec<Formula>,
    #[serde(default)]
    pub modules: Vec<Arc<Module>>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kr_language: default_language(),
            uses_mental_models: false,
            knowledge: Vec::new(),
            initial_beliefs: Vec::new(),
            initial_goals: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.kr_language = language.into();
        self
    }

    pub fn with_mental_models(mut self, enabled: bool) -> Self {
        self.uses_mental_models = enabled;
        self
    }

    pub fn with_beliefs(mut self, beliefs: impl IntoIterator<Item = Formula>) -> Self {
        self.initial_beliefs.extend(beliefs);
        self
    }

    pub fn with_goals(mut self, goals: impl IntoIterator<Item = Formula>) -> Self {
        self.initial_goals.extend(goals);
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn module_of_kind(&self, kind: ModuleKind) -> Option<Arc<Module>> {
        self.modules.iter().find(|m| m.kind == kind).cloned()
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .cloned()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
