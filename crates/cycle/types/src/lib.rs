//! Cycle Types
//!
//! Shared vocabulary of the reasoning cycle runtime: agent identity,
//! formulas and substitutions, percepts and messages, the module/rule/action
//! tree of an agent program, and the error taxonomy used across crates.

pub mod errors;
pub mod ids;
pub mod message;
pub mod program;
pub mod term;

pub use errors::{
    CycleError, EnvironmentError, FormulaParseError, InitializationError, KnowledgeBaseError,
    MessagingError, ReceiverResolutionError,
};
pub use ids::AgentId;
pub use message::{Message, Mood, Percept};
pub use program::{
    Action, BaseKind, EnvAction, ExitCondition, LiteralKind, MentalLiteral, Module, ModuleKind,
    ModuleRef, Program, Rule, RuleEvaluationOrder, RuleSet, SendAction, Selector,
};
pub use term::{Formula, Substitution, Term};
