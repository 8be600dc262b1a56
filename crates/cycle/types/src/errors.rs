//! Error types for the reasoning cycle runtime

use crate::ids::AgentId;
use crate::program::BaseKind;
use thiserror::Error;

/// Errors raised while parsing the textual form of a formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaParseError {
    #[error("Unexpected end of input while parsing '{0}'")]
    UnexpectedEnd(String),

    #[error("Unexpected character '{found}' at offset {offset} in '{input}'")]
    UnexpectedChar {
        input: String,
        found: char,
        offset: usize,
    },

    #[error("A formula must start with a constant, found '{0}'")]
    NotAFormula(String),
}

/// Knowledge representation failures
#[derive(Debug, Clone, Error)]
pub enum KnowledgeBaseError {
    #[error("Formula is not ground: {0}")]
    NonGround(String),

    #[error("Knowledge base already disposed")]
    Disposed,

    #[error("No mental model for agent {0}")]
    UnknownModel(AgentId),

    #[error("Base {0} is not available in a mental model of another agent")]
    UnsupportedBase(BaseKind),

    #[error("Parse error: {0}")]
    Parse(#[from] FormulaParseError),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Failure to construct the mental state of an agent
#[derive(Debug, Clone, Error)]
pub enum InitializationError {
    #[error("Knowledge representation language '{requested}' is not supported (available: {available})")]
    UnsupportedLanguage { requested: String, available: String },

    #[error("Initial mental state is invalid: {0}")]
    InvalidInitialState(#[from] KnowledgeBaseError),

    #[error("Program references unknown module '{0}'")]
    UnknownModule(String),
}

/// Message transport failures
#[derive(Debug, Clone, Error)]
pub enum MessagingError {
    #[error("Unknown receiver: {0}")]
    UnknownReceiver(AgentId),

    #[error("Agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("Inbox of {0} is closed")]
    InboxClosed(AgentId),

    #[error("Messaging capability of {0} has been disposed")]
    Disposed(AgentId),

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Environment bridge failures
#[derive(Debug, Clone, Error)]
pub enum EnvironmentError {
    #[error("Failed to retrieve percepts: {0}")]
    PerceptRetrieval(String),

    #[error("Failed to perform action {action}: {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Environment is not connected")]
    NotConnected,
}

/// Failure to resolve the receivers of a send action
#[derive(Debug, Clone, Error)]
pub enum ReceiverResolutionError {
    #[error("Selector variable {0} does not occur in its condition")]
    UndefinedVariable(String),

    #[error("Selector variable {variable} is bound to non-agent term {term}")]
    NotAnAgent { variable: String, term: String },

    #[error("Condition evaluation failed: {0}")]
    Evaluation(#[from] KnowledgeBaseError),
}

/// Errors unwinding out of a reasoning cycle, module execution or action
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("Agent {0} was killed")]
    Killed(AgentId),

    #[error("Cycle requested for terminated agent {0}")]
    Terminated(AgentId),

    #[error("Unsupported message mood: {0}")]
    UnsupportedMood(String),

    #[error("Processing of message with content {content} failed: {reason}")]
    MessageProcessing { content: String, reason: String },

    #[error("Module stack underflow while exiting {0}")]
    StackUnderflow(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(#[from] KnowledgeBaseError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Receiver resolution error: {0}")]
    ReceiverResolution(#[from] ReceiverResolutionError),

    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),
}

impl CycleError {
    /// Whether the error is a caller bug rather than a runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CycleError::Terminated(_) | CycleError::StackUnderflow(_))
    }
}
