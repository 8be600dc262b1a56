//! Identity types for the reasoning cycle runtime

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique, immutable name of an agent.
///
/// The name doubles as the routing key for messages, so two agents in one
/// session never share an `AgentId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generate an anonymous agent name (`agent-<uuid>`).
    pub fn generate() -> Self {
        Self(format!("agent-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
