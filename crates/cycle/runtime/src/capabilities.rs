//! Capabilities an agent uses to reach the world outside its mental state

use async_trait::async_trait;
use cycle_types::{AgentId, EnvAction, EnvironmentError, Message, MessagingError, Percept};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Inbound and outbound messages of one agent
#[async_trait]
pub trait MessagingCapability: Send + Sync {
    fn agent(&self) -> &AgentId;

    /// Destructive read of every pending inbound message.
    async fn drain_all_messages(&self) -> Result<BTreeSet<Message>, MessagingError>;

    /// Deliver `message` to each of its receivers.
    async fn post(&self, message: &Message) -> Result<(), MessagingError>;

    /// Resolves when new inbound messages may be pending.
    ///
    /// Transports that cannot signal never resolve; sleeping agents then
    /// fall back to polling.
    async fn input_available(&self) {
        std::future::pending::<()>().await
    }

    /// Discard pending inbound messages.
    fn reset(&self);

    fn dispose(&self);
}

/// Percepts and actions in the agent's environment
#[async_trait]
pub trait EnvironmentCapability: Send + Sync {
    async fn get_percepts(&self) -> Result<BTreeSet<Percept>, EnvironmentError>;

    async fn perform_action(&self, action: &EnvAction) -> Result<(), EnvironmentError>;

    async fn get_reward(&self) -> Result<Option<f64>, EnvironmentError> {
        Ok(None)
    }

    /// Resolves when the percepts may have changed; see
    /// [`MessagingCapability::input_available`].
    async fn percepts_changed(&self) {
        std::future::pending::<()>().await
    }
}

/// Sink for the `log` action
pub trait LoggingCapability: Send + Sync {
    fn log(&self, agent: &AgentId, message: &str);
}

/// Forwards agent log actions to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl LoggingCapability for TracingLogger {
    fn log(&self, agent: &AgentId, message: &str) {
        tracing::info!(target: "cycle::agent_log", agent = %agent, "{}", message);
    }
}

/// Environment of an agent that is not connected to one
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnvironment;

#[async_trait]
impl EnvironmentCapability for NoEnvironment {
    async fn get_percepts(&self) -> Result<BTreeSet<Percept>, EnvironmentError> {
        Ok(BTreeSet::new())
    }

    async fn perform_action(&self, action: &EnvAction) -> Result<(), EnvironmentError> {
        tracing::debug!(action = %action, "No environment; action ignored");
        Ok(())
    }
}

/// Everything a reasoning cycle needs besides its program and mental state
#[derive(Clone)]
pub struct Capabilities {
    pub messaging: Arc<dyn MessagingCapability>,
    pub environment: Arc<dyn EnvironmentCapability>,
    pub logging: Arc<dyn LoggingCapability>,
}

impl Capabilities {
    pub fn new(
        messaging: Arc<dyn MessagingCapability>,
        environment: Arc<dyn EnvironmentCapability>,
    ) -> Self {
        Self {
            messaging,
            environment,
            logging: Arc::new(TracingLogger),
        }
    }

    pub fn with_logging(mut self, logging: Arc<dyn LoggingCapability>) -> Self {
        self.logging = logging;
        self
    }
}
