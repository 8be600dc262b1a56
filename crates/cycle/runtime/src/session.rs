//! Multi-agent sessions
//!
//! A session wires several agents to one message router, runs each on its
//! own task and collects their outcomes. A fatal error in one agent ends
//! only that agent.

use crate::capabilities::{Capabilities, EnvironmentCapability, LoggingCapability, MessagingCapability};
use crate::config::RuntimeConfig;
use crate::controller::{AgentController, AgentOutcome, KillSwitch};
use crate::registry::AgentRegistry;
use crate::run_state::RunState;
use crate::telemetry::CycleTelemetry;
use crate::transport::MessageRouter;
use cycle_mental::KnowledgeBaseFactory;
use cycle_types::{AgentId, CycleError, Program};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Session {
    config: RuntimeConfig,
    router: MessageRouter,
    factory: Arc<dyn KnowledgeBaseFactory>,
    telemetry: Arc<CycleTelemetry>,
    registry: Arc<AgentRegistry>,
    logging: Option<Arc<dyn LoggingCapability>>,
    pending: Vec<AgentController>,
    running: Vec<(AgentId, JoinHandle<AgentOutcome>)>,
}

impl Session {
    pub fn new(config: RuntimeConfig, factory: Arc<dyn KnowledgeBaseFactory>) -> Self {
        Self {
            router: MessageRouter::new(&config.messaging),
            telemetry: Arc::new(CycleTelemetry::new(&config.telemetry)),
            registry: Arc::new(AgentRegistry::new()),
            logging: None,
            pending: Vec::new(),
            running: Vec::new(),
            factory,
            config,
        }
    }

    /// Route every agent's `log` actions to `logging`.
    pub fn with_logging(mut self, logging: Arc<dyn LoggingCapability>) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn telemetry(&self) -> &Arc<CycleTelemetry> {
        &self.telemetry
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Create an agent; it starts running on [`Session::start`].
    pub fn add_agent(
        &mut self,
        agent: AgentId,
        program: Arc<Program>,
        environment: Arc<dyn EnvironmentCapability>,
    ) -> Result<KillSwitch, CycleError> {
        let messaging = Arc::new(self.router.register(agent.clone())?);
        let mut capabilities = Capabilities::new(messaging.clone(), environment);
        if let Some(logging) = &self.logging {
            capabilities = capabilities.with_logging(logging.clone());
        }

        let run_state = match RunState::new(
            agent.clone(),
            program.clone(),
            capabilities,
            self.factory.clone(),
            &self.config,
        ) {
            Ok(run_state) => run_state.with_telemetry(self.telemetry.clone()),
            Err(e) => {
                messaging.dispose();
                return Err(e.into());
            }
        };

        let kill_switch = run_state.kill_switch();
        self.registry
            .register(agent, program.name.clone(), kill_switch.clone());
        self.pending.push(AgentController::new(run_state));
        Ok(kill_switch)
    }

    /// Spawn every added agent; all agents know each other.
    pub fn start(&mut self) -> Result<(), CycleError> {
        let agents = self.router.agents();
        let mut controllers = std::mem::take(&mut self.pending);
        for controller in &mut controllers {
            for other in &agents {
                controller
                    .run_state_mut()
                    .mental_state_mut()
                    .add_agent_model(other.clone())?;
            }
        }

        info!(agents = controllers.len(), "Session starting");
        for controller in controllers {
            let agent = controller.agent().clone();
            let handle = tokio::spawn(controller.run());
            self.running.push((agent, handle));
        }
        Ok(())
    }

    pub fn kill(&self, agent: &AgentId) -> bool {
        self.registry.kill(agent)
    }

    pub fn kill_all(&self) {
        self.registry.kill_all();
    }

    /// Wait for every running agent and collect the outcomes.
    ///
    /// Agents stay in the registry until their task ends, so a kill through
    /// a cloned registry still reaches them while this is pending.
    pub async fn join(mut self) -> Vec<AgentOutcome> {
        let mut outcomes = Vec::with_capacity(self.running.len());
        for (agent, handle) in self.running.drain(..) {
            let joined = handle.await;
            self.registry.remove(&agent);
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(agent = %agent, error = %e, "Agent task failed");
                    outcomes.push(AgentOutcome {
                        agent: agent.clone(),
                        rounds: 0,
                        result: Err(CycleError::Terminated(agent)),
                        snapshot: None,
                    });
                }
            }
        }
        info!(agents = outcomes.len(), "Session finished");
        outcomes
    }

    /// Start all agents and wait for them to finish.
    pub async fn run(mut self) -> Result<Vec<AgentOutcome>, CycleError> {
        self.start()?;
        Ok(self.join().await)
    }
}
