//! Cycle Runtime
//!
//! Drives agents through the reasoning cycle: percept and message intake,
//! sleep/wake, init/event/main module execution, send-action dispatch, and
//! the controllers and sessions that run many agents side by side.
//!
//! ```no_run
//! use cycle_mental::MemoryKnowledgeBaseFactory;
//! use cycle_runtime::{NoEnvironment, RuntimeConfig, Session};
//! use cycle_types::{AgentId, Program};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), cycle_types::CycleError> {
//! let program = Arc::new(Program::new("hello"));
//! let mut session = Session::new(RuntimeConfig::testing(), Arc::new(MemoryKnowledgeBaseFactory));
//! session.add_agent(AgentId::new("alice"), program, Arc::new(NoEnvironment))?;
//! let outcomes = session.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod evaluator;
pub mod executor;
pub mod module_stack;
pub mod registry;
pub mod run_state;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use capabilities::{
    Capabilities, EnvironmentCapability, LoggingCapability, MessagingCapability, NoEnvironment,
    TracingLogger,
};
pub use config::{interactive_runtime_config, RuntimeConfig};
pub use controller::{AgentController, AgentOutcome, KillSwitch};
pub use dispatch::{dispatch_send, resolve_receivers};
pub use evaluator::{evaluate_condition, Solution};
pub use executor::{ActionExecutor, ModuleExecutor};
pub use module_stack::{ModuleStack, RunContext};
pub use registry::AgentRegistry;
pub use run_state::{CyclePhase, RunState};
pub use session::Session;
pub use telemetry::CycleTelemetry;
pub use transport::{MessageRouter, RouterMessaging};
