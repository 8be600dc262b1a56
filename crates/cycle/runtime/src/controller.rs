//! Agent controller: drives one agent's reasoning cycles on its own task

use crate::executor::ModuleExecutor;
use crate::run_state::RunState;
use cycle_mental::MentalSnapshot;
use cycle_types::{AgentId, BaseKind, CycleError, ExitCondition, Percept, Substitution};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Stops an agent from any task
///
/// Killing is observed at the start of every cycle, between module
/// iterations and at every sleep poll.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    sender: Arc<watch::Sender<bool>>,
    disposed: Arc<AtomicBool>,
}

impl KillSwitch {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                sender: Arc::new(sender),
                disposed: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    pub fn kill(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_killed(&self) -> bool {
        *self.sender.borrow()
    }

    /// Whether the agent's resources have been released.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// `true` only for the first caller.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }
}

/// How an agent's run ended
#[derive(Debug)]
pub struct AgentOutcome {
    pub agent: AgentId,
    pub rounds: u64,
    pub result: Result<(), CycleError>,
    /// Own bases at the end of the run
    pub snapshot: Option<MentalSnapshot>,
}

impl AgentOutcome {
    /// Finished normally or was killed on request.
    pub fn is_clean(&self) -> bool {
        matches!(self.result, Ok(()) | Err(CycleError::Killed(_)))
    }
}

pub struct AgentController {
    run_state: RunState,
    initial_percepts: Option<BTreeSet<Percept>>,
}

impl AgentController {
    pub fn new(run_state: RunState) -> Self {
        Self {
            run_state,
            initial_percepts: None,
        }
    }

    /// Percepts to use in the first round instead of the environment's.
    pub fn with_initial_percepts(mut self, percepts: BTreeSet<Percept>) -> Self {
        self.initial_percepts = Some(percepts);
        self
    }

    pub fn agent(&self) -> &AgentId {
        self.run_state.agent()
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.run_state.kill_switch()
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn run_state_mut(&mut self) -> &mut RunState {
        &mut self.run_state
    }

    /// Run until the main module exits, `max_rounds` is reached, the agent
    /// is killed or a fatal error occurs. Disposes the agent exactly once.
    pub async fn run(mut self) -> AgentOutcome {
        let result = self.run_loop().await;
        let agent = self.run_state.agent().clone();
        let rounds = self.run_state.round();

        match &result {
            Ok(()) => info!(agent = %agent, rounds, "Agent finished"),
            Err(CycleError::Killed(_)) => info!(agent = %agent, rounds, "Agent killed"),
            Err(e) => error!(agent = %agent, rounds, error = %e, "Agent terminated"),
        }

        let snapshot = self.run_state.mental_state().snapshot().ok();
        self.run_state.dispose();

        AgentOutcome {
            agent,
            rounds,
            result,
            snapshot,
        }
    }

    async fn run_loop(&mut self) -> Result<(), CycleError> {
        let max_rounds = self.run_state.config().max_rounds;
        let mut action_performed = false;
        let mut initial = self.initial_percepts.take();

        loop {
            if max_rounds.is_some_and(|max| self.run_state.round() >= max) {
                return Ok(());
            }

            self.run_state
                .start_cycle(action_performed, initial.take())
                .await?;

            let main = self.run_state.main_module();
            action_performed =
                ModuleExecutor::execute_fully(&mut self.run_state, main.clone(), Substitution::empty())
                    .await?;

            let exit = match main.exit_condition() {
                ExitCondition::Always => true,
                ExitCondition::Never => false,
                ExitCondition::NoAction => !action_performed,
                ExitCondition::NoGoals => self
                    .run_state
                    .mental_state()
                    .contents(BaseKind::Goal, None)?
                    .is_empty(),
            };
            if exit {
                return Ok(());
            }

            tokio::task::yield_now().await;
        }
    }
}
