//! Reasoning cycle engine
//!
//! A [`RunState`] owns one agent's mental state, module stack and
//! capabilities, and advances the agent one round per [`RunState::start_cycle`]:
//!
//! 1. drain inbound messages and obtain percepts,
//! 2. sleep while nothing changed for two rounds and no action was taken,
//! 3. apply the percept delta and process messages, re-checking goals,
//! 4. run the init module in round one and the event module on events,
//! 5. remember this round's inputs for the next one.

use crate::capabilities::Capabilities;
use crate::config::{CycleConfig, RuntimeConfig};
use crate::controller::KillSwitch;
use crate::executor::ModuleExecutor;
use crate::module_stack::ModuleStack;
use crate::telemetry::CycleTelemetry;
use cycle_mental::{KnowledgeBaseFactory, MentalEvent, MentalEventBus, MentalState, PerceptDelta};
use cycle_types::{
    Action, AgentId, BaseKind, CycleError, EnvAction, Formula, InitializationError,
    KnowledgeBaseError, Message, Module, ModuleKind, ModuleRef, Mood, Percept, Program,
    Substitution,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle phase of a reasoning cycle engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePhase {
    Created,
    Cycling,
    Sleeping,
    Resetting,
    Terminated,
}

pub struct RunState {
    agent: AgentId,
    program: Arc<Program>,
    capabilities: Capabilities,
    mental_state: MentalState,
    init_module: Option<Arc<Module>>,
    event_module: Option<Arc<Module>>,
    main_module: Arc<Module>,
    module_stack: ModuleStack,
    focus_goal: Option<Formula>,
    round: u64,
    previous_percepts: BTreeSet<Percept>,
    previous_messages: BTreeSet<Message>,
    sleep_held_previous: bool,
    event: bool,
    phase: CyclePhase,
    config: CycleConfig,
    telemetry: Arc<CycleTelemetry>,
    kill_switch: KillSwitch,
    kill: watch::Receiver<bool>,
}

impl RunState {
    /// Create the engine and the initial mental state of `agent`.
    ///
    /// A program without a main module gets an empty one so the event
    /// module still runs every round.
    pub fn new(
        agent: AgentId,
        program: Arc<Program>,
        capabilities: Capabilities,
        kb_factory: Arc<dyn KnowledgeBaseFactory>,
        config: &RuntimeConfig,
    ) -> Result<Self, InitializationError> {
        validate_program(&program)?;

        let events = MentalEventBus::new(config.observer.channel_capacity);
        let mental_state = MentalState::new(agent.clone(), program.clone(), kb_factory, events)?;
        let main_module = program
            .module_of_kind(ModuleKind::Main)
            .unwrap_or_else(|| Arc::new(Module::placeholder_main()));
        let (kill_switch, kill) = KillSwitch::new();

        info!(agent = %agent, program = %program.name, "Agent created");

        Ok(Self {
            agent,
            init_module: program.module_of_kind(ModuleKind::Init),
            event_module: program.module_of_kind(ModuleKind::Event),
            main_module,
            program,
            capabilities,
            mental_state,
            module_stack: ModuleStack::new(),
            focus_goal: None,
            round: 0,
            previous_percepts: BTreeSet::new(),
            previous_messages: BTreeSet::new(),
            sleep_held_previous: false,
            event: false,
            phase: CyclePhase::Created,
            config: config.cycle.clone(),
            telemetry: Arc::new(CycleTelemetry::new(&config.telemetry)),
            kill_switch,
            kill,
        })
    }

    /// Share one telemetry instance between agents.
    pub fn with_telemetry(mut self, telemetry: Arc<CycleTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Advance one round.
    ///
    /// `initial_percepts`, when non-empty, replaces the environment's
    /// percepts for this round.
    pub async fn start_cycle(
        &mut self,
        action_performed: bool,
        initial_percepts: Option<BTreeSet<Percept>>,
    ) -> Result<(), CycleError> {
        if self.phase == CyclePhase::Terminated || self.kill_switch.is_disposed() {
            error!(agent = %self.agent, "Cycle requested after termination");
            return Err(CycleError::Terminated(self.agent.clone()));
        }
        self.check_killed()?;
        self.phase = CyclePhase::Cycling;

        let mut messages = self.drain_messages().await?;
        let mut percepts = match initial_percepts {
            Some(initial) if !initial.is_empty() => initial,
            _ => self.fetch_percepts().await,
        };

        self.event = !messages.is_empty() || !percepts.is_empty() || action_performed;
        let mut sleep_holds = messages == self.previous_messages
            && percepts == self.previous_percepts
            && !action_performed;

        if self.config.sleep_repeating_agent && self.sleep_held_previous && sleep_holds {
            let (woke_messages, woke_percepts) = self.sleep_until_input_changes().await?;
            messages = woke_messages;
            percepts = woke_percepts;
            self.event = !messages.is_empty() || !percepts.is_empty();
            sleep_holds = false;
        }

        self.round += 1;
        self.telemetry.round_started(&self.agent, self.round);
        debug!(
            agent = %self.agent,
            round = self.round,
            messages = messages.len(),
            percepts = percepts.len(),
            event = self.event,
            "Cycle started"
        );

        let delta = PerceptDelta::compute(&self.previous_percepts, &percepts);
        self.mental_state.update_percepts(&delta.add, &delta.delete)?;
        self.process_messages(&messages)?;

        if self.round == 1 {
            if let Some(init) = self.init_module.clone() {
                ModuleExecutor::execute_fully(self, init, Substitution::empty()).await?;
            }
        }
        if self.event {
            if let Some(event) = self.event_module.clone() {
                ModuleExecutor::execute_fully(self, event, Substitution::empty()).await?;
            }
        }

        self.event = false;
        self.previous_messages = messages;
        self.previous_percepts = percepts;
        self.sleep_held_previous = sleep_holds;
        Ok(())
    }

    async fn drain_messages(&mut self) -> Result<BTreeSet<Message>, CycleError> {
        match self.capabilities.messaging.drain_all_messages().await {
            Ok(messages) => Ok(messages),
            Err(e) => {
                error!(agent = %self.agent, error = %e, "Fatal messaging failure");
                self.phase = CyclePhase::Terminated;
                Err(e.into())
            }
        }
    }

    async fn fetch_percepts(&self) -> BTreeSet<Percept> {
        match self.capabilities.environment.get_percepts().await {
            Ok(percepts) => percepts,
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "Failed to get percepts");
                self.telemetry.percept_failure();
                BTreeSet::new()
            }
        }
    }

    /// Wait until messages or percepts differ from the previous round.
    async fn sleep_until_input_changes(
        &mut self,
    ) -> Result<(BTreeSet<Message>, BTreeSet<Percept>), CycleError> {
        self.phase = CyclePhase::Sleeping;
        self.telemetry.agent_slept(&self.agent);

        let messaging = self.capabilities.messaging.clone();
        let environment = self.capabilities.environment.clone();
        let poll_interval = self.config.sleep_poll_interval();
        let mut kill = self.kill.clone();

        loop {
            tokio::select! {
                _ = kill.changed() => {}
                _ = messaging.input_available() => {}
                _ = environment.percepts_changed() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }

            if *kill.borrow() {
                debug!(agent = %self.agent, "Killed while sleeping");
                return Err(CycleError::Killed(self.agent.clone()));
            }

            trace!(agent = %self.agent, "Sleep poll");
            let messages = self.drain_messages().await?;
            let percepts = self.fetch_percepts().await;
            if messages != self.previous_messages || percepts != self.previous_percepts {
                self.phase = CyclePhase::Cycling;
                self.telemetry.agent_woke(&self.agent);
                return Ok((messages, percepts));
            }
        }
    }

    fn process_messages(&mut self, messages: &BTreeSet<Message>) -> Result<(), CycleError> {
        if messages.is_empty() {
            return Ok(());
        }
        for message in messages {
            self.process_message_mental_model(message)?;
            self.mental_state.record_message(message, true)?;
        }
        self.update_goal_state(None)?;
        self.telemetry.messages_received(messages.len());
        debug!(agent = %self.agent, count = messages.len(), "Messages processed");
        Ok(())
    }

    /// Apply the content of `message` to the model held of its sender.
    fn process_message_mental_model(&mut self, message: &Message) -> Result<(), CycleError> {
        if !self.program.uses_mental_models {
            return Ok(());
        }
        let Some(sender) = message.sender.clone() else {
            return Ok(());
        };

        if !self.mental_state.knows(&sender) {
            if let Err(e) = self.mental_state.add_agent_model(sender.clone()) {
                warn!(agent = %self.agent, sender = %sender, error = %e, "Failed to add mental model");
            }
        }

        self.apply_mood(message, &sender)
            .map_err(|e| CycleError::MessageProcessing {
                content: message.content.to_string(),
                reason: e.to_string(),
            })
    }

    fn apply_mood(&mut self, message: &Message, sender: &AgentId) -> Result<(), KnowledgeBaseError> {
        let source = Some(sender);
        let content = &message.content;
        match message.mood {
            Mood::Indicative => {
                self.mental_state.insert(BaseKind::Belief, content, source)?;
            }
            Mood::Imperative => {
                self.mental_state.insert(BaseKind::Goal, content, source)?;
                self.mental_state.delete(BaseKind::Belief, content, source)?;
            }
            Mood::Interrogative => {
                self.mental_state.delete(BaseKind::Belief, content, source)?;
            }
        }
        let achieved = self.mental_state.update_goal_state(source)?;
        self.telemetry.goals_achieved(achieved.len());
        Ok(())
    }

    /// Re-check goal achievement and record achieved goals.
    pub fn update_goal_state(&mut self, source: Option<&AgentId>) -> Result<Vec<Formula>, CycleError> {
        let achieved = self.mental_state.update_goal_state(source)?;
        self.telemetry.goals_achieved(achieved.len());
        Ok(achieved)
    }

    /// Return to the initial state of the program.
    pub fn reset(&mut self) -> Result<(), CycleError> {
        if self.kill_switch.is_disposed() {
            return Err(CycleError::Terminated(self.agent.clone()));
        }
        self.phase = CyclePhase::Resetting;

        self.round = 0;
        self.mental_state.reset()?;
        self.previous_percepts.clear();
        self.previous_messages.clear();
        self.capabilities.messaging.reset();
        self.focus_goal = None;
        self.module_stack.clear();
        self.sleep_held_previous = false;
        self.event = false;
        self.main_module = self
            .program
            .module_of_kind(ModuleKind::Main)
            .unwrap_or_else(|| Arc::new(Module::placeholder_main()));

        self.phase = CyclePhase::Cycling;
        info!(agent = %self.agent, "Agent reset");
        Ok(())
    }

    /// Release the mental state and messaging resources. Idempotent.
    pub fn dispose(&mut self) {
        if !self.kill_switch.mark_disposed() {
            return;
        }
        self.mental_state.dispose();
        self.capabilities.messaging.dispose();
        self.phase = CyclePhase::Terminated;
        info!(agent = %self.agent, rounds = self.round, "Agent disposed");
    }

    pub fn check_killed(&self) -> Result<(), CycleError> {
        if *self.kill.borrow() {
            Err(CycleError::Killed(self.agent.clone()))
        } else {
            Ok(())
        }
    }

    pub fn is_killed(&self) -> bool {
        *self.kill.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.kill_switch.is_disposed()
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<CycleTelemetry> {
        &self.telemetry
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn mental_state(&self) -> &MentalState {
        &self.mental_state
    }

    pub fn mental_state_mut(&mut self) -> &mut MentalState {
        &mut self.mental_state
    }

    pub fn module_stack(&self) -> &ModuleStack {
        &self.module_stack
    }

    pub(crate) fn module_stack_mut(&mut self) -> &mut ModuleStack {
        &mut self.module_stack
    }

    pub fn focus_goal(&self) -> Option<&Formula> {
        self.focus_goal.as_ref()
    }

    pub fn set_focus_goal(&mut self, goal: Option<Formula>) {
        self.focus_goal = goal;
    }

    pub fn take_focus_goal(&mut self) -> Option<Formula> {
        self.focus_goal.take()
    }

    pub fn main_module(&self) -> Arc<Module> {
        self.main_module.clone()
    }

    /// Make the named module the one the controller runs every round.
    pub fn set_main_module(&mut self, name: &str) -> Result<(), CycleError> {
        let module = self
            .program
            .module(name)
            .ok_or_else(|| CycleError::ModuleNotFound(name.to_string()))?;
        self.main_module = module;
        Ok(())
    }

    /// Mental-state change notifications of this agent.
    pub fn subscribe(&self) -> broadcast::Receiver<MentalEvent> {
        self.mental_state.events().subscribe()
    }

    /// Latest reward of the environment, if it offers one.
    pub async fn reward(&self) -> Option<f64> {
        match self.capabilities.environment.get_reward().await {
            Ok(reward) => reward,
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "Failed to get reward");
                None
            }
        }
    }

    /// Perform an environment action; failures are logged, not raised.
    pub async fn perform_action(&self, action: &EnvAction) -> bool {
        match self.capabilities.environment.perform_action(action).await {
            Ok(()) => {
                debug!(agent = %self.agent, action = %action, "Action performed");
                true
            }
            Err(e) => {
                warn!(agent = %self.agent, action = %action, error = %e, "Action failed");
                self.telemetry.action_failure();
                false
            }
        }
    }

    pub async fn post_message(&self, message: &Message) -> Result<(), CycleError> {
        self.capabilities.messaging.post(message).await?;
        Ok(())
    }

    pub fn log(&self, message: &str) {
        self.capabilities.logging.log(&self.agent, message);
    }
}

/// Every named module call must resolve within the program.
fn validate_program(program: &Program) -> Result<(), InitializationError> {
    fn check_module(program: &Program, module: &Module) -> Result<(), InitializationError> {
        for rule in &module.rules.rules {
            for action in &rule.actions {
                match action {
                    Action::Call(ModuleRef::Named(name)) if !program.has_module(name) => {
                        return Err(InitializationError::UnknownModule(name.clone()));
                    }
                    Action::Call(ModuleRef::Inline(inner)) => check_module(program, inner)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    for module in &program.modules {
        check_module(program, module)?;
    }
    Ok(())
}
