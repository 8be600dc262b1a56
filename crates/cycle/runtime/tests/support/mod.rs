#![allow(dead_code)]

use async_trait::async_trait;
use cycle_mental::MemoryKnowledgeBaseFactory;
use cycle_runtime::{
    Capabilities, EnvironmentCapability, LoggingCapability, MessagingCapability, RunState,
    RuntimeConfig,
};
use cycle_types::{
    AgentId, EnvAction, EnvironmentError, Formula, Message, MessagingError, Percept, Program,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn f(s: &str) -> Formula {
    Formula::parse(s).unwrap()
}

pub fn id(name: &str) -> AgentId {
    AgentId::new(name)
}

/// Environment whose percepts are set by the test
#[derive(Default)]
pub struct ScriptedEnvironment {
    percepts: Mutex<BTreeSet<Percept>>,
    actions: Mutex<Vec<EnvAction>>,
    changed: Notify,
    fail_percepts: AtomicBool,
}

impl ScriptedEnvironment {
    pub fn set_percepts(&self, percepts: &[&str]) {
        *self.percepts.lock().unwrap() = percepts.iter().map(|p| Percept::new(f(p))).collect();
        self.changed.notify_one();
    }

    pub fn fail_percepts(&self, fail: bool) {
        self.fail_percepts.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<EnvAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvironmentCapability for ScriptedEnvironment {
    async fn get_percepts(&self) -> Result<BTreeSet<Percept>, EnvironmentError> {
        if self.fail_percepts.load(Ordering::SeqCst) {
            return Err(EnvironmentError::NotConnected);
        }
        Ok(self.percepts.lock().unwrap().clone())
    }

    async fn perform_action(&self, action: &EnvAction) -> Result<(), EnvironmentError> {
        if action.name == "explode" {
            return Err(EnvironmentError::ActionFailed {
                action: action.name.clone(),
                reason: "refused".to_string(),
            });
        }
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn percepts_changed(&self) {
        self.changed.notified().await
    }
}

/// Messaging double: the test pushes inbound messages, posts are recorded
pub struct RecordingMessaging {
    agent: AgentId,
    inbox: Mutex<Vec<Message>>,
    posted: Mutex<Vec<Message>>,
    arrived: Notify,
    fail_posts: AtomicBool,
    fail_drains: AtomicBool,
}

impl RecordingMessaging {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            inbox: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
            arrived: Notify::new(),
            fail_posts: AtomicBool::new(false),
            fail_drains: AtomicBool::new(false),
        }
    }

    pub fn push(&self, message: Message) {
        self.inbox.lock().unwrap().push(message);
        self.arrived.notify_one();
    }

    pub fn posted(&self) -> Vec<Message> {
        self.posted.lock().unwrap().clone()
    }

    /// Make every `post` fail with a transport error.
    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_drains(&self, fail: bool) {
        self.fail_drains.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingCapability for RecordingMessaging {
    fn agent(&self) -> &AgentId {
        &self.agent
    }

    async fn drain_all_messages(&self) -> Result<BTreeSet<Message>, MessagingError> {
        if self.fail_drains.load(Ordering::SeqCst) {
            return Err(MessagingError::InboxClosed(self.agent.clone()));
        }
        Ok(self.inbox.lock().unwrap().drain(..).collect())
    }

    async fn post(&self, message: &Message) -> Result<(), MessagingError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(MessagingError::Transport("link down".to_string()));
        }
        self.posted.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn input_available(&self) {
        self.arrived.notified().await
    }

    fn reset(&self) {
        self.inbox.lock().unwrap().clear();
    }

    fn dispose(&self) {}
}

/// Collects the text of `log` actions
#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LoggingCapability for RecordingLogger {
    fn log(&self, _agent: &AgentId, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub run_state: RunState,
    pub environment: Arc<ScriptedEnvironment>,
    pub messaging: Arc<RecordingMessaging>,
    pub logger: Arc<RecordingLogger>,
}

pub fn harness(agent: &str, program: Program, config: &RuntimeConfig) -> Harness {
    let environment = Arc::new(ScriptedEnvironment::default());
    let messaging = Arc::new(RecordingMessaging::new(id(agent)));
    let logger = Arc::new(RecordingLogger::default());
    let capabilities = Capabilities::new(messaging.clone(), environment.clone())
        .with_logging(logger.clone());
    let run_state = RunState::new(
        id(agent),
        Arc::new(program),
        capabilities,
        Arc::new(MemoryKnowledgeBaseFactory),
        config,
    )
    .unwrap();
    Harness {
        run_state,
        environment,
        messaging,
        logger,
    }
}
