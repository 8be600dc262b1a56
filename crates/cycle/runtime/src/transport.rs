//! In-process message transport
//!
//! Every agent of a session owns one inbox: an unbounded channel plus a
//! `Notify` that wakes the agent if it is asleep. Any number of agents may
//! post concurrently; only the owning agent drains.

use crate::capabilities::MessagingCapability;
use crate::config::MessagingConfig;
use async_trait::async_trait;
use cycle_types::{AgentId, Message, MessagingError};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

struct Inbox {
    sender: mpsc::UnboundedSender<Message>,
    notify: Arc<Notify>,
}

/// Routes messages between the agents of one session
#[derive(Clone, Default)]
pub struct MessageRouter {
    inboxes: Arc<DashMap<AgentId, Inbox>>,
    config: MessagingConfig,
}

impl MessageRouter {
    pub fn new(config: &MessagingConfig) -> Self {
        Self {
            inboxes: Arc::new(DashMap::new()),
            config: config.clone(),
        }
    }

    /// Open an inbox for `agent` and hand out its messaging capability.
    pub fn register(&self, agent: AgentId) -> Result<RouterMessaging, MessagingError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let notify = Arc::new(Notify::new());

        match self.inboxes.entry(agent.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(MessagingError::DuplicateAgent(agent));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Inbox {
                    sender,
                    notify: notify.clone(),
                });
            }
        }

        debug!(agent = %agent, "Inbox registered");
        Ok(RouterMessaging {
            agent,
            router: self.clone(),
            receiver: Mutex::new(receiver),
            notify,
            disposed: AtomicBool::new(false),
            warn_threshold: self.config.inbox_warn_threshold,
        })
    }

    /// Enqueue `message` for one receiver.
    pub fn deliver(&self, receiver: &AgentId, message: Message) -> Result<(), MessagingError> {
        let inbox = self
            .inboxes
            .get(receiver)
            .ok_or_else(|| MessagingError::UnknownReceiver(receiver.clone()))?;
        inbox
            .sender
            .send(message)
            .map_err(|_| MessagingError::InboxClosed(receiver.clone()))?;
        inbox.notify.notify_one();
        Ok(())
    }

    pub fn agents(&self) -> BTreeSet<AgentId> {
        self.inboxes.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_registered(&self, agent: &AgentId) -> bool {
        self.inboxes.contains_key(agent)
    }

    /// Remove the inbox of `agent` if it is still the one behind `notify`.
    fn deregister(&self, agent: &AgentId, notify: &Arc<Notify>) {
        self.inboxes
            .remove_if(agent, |_, inbox| Arc::ptr_eq(&inbox.notify, notify));
    }
}

/// Messaging capability backed by a [`MessageRouter`] inbox
pub struct RouterMessaging {
    agent: AgentId,
    router: MessageRouter,
    receiver: Mutex<mpsc::UnboundedReceiver<Message>>,
    notify: Arc<Notify>,
    disposed: AtomicBool,
    warn_threshold: usize,
}

impl RouterMessaging {
    fn ensure_live(&self) -> Result<(), MessagingError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(MessagingError::Disposed(self.agent.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessagingCapability for RouterMessaging {
    fn agent(&self) -> &AgentId {
        &self.agent
    }

    async fn drain_all_messages(&self) -> Result<BTreeSet<Message>, MessagingError> {
        self.ensure_live()?;
        let mut receiver = self
            .receiver
            .lock()
            .map_err(|_| MessagingError::Transport("inbox lock poisoned".to_string()))?;

        let mut messages = BTreeSet::new();
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    messages.insert(message);
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(MessagingError::InboxClosed(self.agent.clone()));
                }
            }
        }

        if messages.len() > self.warn_threshold {
            warn!(agent = %self.agent, count = messages.len(), "Large inbox drained");
        }
        Ok(messages)
    }

    async fn post(&self, message: &Message) -> Result<(), MessagingError> {
        self.ensure_live()?;
        let mut first_error = None;
        for receiver in &message.receivers {
            if let Err(e) = self.router.deliver(receiver, message.clone()) {
                warn!(agent = %self.agent, receiver = %receiver, error = %e, "Delivery failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn input_available(&self) {
        self.notify.notified().await
    }

    fn reset(&self) {
        let mut receiver = match self.receiver.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut discarded = 0usize;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }
        debug!(agent = %self.agent, discarded, "Inbox reset");
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.router.deregister(&self.agent, &self.notify);
        debug!(agent = %self.agent, "Inbox disposed");
    }
}
