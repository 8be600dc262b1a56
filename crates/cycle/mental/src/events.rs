//! Mental-state change notifications
//!
//! Observers such as an appraisal engine subscribe to the broadcast channel.
//! Publishing never blocks and never fails the cycle.

use cycle_types::{AgentId, BaseKind, Formula};
use serde::Serialize;
use tokio::sync::broadcast;

/// What changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MentalChange {
    Inserted { base: BaseKind, formula: Formula },
    Deleted { base: BaseKind, formula: Formula },
    GoalAchieved { goal: Formula },
}

/// A change to the mental state of `agent`
///
/// `model` is set when the change happened in the model `agent` holds of
/// another agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentalEvent {
    pub agent: AgentId,
    pub model: Option<AgentId>,
    pub change: MentalChange,
}

/// Broadcast publisher for [`MentalEvent`]s
#[derive(Debug, Clone)]
pub struct MentalEventBus {
    sender: broadcast::Sender<MentalEvent>,
}

impl MentalEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: MentalEvent) {
        // No subscribers is the normal case
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MentalEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MentalEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = MentalEventBus::new(4);
        bus.publish(MentalEvent {
            agent: AgentId::new("a"),
            model: None,
            change: MentalChange::GoalAchieved {
                goal: Formula::prop("done"),
            },
        });

        let mut rx = bus.subscribe();
        let event = MentalEvent {
            agent: AgentId::new("a"),
            model: None,
            change: MentalChange::Inserted {
                base: BaseKind::Belief,
                formula: Formula::prop("ok"),
            },
        };
        bus.publish(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
