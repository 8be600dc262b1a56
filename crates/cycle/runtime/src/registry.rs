//! Agent registry - tracks the running agents of a session

use crate::controller::KillSwitch;
use cycle_types::AgentId;
use dashmap::DashMap;
use std::time::Instant;

/// Registry of running agents and their kill switches
#[derive(Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an agent with this name is already registered.
    pub fn register(&self, agent: AgentId, program: String, kill_switch: KillSwitch) -> bool {
        if self.agents.contains_key(&agent) {
            return false;
        }
        self.agents.insert(
            agent.clone(),
            AgentEntry {
                agent,
                program,
                kill_switch,
                registered_at: Instant::now(),
            },
        );
        true
    }

    pub fn get(&self, agent: &AgentId) -> Option<AgentEntry> {
        self.agents.get(agent).map(|entry| entry.clone())
    }

    pub fn kill(&self, agent: &AgentId) -> bool {
        match self.agents.get(agent) {
            Some(entry) => {
                entry.kill_switch.kill();
                true
            }
            None => false,
        }
    }

    pub fn kill_all(&self) {
        for entry in self.agents.iter() {
            entry.kill_switch.kill();
        }
        tracing::info!("Kill requested for {} agents", self.agents.len());
    }

    pub fn remove(&self, agent: &AgentId) {
        self.agents.remove(agent);
    }

    pub fn agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }
}

/// A registered agent
#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub agent: AgentId,
    pub program: String,
    pub kill_switch: KillSwitch,
    pub registered_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_kill() {
        let registry = AgentRegistry::new();
        let (switch, _rx) = KillSwitch::new();
        assert!(registry.register(AgentId::new("a"), "p".into(), switch.clone()));
        assert!(!registry.register(AgentId::new("a"), "p".into(), switch.clone()));

        assert!(registry.kill(&AgentId::new("a")));
        assert!(switch.is_killed());
        assert!(!registry.kill(&AgentId::new("missing")));

        registry.remove(&AgentId::new("a"));
        assert_eq!(registry.count(), 0);
    }
}
