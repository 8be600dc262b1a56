//! Telemetry for the reasoning cycle runtime

use crate::config::TelemetryConfig;
use cycle_types::AgentId;
use std::collections::HashMap;
use std::sync::RwLock;

pub const ROUNDS: &str = "cycle_rounds_total";
pub const SLEEPS: &str = "cycle_sleeps_total";
pub const WAKES: &str = "cycle_wakes_total";
pub const MESSAGES_RECEIVED: &str = "cycle_messages_received_total";
pub const MESSAGES_SENT: &str = "cycle_messages_sent_total";
pub const GOALS_ACHIEVED: &str = "cycle_goals_achieved_total";
pub const PERCEPT_FAILURES: &str = "cycle_percept_failures_total";
pub const ACTION_FAILURES: &str = "cycle_action_failures_total";

/// Cycle telemetry
///
/// Uses `RwLock` for interior mutability so one instance can be shared by
/// every agent of a session.
pub struct CycleTelemetry {
    config: TelemetryConfig,
    metrics: RwLock<MetricsCollector>,
}

impl CycleTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            config: config.clone(),
            metrics: RwLock::new(MetricsCollector::default()),
        }
    }

    pub fn round_started(&self, agent: &AgentId, round: u64) {
        if self.config.detailed_metrics {
            tracing::trace!(agent = %agent, round, "Round started");
        }
        self.increment(ROUNDS, 1);
    }

    pub fn agent_slept(&self, agent: &AgentId) {
        tracing::debug!(agent = %agent, "Agent going to sleep");
        self.increment(SLEEPS, 1);
    }

    pub fn agent_woke(&self, agent: &AgentId) {
        tracing::debug!(agent = %agent, "Agent woke up");
        self.increment(WAKES, 1);
    }

    pub fn messages_received(&self, count: usize) {
        self.increment(MESSAGES_RECEIVED, count as u64);
    }

    pub fn message_sent(&self, receivers: usize) {
        self.increment(MESSAGES_SENT, receivers as u64);
    }

    pub fn goals_achieved(&self, count: usize) {
        self.increment(GOALS_ACHIEVED, count as u64);
    }

    pub fn percept_failure(&self) {
        self.increment(PERCEPT_FAILURES, 1);
    }

    pub fn action_failure(&self) {
        self.increment(ACTION_FAILURES, 1);
    }

    /// Current value of a counter.
    pub fn counter(&self, name: &str) -> u64 {
        self.metrics
            .read()
            .map(|m| m.counters.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.metrics
            .read()
            .map(|m| m.counters.clone())
            .unwrap_or_default()
    }

    fn increment(&self, name: &'static str, by: u64) {
        if !self.config.enabled || by == 0 {
            return;
        }
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.increment(name, by);
        }
        if self.config.metrics_enabled {
            metrics::counter!(name, by);
        }
    }
}

impl Default for CycleTelemetry {
    fn default() -> Self {
        Self::new(&TelemetryConfig::default())
    }
}

#[derive(Default)]
struct MetricsCollector {
    counters: HashMap<String, u64>,
}

impl MetricsCollector {
    fn increment(&mut self, metric: &str, by: u64) {
        *self.counters.entry(metric.to_string()).or_insert(0) += by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let telemetry = CycleTelemetry::default();
        let agent = AgentId::new("a");
        telemetry.round_started(&agent, 1);
        telemetry.round_started(&agent, 2);
        telemetry.message_sent(2);
        assert_eq!(telemetry.counter(ROUNDS), 2);
        assert_eq!(telemetry.counter(MESSAGES_SENT), 2);
        assert_eq!(telemetry.counter(SLEEPS), 0);
    }

    #[test]
    fn test_disabled_telemetry_records_nothing() {
        let telemetry = CycleTelemetry::new(&TelemetryConfig {
            enabled: false,
            metrics_enabled: false,
            detailed_metrics: false,
        });
        telemetry.percept_failure();
        assert!(telemetry.snapshot().is_empty());
    }
}
