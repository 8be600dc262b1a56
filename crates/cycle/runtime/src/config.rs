//! Configuration for the reasoning cycle runtime

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cycle: CycleConfig,
    pub messaging: MessagingConfig,
    pub telemetry: TelemetryConfig,
    pub observer: ObserverConfig,
}

impl RuntimeConfig {
    /// Layer defaults, an optional file and `CYCLE_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `CYCLE_CYCLE__SLEEP_POLL_INTERVAL_MS=10`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RuntimeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CYCLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Fast polling, no sleep optimisation, bounded runs.
    pub fn testing() -> Self {
        Self {
            cycle: CycleConfig {
                sleep_repeating_agent: false,
                sleep_poll_interval_ms: 5,
                max_rounds: Some(100),
            },
            telemetry: TelemetryConfig {
                enabled: true,
                metrics_enabled: true,
                detailed_metrics: true,
            },
            ..Default::default()
        }
    }
}

/// Reasoning cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Suspend an agent whose inputs did not change for two rounds
    pub sleep_repeating_agent: bool,
    /// Poll interval used while sleeping, for capabilities that cannot signal
    pub sleep_poll_interval_ms: u64,
    /// Upper bound on rounds per agent; `None` runs until killed
    pub max_rounds: Option<u64>,
}

impl CycleConfig {
    pub fn sleep_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sleep_poll_interval_ms.max(1))
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            sleep_repeating_agent: true,
            sleep_poll_interval_ms: 50,
            max_rounds: None,
        }
    }
}

/// Messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Warn when a single drain returns more messages than this
    pub inbox_warn_threshold: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            inbox_warn_threshold: 1000,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub metrics_enabled: bool,
    pub detailed_metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_enabled: true,
            detailed_metrics: false,
        }
    }
}

/// Mental-state observer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub channel_capacity: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Interactive sessions: agents sleep quickly and wake on every message.
pub fn interactive_runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        cycle: CycleConfig {
            sleep_repeating_agent: true,
            sleep_poll_interval_ms: 20,
            max_rounds: None,
        },
        telemetry: TelemetryConfig {
            enabled: true,
            metrics_enabled: true,
            detailed_metrics: true,
        },
        observer: ObserverConfig {
            channel_capacity: 1024,
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(config.cycle.sleep_repeating_agent);
        assert_eq!(config.cycle.sleep_poll_interval_ms, 50);
        assert!(config.cycle.max_rounds.is_none());
    }

    #[test]
    fn test_presets() {
        assert!(!RuntimeConfig::testing().cycle.sleep_repeating_agent);
        assert_eq!(interactive_runtime_config().observer.channel_capacity, 1024);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let cycle = CycleConfig {
            sleep_poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(cycle.sleep_poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cycle]\nsleep_repeating_agent = false\nmax_rounds = 7").unwrap();

        let config = RuntimeConfig::load(file.path().to_str()).unwrap();
        assert!(!config.cycle.sleep_repeating_agent);
        assert_eq!(config.cycle.max_rounds, Some(7));
        assert_eq!(config.messaging.inbox_warn_threshold, 1000);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = RuntimeConfig::load(None).unwrap();
        assert_eq!(config.cycle.sleep_poll_interval_ms, 50);
    }
}
