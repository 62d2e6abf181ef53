//! Routing configuration with environment-driven defaults.
//!
//! All knobs live in one struct passed into `RoutingEngine::new`; nothing is
//! read from ambient process state after construction.

use std::time::Duration;

use tracing::warn;

/// Budgets and limits for one routing session.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Maximum wait for a Planner block (`POLI_PLAN_TIMEOUT`, seconds).
    pub plan_timeout: Duration,
    /// Maximum wait for an Executer block (`POLI_EXEC_TIMEOUT`, seconds).
    pub exec_timeout: Duration,
    /// Delay between capture polls (`POLI_POLL_INTERVAL`, seconds).
    pub poll_interval: Duration,
    /// Elapsed time after which the single per-wait reminder is sent
    /// (`POLI_NUDGE_AFTER`, seconds). Defaults to a third of the wait budget.
    pub nudge_threshold: Option<Duration>,
    /// How many lines of pane output each capture requests
    /// (`POLI_CAPTURE_LINES`).
    pub capture_lines: usize,
    /// Planner→Executer→Planner cycles allowed before the task fails
    /// (`POLI_MAX_ROUNDS`).
    pub max_rounds: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            plan_timeout: Duration::from_secs(180),
            exec_timeout: Duration::from_secs(900),
            poll_interval: Duration::from_secs(1),
            nudge_threshold: None,
            capture_lines: 400,
            max_rounds: 10,
        }
    }
}

impl RouteConfig {
    /// Builds a config from `POLI_*` environment variables, falling back to
    /// the documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            plan_timeout: env_duration("POLI_PLAN_TIMEOUT", defaults.plan_timeout),
            exec_timeout: env_duration("POLI_EXEC_TIMEOUT", defaults.exec_timeout),
            poll_interval: env_duration("POLI_POLL_INTERVAL", defaults.poll_interval),
            nudge_threshold: std::env::var("POLI_NUDGE_AFTER")
                .ok()
                .and_then(|raw| parse_seconds("POLI_NUDGE_AFTER", &raw)),
            capture_lines: env_parse("POLI_CAPTURE_LINES", defaults.capture_lines),
            max_rounds: env_parse("POLI_MAX_ROUNDS", defaults.max_rounds),
        }
    }

    /// The effective nudge threshold for a wait with the given budget.
    pub fn nudge_after(&self, budget: Duration) -> Duration {
        self.nudge_threshold.unwrap_or(budget / 3)
    }
}

fn env_duration(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => parse_seconds(name, &raw).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_seconds(name: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => {
            warn!(%name, %raw, "ignoring unparseable duration");
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(%name, %raw, "ignoring unparseable value");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RouteConfig::default();
        assert_eq!(config.plan_timeout, Duration::from_secs(180));
        assert_eq!(config.exec_timeout, Duration::from_secs(900));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.capture_lines, 400);
        assert_eq!(config.max_rounds, 10);
    }

    #[test]
    fn nudge_defaults_to_a_third_of_the_budget() {
        let config = RouteConfig::default();
        assert_eq!(
            config.nudge_after(Duration::from_secs(180)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn explicit_nudge_threshold_wins() {
        let config = RouteConfig {
            nudge_threshold: Some(Duration::from_secs(5)),
            ..RouteConfig::default()
        };
        assert_eq!(
            config.nudge_after(Duration::from_secs(900)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn fractional_seconds_parse() {
        assert_eq!(
            parse_seconds("POLI_POLL_INTERVAL", "0.4"),
            Some(Duration::from_secs_f64(0.4))
        );
        assert_eq!(parse_seconds("POLI_POLL_INTERVAL", "soon"), None);
        assert_eq!(parse_seconds("POLI_POLL_INTERVAL", "-1"), None);
    }
}
