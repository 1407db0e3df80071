//! Startup configuration, read from the environment the same way
//! `RunnerConfig::from_env` reads `WORKFLOW_RUNNER`/`TEMPORAL_*` in the
//! teacher: parse with a sensible default, warn on an unrecognized value
//! rather than fail outright.

use std::collections::HashSet;

/// Which [`loom_notifier::MigratorNotifier`] implementation to wire up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifierKind {
    #[default]
    Http,
    PubSub,
}

impl std::str::FromStr for NotifierKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "" => Ok(NotifierKind::Http),
            "pubsub" | "pub-sub" | "pub_sub" => Ok(NotifierKind::PubSub),
            _ => Err(()),
        }
    }
}

/// Which [`loom_engine::ExecutionEngine`] implementation to wire up. Only
/// the in-memory kernel exists today; kept as an enum (rather than
/// hardcoding it) so a durably-backed engine slots in without touching
/// `main`'s wiring shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineKind {
    #[default]
    InMemory,
}

impl std::str::FromStr for EngineKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "in-memory" | "" => Ok(EngineKind::InMemory),
            _ => Err(()),
        }
    }
}

/// Process-wide configuration for the `loom-api` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    pub engine: EngineKind,
    pub notifier: NotifierKind,
    /// Migrator app names the Dry-Run port never dispatches to directly
    /// (see DESIGN.md for the "first non-reserved migrator" rule).
    pub reserved_migrators: HashSet<String>,
}

impl Config {
    /// Load configuration from the environment, defaulting anything
    /// unset or unrecognized rather than failing startup.
    pub fn from_env() -> Self {
        let http_addr = std::env::var("LOOM_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let engine = std::env::var("LOOM_ENGINE")
            .ok()
            .and_then(|raw| match raw.parse::<EngineKind>() {
                Ok(kind) => Some(kind),
                Err(()) => {
                    tracing::warn!(value = %raw, "unrecognized LOOM_ENGINE value, defaulting to in_memory");
                    None
                }
            })
            .unwrap_or_default();

        let notifier = std::env::var("LOOM_NOTIFIER")
            .ok()
            .and_then(|raw| match raw.parse::<NotifierKind>() {
                Ok(kind) => Some(kind),
                Err(()) => {
                    tracing::warn!(value = %raw, "unrecognized LOOM_NOTIFIER value, defaulting to http");
                    None
                }
            })
            .unwrap_or_default();

        let reserved_migrators = std::env::var("LOOM_RESERVED_MIGRATORS")
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self {
            http_addr,
            engine,
            notifier,
            reserved_migrators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_kind_from_env_default() {
        assert_eq!("".parse::<NotifierKind>().unwrap(), NotifierKind::Http);
        assert_eq!("http".parse::<NotifierKind>().unwrap(), NotifierKind::Http);
    }

    #[test]
    fn test_notifier_kind_from_env_pubsub() {
        assert_eq!("pubsub".parse::<NotifierKind>().unwrap(), NotifierKind::PubSub);
        assert_eq!("pub-sub".parse::<NotifierKind>().unwrap(), NotifierKind::PubSub);
    }

    #[test]
    fn test_notifier_kind_from_env_rejects_unknown() {
        assert!("carrier-pigeon".parse::<NotifierKind>().is_err());
    }

    #[test]
    fn test_engine_kind_from_env_default() {
        assert_eq!("".parse::<EngineKind>().unwrap(), EngineKind::InMemory);
        assert_eq!("in_memory".parse::<EngineKind>().unwrap(), EngineKind::InMemory);
    }

    #[test]
    fn test_engine_kind_from_env_rejects_unknown() {
        assert!("temporal".parse::<EngineKind>().is_err());
    }
}
