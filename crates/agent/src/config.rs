use reclaim_areas::StaticAreaFactory;
use reclaim_core::CoreError;
use reclaim_events::bus::DEFAULT_CAPACITY;
use reclaim_tasks::TaskManagerConfig;

/// Default cancellation grace period in seconds.
const DEFAULT_CANCEL_GRACE_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("RECLAIM_AREAS is invalid: {0}")]
    Areas(#[from] CoreError),
}

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Areas served by the static factory.
    pub areas: StaticAreaFactory,
    /// Seconds a cancelled task may keep running; `0` waits forever.
    pub cancel_grace_secs: u64,
    /// Broadcast buffer of the event bus.
    pub event_bus_capacity: usize,
}

impl AgentConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `RECLAIM_AREAS`      | empty   |
    /// | `CANCEL_GRACE_SECS`  | `30`    |
    /// | `EVENT_BUS_CAPACITY` | `1024`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let areas = StaticAreaFactory::parse(&lookup("RECLAIM_AREAS").unwrap_or_default())?;

        let cancel_grace_secs = parse_or(
            "CANCEL_GRACE_SECS",
            lookup("CANCEL_GRACE_SECS"),
            DEFAULT_CANCEL_GRACE_SECS,
        )?;

        let event_bus_capacity: usize = parse_or(
            "EVENT_BUS_CAPACITY",
            lookup("EVENT_BUS_CAPACITY"),
            DEFAULT_CAPACITY,
        )?;
        if event_bus_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_BUS_CAPACITY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            areas,
            cancel_grace_secs,
            event_bus_capacity,
        })
    }

    /// Task manager policy derived from this config.
    pub fn task_manager_config(&self) -> TaskManagerConfig {
        TaskManagerConfig::from_grace_secs(self.cancel_grace_secs)
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}
