//! Engine configuration loading.
//!
//! # Responsibility
//! - Parse the JSON configuration file into a validated `EngineConfig`.
//! - Apply the `APPOINTMENT_DURATION_MINUTES` environment override.
//!
//! # Invariants
//! - The calendar policy is validated once here and immutable afterwards.
//! - Each weekday appears at most once, whatever spelling is used.
//! - Only `policy` is required; other fields fall back to defaults.

use crate::db::DEFAULT_STORE_TIMEOUT;
use crate::model::policy::{CalendarPolicy, PolicyError, WorkingHours};
use chrono::{NaiveTime, Weekday};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configured appointment duration.
pub const DURATION_ENV_VAR: &str = "APPOINTMENT_DURATION_MINUTES";

const TIME_FORMAT: &str = "%H:%M";

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_path: Option<PathBuf>,
    /// Upper bound on store lock waits.
    pub store_timeout: Duration,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    pub policy: CalendarPolicy,
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    UnknownWeekday(String),
    DuplicateWeekday(Weekday),
    InvalidTime {
        weekday: Weekday,
        value: String,
    },
    InvalidTimeout,
    InvalidDurationOverride(String),
    Policy(PolicyError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::UnknownWeekday(value) => write!(f, "unknown weekday `{value}`"),
            Self::DuplicateWeekday(weekday) => {
                write!(f, "working hours for {weekday} are declared twice")
            }
            Self::InvalidTime { weekday, value } => {
                write!(f, "invalid time `{value}` for {weekday}; expected HH:MM")
            }
            Self::InvalidTimeout => write!(f, "store_timeout_ms must be greater than zero"),
            Self::InvalidDurationOverride(value) => write!(
                f,
                "{DURATION_ENV_VAR} must be a positive integer, got `{value}`"
            ),
            Self::Policy(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Policy(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<PolicyError> for ConfigError {
    fn from(value: PolicyError) -> Self {
        Self::Policy(value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngineConfig {
    #[serde(default)]
    database_path: Option<PathBuf>,
    #[serde(default = "default_store_timeout_ms")]
    store_timeout_ms: u64,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    log_dir: Option<String>,
    policy: RawPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    appointment_duration_minutes: u32,
    #[serde(default)]
    slot_granularity_minutes: Option<u32>,
    /// Entries in document order, repeated keys included.
    #[serde(default, deserialize_with = "deserialize_hour_entries")]
    working_hours: Vec<(String, RawHours)>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHours {
    open: String,
    close: String,
}

fn deserialize_hour_entries<'de, D>(deserializer: D) -> Result<Vec<(String, RawHours)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HourEntries;

    impl<'de> Visitor<'de> for HourEntries {
        type Value = Vec<(String, RawHours)>;

        fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("a map of weekday names to working hours")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, RawHours>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(HourEntries)
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT.as_millis() as u64
}

impl EngineConfig {
    /// Reads `path` and applies the duration override from the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let duration_override = std::env::var(DURATION_ENV_VAR).ok();
        Self::from_json_with_override(&text, duration_override.as_deref())
    }

    /// Parses configuration JSON without consulting the environment.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Self::from_json_with_override(text, None)
    }

    /// Parses configuration JSON, replacing the duration with
    /// `duration_override` when present. Granularity follows the override
    /// unless it was configured explicitly.
    pub fn from_json_with_override(
        text: &str,
        duration_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let raw: RawEngineConfig = serde_json::from_str(text)?;
        if raw.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let duration_minutes = match duration_override.map(str::trim) {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .ok_or_else(|| ConfigError::InvalidDurationOverride(value.to_string()))?,
            None => raw.policy.appointment_duration_minutes,
        };

        let policy = build_policy(
            duration_minutes,
            raw.policy.slot_granularity_minutes,
            &raw.policy.working_hours,
        )?;

        Ok(Self {
            database_path: raw.database_path,
            store_timeout: Duration::from_millis(raw.store_timeout_ms),
            log_level: raw.log_level,
            log_dir: raw.log_dir,
            policy,
        })
    }
}

fn build_policy(
    duration_minutes: u32,
    granularity_minutes: Option<u32>,
    working_hours: &[(String, RawHours)],
) -> Result<CalendarPolicy, ConfigError> {
    let mut seen = [false; 7];
    let mut hours = Vec::with_capacity(working_hours.len());
    for (key, raw) in working_hours {
        let weekday = key
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ConfigError::UnknownWeekday(key.clone()))?;
        let index = weekday.num_days_from_monday() as usize;
        if seen[index] {
            return Err(ConfigError::DuplicateWeekday(weekday));
        }
        seen[index] = true;

        let open = parse_time(weekday, &raw.open)?;
        let close = parse_time(weekday, &raw.close)?;
        hours.push((weekday, WorkingHours::new(open, close)));
    }

    Ok(CalendarPolicy::new(
        duration_minutes,
        granularity_minutes,
        hours,
    )?)
}

fn parse_time(weekday: Weekday, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| ConfigError::InvalidTime {
        weekday,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use crate::model::policy::PolicyError;
    use chrono::{NaiveTime, Weekday};
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "database_path": "/tmp/appointments.sqlite3",
        "store_timeout_ms": 2500,
        "policy": {
            "appointment_duration_minutes": 60,
            "working_hours": {
                "monday": { "open": "09:00", "close": "17:00" },
                "Fri": { "open": "10:00", "close": "14:30" }
            }
        }
    }"#;

    #[test]
    fn parses_policy_and_storage_settings() {
        let config = EngineConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.store_timeout, Duration::from_millis(2500));
        assert_eq!(config.policy.slot_duration(), 60);
        assert_eq!(config.policy.slot_granularity(), 60);
        let friday = config.policy.hours_for(Weekday::Fri).unwrap();
        assert_eq!(friday.close, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(config.policy.hours_for(Weekday::Tue).is_none());
    }

    #[test]
    fn duration_override_replaces_duration_and_default_granularity() {
        let config = EngineConfig::from_json_with_override(SAMPLE, Some(" 30 ")).unwrap();
        assert_eq!(config.policy.slot_duration(), 30);
        assert_eq!(config.policy.slot_granularity(), 30);

        let err = EngineConfig::from_json_with_override(SAMPLE, Some("0")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDurationOverride(_)));
    }

    #[test]
    fn rejects_duplicate_and_unknown_weekdays() {
        let duplicate = r#"{"policy": {"appointment_duration_minutes": 60, "working_hours": {
            "monday": {"open": "09:00", "close": "12:00"},
            "Mon": {"open": "13:00", "close": "17:00"}
        }}}"#;
        assert!(matches!(
            EngineConfig::from_json(duplicate).unwrap_err(),
            ConfigError::DuplicateWeekday(Weekday::Mon)
        ));

        let unknown = r#"{"policy": {"appointment_duration_minutes": 60, "working_hours": {
            "funday": {"open": "09:00", "close": "12:00"}
        }}}"#;
        assert!(matches!(
            EngineConfig::from_json(unknown).unwrap_err(),
            ConfigError::UnknownWeekday(_)
        ));
    }

    #[test]
    fn rejects_repeated_identical_weekday_key() {
        let repeated = r#"{"policy": {"appointment_duration_minutes": 60, "working_hours": {
            "monday": {"open": "09:00", "close": "12:00"},
            "monday": {"open": "13:00", "close": "17:00"}
        }}}"#;
        assert!(matches!(
            EngineConfig::from_json(repeated).unwrap_err(),
            ConfigError::DuplicateWeekday(Weekday::Mon)
        ));
    }

    #[test]
    fn surfaces_policy_and_time_errors() {
        let mismatch = r#"{"policy": {"appointment_duration_minutes": 60, "slot_granularity_minutes": 40}}"#;
        assert!(matches!(
            EngineConfig::from_json(mismatch).unwrap_err(),
            ConfigError::Policy(PolicyError::GranularityMismatch { .. })
        ));

        let bad_time = r#"{"policy": {"appointment_duration_minutes": 60, "working_hours": {
            "tue": {"open": "9am", "close": "17:00"}
        }}}"#;
        assert!(matches!(
            EngineConfig::from_json(bad_time).unwrap_err(),
            ConfigError::InvalidTime {
                weekday: Weekday::Tue,
                ..
            }
        ));
    }

    #[test]
    fn defaults_optional_fields() {
        let minimal = r#"{"policy": {"appointment_duration_minutes": 45}}"#;
        let config = EngineConfig::from_json(minimal).unwrap();
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.database_path, None);
        assert!(config.policy.hours_for(Weekday::Mon).is_none());
    }
}
