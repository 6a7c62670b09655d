use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::error::{Error, Result};

/// Fallback for any delay/duration string that cannot be parsed.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Fallback for any byte size string that cannot be parsed (ten 80-byte records).
pub const DEFAULT_SIZE_BYTES: u64 = 800;

/// Test definition document, as written by the user.
///
/// Durations and sizes stay strings here; they are resolved once by [`RunPlan::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestDefinition {
    pub name: String,

    #[serde(deserialize_with = "text_or_number")]
    pub duration: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub command_delay: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub script_delay: Option<String>,
    /// Per-user start stagger. Falls back to the resolved `scriptDelay` when absent.
    #[serde(deserialize_with = "text_or_number")]
    pub initial_delay: Option<String>,

    pub concurrent_users: u64,

    #[serde(alias = "zosmfProfiles")]
    pub profiles: Vec<String>,

    /// Operation names to run. Empty means every registered operation.
    pub operations: Vec<String>,

    #[serde(deserialize_with = "text_or_number")]
    pub file_size: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub member_size: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub job_output_size: Option<String>,
    pub dsn_second_segment: String,
    pub unix_dir: String,
    pub account_code: String,
    pub job_card: Vec<String>,
}

/// Durations and sizes may be written as bare numbers (`commandDelay: 500`).
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

/// Values that take precedence over the test definition (typically from CLI flags).
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub users: Option<u64>,
    pub duration: Option<Duration>,
    pub operations: Option<Vec<String>>,
}

/// Resolved, immutable run parameters shared by every session.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub name: String,
    pub duration: Duration,
    pub command_delay: Duration,
    pub script_delay: Duration,
    pub initial_delay: Duration,
    pub concurrent_users: u64,
    pub profiles: Vec<String>,
    /// `None` selects every registered operation.
    pub operations: Option<Vec<String>>,
}

impl RunPlan {
    pub fn resolve(def: &TestDefinition, overrides: PlanOverrides) -> Result<Self> {
        let concurrent_users = overrides.users.unwrap_or(def.concurrent_users);
        if concurrent_users == 0 {
            return Err(Error::InvalidUsers);
        }
        if def.profiles.is_empty() {
            return Err(Error::NoProfiles);
        }

        let script_delay = resolve_duration(def.script_delay.as_deref());
        let initial_delay = def
            .initial_delay
            .as_deref()
            .map_or(script_delay, |s| resolve_duration(Some(s)));

        let operations = overrides
            .operations
            .or_else(|| (!def.operations.is_empty()).then(|| def.operations.clone()));

        Ok(Self {
            name: def.name.clone(),
            duration: overrides
                .duration
                .unwrap_or_else(|| resolve_duration(def.duration.as_deref())),
            command_delay: resolve_duration(def.command_delay.as_deref()),
            script_delay,
            initial_delay,
            concurrent_users,
            profiles: def.profiles.clone(),
            operations,
        })
    }

    /// Stagger applied before user `user_number` starts its setup.
    #[must_use]
    pub fn stagger_for(&self, user_number: u64) -> Duration {
        let factor = u32::try_from(user_number).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Resolves a duration string, falling back to [`DEFAULT_DELAY`].
///
/// Accepts humantime strings (`100ms`, `2s`, `1m 30s`) and bare integers as milliseconds.
#[must_use]
pub fn resolve_duration(input: Option<&str>) -> Duration {
    input.and_then(parse_duration).unwrap_or(DEFAULT_DELAY)
}

/// Strict form of [`resolve_duration`]: `None` instead of the fallback.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ms) = s.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).ok()
}

/// Resolves a byte size string, falling back to [`DEFAULT_SIZE_BYTES`].
#[must_use]
pub fn resolve_size(input: Option<&str>) -> u64 {
    input.and_then(parse_size).unwrap_or(DEFAULT_SIZE_BYTES)
}

fn parse_size(input: &str) -> Option<u64> {
    let s = input.trim();

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_digit() || *ch == '.'))
        .map_or(s.len(), |(idx, _)| idx);
    if number_end == 0 {
        return None;
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: f64 = number_str.parse().ok()?;

    // Base 2 throughout: `KB` and `KiB` are both 1024 bytes.
    let multiplier: u64 = match unit_str.trim().to_ascii_lowercase().as_str() {
        "" | "b" | "byte" | "bytes" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        _ => return None,
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}
