//! Account progress snapshot as reported by the remote service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::types::Counter;

const UNKNOWN: &str = "?";

/// Counters and identity fields for one account at one point in time.
///
/// Replaced wholesale on every fetch; between fetches the worker credits its
/// own observed gains so the dashboard stays current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(rename = "username", default = "unknown", deserialize_with = "text_or_unknown")]
    pub display_name: String,
    #[serde(rename = "fromLanguage", default = "unknown", deserialize_with = "text_or_unknown")]
    pub source_locale: String,
    #[serde(rename = "learningLanguage", default = "unknown", deserialize_with = "text_or_unknown")]
    pub target_locale: String,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub streak: u64,
    #[serde(rename = "totalXp", default, deserialize_with = "count_or_zero")]
    pub experience: u64,
    #[serde(rename = "gems", default, deserialize_with = "count_or_zero")]
    pub currency: u64,
    /// Raw streak metadata; only the repair strategy looks inside.
    #[serde(rename = "streakData", default)]
    pub streak_metadata: Value,
}

impl ProgressSnapshot {
    /// Parse a snapshot from a user-info payload.
    pub fn from_json(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }

    /// Credit a locally observed gain. Counters never decrease.
    pub fn credit(&mut self, counter: Counter, delta: u64) {
        let slot = match counter {
            Counter::Experience => &mut self.experience,
            Counter::Currency => &mut self.currency,
            Counter::Streak => &mut self.streak,
        };
        *slot = slot.saturating_add(delta);
    }
}

/// Non-negative progress between a baseline and a later snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Deltas {
    pub experience: u64,
    pub currency: u64,
    pub streak: u64,
}

impl Deltas {
    pub fn between(baseline: &ProgressSnapshot, current: &ProgressSnapshot) -> Self {
        Self {
            experience: current.experience.saturating_sub(baseline.experience),
            currency: current.currency.saturating_sub(baseline.currency),
            streak: current.streak.saturating_sub(baseline.streak),
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Experience => self.experience,
            Counter::Currency => self.currency,
            Counter::Streak => self.streak,
        }
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn text_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_else(unknown))
}

// The service sends null for counters on fresh accounts.
fn count_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
