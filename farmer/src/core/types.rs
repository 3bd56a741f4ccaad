//! Shared deterministic types for the farming core.
//!
//! These types define stable contracts between the worker loop, the command
//! dispatcher and the status projection. They serialize with stable names so
//! the control bridge can expose them unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit-of-work behavior a profile repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "xp")]
    ExperienceFarm,
    #[serde(rename = "gem")]
    CurrencyFarm,
    #[serde(rename = "streak_farm")]
    StreakFarm,
    #[serde(rename = "streak_repair")]
    StreakRepair,
    #[serde(rename = "combo")]
    RotatingCombo,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::ExperienceFarm,
        Strategy::CurrencyFarm,
        Strategy::StreakFarm,
        Strategy::StreakRepair,
        Strategy::RotatingCombo,
    ];

    /// Short operator-facing name (also the serialized form).
    pub fn name(self) -> &'static str {
        match self {
            Strategy::ExperienceFarm => "xp",
            Strategy::CurrencyFarm => "gem",
            Strategy::StreakFarm => "streak_farm",
            Strategy::StreakRepair => "streak_repair",
            Strategy::RotatingCombo => "combo",
        }
    }

    /// Resolve an operator-typed name, accepting a few long-form aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "xp" | "experience" => Some(Strategy::ExperienceFarm),
            "gem" | "gems" | "currency" => Some(Strategy::CurrencyFarm),
            "streak_farm" | "streak" => Some(Strategy::StreakFarm),
            "streak_repair" | "repair" => Some(Strategy::StreakRepair),
            "combo" | "rotating" => Some(Strategy::RotatingCombo),
            _ => None,
        }
    }

    /// One-shot strategies stop their profile after a single invocation.
    pub fn is_one_shot(self) -> bool {
        matches!(self, Strategy::StreakRepair)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a profile worker.
///
/// `paused` is tracked separately as a sub-state of `Running` (and may be set
/// while still `Initializing`); `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Initializing,
    Running,
    Stopped,
}

/// Why a profile reached `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// Operator `stop <id>` or `quit`.
    Command,
    /// A goal threshold was met.
    GoalReached(Counter),
    /// The baseline fetch never succeeded.
    InitFailed,
    /// An unexpected error escaped a strategy.
    Fault,
    /// A one-shot strategy finished its pass.
    Completed,
}

/// Progress counter tracked per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    Experience,
    Currency,
    Streak,
}

/// Kind of remote action a strategy performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Experience,
    Currency,
    Streak,
    Repair,
}

impl Action {
    /// Counter credited on success. Repair credits its streak per backfill
    /// while it runs, so the summary outcome credits nothing.
    pub fn counter(self) -> Option<Counter> {
        match self {
            Action::Experience => Some(Counter::Experience),
            Action::Currency => Some(Counter::Currency),
            Action::Streak => Some(Counter::Streak),
            Action::Repair => None,
        }
    }
}

/// Result of one remote unit of work.
///
/// A zero-delta success (e.g. zero awarded experience) still counts as a
/// success; failures are reserved for rejected or undeliverable requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: Action,
    pub success: bool,
    pub delta: u64,
    pub reason: String,
}

impl ActionOutcome {
    pub fn gained(action: Action, delta: u64) -> Self {
        Self {
            action,
            success: true,
            delta,
            reason: "ok".to_string(),
        }
    }

    pub fn failed(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            success: false,
            delta: 0,
            reason: reason.into(),
        }
    }

    /// Human-readable line for the profile's last-status field.
    pub fn status_line(&self) -> String {
        match (self.action, self.success) {
            (Action::Experience, true) => format!("+{} XP", self.delta),
            (Action::Currency, true) => format!("+{} gems", self.delta),
            (Action::Streak, true) => format!("+{} streak", self.delta),
            (Action::Repair, true) => format!("repaired +{}", self.delta),
            (Action::Experience, false) => format!("xp fail: {}", self.reason),
            (Action::Currency, false) => format!("gem fail: {}", self.reason),
            (Action::Streak, false) => format!("streak: {}", self.reason),
            (Action::Repair, false) => format!("repair: {}", self.reason),
        }
    }
}
