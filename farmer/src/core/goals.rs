//! Goal thresholds that auto-stop a profile.

use serde::{Deserialize, Serialize};

use crate::core::snapshot::{Deltas, ProgressSnapshot};
use crate::core::types::Counter;

/// Optional per-counter thresholds, measured against the profile's baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSet {
    pub experience: Option<u64>,
    pub currency: Option<u64>,
    pub streak: Option<u64>,
}

impl GoalSet {
    pub fn is_empty(&self) -> bool {
        self.experience.is_none() && self.currency.is_none() && self.streak.is_none()
    }

    pub fn threshold(&self, counter: Counter) -> Option<u64> {
        match counter {
            Counter::Experience => self.experience,
            Counter::Currency => self.currency,
            Counter::Streak => self.streak,
        }
    }

    /// Overwrite only the thresholds present in `update`.
    pub fn merge(&mut self, update: &GoalSet) {
        if let Some(value) = update.experience {
            self.experience = Some(value);
        }
        if let Some(value) = update.currency {
            self.currency = Some(value);
        }
        if let Some(value) = update.streak {
            self.streak = Some(value);
        }
    }

    /// First counter whose gain meets or exceeds its threshold, if any.
    pub fn reached(&self, baseline: &ProgressSnapshot, current: &ProgressSnapshot) -> Option<Counter> {
        let deltas = Deltas::between(baseline, current);
        [Counter::Experience, Counter::Currency, Counter::Streak]
            .into_iter()
            .find(|counter| {
                self.threshold(*counter)
                    .is_some_and(|target| deltas.get(*counter) >= target)
            })
    }
}
