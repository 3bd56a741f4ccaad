//! Read-only status projection over all profiles.

use std::sync::Arc;

use serde::Serialize;

use crate::core::types::{RunState, StopCause, Strategy};
use crate::profile::{Profile, ProfileView};

/// Shown in place of identity fields before the first snapshot arrives.
pub const PLACEHOLDER: &str = "…";

/// One profile's row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStatus {
    pub id: u32,
    pub label: String,
    pub strategy: Strategy,
    pub state: RunState,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_cause: Option<StopCause>,
    pub user: String,
    pub source_locale: String,
    pub target_locale: String,
    pub streak: u64,
    pub experience: u64,
    pub currency: u64,
    pub last_status: String,
}

impl ProfileStatus {
    /// Strategy name, marked when paused.
    pub fn mode_label(&self) -> String {
        if self.paused {
            format!("{} (paused)", self.strategy)
        } else {
            self.strategy.to_string()
        }
    }

    fn from_view(view: ProfileView) -> Self {
        let (user, source_locale, target_locale, streak, experience, currency) = match view.current {
            Some(snapshot) => (
                snapshot.display_name,
                snapshot.source_locale,
                snapshot.target_locale,
                snapshot.streak,
                snapshot.experience,
                snapshot.currency,
            ),
            None => (
                PLACEHOLDER.to_string(),
                PLACEHOLDER.to_string(),
                PLACEHOLDER.to_string(),
                0,
                0,
                0,
            ),
        };
        Self {
            id: view.id,
            label: view.label,
            strategy: view.strategy,
            state: view.state,
            paused: view.paused,
            stop_cause: view.stop_cause,
            user,
            source_locale,
            target_locale,
            streak,
            experience,
            currency,
            last_status: view.last_status,
        }
    }
}

/// Process-wide view: every profile plus running count and summed gains.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// Profiles running and not paused.
    pub running: usize,
    pub experience_gained: u64,
    pub currency_gained: u64,
    pub profiles: Vec<ProfileStatus>,
}

/// Project the profile collection. Never waits on a worker.
pub fn aggregate(profiles: &[Arc<Profile>]) -> StatusReport {
    let mut report = StatusReport::default();
    for profile in profiles {
        let view = profile.view();
        if view.is_active() {
            report.running += 1;
        }
        report.experience_gained += view.deltas.experience;
        report.currency_gained += view.deltas.currency;
        report.profiles.push(ProfileStatus::from_view(view));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::core::goals::GoalSet;
    use crate::core::snapshot::ProgressSnapshot;
    use crate::core::types::Counter;
    use crate::profile::ProfileSettings;

    fn settings(strategy: Strategy) -> ProfileSettings {
        ProfileSettings {
            strategy,
            delay: Duration::from_millis(800),
            goals: GoalSet::default(),
        }
    }

    fn snapshot(xp: u64, gems: u64) -> ProgressSnapshot {
        ProgressSnapshot::from_json(&json!({
            "username": "lin", "fromLanguage": "vi", "learningLanguage": "en",
            "streak": 4, "totalXp": xp, "gems": gems
        }))
        .expect("snapshot")
    }

    #[test]
    fn missing_snapshot_uses_placeholders() {
        let profile = Arc::new(Profile::new(1, "profile1", settings(Strategy::ExperienceFarm)));

        let report = aggregate(&[profile]);

        let row = &report.profiles[0];
        assert_eq!(row.user, PLACEHOLDER);
        assert_eq!(row.source_locale, PLACEHOLDER);
        assert_eq!((row.streak, row.experience, row.currency), (0, 0, 0));
        assert_eq!(row.state, RunState::Initializing);
        assert_eq!(report.running, 0);
    }

    #[test]
    fn totals_sum_gains_and_count_active_profiles() {
        let first = Arc::new(Profile::new(1, "profile1", settings(Strategy::CurrencyFarm)));
        first.begin_running(snapshot(100, 500));
        first.credit(Counter::Currency, 60);
        let second = Arc::new(Profile::new(2, "profile2", settings(Strategy::ExperienceFarm)));
        second.begin_running(snapshot(1000, 0));
        second.credit(Counter::Experience, 45);
        second.pause();
        let third = Arc::new(Profile::new(3, "profile3", settings(Strategy::StreakFarm)));
        third.begin_running(snapshot(5, 5));
        third.stop(StopCause::Command);

        let report = aggregate(&[first, second, third]);

        assert_eq!(report.running, 1);
        assert_eq!(report.currency_gained, 60);
        assert_eq!(report.experience_gained, 45);
        assert_eq!(report.profiles[1].mode_label(), "xp (paused)");
        assert_eq!(report.profiles[0].currency, 560);
    }

    #[test]
    fn serializes_operator_names() {
        let profile = Arc::new(Profile::new(1, "profile1", settings(Strategy::RotatingCombo)));
        profile.begin_running(snapshot(1, 2));

        let value = serde_json::to_value(aggregate(&[profile])).expect("json");

        assert_eq!(value["profiles"][0]["strategy"], json!("combo"));
        assert_eq!(value["profiles"][0]["state"], json!("running"));
        assert_eq!(value["running"], json!(1));
    }
}
