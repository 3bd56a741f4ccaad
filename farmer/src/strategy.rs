//! Strategy executor: one unit of remote work per call.
//!
//! Remote rejections and undeliverable requests come back as failed
//! [`ActionOutcome`]s. Only unexpected faults (e.g. an unparseable success
//! body) escape as `Err`, for the worker to catch at its boundary.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::core::snapshot::ProgressSnapshot;
use crate::core::streak::{StreakWindow, backfill_timestamps, farm_timestamp};
use crate::core::types::{Action, ActionOutcome, Counter, Strategy};
use crate::io::client::RetriesExhausted;
use crate::io::service::{Finalize, ServiceApi};
use crate::io::transport::Transport;
use crate::pacing::Pacing;
use crate::profile::Profile;

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

// A request that outlasted its retries is an ordinary failure, not a fault.
fn undeliverable(action: Action, err: anyhow::Error) -> Result<ActionOutcome> {
    match err.downcast_ref::<RetriesExhausted>() {
        Some(exhausted) => Ok(ActionOutcome::failed(action, exhausted.to_string())),
        None => Err(err),
    }
}

/// Apply an outcome to the profile: credit the gain and record the status line.
pub fn apply_outcome(profile: &Profile, outcome: &ActionOutcome) {
    if let (true, Some(counter)) = (outcome.success, outcome.action.counter()) {
        profile.credit(counter, outcome.delta);
    }
    profile.set_status(outcome.status_line());
}

/// Runs strategies for one profile against its own service connection.
pub struct StrategyExecutor<T> {
    api: ServiceApi<T>,
    pacing: Pacing,
}

impl<T: Transport> StrategyExecutor<T> {
    pub fn new(api: ServiceApi<T>, pacing: Pacing) -> Self {
        Self { api, pacing }
    }

    pub fn api(&self) -> &ServiceApi<T> {
        &self.api
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Run one iteration of `strategy` and apply every outcome to `profile`.
    ///
    /// Returns the outcome of the last phase performed.
    #[instrument(skip_all, fields(profile = profile.id(), strategy = %strategy))]
    pub async fn run(&self, profile: &Profile, strategy: Strategy) -> Result<ActionOutcome> {
        let outcome = match strategy {
            Strategy::ExperienceFarm => self.farm_experience(profile).await?,
            Strategy::CurrencyFarm => self.farm_currency(profile).await?,
            Strategy::StreakFarm => self.farm_streak(profile, unix_now()).await?,
            Strategy::StreakRepair => self.repair_streak(profile, unix_now()).await?,
            Strategy::RotatingCombo => {
                let experience = self.farm_experience(profile).await?;
                apply_outcome(profile, &experience);
                self.pacing.wait(profile.delay()).await;
                let currency = self.farm_currency(profile).await?;
                apply_outcome(profile, &currency);
                self.farm_streak(profile, unix_now()).await?
            }
        };
        apply_outcome(profile, &outcome);
        debug!(success = outcome.success, delta = outcome.delta, reason = %outcome.reason, "iteration finished");
        Ok(outcome)
    }

    /// Complete one story; the awarded amount may be zero.
    pub async fn farm_experience(&self, profile: &Profile) -> Result<ActionOutcome> {
        let action = Action::Experience;
        let Some(snapshot) = profile.current() else {
            return Ok(ActionOutcome::failed(action, "no_user"));
        };
        match self.api.complete_story(&snapshot, unix_now()).await {
            Ok(Some(awarded)) => Ok(ActionOutcome::gained(action, awarded)),
            Ok(None) => Ok(ActionOutcome::failed(action, "rejected")),
            Err(err) => undeliverable(action, err),
        }
    }

    /// Redeem the fixed reward once for a known currency increment.
    pub async fn farm_currency(&self, profile: &Profile) -> Result<ActionOutcome> {
        let action = Action::Currency;
        let Some(snapshot) = profile.current() else {
            return Ok(ActionOutcome::failed(action, "no_user"));
        };
        match self.api.redeem_reward(&snapshot).await {
            Ok(true) => Ok(ActionOutcome::gained(action, self.api.currency_per_reward())),
            Ok(false) => Ok(ActionOutcome::failed(action, "rejected")),
            Err(err) => undeliverable(action, err),
        }
    }

    /// One backdated practice session, a day further back per streak gained.
    pub async fn farm_streak(&self, profile: &Profile, now: i64) -> Result<ActionOutcome> {
        let (Some(baseline), Some(current)) = (profile.baseline(), profile.current()) else {
            return Ok(ActionOutcome::failed(Action::Streak, "no_user"));
        };
        let start = farm_timestamp(now, baseline.streak, current.streak);
        self.streak_session(&current, start).await
    }

    /// Backfill every day missing from the current streak, then stop.
    ///
    /// Each successful backfill credits the profile's streak immediately.
    pub async fn repair_streak(&self, profile: &Profile, now: i64) -> Result<ActionOutcome> {
        let action = Action::Repair;
        let Some(snapshot) = profile.current() else {
            return Ok(ActionOutcome::failed(action, "no_user"));
        };
        let Some(window) = StreakWindow::from_metadata(&snapshot.streak_metadata, now) else {
            return Ok(ActionOutcome::failed(action, "no_currentStreak"));
        };
        let deficit = window.deficit(snapshot.streak);
        debug!(expected = window.expected_length(), observed = snapshot.streak, deficit, "repairing streak");

        let mut repaired = 0;
        for (attempt, start) in backfill_timestamps(now, deficit).into_iter().enumerate() {
            if attempt > 0 {
                self.pacing.wait(profile.delay()).await;
            }
            let outcome = self.streak_session(&snapshot, start).await?;
            if outcome.success {
                repaired += 1;
                profile.credit(Counter::Streak, 1);
            } else {
                debug!(start, reason = %outcome.reason, "backfill rejected");
            }
        }
        if repaired == 0 {
            return Ok(ActionOutcome::failed(action, "no_change"));
        }
        Ok(ActionOutcome::gained(action, repaired))
    }

    async fn streak_session(&self, snapshot: &ProgressSnapshot, start: i64) -> Result<ActionOutcome> {
        let action = Action::Streak;
        let session = match self.api.create_session(snapshot).await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(ActionOutcome::failed(action, "create_fail")),
            Err(err) => return undeliverable(action, err),
        };
        match self.api.finalize_session(&session, start).await {
            Ok(Finalize::Accepted) => Ok(ActionOutcome::gained(action, 1)),
            Ok(Finalize::Rejected(reason)) => Ok(ActionOutcome::failed(action, reason)),
            Err(err) => undeliverable(action, err),
        }
    }
}
