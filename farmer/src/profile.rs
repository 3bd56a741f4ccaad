//! Profiles: the unit of concurrency, and the registry that owns them.
//!
//! A profile's fields fall in two groups with one writer each. Control flags
//! (run state, pause, strategy, delay, goals) are written by the dispatcher and
//! read by the worker at iteration boundaries. Progress (baseline, current
//! snapshot, last status) is written by the worker and read by the status
//! projection. Each group sits behind its own short-lived lock that is never
//! held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use crate::core::goals::GoalSet;
use crate::core::snapshot::{Deltas, ProgressSnapshot};
use crate::core::types::{Counter, RunState, StopCause, Strategy};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Operator-chosen parameters for a new profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSettings {
    pub strategy: Strategy,
    pub delay: Duration,
    pub goals: GoalSet,
}

#[derive(Debug)]
struct Controls {
    state: RunState,
    paused: bool,
    strategy: Strategy,
    delay: Duration,
    goals: GoalSet,
    /// Bumped by every `targets` command, even one that changes nothing.
    targets_revision: u64,
    stop_cause: Option<StopCause>,
}

#[derive(Debug, Default)]
struct Progress {
    baseline: Option<ProgressSnapshot>,
    current: Option<ProgressSnapshot>,
    last_status: String,
}

/// Consistent copy of one profile for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub id: u32,
    pub label: String,
    pub state: RunState,
    pub paused: bool,
    pub strategy: Strategy,
    pub stop_cause: Option<StopCause>,
    pub current: Option<ProgressSnapshot>,
    pub deltas: Deltas,
    pub last_status: String,
}

impl ProfileView {
    /// Running and not paused.
    pub fn is_active(&self) -> bool {
        self.state == RunState::Running && !self.paused
    }
}

/// One account-bound unit of work.
#[derive(Debug)]
pub struct Profile {
    id: u32,
    label: String,
    controls: Mutex<Controls>,
    progress: Mutex<Progress>,
}

impl Profile {
    pub fn new(id: u32, label: impl Into<String>, settings: ProfileSettings) -> Self {
        Self {
            id,
            label: label.into(),
            controls: Mutex::new(Controls {
                state: RunState::Initializing,
                paused: false,
                strategy: settings.strategy,
                delay: settings.delay,
                goals: settings.goals,
                targets_revision: 0,
                stop_cause: None,
            }),
            progress: Mutex::new(Progress {
                last_status: "starting".to_string(),
                ..Progress::default()
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run_state(&self) -> RunState {
        lock(&self.controls).state
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.controls).paused
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.controls).state == RunState::Stopped
    }

    pub fn strategy(&self) -> Strategy {
        lock(&self.controls).strategy
    }

    pub fn delay(&self) -> Duration {
        lock(&self.controls).delay
    }

    pub fn goals(&self) -> GoalSet {
        lock(&self.controls).goals
    }

    pub fn stop_cause(&self) -> Option<StopCause> {
        lock(&self.controls).stop_cause
    }

    /// Set the pause flag. No effect on a stopped profile.
    pub fn pause(&self) -> bool {
        let mut controls = lock(&self.controls);
        if controls.state == RunState::Stopped || controls.paused {
            return false;
        }
        controls.paused = true;
        true
    }

    pub fn resume(&self) -> bool {
        let mut controls = lock(&self.controls);
        if controls.state == RunState::Stopped || !controls.paused {
            return false;
        }
        controls.paused = false;
        true
    }

    /// Move to `Stopped`. Only the first call takes effect; stopped is terminal.
    pub fn stop(&self, cause: StopCause) -> bool {
        let mut controls = lock(&self.controls);
        if controls.state == RunState::Stopped {
            return false;
        }
        controls.state = RunState::Stopped;
        controls.paused = false;
        controls.stop_cause = Some(cause);
        true
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        lock(&self.controls).strategy = strategy;
    }

    pub fn set_delay(&self, delay: Duration) {
        lock(&self.controls).delay = delay;
    }

    /// Overwrite the thresholds present in `update`, keeping the others.
    pub fn set_goals(&self, update: &GoalSet) {
        let mut controls = lock(&self.controls);
        controls.goals.merge(update);
        controls.targets_revision += 1;
    }

    /// How many times targets were set since creation.
    pub fn targets_revision(&self) -> u64 {
        lock(&self.controls).targets_revision
    }

    /// Record the baseline fetched at start and leave `Initializing`.
    ///
    /// Returns `false` when the profile was stopped while initializing; the
    /// snapshot is still kept so the dashboard shows the account.
    pub fn begin_running(&self, baseline: ProgressSnapshot) -> bool {
        {
            let mut progress = lock(&self.progress);
            progress.current = Some(baseline.clone());
            progress.baseline = Some(baseline);
        }
        let mut controls = lock(&self.controls);
        if controls.state != RunState::Initializing {
            return false;
        }
        controls.state = RunState::Running;
        true
    }

    pub fn baseline(&self) -> Option<ProgressSnapshot> {
        lock(&self.progress).baseline.clone()
    }

    pub fn current(&self) -> Option<ProgressSnapshot> {
        lock(&self.progress).current.clone()
    }

    /// Replace the current snapshot wholesale with a fresh fetch.
    pub fn replace_snapshot(&self, snapshot: ProgressSnapshot) {
        lock(&self.progress).current = Some(snapshot);
    }

    /// Credit a locally observed gain to the current snapshot.
    pub fn credit(&self, counter: Counter, delta: u64) {
        if let Some(current) = lock(&self.progress).current.as_mut() {
            current.credit(counter, delta);
        }
    }

    pub fn deltas(&self) -> Deltas {
        let progress = lock(&self.progress);
        match (&progress.baseline, &progress.current) {
            (Some(baseline), Some(current)) => Deltas::between(baseline, current),
            _ => Deltas::default(),
        }
    }

    pub fn set_status(&self, message: impl Into<String>) {
        lock(&self.progress).last_status = message.into();
    }

    pub fn last_status(&self) -> String {
        lock(&self.progress).last_status.clone()
    }

    /// Stop the profile if any goal is met. Returns the counter that tripped
    /// the stop, and `None` on every later call.
    pub fn check_goals(&self) -> Option<Counter> {
        let goals = {
            let controls = lock(&self.controls);
            if controls.state == RunState::Stopped || controls.goals.is_empty() {
                return None;
            }
            controls.goals
        };
        let reached = {
            let progress = lock(&self.progress);
            match (&progress.baseline, &progress.current) {
                (Some(baseline), Some(current)) => goals.reached(baseline, current),
                _ => None,
            }
        }?;
        self.stop(StopCause::GoalReached(reached)).then_some(reached)
    }

    pub fn view(&self) -> ProfileView {
        let (state, paused, strategy, stop_cause) = {
            let controls = lock(&self.controls);
            (
                controls.state,
                controls.paused,
                controls.strategy,
                controls.stop_cause,
            )
        };
        let progress = lock(&self.progress);
        let deltas = match (&progress.baseline, &progress.current) {
            (Some(baseline), Some(current)) => Deltas::between(baseline, current),
            _ => Deltas::default(),
        };
        ProfileView {
            id: self.id,
            label: self.label.clone(),
            state,
            paused,
            strategy,
            stop_cause,
            current: progress.current.clone(),
            deltas,
            last_status: progress.last_status.clone(),
        }
    }
}

/// Append-only collection of profiles, ids assigned in creation order from 1.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: RwLock<Vec<Arc<Profile>>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a profile. `label` defaults to `profile<id>`.
    pub fn create(&self, label: Option<String>, settings: ProfileSettings) -> Arc<Profile> {
        let mut profiles = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = profiles.len() as u32 + 1;
        let label = label.unwrap_or_else(|| format!("profile{id}"));
        let profile = Arc::new(Profile::new(id, label, settings));
        profiles.push(Arc::clone(&profile));
        profile
    }

    pub fn get(&self, id: u32) -> Option<Arc<Profile>> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|profile| profile.id() == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Arc<Profile>> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> ProfileSettings {
        ProfileSettings {
            strategy: Strategy::CurrencyFarm,
            delay: Duration::from_millis(800),
            goals: GoalSet::default(),
        }
    }

    fn snapshot(xp: u64, gems: u64, streak: u64) -> ProgressSnapshot {
        ProgressSnapshot::from_json(&json!({"totalXp": xp, "gems": gems, "streak": streak}))
            .expect("snapshot")
    }

    fn running_profile() -> Profile {
        let profile = Profile::new(1, "profile1", settings());
        assert!(profile.begin_running(snapshot(100, 500, 3)));
        profile
    }

    #[test]
    fn starts_initializing_without_snapshot() {
        let profile = Profile::new(1, "profile1", settings());
        assert_eq!(profile.run_state(), RunState::Initializing);
        assert_eq!(profile.current(), None);
        assert_eq!(profile.deltas(), Deltas::default());
    }

    #[test]
    fn pause_and_resume_leave_progress_untouched() {
        let profile = running_profile();
        profile.set_goals(&GoalSet {
            currency: Some(60),
            ..GoalSet::default()
        });
        let before = (profile.baseline(), profile.current(), profile.goals());

        assert!(profile.pause());
        assert!(!profile.view().is_active());
        assert!(profile.resume());

        assert!(profile.view().is_active());
        assert_eq!((profile.baseline(), profile.current(), profile.goals()), before);
    }

    #[test]
    fn stopped_is_terminal() {
        let profile = running_profile();
        assert!(profile.stop(StopCause::Command));
        assert!(!profile.stop(StopCause::Fault));
        assert!(!profile.pause());
        assert!(!profile.resume());
        assert_eq!(profile.stop_cause(), Some(StopCause::Command));
    }

    #[test]
    fn stop_during_init_keeps_profile_stopped() {
        let profile = Profile::new(1, "profile1", settings());
        profile.stop(StopCause::Command);
        assert!(!profile.begin_running(snapshot(1, 1, 1)));
        assert_eq!(profile.run_state(), RunState::Stopped);
        assert!(profile.current().is_some());
    }

    #[test]
    fn goal_check_stops_exactly_once() {
        let profile = running_profile();
        profile.set_goals(&GoalSet {
            currency: Some(60),
            ..GoalSet::default()
        });

        profile.credit(Counter::Currency, 30);
        assert_eq!(profile.check_goals(), None);
        profile.credit(Counter::Currency, 30);
        assert_eq!(profile.check_goals(), Some(Counter::Currency));
        assert_eq!(profile.check_goals(), None);

        assert_eq!(
            profile.stop_cause(),
            Some(StopCause::GoalReached(Counter::Currency))
        );
        assert_eq!(profile.deltas().currency, 60);
    }

    #[test]
    fn targets_merge_field_by_field() {
        let profile = running_profile();
        profile.set_goals(&GoalSet {
            experience: Some(500),
            ..GoalSet::default()
        });
        profile.set_goals(&GoalSet {
            streak: Some(2),
            ..GoalSet::default()
        });
        assert_eq!(
            profile.goals(),
            GoalSet {
                experience: Some(500),
                currency: None,
                streak: Some(2),
            }
        );
    }

    #[test]
    fn refreshed_snapshot_replaces_local_credit() {
        let profile = running_profile();
        profile.credit(Counter::Experience, 40);
        profile.replace_snapshot(snapshot(130, 500, 3));
        assert_eq!(profile.deltas().experience, 30);
    }

    #[test]
    fn registry_assigns_ids_in_creation_order() {
        let registry = ProfileRegistry::new();
        let first = registry.create(None, settings());
        let second = registry.create(Some("alt".to_string()), settings());

        assert_eq!(first.id(), 1);
        assert_eq!(first.label(), "profile1");
        assert_eq!(second.id(), 2);
        assert_eq!(second.label(), "alt");
        assert_eq!(registry.get(2).map(|p| p.id()), Some(2));
        assert!(registry.get(3).is_none());
        assert_eq!(registry.all().len(), 2);
    }
}
