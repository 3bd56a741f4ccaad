//! Per-profile worker loop.
//!
//! `initializing → running ⇄ paused → stopped`. The loop reads the profile's
//! control flags only at iteration boundaries, so a command never tears an
//! in-flight request/response pair.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{StopCause, Strategy};
use crate::io::transport::Transport;
use crate::profile::Profile;
use crate::strategy::StrategyExecutor;

/// Status recorded when the baseline fetch fails.
pub const INIT_FAILED_STATUS: &str = "token/info fetch failed";

/// Summary of a finished worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Strategy iterations performed.
    pub iterations: u32,
    pub cause: Option<StopCause>,
}

/// Drive `profile` until it stops, then make one best-effort refresh.
///
/// Never returns an error: an unexpected fault is recorded as the profile's
/// last status and stops that profile only.
#[instrument(skip_all, fields(profile = profile.id()))]
pub async fn run_worker<T: Transport>(
    profile: Arc<Profile>,
    executor: StrategyExecutor<T>,
    pause_poll: Duration,
) -> WorkerOutcome {
    let mut iterations = 0;
    if let Err(err) = drive(&profile, &executor, pause_poll, &mut iterations).await {
        warn!(err = %format!("{err:#}"), iterations, "worker fault");
        profile.set_status(format!("exception: {err:#}"));
        profile.stop(StopCause::Fault);
    }

    if profile.baseline().is_some() {
        match executor.api().fetch_snapshot().await {
            Ok(Some(snapshot)) => profile.replace_snapshot(snapshot),
            Ok(None) => debug!("final refresh rejected"),
            Err(err) => debug!(err = %format!("{err:#}"), "final refresh failed"),
        }
    }

    let cause = profile.stop_cause();
    info!(iterations, cause = ?cause, "worker finished");
    WorkerOutcome { iterations, cause }
}

// Operator-visible changes the loop reports through the status line.
struct Observed {
    paused: bool,
    strategy: Strategy,
    targets_revision: u64,
}

impl Observed {
    fn of(profile: &Profile) -> Self {
        Self {
            paused: profile.is_paused(),
            strategy: profile.strategy(),
            targets_revision: profile.targets_revision(),
        }
    }

    fn report_changes(&mut self, profile: &Profile) {
        let now = Self::of(profile);
        if now.strategy != self.strategy {
            profile.set_status(format!("mode → {}", now.strategy));
        }
        if now.targets_revision != self.targets_revision {
            profile.set_status("targets set");
        }
        if now.paused != self.paused {
            profile.set_status(if now.paused { "paused" } else { "resumed" });
        }
        *self = now;
    }
}

async fn drive<T: Transport>(
    profile: &Profile,
    executor: &StrategyExecutor<T>,
    pause_poll: Duration,
    iterations: &mut u32,
) -> Result<()> {
    let baseline = match executor.api().fetch_snapshot().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            init_failed(profile);
            return Ok(());
        }
        Err(err) => {
            debug!(err = %format!("{err:#}"), "baseline fetch failed");
            init_failed(profile);
            return Ok(());
        }
    };
    let name = baseline.display_name.clone();
    if !profile.begin_running(baseline) {
        profile.set_status("stopped");
        return Ok(());
    }
    profile.set_status(format!("ready as {name}"));
    info!(user = %name, "profile running");

    let mut observed = Observed::of(profile);
    loop {
        observed.report_changes(profile);
        if profile.is_stopped() {
            if profile.stop_cause() == Some(StopCause::Command) {
                profile.set_status("stopped");
            }
            return Ok(());
        }
        if observed.paused {
            tokio::time::sleep(pause_poll).await;
            continue;
        }

        let strategy = observed.strategy;
        executor.run(profile, strategy).await?;
        *iterations += 1;

        if strategy.is_one_shot() {
            profile.stop(StopCause::Completed);
            return Ok(());
        }
        if let Some(counter) = profile.check_goals() {
            info!(counter = ?counter, "goal reached");
            profile.set_status("targets reached");
            return Ok(());
        }
        executor.pacing().wait(profile.delay()).await;
    }
}

fn init_failed(profile: &Profile) {
    warn!("baseline fetch failed; profile stopped");
    profile.set_status(INIT_FAILED_STATUS);
    profile.stop(StopCause::InitFailed);
}
