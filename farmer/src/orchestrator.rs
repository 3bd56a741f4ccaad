//! Owner of the profile collection and of the worker tasks driving it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::core::backoff::RetryPolicy;
use crate::core::goals::GoalSet;
use crate::core::types::{StopCause, Strategy};
use crate::io::client::ResilientClient;
use crate::io::config::{FarmConfig, ServiceConfig};
use crate::io::service::ServiceApi;
use crate::io::transport::Connector;
use crate::pacing::Pacing;
use crate::profile::{Profile, ProfileRegistry, ProfileSettings};
use crate::status::{StatusReport, aggregate};
use crate::strategy::StrategyExecutor;
use crate::worker::{WorkerOutcome, run_worker};

/// Parameters for a new profile. Unset fields take the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub label: Option<String>,
    pub token: String,
    pub strategy: Option<Strategy>,
    pub delay: Option<Duration>,
    pub goals: GoalSet,
}

/// Engine tunables shared by every profile.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_delay: Duration,
    pub pacing: Pacing,
    pub retry: RetryPolicy,
    pub pause_poll: Duration,
    pub service: ServiceConfig,
}

impl EngineSettings {
    pub fn from_config(config: &FarmConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            pacing: config.pacing(),
            retry: config.retry_policy(),
            pause_poll: config.pause_poll(),
            service: config.service.clone(),
        }
    }
}

/// Creates profiles, spawns one worker task per profile and stops them.
///
/// Must be used from within a tokio runtime.
pub struct Orchestrator<C> {
    connector: C,
    settings: EngineSettings,
    registry: Arc<ProfileRegistry>,
    workers: Vec<JoinHandle<WorkerOutcome>>,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C, settings: EngineSettings) -> Self {
        Self {
            connector,
            settings,
            registry: Arc::new(ProfileRegistry::new()),
            workers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Shared handle for read-only consumers such as the control bridge.
    pub fn registry(&self) -> Arc<ProfileRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn profile(&self, id: u32) -> Option<Arc<Profile>> {
        self.registry.get(id)
    }

    pub fn profiles(&self) -> Vec<Arc<Profile>> {
        self.registry.all()
    }

    pub fn status(&self) -> StatusReport {
        aggregate(&self.registry.all())
    }

    /// Register a profile and start its worker immediately.
    ///
    /// A token the connector refuses still yields a profile, stopped with a
    /// diagnostic, so the operator sees what happened.
    pub fn add_profile(&mut self, request: NewProfile) -> Arc<Profile> {
        let settings = ProfileSettings {
            strategy: request.strategy.unwrap_or(Strategy::ExperienceFarm),
            delay: self
                .settings
                .pacing
                .clamp_delay(request.delay.unwrap_or(self.settings.base_delay)),
            goals: request.goals,
        };
        let profile = self.registry.create(request.label, settings);
        info!(profile = profile.id(), strategy = %profile.strategy(), "profile added");

        let transport = match self.connector.connect(&request.token) {
            Ok(transport) => transport,
            Err(err) => {
                warn!(profile = profile.id(), err = %format!("{err:#}"), "connect failed");
                profile.set_status(format!("connect failed: {err:#}"));
                profile.stop(StopCause::InitFailed);
                return profile;
            }
        };
        let client = ResilientClient::new(transport, self.settings.retry, self.settings.pacing);
        let api = ServiceApi::new(client, self.settings.service.clone(), &request.token);
        let executor = StrategyExecutor::new(api, self.settings.pacing);
        let handle = tokio::spawn(run_worker(
            Arc::clone(&profile),
            executor,
            self.settings.pause_poll,
        ));
        self.workers.push(handle);
        profile
    }

    /// Flag every profile stopped. Workers notice at their next boundary.
    pub fn stop_all(&self) {
        for profile in self.registry.all() {
            if profile.stop(StopCause::Command) {
                debug!(profile = profile.id(), "stop requested");
            }
        }
    }

    /// Workers whose task has not finished yet.
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Stop everything and wait up to `grace` for workers to finish their
    /// final refresh. Workers still running after that are aborted.
    pub async fn shutdown(&mut self, grace: Duration) -> Vec<WorkerOutcome> {
        self.stop_all();
        let deadline = Instant::now() + grace;
        let mut outcomes = Vec::new();
        for mut handle in self.workers.drain(..) {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(err)) => warn!(err = %err, "worker task failed"),
                Err(_) => {
                    warn!("worker outlived shutdown grace; aborting");
                    handle.abort();
                }
            }
        }
        outcomes
    }
}
