//! Shared state for the control bridge handlers.

use std::sync::Arc;
use std::time::Duration;

use farmer::dispatcher::{CommandSender, Origin};
use farmer::profile::ProfileRegistry;
use farmer::status::{StatusReport, aggregate};

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct BridgeState {
    /// Read-only view of the live profiles.
    pub registry: Arc<ProfileRegistry>,
    /// Lines posted to `/api/cmd` join the console's command queue, tagged
    /// as bridge input.
    pub commands: CommandSender,
    /// Interval between SSE status events.
    pub refresh: Duration,
}

impl BridgeState {
    pub fn new(registry: Arc<ProfileRegistry>, commands: CommandSender, refresh: Duration) -> Self {
        Self {
            registry,
            commands: commands.with_origin(Origin::Bridge),
            refresh,
        }
    }

    pub fn report(&self) -> StatusReport {
        aggregate(&self.registry.all())
    }
}
