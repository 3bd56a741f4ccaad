//! HTTP route handlers for the control bridge.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use farmer::status::StatusReport;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::BridgeState;

/// Build the API router.
pub fn api_router() -> Router<BridgeState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/cmd", post(post_cmd))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/status - the status projection as JSON.
async fn get_status(State(state): State<BridgeState>) -> Json<StatusReport> {
    Json(state.report())
}

#[derive(Debug, Deserialize)]
pub struct CmdRequest {
    #[serde(default)]
    cmd: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CmdResponse {
    ok: bool,
}

/// POST /api/cmd - enqueue one command line.
///
/// The line is only queued here; the console applies it on its next drain,
/// and unknown or malformed lines are dropped there.
async fn post_cmd(
    State(state): State<BridgeState>,
    Json(request): Json<CmdRequest>,
) -> Result<Json<CmdResponse>, StatusCode> {
    debug!(cmd = %request.cmd, "bridge command");
    if !state.commands.send(request.cmd.trim()) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(CmdResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use farmer::core::goals::GoalSet;
    use farmer::core::types::Strategy;
    use farmer::dispatcher::{Origin, QueuedLine, command_queue};
    use farmer::profile::{ProfileRegistry, ProfileSettings};

    fn state() -> (BridgeState, farmer::dispatcher::CommandQueue) {
        let registry = Arc::new(ProfileRegistry::new());
        registry.create(
            None,
            ProfileSettings {
                strategy: Strategy::CurrencyFarm,
                delay: Duration::from_millis(800),
                goals: GoalSet::default(),
            },
        );
        let (sender, queue) = command_queue();
        (
            BridgeState::new(registry, sender, Duration::from_millis(300)),
            queue,
        )
    }

    #[tokio::test]
    async fn status_lists_profiles_with_placeholders() {
        let (state, _queue) = state();

        let Json(report) = get_status(State(state)).await;

        assert_eq!(report.profiles.len(), 1);
        assert_eq!(report.profiles[0].label, "profile1");
        assert_eq!(report.profiles[0].user, farmer::status::PLACEHOLDER);
    }

    #[tokio::test]
    async fn cmd_enqueues_trimmed_line() {
        let (state, mut queue) = state();

        let response = post_cmd(
            State(state),
            Json(CmdRequest {
                cmd: " pause 1 \n".to_string(),
            }),
        )
        .await
        .expect("accepted");

        assert_eq!(response.0, CmdResponse { ok: true });
        assert_eq!(
            queue.drain(),
            vec![QueuedLine {
                origin: Origin::Bridge,
                line: "pause 1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn cmd_after_shutdown_is_unavailable() {
        let (state, mut queue) = state();
        queue.close();

        let result = post_cmd(
            State(state),
            Json(CmdRequest {
                cmd: "quit".to_string(),
            }),
        )
        .await;

        assert_eq!(result.err(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }
}
