//! Test-only transports and fixtures.
//!
//! [`ScriptedTransport`] replays a fixed list of responses, for exercising
//! the retry client. [`FakeService`] is a small stateful stand-in for the
//! remote service that the strategy, worker and orchestrator tests drive end
//! to end.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use crate::io::transport::{ApiRequest, ApiResponse, Connector, Method, Transport};

/// Build an unsigned JWT whose payload carries `sub`.
pub fn fake_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": sub }).to_string());
    format!("{header}.{payload}.signature")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted transport result.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(ApiResponse),
    Fail(String),
}

impl Scripted {
    pub fn status(status: u16) -> Self {
        Scripted::Respond(ApiResponse::new(status, ""))
    }

    pub fn json(status: u16, body: Value) -> Self {
        Scripted::Respond(ApiResponse::new(status, body.to_string()))
    }

    pub fn body(status: u16, body: &str) -> Self {
        Scripted::Respond(ApiResponse::new(status, body))
    }

    pub fn error(message: &str) -> Self {
        Scripted::Fail(message.to_string())
    }

    pub fn retry_after(self, secs: u64) -> Self {
        match self {
            Scripted::Respond(mut response) => {
                response.retry_after = Some(secs);
                Scripted::Respond(response)
            }
            fail => fail,
        }
    }
}

#[derive(Default)]
struct Script {
    pending: VecDeque<Scripted>,
    requests: Vec<ApiRequest>,
}

/// Transport replaying scripted results in order. Clones share the script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new(results: Vec<Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                pending: results.into(),
                requests: Vec::new(),
            })),
        }
    }

    pub fn request_count(&self) -> usize {
        lock(&self.script).requests.len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.script).requests.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut script = lock(&self.script);
        script.requests.push(request.clone());
        match script.pending.pop_front() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(anyhow!(message)),
            None => bail!("script exhausted"),
        }
    }
}

/// Counters held by a [`FakeService`] account.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeAccount {
    pub username: String,
    pub experience: u64,
    pub currency: u64,
    pub streak: u64,
    pub streak_data: Value,
}

struct FakeState {
    account: FakeAccount,
    requests: Vec<ApiRequest>,
    award_xp: u64,
    award_currency: u64,
    reject_actions: Option<u16>,
    reject_fetch: Option<u16>,
    malformed_stories: bool,
    sessions: u64,
}

/// In-memory remote service answering the endpoints the engine calls.
///
/// Successful writes bump the account's counters the way the live service
/// does, so a later fetch reflects them. Clones share state.
#[derive(Clone)]
pub struct FakeService {
    state: Arc<Mutex<FakeState>>,
    latency: Duration,
}

impl FakeService {
    pub fn new(experience: u64, currency: u64, streak: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                account: FakeAccount {
                    username: "learner".to_string(),
                    experience,
                    currency,
                    streak,
                    streak_data: Value::Null,
                },
                requests: Vec::new(),
                award_xp: 40,
                award_currency: 30,
                reject_actions: None,
                reject_fetch: None,
                malformed_stories: false,
                sessions: 0,
            })),
            latency: Duration::ZERO,
        }
    }

    /// Every request waits this long (virtual time under a paused clock).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_streak_data(self, data: Value) -> Self {
        lock(&self.state).account.streak_data = data;
        self
    }

    pub fn with_xp_award(self, award: u64) -> Self {
        lock(&self.state).award_xp = award;
        self
    }

    /// Answer every write with `status`.
    pub fn rejecting_actions(self, status: u16) -> Self {
        lock(&self.state).reject_actions = Some(status);
        self
    }

    /// Answer every user-info fetch with `status`.
    pub fn rejecting_fetch(self, status: u16) -> Self {
        lock(&self.state).reject_fetch = Some(status);
        self
    }

    /// Answer story completions with a body that is not JSON.
    pub fn with_malformed_stories(self) -> Self {
        lock(&self.state).malformed_stories = true;
        self
    }

    pub fn account(&self) -> FakeAccount {
        lock(&self.state).account.clone()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Requests whose method is not `GET`.
    pub fn writes(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method != Method::Get)
            .collect()
    }

    fn respond(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        if request.method == Method::Get {
            if let Some(status) = state.reject_fetch {
                return ApiResponse::new(status, r#"{"error":"unauthorized"}"#);
            }
            if request.url.contains("/users/") {
                let account = &state.account;
                let body = json!({
                    "username": account.username,
                    "fromLanguage": "vi",
                    "learningLanguage": "en",
                    "streak": account.streak,
                    "totalXp": account.experience,
                    "gems": account.currency,
                    "streakData": account.streak_data,
                });
                return ApiResponse::new(200, body.to_string());
            }
            return ApiResponse::new(404, "");
        }
        if let Some(status) = state.reject_actions {
            return ApiResponse::new(status, r#"{"error":"rejected"}"#);
        }
        match request.method {
            Method::Patch if request.url.contains("/rewards/") => {
                state.account.currency += state.award_currency;
                ApiResponse::new(200, "{}")
            }
            Method::Post if request.url.contains("/stories/") => {
                if state.malformed_stories {
                    return ApiResponse::new(200, "<html>");
                }
                let award = state.award_xp;
                state.account.experience += award;
                ApiResponse::new(200, json!({ "awardedXp": award }).to_string())
            }
            Method::Post if request.url.ends_with("/sessions") => {
                state.sessions += 1;
                let id = format!("session-{}", state.sessions);
                ApiResponse::new(200, json!({ "id": id, "challenges": [] }).to_string())
            }
            Method::Put if request.url.contains("/sessions/") => {
                state.account.streak += 1;
                ApiResponse::new(200, "{}")
            }
            _ => ApiResponse::new(404, ""),
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.respond(request))
    }
}

/// Connector handing out [`FakeService`]s by token.
///
/// Unregistered tokens connect to a service that rejects every request.
#[derive(Clone, Default)]
pub struct FakeConnector {
    accounts: Arc<Mutex<HashMap<String, FakeService>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` for `token` and return it for later inspection.
    pub fn register(&self, token: &str, service: FakeService) -> FakeService {
        lock(&self.accounts).insert(token.to_string(), service.clone());
        service
    }
}

impl Connector for FakeConnector {
    type Transport = FakeService;

    fn connect(&self, token: &str) -> Result<FakeService> {
        if token.trim().is_empty() {
            bail!("empty token");
        }
        let registered = lock(&self.accounts).get(token).cloned();
        Ok(registered.unwrap_or_else(|| {
            FakeService::new(0, 0, 0)
                .rejecting_fetch(401)
                .rejecting_actions(401)
        }))
    }
}
