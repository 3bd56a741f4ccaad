//! Remote service boundary: the handful of calls the strategies need.
//!
//! Payload shapes live here and nowhere else. Every call goes through the
//! [`ResilientClient`], so transient failures are already retried by the time
//! a result reaches the strategy layer.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::core::snapshot::ProgressSnapshot;
use crate::io::client::ResilientClient;
use crate::io::config::ServiceConfig;
use crate::io::transport::{ApiRequest, Transport};

const USER_FIELDS: &str = "id,username,fromLanguage,learningLanguage,streak,totalXp,gems,streakData";
/// Finalized practice sessions claim to have lasted this long.
pub const SESSION_LENGTH_SECS: i64 = 60;
/// Response bodies are cut to this many characters in diagnostics.
pub const DIAGNOSTIC_BODY_LIMIT: usize = 200;

const CHALLENGE_TYPES: &[&str] = &[
    "assist",
    "characterIntro",
    "characterMatch",
    "characterPuzzle",
    "characterSelect",
    "characterTrace",
    "characterWrite",
    "completeReverseTranslation",
    "definition",
    "dialogue",
    "extendedMatch",
    "extendedListenMatch",
    "form",
    "freeResponse",
    "gapFill",
    "judge",
    "listen",
    "listenComplete",
    "listenMatch",
    "match",
    "name",
    "listenComprehension",
    "listenIsolation",
    "listenSpeak",
    "listenTap",
    "orderTapComplete",
    "partialListen",
    "partialReverseTranslate",
    "patternTapComplete",
    "radioBinary",
    "radioImageSelect",
    "radioListenMatch",
    "radioListenRecognize",
    "radioSelect",
    "readComprehension",
    "reverseAssist",
    "sameDifferent",
    "select",
    "selectPronunciation",
    "selectTranscription",
    "svgPuzzle",
    "syllableTap",
    "syllableListenTap",
    "speak",
    "tapCloze",
    "tapClozeTable",
    "tapComplete",
    "tapCompleteTable",
    "tapDescribe",
    "translate",
    "transliterate",
    "transliterationAssist",
    "typeCloze",
    "typeClozeTable",
    "typeComplete",
    "typeCompleteTable",
    "writeComprehension",
];

/// Result of finalizing a practice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalize {
    Accepted,
    /// Diagnostic reason: `no_session_id` or `"<status>:<body excerpt>"`.
    Rejected(String),
}

/// Extract the account id (`sub` claim) from a JWT without verifying it.
pub fn account_id_from_token(token: &str) -> Option<String> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    match claims.get("sub")? {
        Value::String(sub) if !sub.is_empty() => Some(sub.clone()),
        Value::Number(sub) => Some(sub.to_string()),
        _ => None,
    }
}

/// Typed calls against the remote service for one account.
pub struct ServiceApi<T> {
    client: ResilientClient<T>,
    endpoints: ServiceConfig,
    account_id: Option<String>,
}

impl<T: Transport> ServiceApi<T> {
    pub fn new(client: ResilientClient<T>, endpoints: ServiceConfig, token: &str) -> Self {
        let account_id = account_id_from_token(token);
        if account_id.is_none() {
            warn!("token carries no decodable account id");
        }
        Self {
            client,
            endpoints,
            account_id,
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn currency_per_reward(&self) -> u64 {
        self.endpoints.currency_per_reward
    }

    /// Fetch the account's counters. `Ok(None)` when the token has no account
    /// id or the service rejects the request.
    #[instrument(skip_all)]
    pub async fn fetch_snapshot(&self) -> Result<Option<ProgressSnapshot>> {
        let Some(account) = self.account_id() else {
            return Ok(None);
        };
        let url = format!(
            "{}/users/{account}?fields={USER_FIELDS}",
            self.endpoints.api_base
        );
        let response = self
            .client
            .execute(&ApiRequest::get(url))
            .await
            .context("fetch user info")?;
        if !response.is_success() {
            debug!(status = response.status, "user info rejected");
            return Ok(None);
        }
        let snapshot =
            ProgressSnapshot::from_json(&response.json()?).context("decode user info")?;
        Ok(Some(snapshot))
    }

    /// Redeem the configured reward once. `true` when the service accepted it.
    #[instrument(skip_all)]
    pub async fn redeem_reward(&self, snapshot: &ProgressSnapshot) -> Result<bool> {
        let Some(account) = self.account_id() else {
            return Ok(false);
        };
        let url = format!(
            "{}/users/{account}/rewards/{}",
            self.endpoints.api_base, self.endpoints.reward_id
        );
        let body = json!({
            "consumed": true,
            "learningLanguage": snapshot.target_locale,
            "fromLanguage": snapshot.source_locale,
        });
        let response = self
            .client
            .execute(&ApiRequest::patch(url, body))
            .await
            .context("redeem reward")?;
        debug!(status = response.status, "reward redemption answered");
        Ok(response.is_success())
    }

    /// Complete one story. `Some(awarded)` on success, where `awarded` may be zero.
    #[instrument(skip_all)]
    pub async fn complete_story(&self, snapshot: &ProgressSnapshot, now: i64) -> Result<Option<u64>> {
        let url = format!(
            "{}/stories/en-{}-{}/complete",
            self.endpoints.stories_base, snapshot.source_locale, self.endpoints.story_slug
        );
        let body = json!({
            "awardXp": true,
            "mode": "READ",
            "isLegendaryMode": true,
            "fromLanguage": snapshot.source_locale,
            "learningLanguage": "en",
            "startTime": now,
            "happyHourBonusXp": 449,
        });
        let response = self
            .client
            .execute(&ApiRequest::post(url, body))
            .await
            .context("complete story")?;
        if !response.is_success() {
            debug!(status = response.status, "story completion rejected");
            return Ok(None);
        }
        let awarded = response
            .json()?
            .get("awardedXp")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(Some(awarded))
    }

    /// Create a practice session. `None` when the service rejects it.
    #[instrument(skip_all)]
    pub async fn create_session(&self, snapshot: &ProgressSnapshot) -> Result<Option<Value>> {
        let url = format!("{}/sessions", self.endpoints.api_base);
        let body = json!({
            "challengeTypes": CHALLENGE_TYPES,
            "fromLanguage": snapshot.source_locale,
            "isFinalLevel": false,
            "isV2": true,
            "juicy": true,
            "learningLanguage": snapshot.target_locale,
            "smartTipsVersion": 2,
            "type": "GLOBAL_PRACTICE",
        });
        let response = self
            .client
            .execute(&ApiRequest::post(url, body))
            .await
            .context("create session")?;
        if !response.is_success() {
            debug!(status = response.status, "session creation rejected");
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }

    /// Finalize a created session as if it ran from `start` for
    /// [`SESSION_LENGTH_SECS`].
    #[instrument(skip_all, fields(start = start))]
    pub async fn finalize_session(&self, session: &Value, start: i64) -> Result<Finalize> {
        let Some(fields) = session.as_object() else {
            return Ok(Finalize::Rejected("no_session".to_string()));
        };
        let Some(id) = fields.get("id").and_then(session_id) else {
            return Ok(Finalize::Rejected("no_session_id".to_string()));
        };
        let mut body = fields.clone();
        body.insert("heartsLeft".to_string(), json!(0));
        body.insert("startTime".to_string(), json!(start));
        body.insert("endTime".to_string(), json!(start + SESSION_LENGTH_SECS));
        body.insert("failed".to_string(), json!(false));
        body.insert("maxInLessonStreak".to_string(), json!(9));
        body.insert("shouldLearnThings".to_string(), json!(true));

        let url = format!("{}/sessions/{id}", self.endpoints.api_base);
        let response = self
            .client
            .execute(&ApiRequest::put(url, Value::Object(body)))
            .await
            .context("finalize session")?;
        if response.is_success() {
            return Ok(Finalize::Accepted);
        }
        Ok(Finalize::Rejected(format!(
            "{}:{}",
            response.status,
            response.body_excerpt(DIAGNOSTIC_BODY_LIMIT)
        )))
    }
}

fn session_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
