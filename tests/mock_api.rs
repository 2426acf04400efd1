//! In-process stand-ins for the Slack and Squadcast APIs, used by the
//! end-to-end sync tests. Each mock records the mutating calls it receives so
//! tests can assert on exactly what went over the wire.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// True when the sandbox refuses to let us bind a listener; tests skip
/// instead of failing in that case.
pub fn bind_denied(err: &(dyn std::error::Error + Send + Sync)) -> bool {
    err.to_string().contains("Operation not permitted")
        || err.to_string().contains("Permission denied")
}

#[derive(Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<Vec<(String, Value)>>>,
}

impl CallLog {
    pub fn record(&self, endpoint: &str, payload: Value) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((endpoint.to_string(), payload));
    }

    pub fn of(&self, endpoint: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(name, _)| name == endpoint)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

// ── mock Slack ──

/// Workspace fixture for the Slack mock: which emails resolve to which user
/// ids, the stored channel topic, optionally one email whose lookup fails
/// with a non-recoverable error code, and whether reading the channel topic
/// fails.
#[derive(Default)]
pub struct SlackFixture {
    pub users: HashMap<String, String>,
    pub topic: String,
    pub error_email: Option<String>,
    pub fail_topic_fetch: bool,
}

#[derive(Clone)]
struct SlackMockState {
    users: Arc<HashMap<String, String>>,
    topic: Arc<Mutex<String>>,
    error_email: Option<String>,
    fail_topic_fetch: bool,
    calls: CallLog,
}

async fn lookup_by_email(
    State(state): State<SlackMockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let email = params.get("email").cloned().unwrap_or_default();
    state.calls.record("users.lookupByEmail", json!({ "email": email }));

    if state.error_email.as_deref() == Some(email.as_str()) {
        return Json(json!({ "ok": false, "error": "fatal_error" }));
    }
    match state.users.get(&email) {
        Some(id) => Json(json!({
            "ok": true,
            "user": {
                "id": id,
                "name": email,
                "profile": { "email": email },
            },
        })),
        None => Json(json!({ "ok": false, "error": "users_not_found" })),
    }
}

async fn update_user_group(
    State(state): State<SlackMockState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    state.calls.record("usergroups.users.update", payload);
    Json(json!({ "ok": true }))
}

async fn conversations_info(State(state): State<SlackMockState>) -> Json<Value> {
    if state.fail_topic_fetch {
        return Json(json!({ "ok": false, "error": "channel_not_found" }));
    }
    let topic = state.topic.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Json(json!({
        "ok": true,
        "channel": { "topic": { "value": topic } },
    }))
}

async fn set_topic(
    State(state): State<SlackMockState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    if let Some(new_topic) = payload.get("topic").and_then(Value::as_str) {
        *state.topic.lock().unwrap_or_else(|e| e.into_inner()) = new_topic.to_string();
    }
    state.calls.record("conversations.setTopic", payload);
    Json(json!({ "ok": true }))
}

async fn auth_test() -> Json<Value> {
    Json(json!({ "ok": true, "user": "sync-bot", "user_id": "UBOT", "team": "Example Team" }))
}

async fn usergroups_list() -> Json<Value> {
    Json(json!({
        "ok": true,
        "usergroups": [
            { "id": "G1", "name": "On-call", "handle": "oncall" },
        ],
    }))
}

pub struct MockSlack {
    pub base_url: String,
    pub calls: CallLog,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockSlack {
    pub async fn start(fixture: SlackFixture) -> TestResult<Self> {
        let calls = CallLog::default();
        let state = SlackMockState {
            users: Arc::new(fixture.users),
            topic: Arc::new(Mutex::new(fixture.topic)),
            error_email: fixture.error_email,
            fail_topic_fetch: fixture.fail_topic_fetch,
            calls: calls.clone(),
        };

        let app = Router::new()
            .route("/users.lookupByEmail", get(lookup_by_email))
            .route("/usergroups.users.update", post(update_user_group))
            .route("/conversations.info", get(conversations_info))
            .route("/conversations.setTopic", post(set_topic))
            .route("/auth.test", get(auth_test))
            .route("/usergroups.list", get(usergroups_list))
            .with_state(state);

        let (base_url, shutdown) = serve(app).await?;
        Ok(Self {
            base_url,
            calls,
            shutdown: Some(shutdown),
        })
    }
}

impl Drop for MockSlack {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ── mock Squadcast ──

#[derive(Clone)]
struct SquadcastMockState {
    refresh_token: String,
    snapshots: Arc<Value>,
}

async fn access_token(
    State(state): State<SquadcastMockState>,
    headers: HeaderMap,
) -> axum::response::Response {
    let presented = headers
        .get("x-refresh-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == state.refresh_token {
        Json(json!({ "data": { "access_token": "mock-access-token" } })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "meta": { "error_message": "invalid refresh token" } })),
        )
            .into_response()
    }
}

async fn graphql(
    State(state): State<SquadcastMockState>,
    Json(_query): Json<Value>,
) -> Json<Value> {
    Json(json!({ "data": { "whoIsOncall": state.snapshots.as_ref() } }))
}

pub struct MockSquadcast {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockSquadcast {
    pub async fn start(refresh_token: &str, snapshots: Value) -> TestResult<Self> {
        let state = SquadcastMockState {
            refresh_token: refresh_token.to_string(),
            snapshots: Arc::new(snapshots),
        };

        let app = Router::new()
            .route("/oauth/access-token", get(access_token))
            .route("/v3/graphql", post(graphql))
            .with_state(state);

        let (base_url, shutdown) = serve(app).await?;
        Ok(Self {
            base_url,
            shutdown: Some(shutdown),
        })
    }
}

impl Drop for MockSquadcast {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve(app: Router) -> TestResult<(String, oneshot::Sender<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    Ok((format!("http://{}", addr), shutdown_tx))
}

// ── snapshot builders ──

pub fn user_json(id: &str, first: &str, email: &str) -> Value {
    json!({
        "ID": id,
        "name": format!("{} Example", first),
        "firstName": first,
        "lastName": "Example",
        "email": email,
    })
}

pub fn user_participant(user: Value) -> Value {
    let id = user["ID"].as_str().unwrap_or("p").to_string();
    json!({ "ID": format!("op-{}", id), "type": "user", "participant": user })
}

pub fn squad_participant(id: &str, members: Vec<Value>) -> Value {
    json!({
        "ID": format!("op-{}", id),
        "type": "squad",
        "participant": { "ID": id, "name": "Squad", "members": members },
    })
}

pub fn schedule_json(id: i64, name: &str, tags: Value, participants: Value) -> Value {
    json!({
        "schedule": {
            "ID": id,
            "name": name,
            "tags": tags,
            "teamID": "team-1",
            "paused": false,
        },
        "oncallParticipants": participants,
    })
}
