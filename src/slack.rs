use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Slack API error: {message}")]
    Api {
        message: String,
        error_code: Option<String>,
        body: Option<Value>,
    },
    #[error("Slack transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode Slack response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SlackError {
    /// True for the recoverable email-lookup miss (`users_not_found`, the
    /// code `users.lookupByEmail` reports). Any other Slack failure is fatal
    /// for the run.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SlackError::Api { error_code: Some(code), .. } if code == "users_not_found"
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// A Slack workspace member as returned by `users.lookupByEmail`. Slack omits
/// plenty of fields depending on workspace settings, so everything but the id
/// defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_bot: bool,
}

/// Identity of the authenticated bot, from `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthIdentity {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: String,
}

/// Client for the Slack Web API, authenticated with a bot token.
pub struct SlackClient {
    http: Client,
    base_url: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(
        bot_token: &str,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SlackError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        info!("Initializing Slack client with base URL: {}", base_url);
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url,
            bot_token: bot_token.to_string(),
        })
    }

    /// Look up a workspace member by email. A `users_not_found` error code in
    /// the response surfaces through `SlackError::is_not_found`.
    pub async fn user_by_email(&self, email: &str) -> Result<SlackUser, SlackError> {
        debug!("Looking up Slack user with email: {}", email);
        let req = self
            .http
            .get(format!("{}/users.lookupByEmail", self.base_url))
            .query(&[("email", email)]);
        let body = self.call(req, "look up user by email").await?;
        Ok(serde_json::from_value(body["user"].clone())?)
    }

    /// Replace the full membership of a user group. Slack expects the member
    /// list as a comma-separated string; there is no incremental add/remove.
    pub async fn update_user_group(
        &self,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<(), SlackError> {
        info!("Updating user group {} with {} members", group_id, user_ids.len());
        let req = self
            .http
            .post(format!("{}/usergroups.users.update", self.base_url))
            .json(&serde_json::json!({
                "usergroup": group_id,
                "users": user_ids.join(","),
            }));
        self.call(req, "update user group").await?;
        info!("Successfully updated user group {}", group_id);
        Ok(())
    }

    /// Current topic of a channel; empty string when no topic is set.
    pub async fn channel_topic(&self, channel_id: &str) -> Result<String, SlackError> {
        debug!("Getting current topic for channel {}", channel_id);
        let req = self
            .http
            .get(format!("{}/conversations.info", self.base_url))
            .query(&[("channel", channel_id)]);
        let body = self.call(req, "get channel info").await?;
        Ok(body
            .pointer("/channel/topic/value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> Result<(), SlackError> {
        info!("Updating channel {} topic", channel_id);
        let req = self
            .http
            .post(format!("{}/conversations.setTopic", self.base_url))
            .json(&serde_json::json!({
                "channel": channel_id,
                "topic": topic,
            }));
        self.call(req, "set channel topic").await?;
        info!("Successfully updated channel {} topic", channel_id);
        Ok(())
    }

    /// Who the bot token authenticates as. Used by the preflight check.
    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
        let req = self.http.get(format!("{}/auth.test", self.base_url));
        let body = self.call(req, "test authentication").await?;
        Ok(serde_json::from_value(body)?)
    }

    /// All user groups visible to the bot. Used by the preflight check.
    pub async fn user_groups(&self) -> Result<Vec<UserGroup>, SlackError> {
        let req = self.http.get(format!("{}/usergroups.list", self.base_url));
        let body = self.call(req, "list user groups").await?;
        Ok(serde_json::from_value(body["usergroups"].clone())?)
    }

    /// Send a request and unwrap Slack's `ok`/`error` envelope. Slack reports
    /// API failures with HTTP 200 and `"ok": false`, so only the envelope is
    /// authoritative.
    async fn call(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value, SlackError> {
        let resp = req.bearer_auth(&self.bot_token).send().await?;
        let body: Value = resp.json().await?;

        if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            Ok(body)
        } else {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            error!("Failed to {}: {}", what, code);
            Err(SlackError::Api {
                message: format!("failed to {}: {}", what, code),
                error_code: Some(code),
                body: Some(body),
            })
        }
    }
}
