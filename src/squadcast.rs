use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SquadcastError {
    #[error("Squadcast API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
        body: Option<serde_json::Value>,
    },
    #[error("Squadcast transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode Squadcast response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A key/value tag attached to a schedule. Tags are the only mechanism for
/// opting a schedule into sync (`slack-usergroup-id`) and into channel-topic
/// updates (`slack-channel-id`).
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "teamID")]
    pub team_id: String,
    pub paused: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Squad {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub members: Vec<User>,
}

/// An on-call participant is either an individual user or a squad. The API
/// discriminates by shape: a `members` field means squad. `Squad` must be
/// tried first so the untagged deserializer settles the variant at parse time.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Participant {
    Squad(Squad),
    User(User),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OncallParticipant {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub participant: Participant,
}

/// One schedule paired with whoever is on call for it right now.
#[derive(Debug, Clone, Deserialize)]
pub struct OncallSchedule {
    pub schedule: Schedule,
    #[serde(rename = "oncallParticipants", default)]
    pub oncall_participants: Vec<OncallParticipant>,
}

impl OncallSchedule {
    /// Flatten participants into an email list, in encounter order: a user
    /// contributes its own email, a squad contributes every member's email.
    /// Duplicates are passed through untouched.
    pub fn oncall_emails(&self) -> Vec<String> {
        self.oncall_users().into_iter().map(|u| u.email.clone()).collect()
    }

    /// Flatten participants into on-call users, in encounter order.
    pub fn oncall_users(&self) -> Vec<&User> {
        let mut users = Vec::new();
        for op in &self.oncall_participants {
            match &op.participant {
                Participant::User(user) => users.push(user),
                Participant::Squad(squad) => users.extend(squad.members.iter()),
            }
        }
        users
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    data: AccessTokenData,
}

#[derive(Debug, Deserialize)]
struct AccessTokenData {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: WhoIsOncallData,
}

#[derive(Debug, Deserialize)]
struct WhoIsOncallData {
    #[serde(rename = "whoIsOncall")]
    who_is_oncall: Vec<OncallSchedule>,
}

const WHO_IS_ONCALL_QUERY: &str = r#"query whoIsOncall($filters: WhoIsOncallFilters) {
	whoIsOncall(filters: $filters) {
		schedule {
			ID
			name
			paused
			tags {
				key
				value
			}
			teamID
		}
		oncallParticipants {
			ID
			type
			participant {
				... on User {
					ID
					name
					firstName
					lastName
					email
				}
				... on Squad {
					ID
					name
					members {
						ID
						name
						firstName
						lastName
						email
					}
				}
			}
		}
	}
}
"#;

/// Client for the Squadcast API. `connect` exchanges the long-lived refresh
/// token for an access token; every later call rides on that bearer token.
#[derive(Debug)]
pub struct SquadcastClient {
    http: Client,
    api_base_url: String,
    team_id: String,
    access_token: String,
}

impl SquadcastClient {
    pub async fn connect(
        refresh_token: &str,
        team_id: &str,
        auth_base_url: &str,
        api_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, SquadcastError> {
        info!("Initializing Squadcast client for team ID: {}", team_id);
        let http = Client::builder().timeout(timeout).build()?;

        let auth_url = format!("{}/oauth/access-token", auth_base_url);
        debug!("Requesting access token from {}", auth_url);
        let resp = http
            .get(&auth_url)
            .header("X-Refresh-Token", refresh_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<serde_json::Value>().await.ok();
            let message = format!(
                "failed to fetch access token: expected 200, got {}",
                status.as_u16()
            );
            error!("{}", message);
            return Err(SquadcastError::Api {
                message,
                status: Some(status.as_u16()),
                body,
            });
        }

        let token: AccessTokenResponse = resp.json().await?;
        debug!("Successfully obtained access token");

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            team_id: team_id.to_string(),
            access_token: token.data.access_token,
        })
    }

    /// Retrieve the current on-call schedules and participants for the team
    /// with a single GraphQL query.
    pub async fn who_is_oncall(&self) -> Result<Vec<OncallSchedule>, SquadcastError> {
        info!("Retrieving on-call schedules for team {}", self.team_id);

        let query = serde_json::json!({
            "query": WHO_IS_ONCALL_QUERY,
            "variables": { "filters": { "teamID": self.team_id } },
        });

        debug!("Sending GraphQL query to Squadcast API");
        let resp = self
            .http
            .post(format!("{}/v3/graphql", self.api_base_url))
            .bearer_auth(&self.access_token)
            .json(&query)
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/meta/error_message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            error!("API error: {}", message);
            return Err(SquadcastError::Api {
                message: format!("failed to retrieve schedules: {}", message),
                status: Some(status.as_u16()),
                body: Some(body),
            });
        }

        let parsed: GraphqlResponse = serde_json::from_value(body)?;
        debug!("Retrieved {} schedules", parsed.data.who_is_oncall.len());
        Ok(parsed.data.who_is_oncall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_json(id: &str, first: &str, email: &str) -> serde_json::Value {
        serde_json::json!({
            "ID": id,
            "name": format!("{} Example", first),
            "firstName": first,
            "lastName": "Example",
            "email": email,
        })
    }

    #[test]
    fn participant_variant_is_decided_by_shape() {
        let user: Participant =
            serde_json::from_value(user_json("u1", "Alice", "alice@example.com"))
                .expect("user participant");
        assert!(matches!(user, Participant::User(_)));

        let squad: Participant = serde_json::from_value(serde_json::json!({
            "ID": "sq1",
            "name": "Platform",
            "members": [user_json("u2", "Bob", "bob@example.com")],
        }))
        .expect("squad participant");
        match squad {
            Participant::Squad(s) => assert_eq!(s.members.len(), 1),
            Participant::User(_) => panic!("squad parsed as user"),
        }
    }

    #[test]
    fn flattening_keeps_encounter_order_and_duplicates() {
        let oncall: OncallSchedule = serde_json::from_value(serde_json::json!({
            "schedule": {
                "ID": 7,
                "name": "Primary",
                "tags": [],
                "teamID": "team-1",
                "paused": false,
            },
            "oncallParticipants": [
                {
                    "ID": "p1",
                    "type": "user",
                    "participant": user_json("u1", "Alice", "alice@example.com"),
                },
                {
                    "ID": "p2",
                    "type": "squad",
                    "participant": {
                        "ID": "sq1",
                        "name": "Platform",
                        "members": [
                            user_json("u2", "Bob", "bob@example.com"),
                            user_json("u1", "Alice", "alice@example.com"),
                        ],
                    },
                },
            ],
        }))
        .expect("oncall schedule");

        // One user plus a squad of two yields exactly three emails, duplicates kept.
        assert_eq!(
            oncall.oncall_emails(),
            vec![
                "alice@example.com".to_string(),
                "bob@example.com".to_string(),
                "alice@example.com".to_string(),
            ]
        );
        let first_names: Vec<&str> = oncall
            .oncall_users()
            .iter()
            .map(|u| u.first_name.as_str())
            .collect();
        assert_eq!(first_names, vec!["Alice", "Bob", "Alice"]);
    }

    #[test]
    fn graphql_envelope_parses_into_schedules() {
        let parsed: GraphqlResponse = serde_json::from_value(serde_json::json!({
            "data": {
                "whoIsOncall": [
                    {
                        "schedule": {
                            "ID": 1,
                            "name": "Primary",
                            "tags": [{ "key": "slack-usergroup-id", "value": "G1" }],
                            "teamID": "team-1",
                            "paused": false,
                        },
                        "oncallParticipants": [],
                    }
                ]
            }
        }))
        .expect("graphql response");
        assert_eq!(parsed.data.who_is_oncall.len(), 1);
        assert_eq!(parsed.data.who_is_oncall[0].schedule.name, "Primary");
    }
}
