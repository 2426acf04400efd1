use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::slack::{SlackClient, SlackError};
use crate::squadcast::{OncallSchedule, Schedule, SquadcastClient};

pub const USERGROUP_TAG_KEY: &str = "slack-usergroup-id";
pub const CHANNEL_TAG_KEY: &str = "slack-channel-id";

/// Per-run outcome tally. Only feeds the final log line; nothing persists.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub skipped: usize,
}

/// The usergroup a schedule syncs into, if and only if the schedule carries
/// exactly one `slack-usergroup-id` tag. Zero or multiple tags opt the
/// schedule out.
pub fn usergroup_tag(schedule: &Schedule) -> Option<&str> {
    let mut tags = schedule.tags.iter().filter(|t| t.key == USERGROUP_TAG_KEY);
    match (tags.next(), tags.next()) {
        (Some(tag), None) => Some(tag.value.as_str()),
        _ => None,
    }
}

/// Channel ids named by a schedule's `slack-channel-id` tags. A tag value may
/// hold several ids separated by commas; entries are trimmed and empties
/// dropped.
pub fn channel_ids(schedule: &Schedule) -> Vec<String> {
    schedule
        .tags
        .iter()
        .filter(|t| t.key == CHANNEL_TAG_KEY)
        .flat_map(|t| t.value.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// One full reconciliation pass: fetch the on-call snapshot once, sync every
/// tagged schedule's usergroup membership, then bring tagged channel topics up
/// to date. Strictly sequential; no state survives the run.
pub async fn run(
    squadcast: &SquadcastClient,
    slack: &SlackClient,
) -> Result<RunReport, SyncError> {
    let oncall = squadcast.who_is_oncall().await?;

    let mut report = RunReport::default();
    let mut selected: Vec<&OncallSchedule> = Vec::new();
    let mut channels: Vec<String> = Vec::new();

    for state in &oncall {
        match usergroup_tag(&state.schedule) {
            Some(group_id) => {
                process_schedule(state, group_id, slack).await?;
                selected.push(state);
                report.processed += 1;
                for id in channel_ids(&state.schedule) {
                    if !channels.contains(&id) {
                        channels.push(id);
                    }
                }
            }
            None => {
                info!(
                    "Skipping schedule '{}' as no slack-usergroup-id tag is found",
                    state.schedule.name
                );
                report.skipped += 1;
            }
        }
    }

    // Topics are composed from the complete set of selected schedules, after
    // every membership update has gone out. Topic failures are not fatal.
    for channel_id in &channels {
        info!("Checking channel topic for channel {}", channel_id);
        if let Err(e) = update_channel_topic(channel_id, &selected, slack).await {
            error!("Failed to update channel topic for {}: {}", channel_id, e);
        }
    }

    Ok(report)
}

/// Sync one schedule's on-call members into its usergroup with a single
/// full-replace call. An email that Slack does not know is skipped; any other
/// Slack failure aborts the run.
async fn process_schedule(
    state: &OncallSchedule,
    group_id: &str,
    slack: &SlackClient,
) -> Result<(), SyncError> {
    let name = &state.schedule.name;
    info!("Processing schedule '{}' with Slack usergroup ID: {}", name, group_id);

    let emails = state.oncall_emails();
    if emails.is_empty() {
        warn!("No on-call users found for schedule '{}'", name);
        return Ok(());
    }

    info!("Looking up Slack IDs for {} users", emails.len());
    let mut user_ids = Vec::with_capacity(emails.len());
    for email in &emails {
        match slack.user_by_email(email).await {
            Ok(user) => {
                debug!("Found Slack ID {} for email {}", user.id, email);
                user_ids.push(user.id);
            }
            Err(e) if e.is_not_found() => {
                warn!("Email {} not found in Slack workspace - skipping this user", email);
            }
            Err(e) => {
                error!("Failed to find Slack user for email {}: {}", email, e);
                return Err(e.into());
            }
        }
    }

    if user_ids.is_empty() {
        warn!("No valid Slack users found for schedule '{}' - skipping update", name);
        return Ok(());
    }

    info!("Updating Slack usergroup ({}) with {} members", group_id, user_ids.len());
    slack.update_user_group(group_id, &user_ids).await?;
    info!("Successfully updated Slack usergroup for schedule '{}'", name);
    Ok(())
}

/// Compose the topic as one `"{schedule}: {mentions}"` line per schedule with
/// at least one on-call participant. A resolvable email becomes a `<@id>`
/// mention; an unresolvable one falls back to the participant's first name.
async fn compose_topic(schedules: &[&OncallSchedule], slack: &SlackClient) -> String {
    let mut lines = Vec::new();

    for state in schedules {
        let users = state.oncall_users();
        if users.is_empty() {
            continue;
        }

        let mut mentions = Vec::with_capacity(users.len());
        for user in users {
            match slack.user_by_email(&user.email).await {
                Ok(slack_user) => mentions.push(format!("<@{}>", slack_user.id)),
                Err(e) => {
                    warn!("Failed to find Slack user for email {}: {}", user.email, e);
                    mentions.push(user.first_name.clone());
                }
            }
        }

        lines.push(format!("{}: {}", state.schedule.name, mentions.join(" ")));
    }

    lines.join("\n")
}

/// Write the composed topic to one channel, skipping the write when the
/// stored topic is already byte-identical. A failed read of the current topic
/// is not fatal; the write proceeds best-effort.
async fn update_channel_topic(
    channel_id: &str,
    schedules: &[&OncallSchedule],
    slack: &SlackClient,
) -> Result<(), SlackError> {
    let new_topic = compose_topic(schedules, slack).await;
    if new_topic.is_empty() {
        warn!("No oncall information available for channel topic");
        return Ok(());
    }

    match slack.channel_topic(channel_id).await {
        Ok(current) if current == new_topic => {
            info!("Channel topic for {} is already up to date", channel_id);
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Could not get current topic for channel {}: {}", channel_id, e);
            info!("Proceeding with topic update for channel {}", channel_id);
        }
    }

    info!("Updating channel topic for channel {}", channel_id);
    slack.set_channel_topic(channel_id, &new_topic).await?;
    info!("Successfully updated channel topic for {}", channel_id);
    Ok(())
}
