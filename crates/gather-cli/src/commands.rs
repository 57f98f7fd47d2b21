use anyhow::{Context, Result};
use chrono::Utc;
use gather_core::{ApiClient, Config, TokenStatus};
use serde_json::{json, Value};

use crate::Command;

/// Page size for `get-messages`
const MESSAGE_PAGE_LIMIT: &str = "50";

pub async fn run(config: &Config, command: Command) -> Result<Value> {
    let client = ApiClient::new(config).context("Failed to create API client")?;

    let output = match command {
        Command::Auth => {
            let token = client.session().get_valid_token().await?;
            let preview: String = token.chars().take(20).collect();
            json!({"token": format!("{}...", preview), "status": "ok"})
        }
        Command::CreateChannel { name, description } => {
            client
                .post("/api/channels", &json!({"name": name, "description": description}))
                .await?
        }
        Command::SendMessage { channel_id, body } => {
            client
                .post(
                    &format!("/api/channels/{}/messages", channel_id),
                    &json!({"body": body}),
                )
                .await?
        }
        Command::GetChannels => client.get("/api/channels", &[]).await?,
        Command::GetMessages { channel_id, since } => {
            let mut query = vec![("limit", MESSAGE_PAGE_LIMIT)];
            if let Some(ref since) = since {
                query.push(("since", since.as_str()));
            }
            client
                .get(&format!("/api/channels/{}/messages", channel_id), &query)
                .await?
        }
        Command::GetBalance => client.get("/api/balance", &[]).await?,
        Command::Me => client.get("/api/agents/me", &[]).await?,
        Command::Status => status_report(client.session().status()),
        Command::Logout => {
            client.session().logout()?;
            json!({"status": "logged_out"})
        }
    };
    Ok(output)
}

fn status_report(status: Option<TokenStatus>) -> Value {
    let now = Utc::now().timestamp();
    match status {
        None => json!({"status": "no_session"}),
        Some(TokenStatus::Unverifiable) => json!({"status": "unverifiable"}),
        Some(status) => {
            let state = if status.is_valid() { "valid" } else { "needs_refresh" };
            json!({
                "status": state,
                "expires_at": status.expires_at(),
                "minutes_until_expiry": status.seconds_until_expiry(now).map(|s| s / 60),
            })
        }
    }
}
