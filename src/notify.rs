//! Outbound notifications after a submission is applied.
//!
//! Best-effort by design: delivery failures are logged and never affect the
//! batch outcome.

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::Settings;

const WEBEX_MESSAGES_URL: &str = "https://webexapis.com/v1/messages";

/// Notify configured endpoints that a submission was applied for an identity.
pub fn submission_processed(settings: &Settings, submission_id: &str, keystore_id: &str) {
    if let (Some(token), Some(room_id)) = (&settings.bot_token, &settings.room_id) {
        let markdown = format!(
            "#### Form Data Added to freeZTP\r\n{keystore_id} \
             ([{submission_id}](https://jotform.com/edit/{submission_id})) \r\n\r\n---"
        );
        if let Err(err) = send_webex_message(token, room_id, &markdown) {
            tracing::warn!(error = %err, "webex notification failed");
        }
    }

    if let Some(url) = &settings.webhook_url {
        let message = format!(
            "<p><strong>Form Data Added to freeZTP</strong></p>\
             <p>{keystore_id} (<a href=\"https://jotform.com/edit/{submission_id}\">\
             {submission_id}</a>)</p><span style=\"display: none\">"
        );
        let payload = json!({
            "src-id": format!("formztp.{}", host_label()),
            "type": "status",
            "message": message,
        });
        if let Err(err) = send_webhook_message(url, &payload) {
            tracing::warn!(error = %err, "webhook notification failed");
        }
    }
}

fn send_webex_message(token: &str, room_id: &str, markdown: &str) -> Result<()> {
    ureq::post(WEBEX_MESSAGES_URL)
        .header("Authorization", format!("Bearer {token}"))
        .send_json(json!({ "roomId": room_id, "markdown": markdown }))
        .context("post webex message")?;
    Ok(())
}

fn send_webhook_message(url: &str, payload: &serde_json::Value) -> Result<()> {
    ureq::post(url)
        .send_json(payload)
        .context("post webhook message")?;
    Ok(())
}

fn host_label() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
