//! Discord webhook notifier.
//!
//! Notifications are best-effort: [`DiscordNotifier::notify`] logs
//! failures and returns nothing, so a Discord outage never fails a
//! purchase or a ticket.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use seisen_core::Timestamp;

use crate::config::DiscordConfig;
use crate::error::{check_status, ClientError};
use crate::retry::{send_with_retry, RetryPolicy};

/// Discord rejects field values longer than this.
pub const FIELD_VALUE_LIMIT: usize = 1024;

/// One embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A rich embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            color,
            fields: Vec::new(),
            timestamp: Timestamp::now().to_rfc3339(),
        }
    }

    /// Append a field. Empty values become `N/A`; long ones are cut to
    /// [`FIELD_VALUE_LIMIT`] characters.
    pub fn field(mut self, name: impl Into<String>, value: impl AsRef<str>, inline: bool) -> Self {
        let value = value.as_ref().trim();
        let value = if value.is_empty() {
            "N/A".to_string()
        } else {
            value.chars().take(FIELD_VALUE_LIMIT).collect()
        };
        self.fields.push(EmbedField {
            name: name.into(),
            value,
            inline,
        });
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp.to_rfc3339();
        self
    }
}

/// Wrap a license key in spoiler markers so it is hidden until clicked.
pub fn spoiler(text: &str) -> String {
    format!("||{text}||")
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    embeds: &'a [Embed],
}

/// Posts messages to a Discord webhook. A notifier without a webhook is
/// valid and silently drops everything.
#[derive(Clone)]
pub struct DiscordNotifier {
    http: reqwest::Client,
    webhook: Option<Url>,
    mention: Option<String>,
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("enabled", &self.webhook.is_some())
            .field("mention", &self.mention)
            .finish()
    }
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: crate::http_client(Duration::from_secs(10))?,
            webhook: Some(config.webhook_url),
            mention: config.mention,
        })
    }

    /// A notifier that sends nothing.
    pub fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook: None,
            mention: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    /// Configured mention, e.g. `<@1234>`.
    pub fn mention(&self) -> Option<&str> {
        self.mention.as_deref()
    }

    /// `text` prefixed by the configured mention.
    pub fn with_mention(&self, text: &str) -> String {
        match &self.mention {
            Some(m) => format!("{m} {text}"),
            None => text.to_string(),
        }
    }

    /// Post a message and report the outcome.
    pub async fn send(&self, content: Option<&str>, embeds: &[Embed]) -> Result<(), ClientError> {
        let Some(url) = &self.webhook else {
            return Ok(());
        };
        let endpoint = "discord webhook";
        let message = WebhookMessage { content, embeds };
        let resp = send_with_retry(RetryPolicy::NONE, endpoint, || {
            self.http.post(url.clone()).json(&message).send()
        })
        .await
        .map_err(|source| ClientError::Http {
            endpoint: endpoint.into(),
            source,
        })?;
        check_status(endpoint, resp).await?;
        Ok(())
    }

    /// Post a message, logging instead of returning failures.
    pub async fn notify(&self, content: Option<&str>, embeds: &[Embed]) {
        if !self.is_enabled() {
            return;
        }
        match self.send(content, embeds).await {
            Ok(()) => tracing::debug!(embeds = embeds.len(), "Discord notification sent"),
            Err(e) => tracing::warn!(error = %e, "Discord notification failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_truncates_and_fills() {
        let long = "x".repeat(FIELD_VALUE_LIMIT + 50);
        let embed = Embed::new("t", 1).field("a", &long, false).field("b", "  ", true);
        assert_eq!(embed.fields[0].value.chars().count(), FIELD_VALUE_LIMIT);
        assert_eq!(embed.fields[1].value, "N/A");
        assert!(embed.fields[1].inline);
    }

    #[test]
    fn test_spoiler() {
        assert_eq!(spoiler("KEY-1"), "||KEY-1||");
    }

    #[test]
    fn test_message_omits_missing_content() {
        let embeds = [Embed::new("t", 0x3b82f6).at(Timestamp::from_millis(0))];
        let json = serde_json::to_value(WebhookMessage {
            content: None,
            embeds: &embeds,
        })
        .unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["embeds"][0]["color"], 0x3b82f6);
        assert_eq!(json["embeds"][0]["timestamp"], "1970-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = DiscordNotifier::disabled();
        assert!(!notifier.is_enabled());
        notifier.send(Some("hi"), &[]).await.unwrap();
        assert_eq!(notifier.with_mention("hi"), "hi");
    }
}
