//! Outbound notification sinks.
//!
//! # Responsibility
//! - Deliver pass summaries and abort notices to a human.
//! - Keep chat credentials out of log lines and error messages.
//!
//! # Invariants
//! - Delivery is fire-and-forget: a failing sink never aborts a pass.
//! - Chat messages never exceed the channel's length limit.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_CHANNEL: &str = "telegram";
const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const TRUNCATED_SUFFIX: &str = "\n(truncated)";

/// Delivery failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError {
    pub channel: String,
    pub message: String,
}

impl NotifyError {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification via `{}` failed: {}", self.channel, self.message)
    }
}

impl Error for NotifyError {}

/// Accepts plain or lightly marked-up text for a human.
pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Sink writing each message to the log. Used when no chat channel is set up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        for line in message.lines() {
            info!("event=notify module=notify channel=log line={line}");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sink posting HTML messages through the Telegram bot `sendMessage` API.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API_BASE, bot_token, chat_id)
    }

    /// Same as [`TelegramNotifier::new`] against another API host.
    pub fn with_api_base(
        api_base: &str,
        bot_token: &str,
        chat_id: &str,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|err| NotifyError::new(TELEGRAM_CHANNEL, err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
        })
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let text = fit_message(message, TELEGRAM_MAX_MESSAGE_CHARS);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "HTML",
        };

        // Request URLs embed the bot token; strip them from transport errors.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|err| {
                NotifyError::new(TELEGRAM_CHANNEL, err.without_url().to_string())
            })?;
        let status = response.status();
        let reply: BotResponse = response.json().map_err(|err| {
            NotifyError::new(
                TELEGRAM_CHANNEL,
                format!("status {status}: {}", err.without_url()),
            )
        })?;

        if !status.is_success() || !reply.ok {
            let description = reply
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(NotifyError::new(
                TELEGRAM_CHANNEL,
                format!("status {status}: {description}"),
            ));
        }

        debug!(
            "event=notify module=notify channel={} status=ok chars={}",
            TELEGRAM_CHANNEL,
            text.chars().count()
        );
        Ok(())
    }
}

/// Caps `message` at `max_chars`, cutting at a line break so markup on the
/// kept lines stays balanced.
fn fit_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }

    let budget = max_chars.saturating_sub(TRUNCATED_SUFFIX.chars().count());
    let head: String = message.chars().take(budget).collect();
    let kept = match head.rfind('\n') {
        Some(cut) => &head[..cut],
        None => head.as_str(),
    };
    format!("{kept}{TRUNCATED_SUFFIX}")
}
