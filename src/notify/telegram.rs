//! Telegram alert delivery.
//!
//! Sends alerts to a Telegram chat through the bot API: `sendPhoto` with the
//! annotated snapshot attached when one is available, `sendMessage`
//! otherwise. Transport failures are returned to the dispatcher, which logs
//! them; the pipeline never retries a fired alert.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use super::{AlertMessage, Notifier};

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MULTIPART_BOUNDARY: &str = "firewatch-alert-boundary";

/// Bot credentials and destination chat.
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(anyhow!("telegram bot token must not be empty"));
        }
        if self.chat_id.trim().is_empty() {
            return Err(anyhow!("telegram chat id must not be empty"));
        }
        Ok(())
    }
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point the notifier at a different API host. Used by tests.
    #[cfg(test)]
    fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base, self.config.bot_token, method
        )
    }

    fn send_message(&self, caption: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": caption,
        });
        ureq::post(&self.method_url("sendMessage"))
            .timeout(REQUEST_TIMEOUT)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .context("send telegram message")?;
        Ok(())
    }

    fn send_photo(&self, caption: &str, jpeg: &[u8]) -> Result<()> {
        let body = multipart_photo_body(MULTIPART_BOUNDARY, &self.config.chat_id, caption, jpeg);
        ureq::post(&self.method_url("sendPhoto"))
            .timeout(REQUEST_TIMEOUT)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .send_bytes(&body)
            .context("send telegram photo")?;
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn notify(&mut self, message: &AlertMessage) -> Result<()> {
        let caption = build_caption(message);
        match &message.snapshot_jpeg {
            Some(jpeg) => self.send_photo(&caption, jpeg),
            None => self.send_message(&caption),
        }
    }
}

/// Build the alert caption shown in the chat.
fn build_caption(message: &AlertMessage) -> String {
    format!(
        "ALERT: {} detected\nConfidence: {:.2}\nStream time: {:.1}s\nSource: {}",
        message.label,
        message.event.confidence,
        message.event.timestamp.as_secs_f64(),
        message.source
    )
}

/// Encode a `sendPhoto` request body: a `chat_id` field, a `caption` field,
/// and the JPEG as the `photo` file part.
fn multipart_photo_body(boundary: &str, chat_id: &str, caption: &str, jpeg: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(jpeg.len() + 512);
    let mut text_field = |body: &mut Vec<u8>, name: &str, value: &str| {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    };

    text_field(&mut body, "chat_id", chat_id);
    text_field(&mut body, "caption", caption);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"photo\"; filename=\"alert.jpg\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
