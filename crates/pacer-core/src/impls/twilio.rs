//! TwilioNotifier - SMS 送信
//!
//! `POST {base}/2010-04-01/Accounts/{sid}/Messages.json`（form: To / From / Body, basic auth）。
//! 成功時はレスポンスの `sid` を [`MessageId`] として返す。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{build_client, normalize_base_url, snippet};
use crate::domain::{ConfigError, MessageId, PhoneNumber, SendError};
use crate::ports::NotifierSink;

pub const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// Static carrier credentials and the sending number.
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from: PhoneNumber,
}

pub struct TwilioNotifier {
    http: reqwest::Client,
    messages_url: String,
    credentials: TwilioCredentials,
}

impl TwilioNotifier {
    pub fn new(
        base_url: &str,
        credentials: TwilioCredentials,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if credentials.account_sid.trim().is_empty() {
            return Err(ConfigError::Missing("carrier account sid"));
        }
        // goes into the url path as-is
        if !credentials.account_sid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidAccountSid(credentials.account_sid));
        }
        let base = normalize_base_url(base_url)?;
        Ok(Self {
            http: build_client(timeout)?,
            messages_url: format!(
                "{base}/2010-04-01/Accounts/{}/Messages.json",
                credentials.account_sid
            ),
            credentials,
        })
    }
}

#[async_trait]
impl NotifierSink for TwilioNotifier {
    async fn send(&self, to: &PhoneNumber, text: &str) -> Result<MessageId, SendError> {
        let response = self
            .http
            .post(&self.messages_url)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[
                ("To", to.as_str()),
                ("From", self.credentials.from.as_str()),
                ("Body", text),
            ])
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(rejection(status.as_u16(), &body));
        }
        parse_message_id(&body)
    }
}

/// Build a [`SendError::Rejected`] from an error response, preferring the
/// carrier's own `message` field.
pub fn rejection(status: u16, body: &str) -> SendError {
    #[derive(Deserialize)]
    struct CarrierError {
        message: String,
        code: Option<u32>,
    }

    let message = match serde_json::from_str::<CarrierError>(body) {
        Ok(CarrierError {
            message,
            code: Some(code),
        }) => format!("{message} (code {code})"),
        Ok(CarrierError { message, code: None }) => message,
        Err(_) => snippet(body, 200),
    };
    SendError::Rejected { status, message }
}

pub fn parse_message_id(body: &str) -> Result<MessageId, SendError> {
    #[derive(Deserialize)]
    struct Created {
        sid: String,
    }

    serde_json::from_str::<Created>(body)
        .map(|created| MessageId::new(created.sid))
        .map_err(|e| SendError::Transport(format!("unexpected carrier response: {e}")))
}
