//! Outbound email: delivery channels and ordered fallback.
//!
//! A [`Mailer`] holds channels in priority order and tries each one once per
//! message. Channels come from a JSON file listing HTTP mail API accounts;
//! [`LogEmailSender`] stands in when nothing is configured outside production.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::auth::verification::CODE_TTL_MINUTES;

/// Upper bound on a single delivery attempt.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Email delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message with status {0}")]
    Rejected(u16),
}

/// A plain-text message ready to send.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
    /// Display name for the `From` header.
    pub from_name: Option<String>,
}

/// One delivery channel.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Human-readable channel name for logs.
    fn name(&self) -> &str;

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Local dev sender that logs instead of sending.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(to_email = %message.to_email, subject = %message.subject, "email send stub");
        debug!(body = %message.body, "email send stub body");
        Ok(())
    }
}

/// Account entry in the sender configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct SenderConfig {
    /// Optional label; defaults to `from_email`.
    #[serde(default)]
    pub name: Option<String>,
    /// Endpoint accepting a JSON send request, e.g. `https://api.brevo.com/v3/smtp/email`.
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiSendBody<'a> {
    sender: ApiAddress<'a>,
    to: Vec<ApiAddress<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

/// Transactional mail API channel (Brevo-compatible JSON body, `api-key` header).
pub struct HttpApiSender {
    label: String,
    config: SenderConfig,
    client: reqwest::Client,
}

impl HttpApiSender {
    pub fn new(config: SenderConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        let label = config
            .name
            .clone()
            .unwrap_or_else(|| config.from_email.clone());
        Ok(Self {
            label,
            config,
            client,
        })
    }
}

#[async_trait]
impl EmailSender for HttpApiSender {
    fn name(&self) -> &str {
        &self.label
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let body = ApiSendBody {
            sender: ApiAddress {
                email: &self.config.from_email,
                name: message.from_name.as_deref(),
            },
            to: vec![ApiAddress {
                email: &message.to_email,
                name: None,
            }],
            subject: &message.subject,
            text_content: &message.body,
        };
        let resp = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Ordered list of delivery channels.
#[derive(Clone, Default)]
pub struct Mailer {
    channels: Vec<Arc<dyn EmailSender>>,
}

impl Mailer {
    pub fn new(channels: Vec<Arc<dyn EmailSender>>) -> Self {
        Self { channels }
    }

    /// Build HTTP channels from config entries. Entries whose client cannot
    /// be built are skipped.
    pub fn from_configs(configs: Vec<SenderConfig>) -> Self {
        let channels = configs
            .into_iter()
            .filter_map(|config| match HttpApiSender::new(config) {
                Ok(sender) => Some(Arc::new(sender) as Arc<dyn EmailSender>),
                Err(e) => {
                    warn!(error = %e, "skipping email sender");
                    None
                }
            })
            .collect();
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Try each channel once, in order. Returns `true` on the first success.
    pub async fn deliver(&self, message: &EmailMessage) -> bool {
        if self.channels.is_empty() {
            warn!("no email channels configured");
            return false;
        }
        for channel in &self.channels {
            match channel.send(message).await {
                Ok(()) => {
                    info!(to_email = %message.to_email, channel = channel.name(), "sent email");
                    return true;
                }
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "failed to send email");
                }
            }
        }
        error!(to_email = %message.to_email, "unable to send email using any configured channel");
        false
    }
}

/// Load sender entries from a JSON array file.
///
/// A missing or malformed file yields an empty list; entries missing
/// required fields are skipped.
pub fn load_sender_configs(path: &Path) -> Vec<SenderConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => {
            warn!(path = %path.display(), "email sender config file not found");
            return Vec::new();
        }
    };
    parse_sender_configs(&raw)
}

fn parse_sender_configs(raw: &str) -> Vec<SenderConfig> {
    let entries = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(entries)) => entries,
        Ok(_) => {
            error!("email sender config must be a list of accounts");
            return Vec::new();
        }
        Err(e) => {
            error!(error = %e, "failed to parse email sender config");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<SenderConfig>(entry) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "skipping invalid email sender entry");
                None
            }
        })
        .collect()
}

/// Bilingual verification code email.
pub fn verification_email(to_email: &str, code: &str, app_name: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: format!("{app_name} 验证码 / Verification Code"),
        body: format!(
            "您好！\n\n您的验证码是：{code}\n\
             {CODE_TTL_MINUTES} 分钟内有效，请勿泄露给他人。\n\n\
             Hello,\n\n\
             Your verification code is: {code}\n\
             It will expire in {CODE_TTL_MINUTES} minutes.\n"
        ),
        from_name: Some(app_name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        name: String,
        ok: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EmailSender for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
            self.calls.lock().unwrap().push(self.name.clone());
            if self.ok {
                Ok(())
            } else {
                Err(MailError::Rejected(503))
            }
        }
    }

    fn channel(name: &str, ok: bool, calls: &Arc<Mutex<Vec<String>>>) -> Arc<dyn EmailSender> {
        Arc::new(Scripted {
            name: name.into(),
            ok,
            calls: calls.clone(),
        })
    }

    fn message() -> EmailMessage {
        verification_email("a@b.com", "123456", "ituhouse")
    }

    #[tokio::test]
    async fn falls_back_in_order_until_success() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mailer = Mailer::new(vec![
            channel("first", false, &calls),
            channel("second", true, &calls),
            channel("third", true, &calls),
        ]);
        assert!(mailer.deliver(&message()).await);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn exhausted_channels_report_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mailer = Mailer::new(vec![channel("a", false, &calls), channel("b", false, &calls)]);
        assert!(!mailer.deliver(&message()).await);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_mailer_fails() {
        assert!(!Mailer::default().deliver(&message()).await);
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let mailer = Mailer::new(vec![Arc::new(LogEmailSender) as Arc<dyn EmailSender>]);
        assert!(mailer.deliver(&message()).await);
    }

    #[test]
    fn verification_email_carries_code() {
        let msg = message();
        assert_eq!(msg.to_email, "a@b.com");
        assert!(msg.subject.starts_with("ituhouse"));
        assert!(msg.body.contains("123456"));
        assert!(msg.body.contains("15 minutes"));
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let raw = r#"[
            {"name": "primary", "api_url": "https://mail.example/send", "api_key": "k", "from_email": "no-reply@example.com"},
            {"api_url": "https://mail.example/send"},
            "not an object"
        ]"#;
        let configs = parse_sender_configs(raw);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name.as_deref(), Some("primary"));
    }

    #[test]
    fn non_list_config_is_empty() {
        assert!(parse_sender_configs(r#"{"api_url": "x"}"#).is_empty());
        assert!(parse_sender_configs("not json").is_empty());
    }

    #[test]
    fn missing_file_is_empty() {
        assert!(load_sender_configs(Path::new("/nonexistent/email_senders.json")).is_empty());
    }
}
