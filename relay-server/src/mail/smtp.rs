//! SMTP mail transport using lettre's blocking client.

use std::env;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use super::{MailError, MailTransport};
use crate::queue::EmailJob;

const DEFAULT_PORT: u16 = 587;
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// How the connection to the mail server is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS)
    Implicit,
    /// Plain connection upgraded with STARTTLS
    StartTls,
}

/// Mail server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Login name, also the From address
    pub user: String,
    pub password: String,
    /// Recipient of every submission
    pub to: String,
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl SmtpSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Empty values count as missing. Every missing variable is named in the
    /// error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("SMTP_HOST");
        let user = get("SMTP_USER");
        let password = get("SMTP_PASSWORD");
        let to = get("SMTP_TO");

        let missing: Vec<&str> = [
            ("SMTP_HOST", host.is_none()),
            ("SMTP_USER", user.is_none()),
            ("SMTP_PASSWORD", password.is_none()),
            ("SMTP_TO", to.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        let (Some(host), Some(user), Some(password), Some(to)) = (host, user, password, to) else {
            return Err(MailError::MissingConfig(missing.join(", ")));
        };

        let port = match get("SMTP_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(env_var = "SMTP_PORT", value = %raw, "Invalid port, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let tls = match get("SMTP_TLS").as_deref().map(str::trim) {
            None | Some("tls") => TlsMode::Implicit,
            Some("starttls") => TlsMode::StartTls,
            Some(other) => {
                warn!(env_var = "SMTP_TLS", value = %other, "Unknown TLS mode, using implicit TLS");
                TlsMode::Implicit
            }
        };

        let timeout_secs = match get("SMTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!(env_var = "SMTP_TIMEOUT_SECS", value = %raw, "Invalid timeout, using default");
                    DEFAULT_TIMEOUT_SECS
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(SmtpSettings {
            host,
            port,
            user,
            password,
            to,
            tls,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Build the outgoing message for a job.
pub fn build_message(settings: &SmtpSettings, job: &EmailJob) -> Result<Message, MailError> {
    let from: Mailbox = settings
        .user
        .parse()
        .map_err(|_| MailError::InvalidAddress(settings.user.clone()))?;
    let to: Mailbox = settings
        .to
        .parse()
        .map_err(|_| MailError::InvalidAddress(settings.to.clone()))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(job.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(job.body.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

/// Blocking SMTP transport.
///
/// Settings are read from the environment on every send, so a missing
/// variable surfaces as a failed delivery rather than a startup error. Each
/// send opens its own connection and closes it afterwards.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailer {
    settings: Option<SmtpSettings>,
}

impl SmtpMailer {
    /// Mailer that reads `SMTP_*` variables at send time.
    pub fn from_env() -> Self {
        Self { settings: None }
    }

    /// Mailer with fixed settings.
    pub fn with_settings(settings: SmtpSettings) -> Self {
        Self {
            settings: Some(settings),
        }
    }

    fn settings(&self) -> Result<SmtpSettings, MailError> {
        match &self.settings {
            Some(settings) => Ok(settings.clone()),
            None => SmtpSettings::from_env(),
        }
    }

    fn transport(settings: &SmtpSettings) -> Result<SmtpTransport, MailError> {
        let builder = match settings.tls {
            TlsMode::Implicit => SmtpTransport::relay(&settings.host),
            TlsMode::StartTls => SmtpTransport::starttls_relay(&settings.host),
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        Ok(builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(settings.timeout))
            .build())
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        let settings = self.settings()?;
        let message = build_message(&settings, job)?;
        let transport = Self::transport(&settings)?;

        info!(
            host = %settings.host,
            port = settings.port,
            tls = ?settings.tls,
            "smtp_send_starting"
        );

        let response = transport.send(&message).map_err(|e| {
            if e.is_permanent() {
                MailError::Rejected(e.to_string())
            } else {
                MailError::Smtp(e.to_string())
            }
        })?;

        info!(
            host = %settings.host,
            code = %response.code(),
            "smtp_send_complete"
        );

        Ok(())
    }
}
