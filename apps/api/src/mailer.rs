//! Outbound mail. Only one message exists today: the email-verification OTP.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::otp::OTP_TTL_MINUTES;
use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("mail task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Sends account mail. Carried in `AppState` as `Arc<dyn Mailer>`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError>;
}

pub fn otp_subject() -> &'static str {
    "Verify your Vitae account"
}

pub fn otp_body(code: &str) -> String {
    format!(
        "Your Vitae verification code is {code}.\n\n\
         The code expires in {OTP_TTL_MINUTES} minutes. \
         If you did not create an account, you can ignore this message."
    )
}

/// SMTP relay mailer. lettre's transport is blocking, so sends run on the blocking pool.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.config.from.parse()?)
            .to(to.parse()?)
            .subject(otp_subject())
            .body(otp_body(code))?;

        let transport = SmtpTransport::relay(&self.config.host)?
            .credentials(SmtpCredentials::new(
                self.config.user.clone(),
                self.config.password.clone(),
            ))
            .build();

        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        info!(to, "Verification email sent");
        Ok(())
    }
}

/// Development mailer: logs the code instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        warn!(to, code, "SMTP not configured; verification code logged instead of mailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_body_mentions_code_and_expiry() {
        let body = otp_body("042917");
        assert!(body.contains("042917"));
        assert!(body.contains("10 minutes"));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        assert!(LogMailer.send_otp("ada@example.com", "123456").await.is_ok());
    }
}
