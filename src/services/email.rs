//! Outgoing mail
//!
//! Password reset links are the only mail Meteor sends. Delivery goes through
//! the [`Mailer`] trait so auth flows can run without an SMTP server.

use crate::config::MailConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Something that can deliver a plain-text message
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Whether delivery is configured at all
    fn is_enabled(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP mailer built from [`MailConfig`]
pub struct EmailService {
    config: MailConfig,
}

impl EmailService {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .config
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_username, &self.config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for EmailService {
    fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::debug!("Mail sent to {}", to);
        Ok(())
    }
}

/// Deep link that opens the reset form in the web client
pub fn reset_link(public_url: &str, token: &str) -> String {
    format!(
        "{}/auth?reset=true&token={}",
        public_url.trim_end_matches('/'),
        token
    )
}

/// Subject and body of the password reset mail
pub fn reset_message(public_url: &str, token: &str, valid_minutes: i64) -> (String, String) {
    let subject = "Reset your Meteor password".to_string();
    let body = format!(
        "Hello,\n\nSomeone asked to reset the password for this account.\n\
         Open the link below to choose a new one:\n\n{}\n\n\
         The link works once and expires in {} minutes.\n\
         If you did not ask for this, you can ignore this mail.\n",
        reset_link(public_url, token),
        valid_minutes
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_link_format() {
        assert_eq!(
            reset_link("https://meteor.example/", "abc"),
            "https://meteor.example/auth?reset=true&token=abc"
        );
    }

    #[test]
    fn test_reset_message_contains_link() {
        let (subject, body) = reset_message("http://localhost:8080", "tok-1", 60);
        assert!(subject.contains("password"));
        assert!(body.contains("http://localhost:8080/auth?reset=true&token=tok-1"));
        assert!(body.contains("60 minutes"));
    }

    #[test]
    fn test_unconfigured_mailer_is_disabled() {
        let mailer = EmailService::new(MailConfig::default());
        assert!(!mailer.is_enabled());
        assert!(mailer.transport().is_err());
    }
}
