//! Outgoing mail: login codes and family invites.
//!
//! DESIGN
//! ======
//! Services build a `MailMessage` from an embedded HTML template and hand it
//! to a `Mailer`. Production uses Resend; when Resend credentials are absent
//! the `LogMailer` writes the message to the log so local setups can still
//! sign in and accept invites.

use std::sync::Arc;

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::ResendConfig;

const LOGIN_CODE_TEMPLATE: &str = include_str!("../templates/login_code.html");
const FAMILY_INVITE_TEMPLATE: &str = include_str!("../templates/family_invite.html");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Delivery backend for outgoing mail.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(config: &ResendConfig) -> Self {
        Self { client: Resend::new(&config.api_key), from: config.from.clone() }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let to = [message.to.as_str()];
        let email = CreateEmailBaseOptions::new(&self.from, to, &message.subject).with_html(&message.html);
        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, body = %message.html, "mail delivery disabled; logging message");
        Ok(())
    }
}

/// Pick the mail backend for the given config.
#[must_use]
pub fn mailer_from_config(resend: Option<&ResendConfig>) -> Arc<dyn Mailer> {
    match resend {
        Some(cfg) => Arc::new(ResendMailer::new(cfg)),
        None => Arc::new(LogMailer),
    }
}

#[must_use]
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[must_use]
pub fn login_code_message(email: &str, code: &str) -> MailMessage {
    let html = LOGIN_CODE_TEMPLATE
        .replace("{{EMAIL}}", &html_escape(email))
        .replace("{{CODE}}", &html_escape(code));
    MailMessage { to: email.to_owned(), subject: "Your Hearthbook sign-in code".to_owned(), html }
}

/// Values substituted into the family invite template.
pub struct InviteMail<'a> {
    pub email: &'a str,
    pub family_name: &'a str,
    pub inviter_name: &'a str,
    pub link: &'a str,
    pub expires_on: &'a str,
}

#[must_use]
pub fn family_invite_message(invite: &InviteMail<'_>) -> MailMessage {
    let html = FAMILY_INVITE_TEMPLATE
        .replace("{{EMAIL}}", &html_escape(invite.email))
        .replace("{{FAMILY}}", &html_escape(invite.family_name))
        .replace("{{INVITER}}", &html_escape(invite.inviter_name))
        .replace("{{LINK}}", &html_escape(invite.link))
        .replace("{{EXPIRES}}", &html_escape(invite.expires_on));
    MailMessage {
        to: invite.email.to_owned(),
        subject: format!("{} invited you to {}", invite.inviter_name, invite.family_name),
        html,
    }
}

#[cfg(test)]
#[path = "mail_test.rs"]
mod tests;
