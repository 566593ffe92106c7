//! Outbound email delivery.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: String) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html,
            reply_to: None,
            attachments: Vec::new(),
        }
    }

    pub fn reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailerError>;
}

#[derive(Debug, Serialize)]
struct ProviderAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ProviderMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ProviderAttachment<'a>>,
}

impl<'a> ProviderMessage<'a> {
    fn new(from: &'a str, email: &'a OutgoingEmail) -> Self {
        Self {
            from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            reply_to: email.reply_to.as_deref(),
            attachments: email
                .attachments
                .iter()
                .map(|a| ProviderAttachment {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    content: BASE64.encode(&a.data),
                })
                .collect(),
        }
    }
}

/// Sends through a transactional email provider's JSON API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            http: Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailerError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&ProviderMessage::new(&self.from, email))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected { status, body });
        }

        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Stand-in used when no provider key is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailerError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email provider not configured, logging email instead of sending"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_message_encodes_attachments() {
        let email = OutgoingEmail::new("asha@example.com", "Hi", "<p>Hi</p>".into())
            .reply_to(Some("help@shop.example".into()))
            .attach(Attachment {
                filename: "invoice.pdf".into(),
                content_type: "application/pdf".into(),
                data: b"%PDF".to_vec(),
            });

        let json = serde_json::to_value(ProviderMessage::new("shop@shop.example", &email)).unwrap();
        assert_eq!(json["to"], serde_json::json!(["asha@example.com"]));
        assert_eq!(json["reply_to"], "help@shop.example");
        assert_eq!(json["attachments"][0]["content"], "JVBERg==");
    }

    #[test]
    fn provider_message_omits_empty_optionals() {
        let email = OutgoingEmail::new("asha@example.com", "Hi", "<p>Hi</p>".into());
        let json = serde_json::to_value(ProviderMessage::new("shop@shop.example", &email)).unwrap();
        assert!(json.get("reply_to").is_none());
        assert!(json.get("attachments").is_none());
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = OutgoingEmail::new("asha@example.com", "Hi", String::new());
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
