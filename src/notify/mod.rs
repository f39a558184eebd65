//! Email notifications
//!
//! Two notifications exist: a contact-form message forwarded to the site
//! owner, and delivery of the free guide PDF to a new lead. Both go through
//! a [`Mailer`]; [`SendGridMailer`] speaks the SendGrid v3 `mail/send` API,
//! which answers `202 Accepted` on success.

mod contact;
mod guide;

pub use contact::{subject_label, ContactMessage, CONTACT_SUBJECTS};
pub use guide::{encode_chunked, recipient_from_payload};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{EmailConfig, GuideConfig};

/// Notification failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing required fields")]
    MissingFields,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("email API key is not configured")]
    MissingApiKey,

    #[error("could not download the guide PDF (status {0})")]
    PdfDownload(u16),

    #[error("email delivery failed with status {status}: {details}")]
    Delivery { status: u16, details: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl NotifyError {
    /// Whether the caller sent bad input (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, NotifyError::MissingFields | NotifyError::InvalidEmail(_))
    }
}

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            name: (!name.is_empty()).then(|| name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Personalization {
    pub to: Vec<Address>,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub mime: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    /// Base64 payload
    pub content: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub mime: String,
    pub disposition: String,
}

/// Outgoing message in the SendGrid v3 request shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mail {
    pub personalizations: Vec<Personalization>,
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Address>,
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Mail {
    /// Single-recipient HTML message
    pub fn html(to: Address, from: Address, subject: &str, body: String) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: vec![to],
                subject: subject.to_string(),
            }],
            from,
            reply_to: None,
            content: vec![Content {
                mime: "text/html".to_string(),
                value: body,
            }],
            attachments: Vec::new(),
        }
    }

    pub fn subject(&self) -> &str {
        self.personalizations
            .first()
            .map(|p| p.subject.as_str())
            .unwrap_or_default()
    }
}

/// Email delivery backend
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Whether delivery credentials are present
    fn is_configured(&self) -> bool;

    async fn send(&self, mail: &Mail) -> Result<(), NotifyError>;
}

/// SendGrid v3 client
pub struct SendGridMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl SendGridMailer {
    pub fn new(client: reqwest::Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.trim().to_string(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn send(&self, mail: &Mail) -> Result<(), NotifyError> {
        if !self.is_configured() {
            return Err(NotifyError::MissingApiKey);
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(mail)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::ACCEPTED {
            tracing::info!("Email sent: {}", mail.subject());
            return Ok(());
        }

        let details = response.text().await.unwrap_or_default();
        tracing::error!("Email delivery failed ({}): {}", status, details);
        Err(NotifyError::Delivery {
            status: status.as_u16(),
            details,
        })
    }
}

/// Sends the contact and guide notifications
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    client: reqwest::Client,
    email: EmailConfig,
    guide: GuideConfig,
    pdf_url: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        client: reqwest::Client,
        email: EmailConfig,
        guide: GuideConfig,
        pdf_url: String,
    ) -> Self {
        Self {
            mailer,
            client,
            email,
            guide,
            pdf_url,
        }
    }

    /// Forward a contact-form message to the site owner
    pub async fn send_contact(&self, message: &ContactMessage) -> Result<(), NotifyError> {
        message.validate()?;
        if !self.mailer.is_configured() {
            tracing::error!("Contact email not sent: no API key");
            return Err(NotifyError::MissingApiKey);
        }

        tracing::info!("Sending contact message from {}", message.email);
        self.mailer.send(&message.to_mail(&self.email)).await
    }

    /// Email the guide PDF to `recipient`
    pub async fn send_guide(&self, recipient: &str) -> Result<(), NotifyError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(NotifyError::MissingFields);
        }
        if !self.mailer.is_configured() {
            tracing::error!("Guide email not sent: no API key");
            return Err(NotifyError::MissingApiKey);
        }

        tracing::info!("Sending guide to {}", recipient);
        let pdf = guide::download(&self.client, &self.pdf_url).await?;
        tracing::debug!("Guide PDF downloaded, {} bytes", pdf.len());

        let attachment = encode_chunked(&pdf, self.guide.chunk_size);
        let mail = guide::guide_mail(recipient, attachment, &self.email, &self.guide);
        self.mailer.send(&mail).await
    }
}
