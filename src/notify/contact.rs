//! Contact-form notification

use serde::Deserialize;

use super::{Address, Mail, NotifyError};
use crate::config::EmailConfig;
use crate::content::{html_escape, is_valid_email};

/// Subject keys offered by the contact form and their labels
pub const CONTACT_SUBJECTS: [(&str, &str); 5] = [
    ("session", "Consulta sobre sesiones 1:1"),
    ("ebook-free", "Pregunta sobre la guía gratuita"),
    ("ebook-paid", "Quiero comprar el ebook (5€)"),
    ("collaboration", "Propuesta de colaboración"),
    ("other", "Otro tema"),
];

/// Label for a subject key; unknown keys pass through unchanged
pub fn subject_label(key: &str) -> &str {
    CONTACT_SUBJECTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}

/// A message submitted through the contact form
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactMessage {
    /// All four fields are required and the email must look valid
    pub fn validate(&self) -> Result<(), NotifyError> {
        let fields = [&self.name, &self.email, &self.subject, &self.message];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(NotifyError::MissingFields);
        }
        if !is_valid_email(&self.email) {
            return Err(NotifyError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }

    /// Notification addressed to the site owner, replying to the visitor
    pub fn to_mail(&self, config: &EmailConfig) -> Mail {
        let label = subject_label(self.subject.trim());
        let name = html_escape(self.name.trim());
        let email = html_escape(self.email.trim());

        let body = format!(
            concat!(
                "<h1>Nuevo mensaje de contacto</h1>\n",
                "<p><strong>De:</strong> {name}</p>\n",
                "<p><strong>Email:</strong> <a href=\"mailto:{email}\">{email}</a></p>\n",
                "<p><strong>Asunto:</strong> {subject}</p>\n",
                "<h2>Mensaje:</h2>\n",
                "<div style=\"white-space: pre-wrap;\">{message}</div>\n",
                "<p>Para responder, responde a este email y llegará directamente a {email}.</p>\n"
            ),
            name = name,
            email = email,
            subject = html_escape(label),
            message = html_escape(self.message.trim()),
        );

        let mut mail = Mail::html(
            Address::new(&config.owner_email, &config.owner_name),
            Address::new(&config.from_email, &config.contact_from_name),
            &format!("[Crianzas Conscientes] {}", label),
            body,
        );
        mail.reply_to = Some(Address::new(self.email.trim(), self.name.trim()));
        mail
    }
}
