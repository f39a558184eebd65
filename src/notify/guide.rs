//! Guide delivery: download the PDF and mail it as an attachment

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{Address, Attachment, Mail, NotifyError};
use crate::config::{EmailConfig, GuideConfig};

/// Base64-encode `bytes` chunk by chunk.
///
/// Chunks are a multiple of 3 bytes so no chunk but the last carries padding
/// and the pieces concatenate into the whole-input encoding.
pub fn encode_chunked(bytes: &[u8], chunk_size: usize) -> String {
    let chunk_size = (chunk_size / 3 * 3).max(3);
    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(chunk_size) {
        STANDARD.encode_string(chunk, &mut encoded);
    }
    encoded
}

/// Recipient from a lead-insert webhook: `{"record":{"email":..}}` or `{"email":..}`
pub fn recipient_from_payload(payload: &serde_json::Value) -> Option<String> {
    let email = |value: Option<&serde_json::Value>| {
        value
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    };
    email(payload.pointer("/record/email")).or_else(|| email(payload.get("email")))
}

pub(super) async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, NotifyError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        tracing::error!("Failed to download guide PDF from {}: {}", url, status);
        return Err(NotifyError::PdfDownload(status.as_u16()));
    }
    Ok(response.bytes().await?.to_vec())
}

pub(super) fn guide_mail(
    recipient: &str,
    attachment: String,
    email: &EmailConfig,
    guide: &GuideConfig,
) -> Mail {
    let body = format!(
        concat!(
            "<h1>¡Gracias por tu interés! 💚</h1>\n",
            "<p>Hola,</p>\n",
            "<p>Adjunto encontrarás la <strong>Guía de Primeros Pasos en Crianza Consciente</strong> ",
            "con herramientas prácticas que podrás empezar a aplicar hoy mismo.</p>\n",
            "<p>Si tienes alguna pregunta sobre las sesiones de acompañamiento, responde a este email.</p>\n",
            "<p>Con cariño,<br><strong>{owner}</strong><br>{site}</p>\n"
        ),
        owner = email.owner_name,
        site = email.from_name,
    );

    let mut mail = Mail::html(
        Address::new(recipient, ""),
        Address::new(&email.from_email, &email.from_name),
        &guide.subject,
        body,
    );
    mail.reply_to = Some(Address::new(&email.owner_email, &email.owner_name));
    mail.attachments.push(Attachment {
        content: attachment,
        filename: guide.filename.clone(),
        mime: "application/pdf".to_string(),
        disposition: "attachment".to_string(),
    });
    mail
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunked_matches_one_shot() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let expected = STANDARD.encode(&data);

        for chunk_size in [3, 8190, 8192, 4, 1, 0, 100_000] {
            assert_eq!(encode_chunked(&data, chunk_size), expected, "chunk {}", chunk_size);
        }
        assert_eq!(encode_chunked(&[], 8190), "");
    }

    #[test]
    fn test_recipient_from_payload() {
        assert_eq!(
            recipient_from_payload(&json!({"record": {"email": "ana@example.com"}})),
            Some("ana@example.com".to_string())
        );
        assert_eq!(
            recipient_from_payload(&json!({"email": " luis@example.com "})),
            Some("luis@example.com".to_string())
        );
        assert_eq!(recipient_from_payload(&json!({"record": {}})), None);
        assert_eq!(recipient_from_payload(&json!({"email": ""})), None);
    }

    #[test]
    fn test_guide_mail_shape() {
        let mail = guide_mail(
            "ana@example.com",
            "QUJD".to_string(),
            &EmailConfig::default(),
            &GuideConfig::default(),
        );
        assert_eq!(mail.subject(), "¡Tu guía de Crianza Consciente está lista! 🌱");
        assert_eq!(mail.attachments[0].filename, "Guia-Crianza-Consciente.pdf");
        assert_eq!(
            mail.reply_to.as_ref().map(|a| a.email.as_str()),
            Some("mailensteinbrenner@gmail.com")
        );

        let json = serde_json::to_value(&mail).unwrap();
        assert_eq!(json["attachments"][0]["type"], "application/pdf");
        assert_eq!(json["content"][0]["type"], "text/html");
        assert!(json["personalizations"][0]["to"][0].get("name").is_none());
    }
}
