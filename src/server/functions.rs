//! JSON notification endpoints under `/functions/v1`
//!
//! These accept the same payloads the hosted edge functions did, so a
//! database webhook or an external form can keep calling them.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use super::SharedState;
use crate::notify::{recipient_from_payload, ContactMessage, NotifyError};

const CORS_HEADERS: [(HeaderName, &str); 2] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "authorization, x-client-info, apikey, content-type",
    ),
];

fn reply(status: StatusCode, body: Value) -> Response {
    (status, CORS_HEADERS, Json(body)).into_response()
}

fn failure(error: &NotifyError) -> Response {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!("Notification failed: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = match error {
        NotifyError::MissingFields => json!({ "error": "Faltan campos requeridos" }),
        NotifyError::InvalidEmail(email) => {
            json!({ "error": format!("Email no válido: {}", email) })
        }
        NotifyError::MissingApiKey => json!({ "error": "SENDGRID_API_KEY no configurada" }),
        NotifyError::PdfDownload(_) => json!({ "error": "No se pudo descargar el PDF" }),
        NotifyError::Delivery { status, details } => {
            json!({ "error": "Error enviando email", "status": status, "details": details })
        }
        other => json!({ "error": other.to_string() }),
    };
    reply(status, body)
}

fn parse_payload(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Invalid JSON payload: {}", e);
        reply(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    })
}

/// CORS preflight
pub async fn preflight() -> Response {
    (StatusCode::OK, CORS_HEADERS, "ok").into_response()
}

pub async fn send_contact_email(State(state): State<SharedState>, body: Bytes) -> Response {
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let message: ContactMessage = serde_json::from_value(payload).unwrap_or_default();

    match state.notifier.send_contact(&message).await {
        Ok(()) => reply(
            StatusCode::OK,
            json!({ "success": true, "message": "Mensaje enviado correctamente" }),
        ),
        Err(e) => failure(&e),
    }
}

pub async fn send_guide_email(State(state): State<SharedState>, body: Bytes) -> Response {
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let Some(recipient) = recipient_from_payload(&payload) else {
        tracing::error!("No email in guide payload");
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Email no encontrado en el payload" }),
        );
    };

    match state.notifier.send_guide(&recipient).await {
        Ok(()) => reply(
            StatusCode::OK,
            json!({ "success": true, "message": "Email enviado" }),
        ),
        Err(e) => failure(&e),
    }
}
