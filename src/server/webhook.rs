//! Webhook endpoint handler.
//!
//! Verifies the delivery's signature, decodes it into an update and
//! enqueues it on the event processor before answering. The processor
//! applies updates asynchronously, in arrival order.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, SignatureError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Payload could not be decoded.
    #[error("invalid payload: {0}")]
    Parse(#[from] ParseError),

    /// The event processor is no longer accepting updates.
    #[error("event processor unavailable")]
    ProcessorClosed,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
            WebhookError::ProcessorClosed => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event`: Event type (required)
///   - `X-GitHub-Delivery`: Delivery ID (logged when present)
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature (required when a secret
///     is configured)
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 202 Accepted: Update enqueued
/// - 200 OK (`Ignored`): Nothing in the delivery to track
/// - 400 Bad Request: Missing header or undecodable payload
/// - 401 Unauthorized: Invalid signature
/// - 503 Service Unavailable: Event processor has stopped
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::new("unknown"));

    debug!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        "Received webhook"
    );

    // Verify signature BEFORE any parsing.
    let signature = headers
        .get(HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = app_state.webhook_secret().verify(&body, signature) {
        warn!(delivery_id = %delivery_id, error = %e, "Rejected webhook signature");
        return Err(match e {
            SignatureError::Missing => WebhookError::MissingHeader(HEADER_SIGNATURE),
            SignatureError::Malformed | SignatureError::Mismatch => WebhookError::InvalidSignature,
        });
    }

    let update = match parse_webhook(&event_type, &body) {
        Ok(Some(update)) => update,
        Ok(None) => {
            debug!(delivery_id = %delivery_id, "Nothing to track in webhook");
            return Ok((StatusCode::OK, "Ignored"));
        }
        Err(e) => {
            warn!(delivery_id = %delivery_id, error = %e, "Could not parse webhook");
            return Err(e.into());
        }
    };

    let repo = update.repo().clone();
    let kind = update.kind();

    app_state.processor().submit(update).await.map_err(|e| {
        warn!(delivery_id = %delivery_id, error = %e, "Dropping webhook");
        WebhookError::ProcessorClosed
    })?;

    info!(
        delivery_id = %delivery_id,
        repo = %repo,
        kind,
        "Webhook enqueued"
    );
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
