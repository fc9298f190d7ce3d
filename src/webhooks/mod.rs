//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Payload parsing into processor updates

pub mod parser;
pub mod signature;

pub use parser::{ParseError, parse_webhook};
pub use signature::{
    SignatureError, WebhookSecret, compute_signature, format_signature_header,
    parse_signature_header,
};
