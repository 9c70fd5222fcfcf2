//! Webhook provider contract for deployment-event ingestion.

use std::collections::BTreeMap;

use crate::domain::WebhookOutcome;
use crate::error::WebhookError;

/// Request headers, lowercased names. The gateway converts from its HTTP
/// types so providers stay framework-free.
pub type WebhookHeaders = BTreeMap<String, String>;

/// A deployment system that delivers webhooks.
///
/// Verification and parsing are pure functions of the delivery; persistence
/// and HTTP status mapping belong to the gateway.
pub trait WebhookProvider: Send + Sync {
    /// Stable provider identifier; the webhook endpoint path segment.
    fn name(&self) -> &str;

    /// Verify the delivery's signature or token. Constant-time comparison
    /// is required for secret-derived values.
    fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<(), WebhookError>;

    /// Parse a verified delivery into a deployment event, or `Ignored` for
    /// deliveries of no interest (non-success states, irrelevant actions).
    fn parse(&self, headers: &WebhookHeaders, body: &[u8])
        -> Result<WebhookOutcome, WebhookError>;
}
