//! Error taxonomy shared across subsystems.
//!
//! Each error carries a stable kind plus service/provider context. Provider
//! errors are absorbed at the orchestrator boundary (a failing provider
//! contributes nothing); metric-discovery errors during drift analysis
//! propagate to the caller.

use thiserror::Error;

/// Failure of a discovery or ownership provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Deadline or network timeout; worth retrying.
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout {
        /// Provider name.
        provider: String,
        /// Deadline that elapsed.
        timeout_ms: u64,
    },

    /// Transient upstream failure (5xx, connection reset).
    #[error("provider {provider} transient failure: {message}")]
    Transient {
        /// Provider name.
        provider: String,
        /// Upstream detail.
        message: String,
    },

    /// Permanent failure (auth, 4xx); retrying will not help.
    #[error("provider {provider} permanent failure: {message}")]
    Permanent {
        /// Provider name.
        provider: String,
        /// Upstream detail.
        message: String,
    },

    /// Provider is misconfigured or unreachable.
    #[error("provider {provider} misconfigured: {message}")]
    Misconfigured {
        /// Provider name.
        provider: String,
        /// Configuration detail.
        message: String,
    },

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::Transient { .. }
        )
    }
}

/// Failure talking to the metrics backend.
#[derive(Debug, Error)]
pub enum MetricDiscoveryError {
    /// Backend unreachable or returned a server error.
    #[error("metrics backend unavailable: {0}")]
    Backend(String),

    /// Response did not parse as expected.
    #[error("malformed metrics response: {0}")]
    Malformed(String),
}

/// Failure of a drift analysis request.
#[derive(Debug, Error)]
pub enum DriftAnalysisError {
    /// Fewer than two samples; nothing to fit.
    #[error("insufficient data: {points} point(s) in window, need at least 2")]
    InsufficientData {
        /// Samples actually present.
        points: usize,
    },

    /// Window failed to parse or is non-positive.
    #[error("invalid analysis window: {0}")]
    InvalidWindow(String),

    /// The requested SLO is not declared on the spec.
    #[error("unknown SLO {0:?} for this service")]
    UnknownSlo(String),

    /// The underlying range query failed.
    #[error(transparent)]
    Metrics(#[from] MetricDiscoveryError),
}

/// Bad ServiceSpec input.
#[derive(Debug, Error)]
pub enum SpecValidationError {
    /// Spec has no usable name.
    #[error("service spec is missing a name")]
    MissingName,

    /// A field failed validation.
    #[error("invalid spec field {field}: {message}")]
    Invalid {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Generator-side fault during artifact rendering.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Required external data is missing.
    #[error("{kind} generator for {service}: missing {what}")]
    MissingData {
        /// Artifact kind name.
        kind: String,
        /// Service being generated.
        service: String,
        /// What was missing.
        what: String,
    },

    /// Template or serialization failure.
    #[error("{kind} generator for {service}: {message}")]
    Render {
        /// Artifact kind name.
        kind: String,
        /// Service being generated.
        service: String,
        /// Failure detail.
        message: String,
    },
}

/// Downstream write failure.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Worth retrying with backoff.
    #[error("transient sink failure writing {target}: {message}")]
    Transient {
        /// Destination path or URL.
        target: String,
        /// Failure detail.
        message: String,
    },

    /// Retrying will not help; abort this artifact.
    #[error("permanent sink failure writing {target}: {message}")]
    Permanent {
        /// Destination path or URL.
        target: String,
        /// Failure detail.
        message: String,
    },
}

/// Webhook ingestion failure. Maps onto the HTTP response contract.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature or token verification failed -> 401.
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Body did not parse as the provider's payload -> 400.
    #[error("malformed webhook payload: {0}")]
    Malformed(String),

    /// Event store write failed -> 5xx so the sender retries.
    #[error("failed to persist deployment event: {0}")]
    Persistence(String),
}
