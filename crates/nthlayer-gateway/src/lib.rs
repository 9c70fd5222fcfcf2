//! # NthLayer Gateway
//!
//! HTTP ingestion for deployment webhooks. Providers verify and normalize
//! deliveries; the gateway maps outcomes onto the response contract
//! (200 persisted/ignored/duplicate, 400 malformed, 401 bad signature,
//! 404 unknown provider, 503 overloaded, 500 store failure).

pub mod server;

pub use server::{GatewayConfig, GatewayServer};
