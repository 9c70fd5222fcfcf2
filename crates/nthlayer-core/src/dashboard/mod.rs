//! Intent-based dashboard generation: abstract monitoring concerns resolved
//! against the metrics that actually exist.

mod catalog;
mod generator;
mod resolver;

pub use catalog::{intents_for, panel_specs_for_spec};
pub use generator::DashboardGenerator;
pub use resolver::IntentResolver;
