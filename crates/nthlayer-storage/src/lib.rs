//! # NthLayer Storage
//!
//! SQLite persistence for the deployment-event store. The rest of the
//! system is operationally stateless; this crate holds the one durable
//! table and its migrations.

mod database;
pub mod repositories;

pub use database::Database;
pub use repositories::SqliteDeploymentEventRepository;
