//! Database access layer
//!
//! Schema initialization and shared row models. Service-specific queries
//! live in each service crate.

pub mod init;
pub mod models;

pub use init::init_database;
pub use models::{Event, PriorityPool, Registration, RegistrationStatus};
