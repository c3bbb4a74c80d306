//! # Medlem Common Library
//!
//! Shared code for the medlem membership-organization services including:
//! - Database models and schema initialization
//! - Notification intent types (RegistrationEvent enum) and EventBus
//! - Configuration loading and root folder resolution
//! - Error types
//! - Timestamp and UUID utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
