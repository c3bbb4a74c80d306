//! medlem-reg specific configuration

use std::path::PathBuf;

/// Registration service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: String,
    /// Base URL of the membership service (group lookups)
    pub membership_base_url: String,
    /// Base URL of the disciplinary-strike service
    pub strike_base_url: String,
    /// Notification service endpoint; None disables forwarding
    pub notify_url: Option<String>,
}

impl Config {
    /// Build configuration from a resolved root folder and optional overrides
    pub fn new(
        root_folder: PathBuf,
        bind_addr: Option<String>,
        membership_base_url: Option<String>,
        strike_base_url: Option<String>,
        notify_url: Option<String>,
    ) -> Self {
        let db_path = root_folder.join("medlem.db");
        Self {
            root_folder,
            db_path,
            bind_addr: bind_addr.unwrap_or_else(|| "127.0.0.1:5730".to_string()),
            membership_base_url: membership_base_url
                .unwrap_or_else(|| "http://127.0.0.1:5731".to_string()),
            strike_base_url: strike_base_url
                .unwrap_or_else(|| "http://127.0.0.1:5732".to_string()),
            notify_url,
        }
    }
}
