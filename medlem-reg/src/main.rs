//! medlem-reg - Event Registration Admission service
//!
//! Admission control for membership-organization events: capacity-checked
//! registration, priority-based waitlisting, and preemptive swapping, with
//! all state in SQLite and one write transaction per operation.

use anyhow::Result;
use clap::Parser;
use medlem_common::events::EventBus;
use medlem_reg::admission::AdmissionController;
use medlem_reg::api::{self, AppContext};
use medlem_reg::config::Config;
use medlem_reg::notify;
use medlem_reg::oracles::{HttpMembershipOracle, HttpStrikeOracle};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "medlem-reg", about = "Event registration admission service")]
struct Cli {
    /// Root data folder (db lives here); falls back to env/config/default
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen address, host:port
    #[arg(long, env = "MEDLEM_REG_BIND")]
    bind: Option<String>,

    /// Membership service base URL
    #[arg(long, env = "MEDLEM_MEMBERSHIP_URL")]
    membership_url: Option<String>,

    /// Strike service base URL
    #[arg(long, env = "MEDLEM_STRIKES_URL")]
    strikes_url: Option<String>,

    /// Notification service endpoint (omit to disable forwarding)
    #[arg(long, env = "MEDLEM_NOTIFY_URL")]
    notify_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification immediately after tracing init, before database
    // delays can push it down the log
    info!(
        "Starting medlem registration service (medlem-reg) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = medlem_common::config::resolve_root_folder(
        cli.root_folder.as_deref(),
        "MEDLEM_ROOT_FOLDER",
    )?;
    let config = Config::new(
        root_folder,
        cli.bind,
        cli.membership_url,
        cli.strikes_url,
        cli.notify_url,
    );
    info!("Database path: {}", config.db_path.display());

    let db = medlem_common::db::init_database(&config.db_path).await?;

    let bus = Arc::new(EventBus::new(256));
    let membership = Arc::new(HttpMembershipOracle::new(config.membership_base_url.clone()));
    let strikes = Arc::new(HttpStrikeOracle::new(config.strike_base_url.clone()));
    let controller = Arc::new(AdmissionController::new(
        db.clone(),
        membership,
        strikes,
        Arc::clone(&bus),
    ));

    notify::spawn_forwarder(Arc::clone(&bus), config.notify_url.clone());

    let ctx = AppContext { db, controller };
    api::run(&config.bind_addr, ctx).await?;

    Ok(())
}
