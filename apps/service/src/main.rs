use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use uppe_watch::config::Config;
use uppe_watch::database::{DatabaseImpl, initialize_database};
use uppe_watch::monitoring::MonitoringExecutor;
use uppe_watch::notification::{EmailSink, HttpWebhook, Sinks, SmtpMailer};
use uppe_watch::orchestrator::Orchestrator;
use uppe_watch::pool::open_pool;

#[derive(Debug, Parser)]
#[command(version, about = "Uptime monitor with email and webhook alerts")]
struct Cli {
    /// Path to the config file (default: $XDG_CONFIG_HOME/uppe/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides `storage.database_path`
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;
    if let Some(database) = cli.database {
        config.storage.database_path = database;
    }

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    info!("Opening database at {}", config.storage.database_path.display());
    let pool = open_pool(&config.storage.database_path).await?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }
    let database =
        Arc::new(DatabaseImpl::new_from_pool(pool).with_max_samples(config.storage.max_samples_per_target));

    let executor = Arc::new(MonitoringExecutor::new(config.monitor.probe_timeout_seconds)?);
    let sinks = build_sinks(&config)?;

    let orchestrator = Orchestrator::new(database, executor, sinks, config.engine_settings());
    orchestrator.load_from_database().await?;
    orchestrator.start().await;

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    orchestrator.stop().await;

    Ok(())
}

fn build_sinks(config: &Config) -> Result<Sinks> {
    let delivery_timeout = Duration::from_secs(config.notifications.delivery_timeout_seconds);

    let (email, from_address): (Option<Arc<dyn EmailSink>>, String) = match config.notifications.smtp() {
        Some(smtp) => {
            let mailer: Arc<dyn EmailSink> = Arc::new(SmtpMailer::new(smtp, delivery_timeout)?);
            (Some(mailer), smtp.from_address.clone())
        }
        None => {
            warn!("SMTP is not configured, email notifications are disabled");
            (None, String::new())
        }
    };

    Ok(Sinks { email, from_address, webhook: Arc::new(HttpWebhook::new(delivery_timeout)?) })
}
