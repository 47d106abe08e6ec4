use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelstats::{
    avatars::AvatarCache,
    config::{AppSettings, Config, RuntimeSettingsStore},
    database::Database,
    extractor::YtDlpExtractor,
    refresh::{ChannelRefresher, RefreshJobManager, RefreshScheduler, RefreshService},
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "reelstats")]
#[command(version)]
#[command(about = "Track views, likes and comments of short-video channels")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("reelstats={},tower_http=trace", cli.log_level)
    } else {
        format!("reelstats={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reelstats v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    config.ensure_directories()?;

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let settings = RuntimeSettingsStore::load(
        &config.storage.settings_file,
        AppSettings {
            refresh_interval_hours: config.refresh.default_interval_hours,
            max_videos_per_channel: config.refresh.default_max_videos,
            cookies_file: None,
        },
    );

    let extractor = Arc::new(YtDlpExtractor::new(&config.extractor));
    let avatars = AvatarCache::new(config.storage.avatar_path.clone());
    let mut refresher = ChannelRefresher::new(database.clone(), extractor);
    if config.extractor.avatar_cache_enabled {
        refresher = refresher.with_avatar_cache(avatars.clone());
    }
    let jobs = RefreshJobManager::new(refresher, settings.clone());
    let refresh = RefreshService::new(jobs);
    info!("Refresh service initialized");

    let shutdown = CancellationToken::new();

    match RefreshScheduler::from_expression(refresh.clone(), &config.refresh.schedule) {
        Ok(Some(scheduler)) => {
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.run(token).await });
        }
        Ok(None) => info!("Scheduled refresh disabled"),
        Err(e) => warn!("Scheduled refresh disabled: {}", e),
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let state = AppState {
        database,
        refresh,
        settings,
        avatars,
        config: config.clone(),
    };
    let web_server = WebServer::new(&config, state)?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve(shutdown).await?;

    Ok(())
}
