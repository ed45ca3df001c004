use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::bot::MusicBot;
use crate::config::{Config, LogFormat, LoggingConfig};
use crate::sources::YtDlpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // no valid configuration, no start
    let config = Config::load()?;

    init_tracing(&config.logging)?;

    info!("🎵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    let fetcher = Arc::new(YtDlpFetcher::new(&config.player));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&fetcher).await;
    }

    fetcher.prepare().await?;
    if let Err(e) = fetcher.verify_dependencies().await {
        warn!("⚠️ Downloader check failed, `play` will not work: {:?}", e);
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let config = Arc::new(config);
    let songbird = Songbird::serenity();
    let handler = MusicBot::new(config.clone(), fetcher, songbird.clone());

    let mut client = Client::builder(&config.discord.token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Shutdown signal received, closing...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error registering Ctrl+C handler: {:?}", e),
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

/// Sets up the global subscriber; `RUST_LOG` takes precedence over the file.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;
    for directive in &logging.directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.ansi);

    let result = match logging.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!(e))
}

async fn health_check(fetcher: &YtDlpFetcher) -> Result<()> {
    fetcher.verify_dependencies().await?;
    println!("OK");
    Ok(())
}
