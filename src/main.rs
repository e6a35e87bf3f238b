use anyhow::{Context, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;
mod storage;
mod ui;

use crate::audio::{registry::SessionRegistry, voice::SongbirdGateway};
use crate::bot::AlexaBot;
use crate::config::Config;
use crate::sources::{LocalLibrary, TrackResolver, YtDlp, YtDlpResolver};
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alexa_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    info!("🎵 Starting Alexa Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let storage = Arc::new(tokio::sync::Mutex::new(
        JsonStorage::new(config.data_dir.clone()).await?,
    ));

    let library = match config.local_music_folder.clone() {
        Some(folder) => {
            let library = tokio::task::spawn_blocking(move || LocalLibrary::scan(&folder))
                .await
                .context("local library scan panicked")?;
            info!("📚 Local library loaded with {} songs", library.len());
            Some(Arc::new(library))
        }
        None => {
            info!("📚 No local music folder set, local playback disabled");
            None
        }
    };

    let ytdlp = YtDlp::new(config.ytdlp_path.clone(), reqwest::Client::new());
    let resolver: Arc<dyn TrackResolver> =
        Arc::new(YtDlpResolver::new(ytdlp, config.max_playlist_size));

    let registry = SessionRegistry::new(config.session_settings());
    let songbird = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(Arc::clone(&songbird)));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let token = config.discord_token.clone();
    let handler = AlexaBot::new(
        config,
        storage,
        registry.clone(),
        resolver,
        library,
        gateway,
    );

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error listening for Ctrl+C: {:?}", e);
            return;
        }
        warn!("⚠️ Shutdown signal received, closing...");
        registry.clear().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp or ffmpeg is missing");
    }
}
