//! # Bot Module
//!
//! Discord glue around the playback engine.
//!
//! [`AlexaBot`] implements Serenity's [`EventHandler`]: it registers the slash
//! commands once the gateway is ready, routes interactions to [`handlers`],
//! tears a guild's session down when the bot is kicked from voice, and feeds
//! pin updates to the [`archive`].
//!
//! The command logic itself lives in [`music`], [`archive`] and [`fun`] and
//! does not depend on a live gateway.

use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    model::event::ChannelPinsUpdateEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub mod archive;
pub mod commands;
pub mod fun;
pub mod handlers;
pub mod music;
pub mod settings;

use crate::{
    audio::{registry::SessionRegistry, voice::VoiceGateway},
    config::Config,
    sources::{LocalLibrary, TrackResolver},
    storage::JsonStorage,
};

pub struct AlexaBot {
    config: Arc<Config>,
    /// Guild settings (archive channel, prefix).
    storage: Arc<Mutex<JsonStorage>>,
    /// One playback session per guild.
    registry: SessionRegistry,
    resolver: Arc<dyn TrackResolver>,
    /// `None` when no music folder is configured.
    library: Option<Arc<LocalLibrary>>,
    gateway: Arc<dyn VoiceGateway>,
}

impl AlexaBot {
    pub fn new(
        config: Config,
        storage: Arc<Mutex<JsonStorage>>,
        registry: SessionRegistry,
        resolver: Arc<dyn TrackResolver>,
        library: Option<Arc<LocalLibrary>>,
        gateway: Arc<dyn VoiceGateway>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            registry,
            resolver,
            library,
            gateway,
        }
    }

    /// Registers the slash commands on the configured guild, or globally
    /// when none is set.
    ///
    /// Guild commands propagate within seconds, global ones can take up to
    /// an hour.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Commands registered for guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Commands registered globally");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for AlexaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let result = match interaction {
            Interaction::Command(command) => handlers::handle_command(&ctx, command, self).await,
            Interaction::Autocomplete(autocomplete) => {
                handlers::handle_autocomplete(&ctx, autocomplete, self).await
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Error handling interaction: {:?}", e);
        }
    }

    /// Tears the session down when the bot is disconnected from voice by
    /// someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id || new.channel_id.is_some() {
            return;
        }
        let (Some(old), Some(guild_id)) = (old, new.guild_id) else {
            return;
        };

        if self
            .registry
            .leave_disconnected(guild_id, old.channel_id)
            .await
        {
            warn!("🔌 Disconnected from voice in guild {}, session closed", guild_id);
        }
    }

    async fn channel_pins_update(&self, ctx: Context, pin: ChannelPinsUpdateEvent) {
        if let Err(e) = archive::archive_latest_pin(&ctx, &self.storage, &pin).await {
            error!("Error archiving pin from channel {}: {:?}", pin.channel_id, e);
        }
    }
}
