use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// Prefix used when a guild never picked one.
pub const DEFAULT_PREFIX: &str = "alexa";
pub const MAX_PREFIX_LEN: usize = 20;

/// Per-guild settings stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    /// Where pinned messages are copied to.
    #[serde(default)]
    pub archive_channel_id: Option<u64>,
    /// `None` means [`DEFAULT_PREFIX`].
    #[serde(default)]
    pub prefix: Option<String>,
}

/// File-backed guild settings, one `servers/guild_<id>.json` per guild,
/// with an in-memory cache in front.
pub struct JsonStorage {
    data_dir: PathBuf,
    servers_cache: HashMap<u64, GuildSettings>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        let servers_dir = data_dir.join("servers");
        fs::create_dir_all(&servers_dir)
            .await
            .with_context(|| format!("cannot create {}", servers_dir.display()))?;

        info!("📁 Storage initialised at: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            servers_cache: HashMap::new(),
        };
        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Settings for a guild; defaults when nothing was stored yet.
    pub fn guild_settings(&self, guild_id: u64) -> GuildSettings {
        self.servers_cache
            .get(&guild_id)
            .cloned()
            .unwrap_or(GuildSettings {
                guild_id,
                ..GuildSettings::default()
            })
    }

    pub fn archive_channel(&self, guild_id: u64) -> Option<u64> {
        self.servers_cache
            .get(&guild_id)
            .and_then(|settings| settings.archive_channel_id)
    }

    pub async fn set_archive_channel(&mut self, guild_id: u64, channel_id: Option<u64>) -> Result<()> {
        let mut settings = self.guild_settings(guild_id);
        settings.archive_channel_id = channel_id;
        self.update_guild_settings(settings).await
    }

    pub fn prefix(&self, guild_id: u64) -> &str {
        self.servers_cache
            .get(&guild_id)
            .and_then(|settings| settings.prefix.as_deref())
            .unwrap_or(DEFAULT_PREFIX)
    }

    pub async fn set_prefix(&mut self, guild_id: u64, prefix: Option<String>) -> Result<()> {
        let mut settings = self.guild_settings(guild_id);
        settings.prefix = prefix;
        self.update_guild_settings(settings).await
    }

    pub async fn update_guild_settings(&mut self, settings: GuildSettings) -> Result<()> {
        self.save_guild_settings(&settings).await?;
        info!("💾 Settings updated for guild {}", settings.guild_id);
        self.servers_cache.insert(settings.guild_id, settings);
        Ok(())
    }

    async fn load_guild_settings(&self, guild_id: u64) -> Result<GuildSettings> {
        let file_path = self.server_file_path(guild_id);
        let content = fs::read_to_string(&file_path).await?;
        let settings: GuildSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    async fn save_guild_settings(&self, settings: &GuildSettings) -> Result<()> {
        let file_path = self.server_file_path(settings.guild_id);
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&file_path, content)
            .await
            .with_context(|| format!("cannot write {}", file_path.display()))?;
        Ok(())
    }

    async fn load_all_servers(&mut self) -> Result<()> {
        let servers_dir = self.data_dir.join("servers");
        let mut files = fs::read_dir(&servers_dir).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let guild_id = path
                .file_stem()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok());

            if let Some(guild_id) = guild_id {
                match self.load_guild_settings(guild_id).await {
                    Ok(settings) => {
                        self.servers_cache.insert(guild_id, settings);
                        loaded_count += 1;
                    }
                    Err(e) => {
                        warn!("Error loading settings for guild {}: {}", guild_id, e);
                    }
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Loaded settings for {} guilds", loaded_count);
        }

        Ok(())
    }

    fn server_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("servers").join(format!("guild_{}.json", guild_id))
    }
}
