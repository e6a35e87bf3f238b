use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

use crate::audio::session::SessionSettings;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers commands on one guild instead of globally

    // Playback
    pub idle_timeout: Duration,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub ytdlp_path: String,

    // Paths
    pub local_music_folder: Option<PathBuf>,
    pub data_dir: PathBuf,
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("cannot create {}", config.data_dir.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from any key/value source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: var("GUILD_ID")
                .map(|id| id.trim().parse())
                .transpose()
                .context("GUILD_ID must be a numeric id")?,

            idle_timeout: var("IDLE_TIMEOUT")
                .map(|value| humantime::parse_duration(value.trim()))
                .transpose()
                .context("IDLE_TIMEOUT must be a duration such as `3m` or `180s`")?
                .unwrap_or(defaults.idle_timeout),
            max_queue_size: var("MAX_QUEUE_SIZE")
                .map(|value| value.trim().parse())
                .transpose()
                .context("MAX_QUEUE_SIZE must be a number")?
                .unwrap_or(defaults.max_queue_size),
            max_playlist_size: var("MAX_PLAYLIST_SIZE")
                .map(|value| value.trim().parse())
                .transpose()
                .context("MAX_PLAYLIST_SIZE must be a number")?
                .unwrap_or(defaults.max_playlist_size),
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            local_music_folder: var("LOCAL_MUSIC_FOLDER").map(PathBuf::from),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        })
    }

    /// Sanity checks that catch common deployment mistakes.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if let Some(folder) = &self.local_music_folder {
            if !folder.is_dir() {
                anyhow::bail!("Local music folder {} is not a directory", folder.display());
            }
        }

        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.idle_timeout,
            max_queue_size: self.max_queue_size,
        }
    }

    /// Summary safe to log: never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: {}\n  \
            Playback: {} idle timeout, {} queue, {} playlist entries\n  \
            Sources: yt-dlp at `{}`, local music {}\n  \
            Data: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            humantime::format_duration(self.idle_timeout),
            self.max_queue_size,
            self.max_playlist_size,
            self.ytdlp_path,
            self.local_music_folder
                .as_ref()
                .map_or("disabled".to_string(), |dir| dir.display().to_string()),
            self.data_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,

            idle_timeout: Duration::from_secs(180),
            max_queue_size: 1000,
            max_playlist_size: 100,
            ytdlp_path: "yt-dlp".to_string(),

            local_music_folder: None,
            data_dir: "./data".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_token_is_set() {
        let config = load(&[("DISCORD_TOKEN", "abc"), ("GUILD_ID", "")]).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.guild_id, None);
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.max_playlist_size, 100);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.local_music_folder, None);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn token_is_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn parses_overrides() {
        let config = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("GUILD_ID", "1234"),
            ("IDLE_TIMEOUT", "90s"),
            ("MAX_QUEUE_SIZE", "50"),
            ("LOCAL_MUSIC_FOLDER", "/srv/music"),
        ])
        .unwrap();
        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.session_settings().max_queue_size, 50);
        assert_eq!(config.local_music_folder, Some(PathBuf::from("/srv/music")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("IDLE_TIMEOUT", "soon")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("MAX_QUEUE_SIZE", "-1")]).is_err());
    }

    #[test]
    fn validate_checks_limits_and_music_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            discord_token: "abc".to_string(),
            local_music_folder: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        config.local_music_folder = Some(dir.path().join("missing"));
        assert!(config.validate().is_err());

        config.local_music_folder = None;
        config.max_queue_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("3m"));
        assert!(summary.contains("local music disabled"));
    }
}
