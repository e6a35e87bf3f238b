use serenity::model::id::GuildId;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    audio::error::PlayerError,
    storage::{JsonStorage, DEFAULT_PREFIX, MAX_PREFIX_LEN},
};

/// `/prefix [prefix]`: shows the guild's command prefix, or replaces it.
pub async fn prefix(
    storage: &Mutex<JsonStorage>,
    guild_id: GuildId,
    new_prefix: Option<&str>,
) -> Result<String, PlayerError> {
    let Some(new_prefix) = new_prefix else {
        let current = storage.lock().await.prefix(guild_id.get()).to_string();
        return Ok(format!("The prefix here is `{}`.", current));
    };

    let new_prefix = new_prefix.trim();
    if new_prefix.is_empty() || new_prefix.contains('`') {
        return Err(PlayerError::InvalidQuery("That isn't a usable prefix.".to_string()));
    }
    if new_prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(PlayerError::InvalidQuery(format!(
            "Prefixes can be at most {} characters long.",
            MAX_PREFIX_LEN
        )));
    }

    let stored = (new_prefix != DEFAULT_PREFIX).then(|| new_prefix.to_string());
    storage
        .lock()
        .await
        .set_prefix(guild_id.get(), stored)
        .await?;
    info!("🔤 Prefix for guild {} set to {}", guild_id, new_prefix);
    Ok(format!("Prefix set to `{}`.", new_prefix))
}
