use anyhow::Result;
use serenity::{
    builder::{CreateAttachment, CreateMessage},
    http::HttpError,
    model::{
        event::ChannelPinsUpdateEvent,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::storage::JsonStorage;

/// Discord's message length limit.
pub const MESSAGE_LIMIT: usize = 2000;

pub fn archive_text(author: UserId, content: &str) -> String {
    format!("**Original Poster: <@{}>**:\n{}", author, content)
        .chars()
        .take(MESSAGE_LIMIT)
        .collect()
}

pub async fn set_archive(
    storage: &Mutex<JsonStorage>,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<String> {
    storage
        .lock()
        .await
        .set_archive_channel(guild_id.get(), Some(channel_id.get()))
        .await?;
    info!("📌 Archive channel for guild {} set to {}", guild_id, channel_id);
    Ok(format!("Archive set. Now pins will show up in <#{}>.", channel_id))
}

pub async fn remove_archive(storage: &Mutex<JsonStorage>, guild_id: GuildId) -> Result<String> {
    storage
        .lock()
        .await
        .set_archive_channel(guild_id.get(), None)
        .await?;
    info!("📌 Archive channel for guild {} removed", guild_id);
    Ok("Archive forgotten.".to_string())
}

fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

/// Copies the newest pin of a channel into the guild's archive channel.
pub async fn archive_latest_pin(
    ctx: &Context,
    storage: &Mutex<JsonStorage>,
    event: &ChannelPinsUpdateEvent,
) -> Result<()> {
    // Unpins carry no timestamp.
    if event.last_pin_timestamp.is_none() {
        return Ok(());
    }
    let Some(guild_id) = event.guild_id else {
        return Ok(());
    };

    let Some(archive_id) = storage.lock().await.archive_channel(guild_id.get()) else {
        debug!("No archive channel set for guild {}", guild_id);
        return Ok(());
    };
    let archive = ChannelId::new(archive_id);

    if let Err(e) = archive.to_channel(ctx).await {
        if is_not_found(&e) {
            warn!("🗑️ Archive channel {} of guild {} is gone, unsetting it", archive, guild_id);
            storage
                .lock()
                .await
                .set_archive_channel(guild_id.get(), None)
                .await?;
            return Ok(());
        }
        return Err(e.into());
    }

    let Some(pin) = event.channel_id.pins(&ctx.http).await?.into_iter().next() else {
        return Ok(());
    };

    let mut files = Vec::with_capacity(pin.attachments.len());
    for attachment in &pin.attachments {
        let data = attachment.download().await?;
        files.push(CreateAttachment::bytes(data, attachment.filename.clone()));
    }

    let message = CreateMessage::new()
        .content(archive_text(pin.author.id, &pin.content))
        .add_files(files);
    archive.send_message(&ctx.http, message).await?;

    info!("📌 Archived a pin from channel {} in guild {}", event.channel_id, guild_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn archive_text_credits_the_author() {
        assert_eq!(
            archive_text(UserId::new(42), "hello there"),
            "**Original Poster: <@42>**:\nhello there"
        );
    }

    #[test]
    fn archive_text_is_truncated_to_the_message_limit() {
        let long = "é".repeat(3000);
        let text = archive_text(UserId::new(42), &long);
        assert_eq!(text.chars().count(), MESSAGE_LIMIT);
        assert!(text.starts_with("**Original Poster: <@42>**:\n"));
    }

    #[tokio::test]
    async fn archive_channel_can_be_set_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Mutex::new(JsonStorage::new(dir.path().to_path_buf()).await.unwrap());
        let guild = GuildId::new(5);

        let reply = set_archive(&storage, guild, ChannelId::new(77)).await.unwrap();
        assert_eq!(reply, "Archive set. Now pins will show up in <#77>.");
        assert_eq!(storage.lock().await.archive_channel(5), Some(77));

        let reply = remove_archive(&storage, guild).await.unwrap();
        assert_eq!(reply, "Archive forgotten.");
        assert_eq!(storage.lock().await.archive_channel(5), None);
    }
}
