use anyhow::Result;
use serenity::{
    builder::{
        CreateAutocompleteResponse, CreateInteractionResponse, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    audio::{error::PlayerError, voice::DiscordNotifier},
    bot::{
        archive, fun,
        music::{self, MusicContext, Reply},
        settings,
        AlexaBot,
    },
    sources::SongField,
    ui::embeds::create_error_embed,
};

/// Runs a slash command and edits the deferred response with the outcome.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &AlexaBot,
) -> Result<()> {
    info!(
        "📝 /{} used by {} in {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    // Resolving a playlist can take longer than the interaction deadline.
    command.defer(&ctx.http).await?;

    let outcome = match fun_reply(&command) {
        Some(reply) => Ok(reply),
        None => match command.guild_id {
            Some(guild_id) => dispatch(ctx, &command, guild_id, bot).await,
            None => Err(PlayerError::InvalidQuery(
                "This command only works in a server.".to_string(),
            )),
        },
    };

    let reply = outcome.unwrap_or_else(|e| {
        if e.is_internal() {
            error!("Error handling /{}: {:?}", command.data.name, e);
            Reply::Embed(create_error_embed(&e.user_message()))
        } else {
            debug!("/{} refused: {}", command.data.name, e);
            Reply::Text(e.user_message())
        }
    });

    let response = match reply {
        Reply::Text(text) => EditInteractionResponse::new().content(text),
        Reply::Embed(embed) => EditInteractionResponse::new().embed(embed),
    };
    command.edit_response(&ctx.http, response).await?;

    Ok(())
}

fn fun_reply(command: &CommandInteraction) -> Option<Reply> {
    let mut rng = rand::thread_rng();
    let text = match command.data.name.as_str() {
        "8ball" => fun::eight_ball(string_option(command, "question"), &mut rng),
        "coinflip" => fun::coinflip(&mut rng),
        "roll" => fun::roll(string_option(command, "dice"), &mut rng),
        _ => return None,
    };
    Some(Reply::Text(text))
}

async fn dispatch(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &AlexaBot,
) -> Result<Reply, PlayerError> {
    let music = MusicContext {
        guild_id,
        user_id: command.user.id,
        user_voice: user_voice_channel(ctx, guild_id, command.user.id),
        registry: &bot.registry,
        gateway: bot.gateway.as_ref(),
        notifier: Arc::new(DiscordNotifier::new(ctx.http.clone(), command.channel_id)),
    };

    match command.data.name.as_str() {
        "join" => music::join(&music).await,
        "summon" => music::summon(&music, channel_option(command, "channel")).await,
        "leave" => music::leave(&music).await,
        "play" => {
            let query = string_option(command, "query").unwrap_or_default();
            music::play(&music, bot.resolver.as_ref(), query).await
        }
        "play-local" => {
            music::play_local(
                &music,
                bot.library.as_deref(),
                string_option(command, "title"),
                string_option(command, "album"),
                string_option(command, "artist"),
            )
            .await
        }
        "pause" => music::pause(&music).await,
        "resume" => music::resume(&music).await,
        "stop" => music::stop(&music).await,
        "skip" => music::skip(&music).await,
        "queue" => {
            let page = integer_option(command, "page").unwrap_or(1);
            music::queue(&music, usize::try_from(page).unwrap_or(1))
        }
        "shuffle" => music::shuffle(&music),
        "remove" => {
            let index = integer_option(command, "index").unwrap_or(0);
            music::remove(&music, usize::try_from(index).unwrap_or(0))
        }
        "loop" => music::toggle_loop(&music),
        "now" => music::now_playing(&music),
        "set-archive" => {
            let channel = channel_option(command, "channel").unwrap_or(command.channel_id);
            let text = archive::set_archive(&bot.storage, guild_id, channel).await?;
            Ok(Reply::Text(text))
        }
        "prefix" => {
            let text =
                settings::prefix(&bot.storage, guild_id, string_option(command, "prefix")).await?;
            Ok(Reply::Text(text))
        }
        "remove-archive" => {
            let text = archive::remove_archive(&bot.storage, guild_id).await?;
            Ok(Reply::Text(text))
        }
        other => Err(PlayerError::InvalidQuery(format!("❌ Unknown command /{}", other))),
    }
}

/// Suggestions for the `/play-local` fields.
pub async fn handle_autocomplete(
    ctx: &Context,
    interaction: CommandInteraction,
    bot: &AlexaBot,
) -> Result<()> {
    let Some(focused) = interaction.data.autocomplete() else {
        return Ok(());
    };
    let Some(field) = SongField::from_option(focused.name) else {
        return Ok(());
    };

    let others: Vec<(SongField, String)> = interaction
        .data
        .options
        .iter()
        .filter(|option| option.name != focused.name)
        .filter_map(|option| {
            let field = SongField::from_option(&option.name)?;
            Some((field, option.value.as_str()?.to_string()))
        })
        .collect();

    let choices = bot
        .library
        .as_ref()
        .map(|library| library.autocomplete(field, focused.value, &others))
        .unwrap_or_default();

    let response = choices
        .into_iter()
        .fold(CreateAutocompleteResponse::new(), |response, choice| {
            response.add_string_choice(choice.clone(), choice)
        });
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
        .await?;

    Ok(())
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn channel_option(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_channel_id())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
