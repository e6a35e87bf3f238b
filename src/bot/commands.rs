use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::CommandOptionType, channel::ChannelType, id::GuildId,
        permissions::Permissions,
    },
    prelude::Context,
};

use crate::storage::MAX_PREFIX_LEN;

/// Every slash command the bot answers to.
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        summon_command(),
        leave_command(),
        play_command(),
        play_local_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        queue_command(),
        shuffle_command(),
        remove_command(),
        loop_command(),
        now_command(),
        set_archive_command(),
        remove_archive_command(),
        prefix_command(),
        eight_ball_command(),
        coinflip_command(),
        roll_command(),
    ]
}

pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Guild commands show up immediately, which is handy while developing.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Voice

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join the voice channel you're in")
}

fn summon_command() -> CreateCommand {
    CreateCommand::new("summon")
        .description("Join a voice channel, or move there if already connected")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Voice channel, defaults to yours",
            )
            .channel_types(vec![ChannelType::Voice, ChannelType::Stage]),
        )
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave")
        .description("Leave the voice channel and forget the queue")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or playlist from a URL or a search")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn play_local_command() -> CreateCommand {
    let field = |name: &str, description: &str| {
        CreateCommandOption::new(CommandOptionType::String, name, description)
            .set_autocomplete(true)
    };

    CreateCommand::new("play-local")
        .description("Play a song or a whole album from the local music folder")
        .add_option(field("title", "Song title"))
        .add_option(field("album", "Album, queued in track order when no title is given"))
        .add_option(field("artist", "Artist, to narrow down the title or album"))
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause")
        .description("Pause the current song")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume")
        .description("Resume the paused song")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playing and clear the queue")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggle looping of the current song")
}

fn now_command() -> CreateCommand {
    CreateCommand::new("now").description("Show the song that is playing")
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("List the queued songs")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page to show")
                .min_int_value(1),
        )
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffle the queue")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a song from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Position in the queue, as shown by /queue",
            )
            .min_int_value(1)
            .required(true),
        )
}

// Pin archive

fn set_archive_command() -> CreateCommand {
    CreateCommand::new("set-archive")
        .description("Copy every new pin into a channel")
        .default_member_permissions(Permissions::MANAGE_CHANNELS)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Archive channel, defaults to this one",
            )
            .channel_types(vec![ChannelType::Text]),
        )
}

fn prefix_command() -> CreateCommand {
    CreateCommand::new("prefix")
        .description("Show or change this server's command prefix")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "prefix", "New prefix")
                .max_length(MAX_PREFIX_LEN as u16),
        )
}

fn remove_archive_command() -> CreateCommand {
    CreateCommand::new("remove-archive")
        .description("Stop copying pins")
        .default_member_permissions(Permissions::MANAGE_CHANNELS)
}

// Fun

fn eight_ball_command() -> CreateCommand {
    CreateCommand::new("8ball")
        .description("Ask the magic 8-ball")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "question",
            "What do you want to know?",
        ))
}

fn coinflip_command() -> CreateCommand {
    CreateCommand::new("coinflip").description("Flip a coin")
}

fn roll_command() -> CreateCommand {
    CreateCommand::new("roll")
        .description("Roll some dice")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "dice",
            "Dice in NdM notation, 1d6 by default",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::collections::HashSet;

    fn command(name: &str) -> Value {
        all_commands()
            .into_iter()
            .map(|command| serde_json::to_value(command).unwrap())
            .find(|command| command["name"] == name)
            .unwrap_or_else(|| panic!("no /{} command", name))
    }

    #[test]
    fn command_names_are_unique() {
        let names: Vec<String> = all_commands()
            .into_iter()
            .map(|command| serde_json::to_value(command).unwrap()["name"].to_string())
            .collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), 20);
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn moderation_commands_need_permissions() {
        for name in ["summon", "leave", "pause", "resume", "prefix"] {
            assert_eq!(command(name)["default_member_permissions"], "32", "/{}", name);
        }
        for name in ["set-archive", "remove-archive"] {
            assert_eq!(command(name)["default_member_permissions"], "16", "/{}", name);
        }
        assert!(command("play")["default_member_permissions"].is_null());
    }

    #[test]
    fn summon_takes_an_optional_voice_channel() {
        let option = command("summon")["options"][0].clone();
        assert_eq!(option["name"], "channel");
        assert_eq!(option["type"], 7);
        assert_ne!(option["required"], true);
        assert_eq!(option["channel_types"], serde_json::json!([2, 13]));
    }

    #[test]
    fn play_local_fields_autocomplete() {
        let options = command("play-local")["options"].as_array().unwrap().clone();
        let names: Vec<&str> = options.iter().map(|o| o["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["title", "album", "artist"]);
        assert!(options.iter().all(|o| o["autocomplete"] == true));
        assert!(options.iter().all(|o| o["required"] != true));
    }
}
