use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, channel::ChannelType, id::GuildId},
    prelude::Context,
};

/// Longest TTS message accepted; keeps the "Now playing" embed valid.
pub const MAX_TTS_LENGTH: u16 = 1000;

/// Every slash command of the voice module.
pub fn all() -> Vec<CreateCommand> {
    vec![
        play_command(),
        tts_command(),
        tts_channel_command(),
        join_command(),
        stop_command(),
        leave_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        queue_command(),
        remove_command(),
        volume_command(),
        loop_command(),
    ]
}

pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Guild commands update instantly; used while developing.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all()).await?;
    Ok(())
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Plays a query from YouTube")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "The YouTube link or query to search",
            )
            .required(true),
        )
}

fn tts_command() -> CreateCommand {
    CreateCommand::new("tts")
        .description("Sends a TTS message")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "The TTS message to play")
                .max_length(MAX_TTS_LENGTH)
                .required(true),
        )
}

fn tts_channel_command() -> CreateCommand {
    CreateCommand::new("tts_channel")
        .description("Sends a TTS message in the target channel")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "The channel to play the TTS message",
            )
            .channel_types(vec![ChannelType::Voice, ChannelType::Stage])
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "The TTS message to play")
                .max_length(MAX_TTS_LENGTH)
                .required(true),
        )
}

// Connection

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Joins the voice channel")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops the audio")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Disconnects the bot from voice chat")
}

// Control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pauses the song")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resumes the song")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the song")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Changes the sound volume")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "volume",
                "The volume to change to. Leave empty to check the current volume",
            )
            .min_int_value(0),
        )
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Shows the queue for the guild")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Removes an entry from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "number",
                "The number of entry to remove from the queue",
            )
            .required(true),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Enables/disables queue loop")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_command_once() {
        let names: Vec<String> = all()
            .iter()
            .map(|command| {
                serde_json::to_value(command).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();

        assert_eq!(names.len(), 13);
        assert_eq!(unique.len(), names.len());
        assert!(names.contains(&"tts_channel".to_string()));
    }

    #[test]
    fn tts_queries_are_length_limited() {
        for command in [tts_command(), tts_channel_command()] {
            let json = serde_json::to_value(&command).unwrap();
            let query = json["options"]
                .as_array()
                .unwrap()
                .iter()
                .find(|option| option["name"] == "query")
                .unwrap()
                .clone();
            assert_eq!(query["max_length"], u64::from(MAX_TTS_LENGTH));
        }
    }
}
