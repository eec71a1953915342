use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{Enqueued, PlayableItem, PlaybackError},
    bot::{channel_member_count, user_voice_channel, NextBot},
    sources::YtDlpResolver,
    ui::embeds,
};

const NOT_IN_VOICE: &str = "You need to be in a voice channel!";
const NOT_LISTENING: &str = "You need to be in the voice channel to use this command!";
const NOT_LISTENING_QUEUE: &str = "You need to be in the voice channel to add songs to the queue!";

/// Handles slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &NextBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_error(ctx, &command, "This command only works in a server!").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "tts" => handle_tts(ctx, &command, bot, guild_id).await,
        "tts_channel" => handle_tts_channel(ctx, &command, bot, guild_id).await,
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        _ => respond_error(ctx, &command, "Unknown command").await,
    }
}

// Playback

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let query = option_str(command, "query").unwrap_or_default();

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_error(ctx, command, NOT_IN_VOICE).await;
    };

    if !YtDlpResolver::is_supported_query(query) {
        return respond_error(ctx, command, "Invalid YouTube link!").await;
    }

    // Resolving can take longer than the interaction deadline
    command.defer(&ctx.http).await?;

    if bot.player.current_queue(guild_id).await?.is_some()
        && bot_channel(bot, guild_id).await != Some(channel_id)
    {
        return edit_error(ctx, command, NOT_LISTENING_QUEUE).await;
    }

    let media = match bot.resolver.resolve_media(query).await {
        Ok(media) => media,
        Err(e) => {
            warn!("Could not resolve '{}': {}", query, e);
            return edit_error(ctx, command, &PlaybackError::from(e).to_string()).await;
        }
    };

    enqueue_and_reply(ctx, command, bot, guild_id, channel_id, media.into()).await
}

async fn handle_tts(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let text = option_str(command, "query").unwrap_or_default();

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_error(ctx, command, NOT_IN_VOICE).await;
    };

    command.defer(&ctx.http).await?;

    if bot.player.current_queue(guild_id).await?.is_some()
        && bot_channel(bot, guild_id).await != Some(channel_id)
    {
        return edit_error(ctx, command, NOT_LISTENING).await;
    }

    let speech = bot.tts.build_speech_item(text);
    enqueue_and_reply(ctx, command, bot, guild_id, channel_id, speech.into()).await
}

async fn handle_tts_channel(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &NextBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = option_str(command, "query").unwrap_or_default();
    let Some(channel_id) = option_channel(command, "channel") else {
        return respond_error(ctx, command, "Pick a voice channel!").await;
    };

    if channel_member_count(ctx, guild_id, channel_id) == 0 {
        return respond_error(ctx, command, "Channel is empty!").await;
    }

    command.defer(&ctx.http).await?;

    if bot.player.current_queue(guild_id).await?.is_some()
        && bot_channel(bot, guild_id).await != Some(channel_id)
    {
        return edit_error(ctx, command, "The bot is currently being used in a different channel!").await;
    }

    let speech = bot.tts.build_speech_item(text);
    enqueue_and_reply(ctx, command, bot, guild_id, channel_id, speech.into()).await
}

/// Enqueues `item` and answers the deferred interaction with its embed.
async fn enqueue_and_reply(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &NextBot,
    guild_id: GuildId,
    channel_id: ChannelId,
    item: PlayableItem,
) -> Result<()> {
    let embed = match bot.player.enqueue(guild_id, channel_id, item.clone()).await {
        Ok(Enqueued::Started { item, .. }) => embeds::item(&item, "Now playing:", bot_avatar(ctx)),
        Ok(Enqueued::Queued { position }) => {
            info!("📋 Queued at #{} in guild {}: {}", position, guild_id, item.title());
            embeds::item(&item, "Added to queue:", bot_avatar(ctx))
        }
        Err(e) => return edit_error(ctx, command, &e.to_string()).await,
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

// Connection

async fn handle_join(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if bot.player.connection(guild_id).is_some() {
        return respond_error(ctx, command, "The bot is already in a voice channel!").await;
    }

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_error(ctx, command, "You are not in a voice channel!").await;
    };

    match bot.player.join(guild_id, channel_id).await {
        Ok(_) => respond(ctx, command, embeds::success(&format!("🔊 Joined <#{channel_id}>"))).await,
        Err(e) => respond_error(ctx, command, &e.to_string()).await,
    }
}

async fn handle_stop(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let result = bot.player.stop(guild_id).await;
    reply(ctx, command, result.map(|()| "⏹️ Stopped!".to_string())).await
}

async fn handle_leave(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let result = bot.player.leave(guild_id).await;
    reply(ctx, command, result.map(|()| "Disconnected!".to_string())).await
}

// Control

async fn handle_pause(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if let Err(message) = check_listener(ctx, command, bot, guild_id).await {
        return respond_error(ctx, command, &message).await;
    }

    let result = bot.player.pause(guild_id).await;
    reply(ctx, command, result.map(|()| "⏸ Paused!".to_string())).await
}

async fn handle_resume(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if let Err(message) = check_listener(ctx, command, bot, guild_id).await {
        return respond_error(ctx, command, &message).await;
    }

    let result = bot.player.resume(guild_id).await;
    reply(ctx, command, result.map(|()| "▶ Resumed!".to_string())).await
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if let Err(message) = check_listener(ctx, command, bot, guild_id).await {
        return respond_error(ctx, command, &message).await;
    }

    let result = bot.player.skip(guild_id).await;
    reply(ctx, command, result.map(|()| "⏩ Skipped!".to_string())).await
}

async fn handle_volume(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if let Err(message) = check_listener(ctx, command, bot, guild_id).await {
        return respond_error(ctx, command, &message).await;
    }

    let requested = option_i64(command, "volume").map(|v| u32::try_from(v).unwrap_or(u32::MAX));
    let limit = bot.config.volume_limit(command.user.id.get());

    let result = bot
        .player
        .volume(guild_id, requested, limit)
        .await
        .map(|volume| match requested {
            Some(_) => format!("🔊 Set volume to {volume}%"),
            None => format!("🔊 Volume is currently set to {volume}%"),
        });

    reply(ctx, command, result).await
}

// Queue

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let Some(items) = bot.player.current_queue(guild_id).await? else {
        return respond_error(ctx, command, &PlaybackError::EmptyQueue.to_string()).await;
    };

    let looping = bot.player.is_looping(guild_id).await?;
    respond(ctx, command, embeds::queue(&items, looping)).await
}

async fn handle_remove(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    let number = option_i64(command, "number").unwrap_or_default();
    let position = usize::try_from(number).unwrap_or_default();

    let result = bot
        .player
        .remove(guild_id, position)
        .await
        .map(|item| format!("Successfully removed {item} from the queue!"));

    reply(ctx, command, result).await
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &NextBot, guild_id: GuildId) -> Result<()> {
    if let Err(message) = check_listener(ctx, command, bot, guild_id).await {
        return respond_error(ctx, command, &message).await;
    }

    let result = bot.player.toggle_loop(guild_id).await.map(|enabled| {
        if enabled {
            "🔁 Loop enabled!".to_string()
        } else {
            "🔁 Loop disabled!".to_string()
        }
    });

    reply(ctx, command, result).await
}

// Helpers

/// The bot must be connected and the user must share its channel.
async fn check_listener(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &NextBot,
    guild_id: GuildId,
) -> Result<(), String> {
    let Some(bot_channel) = bot_channel(bot, guild_id).await else {
        return Err(PlaybackError::NotConnected.to_string());
    };

    if user_voice_channel(ctx, guild_id, command.user.id) != Some(bot_channel) {
        return Err(NOT_LISTENING.to_string());
    }

    Ok(())
}

async fn bot_channel(bot: &NextBot, guild_id: GuildId) -> Option<ChannelId> {
    bot.player.connection(guild_id)?.channel_id().await
}

fn bot_avatar(ctx: &Context) -> Option<String> {
    ctx.cache.current_user().avatar_url()
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn option_channel(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_channel_id())
}

/// Green embed on success, ephemeral red one on a playback error.
async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    result: Result<String, PlaybackError>,
) -> Result<()> {
    match result {
        Ok(message) => respond(ctx, command, embeds::success(&message)).await,
        Err(e) => respond_error(ctx, command, &e.to_string()).await,
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn respond_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::error(message))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Error reply for an interaction that was already deferred.
async fn edit_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::error(message)),
        )
        .await?;
    Ok(())
}
