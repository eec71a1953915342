use serenity::{
    model::{
        id::{ChannelId, GuildId, UserId},
        voice::VoiceState,
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use crate::bot::{channel_member_count, NextBot};

/// What a voice state change means for the guild's playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    /// The bot was disconnected from outside; drop its queue.
    Forget,
    /// Everyone else left the bot's channel.
    Leave,
    Ignore,
}

/// Decides the reaction to `member` moving from `old_channel` to
/// `new_channel`. `remaining` is the member count of the bot's channel after
/// the move.
pub fn classify(
    bot_user: UserId,
    member: UserId,
    old_channel: Option<ChannelId>,
    new_channel: Option<ChannelId>,
    bot_channel: Option<ChannelId>,
    remaining: usize,
    auto_leave: bool,
) -> VoiceAction {
    if member == bot_user {
        return if new_channel.is_none() {
            VoiceAction::Forget
        } else {
            VoiceAction::Ignore
        };
    }

    let left_bot_channel = old_channel.is_some() && old_channel == bot_channel && new_channel != old_channel;

    if auto_leave && left_bot_channel && remaining <= 1 {
        VoiceAction::Leave
    } else {
        VoiceAction::Ignore
    }
}

/// Handles voice state updates: auto-leave and cleanup after disconnects.
pub async fn handle_voice_state(ctx: &Context, bot: &NextBot, old: Option<VoiceState>, new: VoiceState) {
    let Some(guild_id) = new.guild_id else {
        return;
    };

    let bot_user = ctx.cache.current_user().id;
    let bot_channel = match bot.player.connection(guild_id) {
        Some(connection) => connection.channel_id().await,
        None => None,
    };
    let remaining = bot_channel.map_or(0, |channel| channel_member_count(ctx, guild_id, channel));

    let action = classify(
        bot_user,
        new.user_id,
        old.and_then(|state| state.channel_id),
        new.channel_id,
        bot_channel,
        remaining,
        bot.config.auto_leave,
    );

    match action {
        VoiceAction::Forget => forget(bot, guild_id).await,
        VoiceAction::Leave => leave(bot, guild_id).await,
        VoiceAction::Ignore => {}
    }
}

async fn forget(bot: &NextBot, guild_id: GuildId) {
    warn!("🔌 Bot disconnected from voice in guild {}", guild_id);

    if let Err(e) = bot.player.forget(guild_id).await {
        error!("Failed to drop queue for guild {}: {}", guild_id, e);
    }
}

async fn leave(bot: &NextBot, guild_id: GuildId) {
    info!("👋 Alone in voice channel, leaving guild {}", guild_id);

    if let Err(e) = bot.player.leave(guild_id).await {
        error!("Failed to leave voice in guild {}: {}", guild_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> UserId {
        UserId::new(1)
    }

    fn user() -> UserId {
        UserId::new(2)
    }

    fn channel(id: u64) -> Option<ChannelId> {
        Some(ChannelId::new(id))
    }

    #[test]
    fn bot_disconnect_forgets_the_guild() {
        let action = classify(bot(), bot(), channel(10), None, channel(10), 0, true);
        assert_eq!(action, VoiceAction::Forget);
    }

    #[test]
    fn bot_moving_channels_is_ignored() {
        let action = classify(bot(), bot(), channel(10), channel(11), channel(11), 2, true);
        assert_eq!(action, VoiceAction::Ignore);
    }

    #[test]
    fn last_listener_leaving_makes_bot_leave() {
        let action = classify(bot(), user(), channel(10), None, channel(10), 1, true);
        assert_eq!(action, VoiceAction::Leave);

        let moved = classify(bot(), user(), channel(10), channel(20), channel(10), 1, true);
        assert_eq!(moved, VoiceAction::Leave);
    }

    #[test]
    fn stays_while_others_listen() {
        let action = classify(bot(), user(), channel(10), None, channel(10), 2, true);
        assert_eq!(action, VoiceAction::Ignore);
    }

    #[test]
    fn ignores_other_channels_and_disabled_auto_leave() {
        assert_eq!(
            classify(bot(), user(), channel(20), None, channel(10), 1, true),
            VoiceAction::Ignore
        );
        assert_eq!(
            classify(bot(), user(), channel(10), None, channel(10), 1, false),
            VoiceAction::Ignore
        );
        assert_eq!(
            classify(bot(), user(), None, channel(10), channel(10), 2, true),
            VoiceAction::Ignore
        );
    }
}
