//! # Bot Module
//!
//! Discord-facing glue for the voice module: slash command registration and
//! dispatch, plus voice state handling (auto-leave, cleanup after being
//! disconnected). All playback decisions are delegated to [`AudioPlayer`].

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::AudioPlayer,
    config::Config,
    sources::{SpeechSynthesizer, YtDlpResolver},
};

/// Serenity event handler owning the bot's shared state.
pub struct NextBot {
    pub config: Arc<Config>,
    pub player: AudioPlayer,
    pub resolver: YtDlpResolver,
    pub tts: SpeechSynthesizer,
}

impl NextBot {
    pub fn new(config: Config, player: AudioPlayer) -> Self {
        let resolver = YtDlpResolver::new(config.ytdlp_path.clone(), config.resolve_timeout);
        let tts = SpeechSynthesizer::new(config.tts_endpoint.clone(), config.tts_voice.clone());

        Self {
            config: Arc::new(config),
            player,
            resolver,
            tts,
        }
    }

    /// Registers slash commands globally, or in the development guild when
    /// one is configured.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

/// Voice channel `user_id` is currently in, from the cache.
pub(crate) fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild.voice_states.get(&user_id)?.channel_id
}

/// Number of members (bot included) connected to `channel_id`.
pub(crate) fn channel_member_count(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> usize {
    ctx.cache.guild(guild_id).map_or(0, |guild| {
        guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .count()
    })
}

#[async_trait]
impl EventHandler for NextBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online in {} guilds", ready.user.name, ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        events::handle_voice_state(&ctx, self, old, new).await;
    }
}
