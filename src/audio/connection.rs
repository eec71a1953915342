use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use crate::audio::{error::PlaybackError, item::PlayableItem, player::FinishNotifier};

/// A live voice connection in one guild.
#[async_trait]
pub trait AudioConnection: Send + Sync {
    /// Starts streaming `item` at `volume` percent, replacing whatever was
    /// playing. `on_finish` must be notified exactly once when this playback
    /// ends, errors, or is stopped.
    async fn play(
        &self,
        item: &PlayableItem,
        volume: u8,
        on_finish: FinishNotifier,
    ) -> Result<(), PlaybackError>;

    fn pause(&self) -> Result<(), PlaybackError>;

    fn resume(&self) -> Result<(), PlaybackError>;

    /// Stops the current track, which fires its finish notification.
    fn stop(&self) -> Result<(), PlaybackError>;

    async fn disconnect(&self) -> Result<(), PlaybackError>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    /// Volume of the current track in percent.
    async fn volume(&self) -> Option<u32>;

    fn set_volume(&self, percent: u32) -> Result<(), PlaybackError>;

    async fn channel_id(&self) -> Option<ChannelId>;
}

/// Opens voice connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioConnection>, PlaybackError>;
}
