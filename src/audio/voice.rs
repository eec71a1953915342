use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::ControlError,
    input::{HttpRequest, Input},
    tracks::{PlayMode, Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::{
    connection::{AudioConnection, VoiceConnector},
    error::PlaybackError,
    item::PlayableItem,
    player::FinishNotifier,
};

/// Joins voice channels through songbird.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        Self {
            manager,
            http_client,
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioConnection>, PlaybackError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            call,
            manager: Arc::clone(&self.manager),
            http_client: self.http_client.clone(),
            track: Mutex::new(None),
        }))
    }
}

/// One guild's songbird call and the track it is playing.
pub struct SongbirdConnection {
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn current(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

fn control_error(e: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::Connection(e.to_string())
}

/// Songbird drops a track's controls once it ends, so a finished track has
/// nothing left to pause, resume or stop.
fn ignore_finished(result: Result<(), ControlError>) -> Result<(), PlaybackError> {
    match result {
        Err(ControlError::Finished) => Ok(()),
        other => other.map_err(control_error),
    }
}

#[async_trait]
impl AudioConnection for SongbirdConnection {
    async fn play(
        &self,
        item: &PlayableItem,
        volume: u8,
        on_finish: FinishNotifier,
    ) -> Result<(), PlaybackError> {
        let input: Input = HttpRequest::new(self.http_client.clone(), item.source_url().to_string()).into();
        let track = Track::new(input).volume(f32::from(volume) / 100.0);

        let handle = self.call.lock().await.play_only(track);

        // Both events share one notifier so only the first of them reports.
        let finish = Arc::new(Mutex::new(Some(on_finish)));
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler {
                    finish: Arc::clone(&finish),
                },
            )
            .map_err(control_error)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorHandler { finish })
            .map_err(control_error)?;

        *self.track.lock() = Some(handle);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        match self.current() {
            Some(track) => ignore_finished(track.pause()),
            None => Ok(()),
        }
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        match self.current() {
            Some(track) => ignore_finished(track.play()),
            None => Ok(()),
        }
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        match self.current() {
            Some(track) => ignore_finished(track.stop()),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> Result<(), PlaybackError> {
        self.track.lock().take();
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;
        info!("🔌 Voice call removed in guild {}", self.guild_id);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn volume(&self) -> Option<u32> {
        let track = self.current()?;
        let info = track.get_info().await.ok()?;
        Some((info.volume * 100.0).round() as u32)
    }

    fn set_volume(&self, percent: u32) -> Result<(), PlaybackError> {
        let track = self
            .current()
            .ok_or_else(|| PlaybackError::Connection("nothing is playing".to_string()))?;
        track.set_volume(percent as f32 / 100.0).map_err(control_error)
    }

    async fn channel_id(&self) -> Option<ChannelId> {
        let call = self.call.lock().await;
        call.current_channel().map(|channel| ChannelId::new(channel.0.get()))
    }
}

/// Reports a track that ended or was stopped.
struct TrackEndHandler {
    finish: Arc<Mutex<Option<FinishNotifier>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let notifier = self.finish.lock().take();
        if let Some(notifier) = notifier {
            debug!("Track ended in guild {}", notifier.guild_id());
            notifier.notify(None).await;
        }

        None
    }
}

/// Reports a track that failed to play.
struct TrackErrorHandler {
    finish: Arc<Mutex<Option<FinishNotifier>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        }
        .unwrap_or_else(|| "unknown playback error".to_string());

        let notifier = self.finish.lock().take();
        if let Some(notifier) = notifier {
            warn!("Track errored in guild {}: {}", notifier.guild_id(), reason);
            notifier.notify(Some(reason)).await;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        item::tests::media,
        player::tests::{channel, guild, player_with, FakeConnection},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn finished_track_controls_are_no_ops() {
        assert_eq!(ignore_finished(Err(ControlError::Finished)), Ok(()));
        assert_eq!(ignore_finished(Ok(())), Ok(()));
    }

    #[tokio::test]
    async fn errored_track_reports_once() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        let finish = Arc::new(Mutex::new(Some(fake.take_notifier())));
        let on_error = TrackErrorHandler {
            finish: Arc::clone(&finish),
        };
        let on_end = TrackEndHandler { finish };

        // Songbird fires Error and then End for a track that failed.
        assert!(on_error.act(&EventContext::Track(&[])).await.is_none());
        assert!(on_end.act(&EventContext::Track(&[])).await.is_none());

        assert_eq!(fake.played(), vec![media("a")]);
        assert_eq!(
            player.current_queue(guild()).await.unwrap(),
            Some(vec![media("a"), media("b")])
        );
    }

    #[tokio::test]
    async fn ended_track_advances_queue() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        let on_end = TrackEndHandler {
            finish: Arc::new(Mutex::new(Some(fake.take_notifier()))),
        };
        on_end.act(&EventContext::Track(&[])).await;

        assert_eq!(fake.played(), vec![media("a"), media("b")]);
        assert_eq!(player.current_queue(guild()).await.unwrap(), Some(vec![media("b")]));
    }
}
