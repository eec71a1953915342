use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::audio::{
    connection::{AudioConnection, VoiceConnector},
    error::PlaybackError,
    item::PlayableItem,
    manager::QueueManager,
    queue::{Advance, Enqueued, PlaybackId},
};

/// Drives every guild's queue through its voice connection.
///
/// Queue state lives in [`QueueManager`]; this type owns the connections and
/// performs the audio I/O that the queue decisions call for.
#[derive(Clone)]
pub struct AudioPlayer {
    queues: QueueManager,
    connections: Arc<DashMap<GuildId, Arc<dyn AudioConnection>>>,
    connector: Arc<dyn VoiceConnector>,
    default_volume: u8,
}

/// Completion callback handed to [`AudioConnection::play`].
///
/// Consumed on use, so one playback can only be reported once.
pub struct FinishNotifier {
    player: AudioPlayer,
    guild_id: GuildId,
    playback: PlaybackId,
}

impl FinishNotifier {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Reports the end of the playback and waits until the queue has advanced.
    pub async fn notify(self, error: Option<String>) {
        self.player
            .on_finished(self.guild_id, self.playback, error)
            .await;
    }
}

impl AudioPlayer {
    pub fn new(connector: Arc<dyn VoiceConnector>, default_volume: u8) -> Self {
        Self {
            queues: QueueManager::spawn(),
            connections: Arc::new(DashMap::new()),
            connector,
            default_volume,
        }
    }

    pub fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn AudioConnection>> {
        self.connections
            .get(&guild_id)
            .map(|connection| Arc::clone(connection.value()))
    }

    fn require_connection(&self, guild_id: GuildId) -> Result<Arc<dyn AudioConnection>, PlaybackError> {
        self.connection(guild_id).ok_or(PlaybackError::NotConnected)
    }

    /// Returns the guild's connection, connecting to `channel_id` if there is none.
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioConnection>, PlaybackError> {
        if let Some(connection) = self.connection(guild_id) {
            return Ok(connection);
        }

        let connection = self.connector.connect(guild_id, channel_id).await?;
        // A concurrent join may have won the race; keep whichever got in first.
        let connection = Arc::clone(
            self.connections
                .entry(guild_id)
                .or_insert(connection)
                .value(),
        );
        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(connection)
    }

    /// Appends `item` to the guild's queue. When the guild had no queue the
    /// item starts right away on the existing connection, or on a new one in
    /// `channel_id`.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        item: PlayableItem,
    ) -> Result<Enqueued, PlaybackError> {
        let outcome = self.queues.enqueue(guild_id, item).await?;

        if let Enqueued::Started { item, playback } = &outcome {
            let started = match self.join(guild_id, channel_id).await {
                Ok(connection) => self.start(connection, guild_id, item, *playback).await,
                Err(e) => Err(e),
            };

            if let Err(e) = started {
                warn!("Could not start playback in guild {}: {}", guild_id, e);
                self.queues.clear(guild_id).await?;
                return Err(e);
            }
        }

        Ok(outcome)
    }

    async fn start(
        &self,
        connection: Arc<dyn AudioConnection>,
        guild_id: GuildId,
        item: &PlayableItem,
        playback: PlaybackId,
    ) -> Result<(), PlaybackError> {
        let notifier = FinishNotifier {
            player: self.clone(),
            guild_id,
            playback,
        };

        connection.play(item, self.default_volume, notifier).await?;
        info!("🎵 Playing in guild {}: {}", guild_id, item.title());
        Ok(())
    }

    /// Advances the guild's queue after a playback ended.
    pub async fn on_finished(&self, guild_id: GuildId, playback: PlaybackId, error: Option<String>) {
        let advance = match self.queues.finish(guild_id, playback, error).await {
            Ok(advance) => advance,
            Err(e) => {
                warn!("Dropping finish for guild {}: {}", guild_id, e);
                return;
            }
        };

        match advance {
            Advance::Next { item, playback } => match self.connection(guild_id) {
                Some(connection) => {
                    if let Err(e) = self.start(connection, guild_id, &item, playback).await {
                        error!("❌ Could not start next item in guild {}: {}", guild_id, e);
                    }
                }
                None => {
                    warn!("No voice connection left in guild {}, dropping queue", guild_id);
                    let _ = self.queues.clear(guild_id).await;
                }
            },
            Advance::Exhausted | Advance::Stalled => {}
            Advance::Stale => debug!("Stale finish in guild {}", guild_id),
        }
    }

    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Result<PlayableItem, PlaybackError> {
        self.queues.remove(guild_id, position).await
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.queues.toggle_loop(guild_id).await
    }

    pub async fn is_looping(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.queues.is_looping(guild_id).await
    }

    pub async fn clear(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        self.queues.clear(guild_id).await
    }

    /// The guild's queue, playing item first.
    pub async fn current_queue(&self, guild_id: GuildId) -> Result<Option<Vec<PlayableItem>>, PlaybackError> {
        self.queues.items(guild_id).await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let connection = self.require_connection(guild_id)?;
        if !connection.is_playing().await {
            return Err(PlaybackError::AlreadyPaused);
        }

        connection.pause()?;
        info!("⏸️ Paused in guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let connection = self.require_connection(guild_id)?;
        if !connection.is_paused().await {
            return Err(PlaybackError::AlreadyPlaying);
        }

        connection.resume()?;
        info!("▶️ Resumed in guild {}", guild_id);
        Ok(())
    }

    /// Stops the current item; its finish notification advances the queue.
    pub async fn skip(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        self.require_connection(guild_id)?.stop()?;
        info!("⏭️ Skipped in guild {}", guild_id);
        Ok(())
    }

    /// Clears the queue and stops the current item, staying connected.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let connection = self.require_connection(guild_id)?;
        // Clear first so the stopped track's finish finds nothing to advance.
        self.queues.clear(guild_id).await?;
        if let Err(e) = connection.stop() {
            warn!("Could not stop track in guild {}: {}", guild_id, e);
        }
        info!("⏹️ Stopped in guild {}", guild_id);
        Ok(())
    }

    /// Clears the queue and disconnects.
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let (_, connection) = self
            .connections
            .remove(&guild_id)
            .ok_or(PlaybackError::NotConnected)?;

        self.queues.clear(guild_id).await?;
        connection.disconnect().await?;
        info!("👋 Left voice in guild {}", guild_id);
        Ok(())
    }

    /// Drops the guild's queue and connection after the bot was disconnected
    /// from outside.
    pub async fn forget(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        self.connections.remove(&guild_id);
        self.queues.clear(guild_id).await?;
        Ok(())
    }

    /// Sets the current item's volume, or reports it when `percent` is `None`.
    pub async fn volume(&self, guild_id: GuildId, percent: Option<u32>, max: u32) -> Result<u32, PlaybackError> {
        let connection = self.require_connection(guild_id)?;

        let Some(percent) = percent else {
            return Ok(connection
                .volume()
                .await
                .unwrap_or(u32::from(self.default_volume)));
        };

        if percent > max {
            return Err(PlaybackError::VolumeOutOfRange {
                requested: percent,
                max,
            });
        }

        connection.set_volume(percent)?;
        info!("🔊 Volume set to {}% in guild {}", percent, guild_id);
        Ok(percent)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::{connection::MockVoiceConnector, item::tests::media};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    pub(crate) struct FakeConnection {
        played: Mutex<Vec<PlayableItem>>,
        pending: Mutex<Vec<FinishNotifier>>,
        volume: Mutex<Option<u32>>,
        paused: AtomicBool,
        stops: AtomicUsize,
        stop_fails: AtomicBool,
        disconnected: AtomicBool,
    }

    impl FakeConnection {
        pub(crate) fn played(&self) -> Vec<PlayableItem> {
            self.played.lock().clone()
        }

        /// Notifier of the most recent playback.
        pub(crate) fn take_notifier(&self) -> FinishNotifier {
            self.pending.lock().pop().expect("nothing playing")
        }

        /// Reports the end of the most recent playback.
        async fn finish(&self, error: Option<&str>) {
            let notifier = self.take_notifier();
            notifier.notify(error.map(str::to_string)).await;
        }
    }

    #[async_trait]
    impl AudioConnection for FakeConnection {
        async fn play(
            &self,
            item: &PlayableItem,
            volume: u8,
            on_finish: FinishNotifier,
        ) -> Result<(), PlaybackError> {
            self.played.lock().push(item.clone());
            self.pending.lock().push(on_finish);
            *self.volume.lock() = Some(u32::from(volume));
            self.paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&self) -> Result<(), PlaybackError> {
            self.paused.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn resume(&self) -> Result<(), PlaybackError> {
            self.paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), PlaybackError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.stop_fails.load(Ordering::SeqCst) {
                return Err(PlaybackError::Connection("track finished".into()));
            }
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), PlaybackError> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn is_playing(&self) -> bool {
            !self.pending.lock().is_empty() && !self.paused.load(Ordering::SeqCst)
        }

        async fn is_paused(&self) -> bool {
            self.paused.load(Ordering::SeqCst)
        }

        async fn volume(&self) -> Option<u32> {
            *self.volume.lock()
        }

        fn set_volume(&self, percent: u32) -> Result<(), PlaybackError> {
            *self.volume.lock() = Some(percent);
            Ok(())
        }

        async fn channel_id(&self) -> Option<ChannelId> {
            Some(channel())
        }
    }

    pub(crate) fn guild() -> GuildId {
        GuildId::new(1)
    }

    pub(crate) fn channel() -> ChannelId {
        ChannelId::new(10)
    }

    pub(crate) fn player_with(fake: &Arc<FakeConnection>, connects: usize) -> AudioPlayer {
        let connection: Arc<dyn AudioConnection> = fake.clone();
        let mut connector = MockVoiceConnector::new();
        connector
            .expect_connect()
            .times(connects)
            .returning(move |_, _| Ok(Arc::clone(&connection)));
        AudioPlayer::new(Arc::new(connector), 50)
    }

    #[tokio::test]
    async fn plays_first_item_and_advances_through_queue() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);

        let first = player.enqueue(guild(), channel(), media("a")).await.unwrap();
        assert!(matches!(first, Enqueued::Started { .. }));
        assert_eq!(
            player.enqueue(guild(), channel(), media("b")).await.unwrap(),
            Enqueued::Queued { position: 1 }
        );
        assert_eq!(fake.played(), vec![media("a")]);
        assert_eq!(fake.volume.lock().clone(), Some(50));
        assert_eq!(
            player.current_queue(guild()).await.unwrap(),
            Some(vec![media("a"), media("b")])
        );

        fake.finish(None).await;
        assert_eq!(fake.played(), vec![media("a"), media("b")]);
        assert_eq!(player.current_queue(guild()).await.unwrap(), Some(vec![media("b")]));

        fake.finish(None).await;
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
        assert_eq!(fake.played().len(), 2);
    }

    #[tokio::test]
    async fn playback_error_stalls_queue() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        fake.finish(Some("stream closed")).await;

        assert_eq!(fake.played(), vec![media("a")]);
        assert_eq!(
            player.current_queue(guild()).await.unwrap(),
            Some(vec![media("a"), media("b")])
        );
    }

    #[tokio::test]
    async fn loop_replays_queue_in_order() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        assert!(player.toggle_loop(guild()).await.unwrap());
        for name in ["a", "b", "c"] {
            player.enqueue(guild(), channel(), media(name)).await.unwrap();
        }

        for _ in 0..3 {
            fake.finish(None).await;
        }

        assert_eq!(fake.played(), vec![media("a"), media("b"), media("c"), media("a")]);
        assert_eq!(
            player.current_queue(guild()).await.unwrap(),
            Some(vec![media("a"), media("b"), media("c")])
        );
    }

    #[tokio::test]
    async fn failed_connect_rolls_back_queue() {
        let mut connector = MockVoiceConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_, _| Err(PlaybackError::Connection("missing permissions".into())));
        let player = AudioPlayer::new(Arc::new(connector), 50);

        let result = player.enqueue(guild(), channel(), media("a")).await;

        assert_eq!(result, Err(PlaybackError::Connection("missing permissions".into())));
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_queue_reuses_existing_connection() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);

        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        fake.finish(None).await;
        let again = player.enqueue(guild(), channel(), media("b")).await.unwrap();

        assert!(matches!(again, Enqueued::Started { .. }));
        assert_eq!(fake.played(), vec![media("a"), media("b")]);
    }

    #[tokio::test]
    async fn skip_stops_current_track() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        assert_eq!(player.skip(guild()).await, Err(PlaybackError::NotConnected));

        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();
        player.skip(guild()).await.unwrap();
        assert_eq!(fake.stops.load(Ordering::SeqCst), 1);

        // The stopped track reports its end like any other.
        fake.finish(None).await;
        assert_eq!(fake.played(), vec![media("a"), media("b")]);
    }

    #[tokio::test]
    async fn stop_clears_queue_and_ignores_stopped_track() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        player.stop(guild()).await.unwrap();
        fake.finish(None).await;

        assert_eq!(fake.stops.load(Ordering::SeqCst), 1);
        assert_eq!(fake.played(), vec![media("a")]);
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
        assert!(player.connection(guild()).is_some());
    }

    #[tokio::test]
    async fn leave_disconnects_and_clears() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        assert_eq!(player.leave(guild()).await, Err(PlaybackError::NotConnected));

        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.leave(guild()).await.unwrap();

        assert!(fake.disconnected.load(Ordering::SeqCst));
        assert!(player.connection(guild()).is_none());
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn pause_and_resume_report_no_ops() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        assert_eq!(player.pause(guild()).await, Err(PlaybackError::NotConnected));

        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        assert_eq!(player.resume(guild()).await, Err(PlaybackError::AlreadyPlaying));
        player.pause(guild()).await.unwrap();
        assert_eq!(player.pause(guild()).await, Err(PlaybackError::AlreadyPaused));
        player.resume(guild()).await.unwrap();
        assert!(!fake.paused.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn volume_reports_and_validates() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();

        assert_eq!(player.volume(guild(), None, 100).await, Ok(50));
        assert_eq!(
            player.volume(guild(), Some(150), 100).await,
            Err(PlaybackError::VolumeOutOfRange { requested: 150, max: 100 })
        );
        assert_eq!(player.volume(guild(), Some(150), 200).await, Ok(150));
        assert_eq!(player.volume(guild(), None, 100).await, Ok(150));
    }

    #[tokio::test]
    async fn forget_drops_state_after_external_disconnect() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        player.forget(guild()).await.unwrap();
        fake.finish(None).await;

        assert!(player.connection(guild()).is_none());
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
        assert_eq!(fake.played(), vec![media("a")]);
    }

    #[tokio::test]
    async fn stop_succeeds_after_track_already_ended() {
        let fake = Arc::new(FakeConnection::default());
        let player = player_with(&fake, 1);
        player.enqueue(guild(), channel(), media("a")).await.unwrap();
        player.enqueue(guild(), channel(), media("b")).await.unwrap();

        // The failed track is gone, so stopping it reports an error.
        fake.finish(Some("stream closed")).await;
        fake.stop_fails.store(true, Ordering::SeqCst);

        assert_eq!(player.stop(guild()).await, Ok(()));
        assert_eq!(player.current_queue(guild()).await.unwrap(), None);
        assert_eq!(fake.stops.load(Ordering::SeqCst), 1);
    }

    /// Connects only once both callers are inside `connect`.
    struct RacingConnector {
        barrier: tokio::sync::Barrier,
    }

    #[async_trait]
    impl VoiceConnector for RacingConnector {
        async fn connect(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Arc<dyn AudioConnection>, PlaybackError> {
            self.barrier.wait().await;
            Ok(Arc::new(FakeConnection::default()))
        }
    }

    #[tokio::test]
    async fn concurrent_joins_share_one_connection() {
        let connector = RacingConnector {
            barrier: tokio::sync::Barrier::new(2),
        };
        let player = AudioPlayer::new(Arc::new(connector), 50);

        let (first, second) = tokio::join!(
            player.join(guild(), channel()),
            player.join(guild(), channel())
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        let kept = player.connection(guild()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &kept));
    }
}
