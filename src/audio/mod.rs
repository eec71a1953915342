//! # Audio Module
//!
//! Per-guild playback of music and TTS messages.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue State
//! - One ordered queue per guild, playing item at the front
//! - Loop flags, kept apart from the queues
//! - Playback tokens so only the current playback can advance a queue
//!
//! ### [`manager`] - Queue Task
//! - Owns the queue state on a single tokio task
//! - Every mutation, including track-end advances, is posted to it and awaited
//!
//! ### [`player`] - Playback Driver
//! - Keeps one voice connection per guild
//! - Starts items, advances on finish, pause/resume/skip/stop/leave/volume
//!
//! ### [`voice`] - Songbird Adapter
//! - [`connection::AudioConnection`] and [`connection::VoiceConnector`] on top
//!   of songbird calls and track events
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let player = AudioPlayer::new(Arc::new(SongbirdConnector::new(songbird, http)), 50);
//!
//! match player.enqueue(guild_id, channel_id, item).await? {
//!     Enqueued::Started { .. } => { /* now playing */ }
//!     Enqueued::Queued { position } => { /* waiting at #position */ }
//! }
//!
//! player.skip(guild_id).await?;
//! player.leave(guild_id).await?;
//! ```

pub mod connection;
pub mod error;
pub mod item;
pub mod manager;
pub mod player;
pub mod queue;
pub mod voice;

pub use error::PlaybackError;
pub use item::{MediaItem, PlayableItem, SpeechItem};
pub use player::AudioPlayer;
pub use queue::Enqueued;
