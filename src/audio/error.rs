use thiserror::Error;

/// Errors surfaced by the playback core to the command layer.
///
/// The `Display` text is shown to users as-is, so keep it short.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("{0}")]
    Resolution(String),

    #[error("Invalid number to remove! Pick between 1 and {}", .len.saturating_sub(1))]
    InvalidPosition { position: usize, len: usize },

    #[error("Volume needs to be in range 0-{max}")]
    VolumeOutOfRange { requested: u32, max: u32 },

    #[error("The bot is not connected to a voice channel!")]
    NotConnected,

    #[error("Voice connection error: {0}")]
    Connection(String),

    #[error("There is no queue!")]
    EmptyQueue,

    #[error("Already paused!")]
    AlreadyPaused,

    #[error("Already playing!")]
    AlreadyPlaying,

    #[error("The playback queue is shutting down")]
    ManagerStopped,
}
