//! Producers that turn user input into playable items.

pub mod tts;
pub mod youtube;

pub use tts::SpeechSynthesizer;
pub use youtube::{ResolveError, YtDlpResolver};
