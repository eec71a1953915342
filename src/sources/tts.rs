use crate::audio::SpeechItem;

/// Builds TTS items for a GET speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    endpoint: String,
    voice: String,
}

impl SpeechSynthesizer {
    pub fn new(endpoint: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            voice: voice.into(),
        }
    }

    pub fn build_speech_item(&self, text: &str) -> SpeechItem {
        SpeechItem::new(&self.endpoint, &self.voice, text)
    }
}
