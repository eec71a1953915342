use std::fmt;

/// Longest TTS text shown in the short display form before truncation.
const SPEECH_PREVIEW_CHARS: usize = 30;

/// Media resolved from a query against the video extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub title: String,
    /// Direct audio stream fed to the voice driver.
    pub source_url: String,
    /// Public page of the video.
    pub url: String,
    /// Whole seconds; live streams report 0.
    pub duration: u64,
    pub thumbnail_url: Option<String>,
    pub channel: String,
}

/// A text-to-speech message and the endpoint URL that synthesises it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechItem {
    text: String,
    source_url: String,
}

impl SpeechItem {
    /// Builds the synthesis URL as `<endpoint>?voice=<voice>&text=<text>`.
    pub fn new(endpoint: &str, voice: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        let source_url = format!(
            "{}?voice={}&text={}",
            endpoint,
            urlencoding::encode(voice),
            urlencoding::encode(&text)
        );

        Self { text, source_url }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Anything the guild queue can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableItem {
    Media(MediaItem),
    Speech(SpeechItem),
}

impl PlayableItem {
    pub fn source_url(&self) -> &str {
        match self {
            Self::Media(media) => &media.source_url,
            Self::Speech(speech) => speech.source_url(),
        }
    }

    /// Name used in logs.
    pub fn title(&self) -> &str {
        match self {
            Self::Media(media) => &media.title,
            Self::Speech(speech) => speech.text(),
        }
    }

    pub fn duration(&self) -> Option<u64> {
        match self {
            Self::Media(media) => Some(media.duration),
            Self::Speech(_) => None,
        }
    }
}

impl From<MediaItem> for PlayableItem {
    fn from(media: MediaItem) -> Self {
        Self::Media(media)
    }
}

impl From<SpeechItem> for PlayableItem {
    fn from(speech: SpeechItem) -> Self {
        Self::Speech(speech)
    }
}

/// Short markdown form used in queue listings and confirmations.
impl fmt::Display for PlayableItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Media(media) => write!(f, "**[{}]({})**", media.title, media.url),
            Self::Speech(speech) => {
                let mut chars = speech.text.chars();
                let preview: String = chars.by_ref().take(SPEECH_PREVIEW_CHARS).collect();
                if chars.next().is_some() {
                    write!(f, "**TTS Message:** {preview}...")
                } else {
                    write!(f, "**TTS Message:** {preview}")
                }
            }
        }
    }
}
