use anyhow::Result;
use std::time::Duration;

const DEFAULT_TTS_ENDPOINT: &str = "https://api.streamelements.com/kappa/v2/speech";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Development guild for instant command updates
    pub owner_id: Option<u64>,

    // Audio
    pub default_volume: u8,
    pub max_volume: u32,
    pub owner_max_volume: u32,
    pub auto_leave: bool,

    // Sources
    pub tts_endpoint: String,
    pub tts_voice: String,
    pub ytdlp_path: String,
    pub resolve_timeout: Duration,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().parse()?),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            owner_id: std::env::var("OWNER_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: var_or("DEFAULT_VOLUME", 50)?,
            max_volume: var_or("MAX_VOLUME", 100)?,
            owner_max_volume: var_or("OWNER_MAX_VOLUME", 200)?,
            auto_leave: var_or("AUTO_LEAVE", true)?,

            tts_endpoint: var_or("TTS_ENDPOINT", DEFAULT_TTS_ENDPOINT.to_string())?,
            tts_voice: var_or("TTS_VOICE", "Brian".to_string())?,
            ytdlp_path: var_or("YTDLP_PATH", "yt-dlp".to_string())?,
            resolve_timeout: Duration::from_secs(var_or("RESOLVE_TIMEOUT", 30)?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks on values that would otherwise fail at playback time.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if u32::from(self.default_volume) > self.max_volume {
            anyhow::bail!(
                "Default volume {}% exceeds the maximum of {}%",
                self.default_volume,
                self.max_volume
            );
        }

        if self.owner_max_volume < self.max_volume {
            anyhow::bail!(
                "Owner volume limit {}% is below the regular limit {}%",
                self.owner_max_volume,
                self.max_volume
            );
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if !self.tts_endpoint.starts_with("http://") && !self.tts_endpoint.starts_with("https://") {
            anyhow::bail!("TTS endpoint must be an http(s) URL, got: {}", self.tts_endpoint);
        }

        Ok(())
    }

    /// Volume ceiling for `user_id`; the owner gets a higher one.
    pub fn volume_limit(&self, user_id: u64) -> u32 {
        if self.owner_id == Some(user_id) {
            self.owner_max_volume
        } else {
            self.max_volume
        }
    }

    /// Configuration summary without secrets, for startup logs.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {} (owner: {})\n  \
            Audio: {}% default, {}% max, auto-leave={}\n  \
            Sources: yt-dlp at {} ({}s timeout), TTS voice {}",
            self.guild_id.map_or("global".to_string(), |id| format!("in guild {id}")),
            self.owner_id.map_or("none".to_string(), |id| id.to_string()),
            self.default_volume,
            self.max_volume,
            self.auto_leave,
            self.ytdlp_path,
            self.resolve_timeout.as_secs(),
            self.tts_voice,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            owner_id: None,

            default_volume: 50,
            max_volume: 100,
            owner_max_volume: 200,
            auto_leave: true,

            tts_endpoint: DEFAULT_TTS_ENDPOINT.to_string(),
            tts_voice: "Brian".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout: Duration::from_secs(30),
        }
    }
}
