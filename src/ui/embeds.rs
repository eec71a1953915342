use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};

use crate::audio::PlayableItem;

/// Standard palette for the bot's embeds.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Discord rejects embed descriptions longer than this.
const MAX_DESCRIPTION: usize = 4096;

pub fn success(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(message)
        .color(colors::SUCCESS_GREEN)
}

pub fn error(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(format!("❌ {message}"))
        .color(colors::ERROR_RED)
}

/// Embed for an item that just started ("Now playing:") or was queued
/// ("Added to queue:").
pub fn item(item: &PlayableItem, heading: &str, icon_url: Option<String>) -> CreateEmbed {
    let mut author = CreateEmbedAuthor::new(heading);
    if let Some(icon_url) = icon_url {
        author = author.icon_url(icon_url);
    }

    let embed = match item {
        PlayableItem::Media(media) => {
            let mut embed = CreateEmbed::default()
                .title(&media.title)
                .url(&media.url)
                .field("Channel", &media.channel, true)
                .field("Duration", format_duration(media.duration), true);
            if let Some(thumbnail) = &media.thumbnail_url {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
        PlayableItem::Speech(speech) => CreateEmbed::default()
            .title("TTS Message:")
            .description(speech_description(speech.text())),
    };

    embed.author(author).color(colors::MUSIC_PURPLE)
}

pub fn queue(items: &[PlayableItem], looping: bool) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("Queue")
        .description(queue_description(items))
        .color(colors::MUSIC_PURPLE);

    if looping {
        embed = embed.footer(CreateEmbedFooter::new("🔁 Loop enabled"));
    }

    embed
}

/// Playing item first, then the pending ones numbered from 1.
pub fn queue_description(items: &[PlayableItem]) -> String {
    let Some((current, pending)) = items.split_first() else {
        return String::new();
    };

    let mut description = format!("Currently playing: {current}\n\n");

    for (i, item) in pending.iter().enumerate() {
        let line = match item.duration() {
            Some(duration) => format!("`{}.` {} | {}\n", i + 1, item, format_duration(duration)),
            None => format!("`{}.` {}\n", i + 1, item),
        };

        let remaining = pending.len() - i;
        let more = format!("...and {remaining} more");
        if description.len() + line.len() + more.len() > MAX_DESCRIPTION {
            description.push_str(&more);
            break;
        }
        description.push_str(&line);
    }

    description
}

/// Speech text cut to fit an embed description.
pub fn speech_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION {
        return text.to_string();
    }

    let mut description: String = text.chars().take(MAX_DESCRIPTION - 3).collect();
    description.push_str("...");
    description
}

/// `m:ss` below an hour, `h:mm:ss` otherwise.
pub fn format_duration(seconds: u64) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
