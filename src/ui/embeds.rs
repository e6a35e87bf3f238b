use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::track::format_duration;

/// Standard palette for the bot's embeds.
pub mod colors {
    use serenity::all::Colour;

    pub const NOW_PLAYING: Colour = Colour::new(0x1FA852);
    pub const LOCAL: Colour = Colour::BLUE;
    pub const QUEUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
}

/// One page of the queue listing.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    /// 1-based page number as requested.
    pub page: usize,
    pub pages: usize,
    pub total_tracks: usize,
    pub total_length: Duration,
    /// `(position, short_info)` pairs, positions 1-based.
    pub entries: Vec<(usize, String)>,
}

pub fn create_queue_embed(queue: &QueuePage) -> CreateEmbed {
    let listing: String = queue
        .entries
        .iter()
        .map(|(position, info)| format!("`{}.` {}\n", position, info))
        .collect();

    let mut description = format!("**{} tracks:**\n\n{}", queue.total_tracks, listing);
    if !queue.total_length.is_zero() {
        description.push_str(&format!("\nTotal length: {}", format_duration(queue.total_length)));
    }

    CreateEmbed::new()
        .title("Queue")
        .description(description)
        .color(colors::QUEUE)
        .footer(CreateEmbedFooter::new(format!(
            "Viewing page {}/{}",
            queue.page, queue.pages
        )))
}

/// Generic failure notice; details stay in the logs.
pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn queue_embed_lists_positions_and_page() {
        let page = QueuePage {
            page: 2,
            pages: 3,
            total_tracks: 21,
            total_length: Duration::from_secs(3725),
            entries: vec![
                (11, "**Angel** - 6m 19s".to_string()),
                (12, "**Teardrop** - unknown length".to_string()),
            ],
        };

        let embed = serde_json::to_value(create_queue_embed(&page)).unwrap();
        assert_eq!(
            embed["description"],
            "**21 tracks:**\n\n`11.` **Angel** - 6m 19s\n`12.` **Teardrop** - unknown length\n\nTotal length: 1h 2m 5s"
        );
        assert_eq!(embed["footer"]["text"], "Viewing page 2/3");
    }
}
