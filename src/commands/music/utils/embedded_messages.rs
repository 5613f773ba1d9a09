use poise::CreateReply;

use crate::commands::music::audio_sources::wow_api::WowClip;

use super::music_manager::MusicError;
use super::playback_session::{Enqueued, PlaybackState, QueueSnapshot};

/// Discord rejects messages longer than this many characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// A plain reply everybody in the channel sees
pub fn reply(content: impl Into<String>) -> CreateReply {
    CreateReply::default().content(content).ephemeral(false)
}

/// A reply only the invoking user sees
pub fn error_reply(content: impl Into<String>) -> CreateReply {
    CreateReply::default().content(content).ephemeral(true)
}

/// What the user is told when a music operation fails
pub fn music_error(err: &MusicError) -> String {
    match err {
        MusicError::NotFound(query) => format!("Wow! Couldn't find anything called \"{}\".", query),
        MusicError::UserNotInVoiceChannel => "Wow! Join a voice channel first.".to_string(),
        MusicError::NotConnected | MusicError::SessionClosed => {
            "Wow! I'm not in a voice channel.".to_string()
        }
        MusicError::NetworkError(_) => "Wow! Something went wrong!".to_string(),
        other => format!("Wow! {}", other),
    }
}

/// One clip as a quote block
pub fn format_clip(clip: &WowClip) -> String {
    format!(
        "> {}\n> ~ {} (\"{}\" at {})\n{}",
        clip.full_line, clip.character, clip.movie, clip.timestamp, clip.poster
    )
}

fn more_trailer(count: usize) -> String {
    format!("…and {} more", count)
}

/// Clip quotes, one per block, cut off with a trailer before `limit` characters
pub fn format_clips(clips: &[WowClip], limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for (index, clip) in clips.iter().enumerate() {
        let block = format_clip(clip);
        let separator = usize::from(!out.is_empty());
        let after = clips.len() - index - 1;
        let reserved = if after > 0 {
            more_trailer(after).chars().count() + 1
        } else {
            0
        };

        let len = block.chars().count() + separator;
        if used + len + reserved > limit {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&more_trailer(clips.len() - index));
            return out;
        }

        if separator == 1 {
            out.push('\n');
        }
        out.push_str(&block);
        used += len;
    }

    out
}

/// Confirmation for a successful enqueue
pub fn queued(label: &str, enqueued: &Enqueued) -> String {
    match (enqueued.started, enqueued.count) {
        (true, 1) => format!("Wow! Now playing {}.", label),
        (true, count) => format!("Wow! Now playing {} ({} clips).", label, count),
        (false, 1) => format!("Wow! Queued {} at position {}.", label, enqueued.position + 1),
        (false, count) => format!(
            "Wow! Queued {} ({} clips) from position {}.",
            label,
            count,
            enqueued.position + 1
        ),
    }
}

/// The `np` listing
pub fn queue_listing(snapshot: &QueueSnapshot) -> String {
    if snapshot.entries.is_empty() {
        return "Wow! The queue is empty.".to_string();
    }

    let header = match snapshot.state {
        PlaybackState::Paused => "Paused",
        _ => "Now playing",
    };
    let origin = snapshot
        .current
        .as_ref()
        .and_then(|current| current.origin())
        .map(|origin| format!(" from {}", origin))
        .unwrap_or_default();

    let mut listing = format!("{}{}:\n{}", header, origin, snapshot.entries.join("\n"));
    let hidden = snapshot.total.saturating_sub(snapshot.entries.len());
    if hidden > 0 {
        listing.push('\n');
        listing.push_str(&more_trailer(hidden));
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::audio_sources::track_metadata::ClipMetadata;
    use pretty_assertions::assert_eq;

    fn clip(line: &str) -> WowClip {
        WowClip {
            movie: "Cars".to_string(),
            year: None,
            release_date: None,
            director: None,
            character: "Lightning McQueen".to_string(),
            movie_duration: None,
            timestamp: "00:12:01".to_string(),
            full_line: line.to_string(),
            current_wow_in_movie: None,
            total_wows_in_movie: None,
            poster: "https://img.example/cars.jpg".to_string(),
            video: None,
            audio: "https://clips.example/cars.mp3".to_string(),
        }
    }

    #[test]
    fn clip_renders_as_quote() {
        assert_eq!(
            format_clip(&clip("Wow.")),
            "> Wow.\n> ~ Lightning McQueen (\"Cars\" at 00:12:01)\nhttps://img.example/cars.jpg"
        );
    }

    #[test]
    fn clips_fit_without_trailer() {
        let clips = vec![clip("Wow."), clip("Wow!")];
        let text = format_clips(&clips, MAX_MESSAGE_LEN);
        assert_eq!(text.lines().count(), 6);
        assert!(!text.contains("more"));
    }

    #[test]
    fn long_lists_are_cut_with_trailer() {
        let clips: Vec<WowClip> = (0..91).map(|_| clip("Wow.")).collect();
        let text = format_clips(&clips, MAX_MESSAGE_LEN);

        assert!(text.chars().count() <= MAX_MESSAGE_LEN);
        let shown = text.matches("> Wow.").count();
        assert!(shown > 0 && shown < 91);
        assert!(text.ends_with(&format!("…and {} more", 91 - shown)));
    }

    #[test]
    fn tiny_limit_still_reports_count() {
        let clips = vec![clip("Wow."), clip("Wow.")];
        assert_eq!(format_clips(&clips, 5), "…and 2 more");
    }

    #[test]
    fn queued_messages() {
        let started = Enqueued {
            position: 0,
            count: 1,
            started: true,
        };
        assert_eq!(queued("bees", &started), "Wow! Now playing bees.");

        let pending = Enqueued {
            position: 2,
            count: 4,
            started: false,
        };
        assert_eq!(
            queued("album moods", &pending),
            "Wow! Queued album moods (4 clips) from position 3."
        );
    }

    #[test]
    fn listing_mentions_hidden_entries() {
        let snapshot = QueueSnapshot {
            state: PlaybackState::Playing,
            current: Some(ClipMetadata {
                display_name: "a".to_string(),
                ..Default::default()
            }),
            entries: vec!["1. a".to_string(), "2. b".to_string()],
            total: 5,
        };
        assert_eq!(queue_listing(&snapshot), "Now playing:\n1. a\n2. b\n…and 3 more");

        let empty = QueueSnapshot {
            state: PlaybackState::DisconnectArmed,
            current: None,
            entries: Vec::new(),
            total: 0,
        };
        assert_eq!(queue_listing(&empty), "Wow! The queue is empty.");
    }

    #[test]
    fn listing_names_where_current_clip_is_from() {
        let snapshot = QueueSnapshot {
            state: PlaybackState::Paused,
            current: Some(ClipMetadata {
                display_name: "Wow. (Cars at 00:12:01)".to_string(),
                speaker: Some("Lightning McQueen".to_string()),
                source_title: Some("Cars".to_string()),
            }),
            entries: vec!["1. Wow. (Cars at 00:12:01)".to_string()],
            total: 1,
        };
        assert_eq!(
            queue_listing(&snapshot),
            "Paused from \"Cars\" (Lightning McQueen):\n1. Wow. (Cars at 00:12:01)"
        );
    }
}
