//! Defines `ClipMetadata`, the display-side description of anything the bot can
//! queue, whether it came from the local catalog or from the Wow API.

use super::catalog::CatalogTrack;
use super::wow_api::WowClip;

/// Where a clip's audio lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A file inside the local music catalog.
    Local,
    /// A URL that has to be downloaded before it can be streamed.
    Remote,
}

/// Unified representation of a clip for replies and queue listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipMetadata {
    /// The name shown in queue listings and replies.
    pub display_name: String,
    /// Who says the line, for Wow API clips.
    pub speaker: Option<String>,
    /// The movie (or album) the clip belongs to.
    pub source_title: Option<String>,
}

impl ClipMetadata {
    /// Where the clip comes from, e.g. `"Cars" (Lightning McQueen)`.
    pub fn origin(&self) -> Option<String> {
        match (&self.source_title, &self.speaker) {
            (Some(title), Some(speaker)) => Some(format!("\"{}\" ({})", title, speaker)),
            (Some(title), None) => Some(format!("\"{}\"", title)),
            (None, Some(speaker)) => Some(speaker.clone()),
            (None, None) => None,
        }
    }
}

impl Default for ClipMetadata {
    fn default() -> Self {
        Self {
            display_name: "Unknown Clip".to_string(),
            speaker: None,
            source_title: None,
        }
    }
}

impl From<&CatalogTrack> for ClipMetadata {
    fn from(track: &CatalogTrack) -> Self {
        Self {
            display_name: track.name.clone(),
            source_title: track.album.clone(),
            ..Default::default()
        }
    }
}

impl From<&WowClip> for ClipMetadata {
    fn from(clip: &WowClip) -> Self {
        Self {
            display_name: format!("{} ({} at {})", clip.full_line, clip.movie, clip.timestamp),
            speaker: Some(clip.character.clone()),
            source_title: Some(clip.movie.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn origin_names_album_or_movie() {
        let track = CatalogTrack::new("music/owen/Chill/Vivid_Memories.mp3", Some("Chill".into()));
        assert_eq!(ClipMetadata::from(&track).origin().as_deref(), Some("\"Chill\""));

        let loose = CatalogTrack::new("music/owen/loose.mp3", None);
        assert_eq!(ClipMetadata::from(&loose).origin(), None);

        let clip = ClipMetadata {
            display_name: "Wow.".to_string(),
            speaker: Some("Lightning McQueen".to_string()),
            source_title: Some("Cars".to_string()),
        };
        assert_eq!(clip.origin().as_deref(), Some("\"Cars\" (Lightning McQueen)"));
    }
}
