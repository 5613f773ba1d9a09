//! Where clips come from: the local catalog and the remote wow API.
//!
//! `ClipSource` turns a user query (or a random-count request) into
//! `PlayableItem`s. Remote audio is fetched through the `ClipFetcher` seam so the
//! download path can be swapped out in tests.

/// Submodule indexing local music into albums, aliases and a fuzzy-search list.
pub mod catalog;
/// Submodule defining the `ClipMetadata` struct used across audio sources.
pub mod track_metadata;
/// Submodule with the HTTP client for the random-wow API.
pub mod wow_api;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::commands::music::utils::playable::PlayableItem;
use catalog::{ClipCatalog, Resolution};
use track_metadata::ClipMetadata;
use wow_api::{WowApi, WowClip};

/// Downloads a remote clip into a file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipFetcher: Send + Sync {
    /// Writes the body behind `url` to `destination`, replacing its contents.
    async fn fetch(&self, url: &str, destination: &Path) -> MusicResult<()>;
}

/// `ClipFetcher` over plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpClipFetcher {
    client: Client,
}

impl HttpClipFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClipFetcher for HttpClipFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> MusicResult<()> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let io_error =
            |e: std::io::Error| MusicError::AudioSourceError(format!("{}: {}", destination.display(), e));
        let mut file = tokio::fs::File::create(destination).await.map_err(io_error)?;

        let mut written = 0usize;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len();
            file.write_all(&chunk).await.map_err(io_error)?;
        }
        file.flush().await.map_err(io_error)?;

        debug!("Fetched {} bytes from {}", written, url);
        Ok(())
    }
}

/// Clips resolved from a user query.
#[derive(Debug)]
pub struct ResolvedClips {
    /// What matched, for the reply ("album moods", "bees").
    pub label: String,
    pub items: Vec<PlayableItem>,
}

/// Resolves queries against the catalog and pulls random clips from the wow API.
pub struct ClipSource {
    catalog: ClipCatalog,
    wow_api: WowApi,
    fetcher: Arc<dyn ClipFetcher>,
    scratch_dir: PathBuf,
    max_wows: usize,
}

impl ClipSource {
    pub fn new(
        catalog: ClipCatalog,
        wow_api: WowApi,
        fetcher: Arc<dyn ClipFetcher>,
        scratch_dir: impl Into<PathBuf>,
        max_wows: usize,
    ) -> Self {
        Self {
            catalog,
            wow_api,
            fetcher,
            scratch_dir: scratch_dir.into(),
            max_wows: max_wows.max(1),
        }
    }

    /// Clamps a requested wow count to `[1, max_wows]`; no count means one.
    pub fn clamp_wows(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX).min(self.max_wows),
            _ => 1,
        }
    }

    /// Resolves a song, alias or album name into local items.
    pub fn resolve(&self, query: &str) -> MusicResult<ResolvedClips> {
        let resolution = self.catalog.resolve(query)?;
        let label = match &resolution {
            Resolution::Album { name, .. } => format!("album {}", name),
            Resolution::Alias(track) | Resolution::Fuzzy { track, .. } => track.name.clone(),
        };

        let items = resolution
            .into_tracks()
            .iter()
            .map(|track| PlayableItem::local(ClipMetadata::from(track), track.path.clone()))
            .collect();

        Ok(ResolvedClips { label, items })
    }

    /// Fetches `count` random wows (clamped) and wraps their audio as remote
    /// items, in the order the API returned them. The clips handed back for
    /// display are exactly the ones queued.
    pub async fn random(&self, count: usize) -> MusicResult<(Vec<WowClip>, Vec<PlayableItem>)> {
        let count = count.clamp(1, self.max_wows);
        let mut clips = self.wow_api.random(count).await?;
        if clips.is_empty() {
            return Err(MusicError::NotFound("random wow".to_string()));
        }
        if clips.len() > count {
            debug!("Wow API returned {} clips for {}, dropping the rest", clips.len(), count);
            clips.truncate(count);
        }
        info!("Fetched {} random wows", clips.len());

        let items = clips
            .iter()
            .map(|clip| {
                PlayableItem::remote(
                    ClipMetadata::from(clip),
                    clip.audio.clone(),
                    Arc::clone(&self.fetcher),
                    self.scratch_dir.clone(),
                )
            })
            .collect();

        Ok((clips, items))
    }

    /// Autocomplete candidates for the `music` option.
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<String> {
        self.catalog.suggest(partial, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::audio_sources::catalog::CatalogTrack;
    use crate::commands::music::audio_sources::track_metadata::SourceKind;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn source() -> ClipSource {
        let catalog = ClipCatalog::from_parts(
            [(
                "Moods",
                vec![
                    CatalogTrack::new("music/owen/Moods/a.mp3", Some("Moods".to_string())),
                    CatalogTrack::new("music/owen/Moods/b.mp3", Some("Moods".to_string())),
                ],
            )],
            [("bees", CatalogTrack::new("music/owen/x.mp3", None))],
            0.5,
        );
        let wow_api = WowApi::new(Client::new(), "http://127.0.0.1:9/").unwrap();
        ClipSource::new(catalog, wow_api, Arc::new(MockClipFetcher::new()), "/tmp/wowbot", 91)
    }

    #[rstest]
    #[case(None, 1)]
    #[case(Some(0), 1)]
    #[case(Some(-4), 1)]
    #[case(Some(5), 5)]
    #[case(Some(91), 91)]
    #[case(Some(500), 91)]
    fn wow_count_is_clamped(#[case] requested: Option<i64>, #[case] expected: usize) {
        assert_eq!(source().clamp_wows(requested), expected);
    }

    #[test]
    fn album_resolves_to_local_items_in_order() {
        let resolved = source().resolve("moods").unwrap();
        assert_eq!(resolved.label, "album Moods");
        let names: Vec<&str> = resolved.items.iter().map(|item| item.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(resolved
            .items
            .iter()
            .all(|item| item.source_kind() == SourceKind::Local));
    }

    #[test]
    fn alias_resolves_to_single_item() {
        let resolved = source().resolve("bees").unwrap();
        assert_eq!(resolved.label, "x");
        assert_eq!(resolved.items.len(), 1);
    }

    #[test]
    fn unknown_query_is_not_found() {
        assert_matches!(source().resolve("zzzzzz"), Err(MusicError::NotFound(_)));
    }
}
