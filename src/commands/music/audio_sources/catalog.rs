//! The local clip catalog: an index over `<root>/<artist>/<album>/<track>` built
//! once at startup and read-only afterwards.
//!
//! Lookup goes album name, then alias, then fuzzy match on track names.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use strsim::sorensen_dice;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// File extensions the voice driver can decode.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

/// A single playable file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    /// File stem, used as display name.
    pub name: String,
    /// Album directory the file lives in, if any.
    pub album: Option<String>,
    pub path: PathBuf,
}

impl CatalogTrack {
    pub fn new(path: impl Into<PathBuf>, album: Option<String>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self { name, album, path }
    }
}

/// How a query was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Album { name: String, tracks: Vec<CatalogTrack> },
    Alias(CatalogTrack),
    Fuzzy { track: CatalogTrack, score: f64 },
}

impl Resolution {
    pub fn into_tracks(self) -> Vec<CatalogTrack> {
        match self {
            Resolution::Album { tracks, .. } => tracks,
            Resolution::Alias(track) | Resolution::Fuzzy { track, .. } => vec![track],
        }
    }
}

/// Lowercases, turns `_` and `-` into spaces and collapses whitespace.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct ClipCatalog {
    // normalized title -> (title as found on disk, tracks)
    albums: HashMap<String, (String, Vec<CatalogTrack>)>,
    album_titles: Vec<String>,
    aliases: HashMap<String, CatalogTrack>,
    // (normalized track name, track)
    search_index: Vec<(String, CatalogTrack)>,
    threshold: f64,
}

impl ClipCatalog {
    /// Builds a catalog from already-known albums and aliases.
    ///
    /// Every album track and alias target becomes a fuzzy-search candidate.
    pub fn from_parts<A, S>(
        albums: impl IntoIterator<Item = (A, Vec<CatalogTrack>)>,
        aliases: impl IntoIterator<Item = (S, CatalogTrack)>,
        threshold: f64,
    ) -> Self
    where
        A: Into<String>,
        S: AsRef<str>,
    {
        let mut catalog = Self {
            threshold,
            ..Default::default()
        };

        for (title, tracks) in albums {
            let title = title.into();
            let key = normalize(&title);
            if catalog.albums.contains_key(&key) {
                debug!("Merging duplicate album directory '{}'", title);
            } else {
                catalog.album_titles.push(title.clone());
            }
            catalog
                .albums
                .entry(key)
                .or_insert_with(|| (title, Vec::new()))
                .1
                .extend(tracks);
        }

        for (alias, track) in aliases {
            catalog.aliases.insert(normalize(alias.as_ref()), track);
        }

        let mut seen = HashSet::new();
        let candidates = catalog
            .albums
            .values()
            .flat_map(|(_, tracks)| tracks)
            .chain(catalog.aliases.values())
            .filter(|track| seen.insert(track.path.clone()))
            .map(|track| (normalize(&track.name), track.clone()))
            .collect::<Vec<_>>();
        catalog.search_index = candidates;
        catalog.search_index.sort_by(|a, b| a.1.path.cmp(&b.1.path));
        catalog.album_titles.sort();

        catalog
    }

    /// Scans `root` and builds the catalog.
    ///
    /// Every track is reachable by its own file stem; `alias_file` (JSON object of
    /// `alias -> path relative to root`) adds or overrides aliases.
    pub fn scan(root: &Path, alias_file: Option<&Path>, threshold: f64) -> MusicResult<Self> {
        if !root.is_dir() {
            return Err(MusicError::CatalogError(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut albums: Vec<(String, Vec<CatalogTrack>)> = Vec::new();
        let mut loose: Vec<CatalogTrack> = Vec::new();
        // Parent directory of the album currently being filled.
        let mut current_album: Option<PathBuf> = None;

        let walker = WalkDir::new(root)
            .follow_links(true)
            .min_depth(1)
            .max_depth(3)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable catalog entry: {}", e);
                    continue;
                }
            };
            if !is_audio_file(&entry) {
                continue;
            }

            // <root>/<artist>/<album>/<track>; anything shallower has no album.
            let Some(album_dir) = entry.path().parent().filter(|_| entry.depth() == 3) else {
                loose.push(CatalogTrack::new(entry.into_path(), None));
                continue;
            };

            let title = album_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if current_album.as_deref() != Some(album_dir) {
                current_album = Some(album_dir.to_path_buf());
                albums.push((title.clone(), Vec::new()));
            }
            if let Some((_, tracks)) = albums.last_mut() {
                tracks.push(CatalogTrack::new(entry.into_path(), Some(title)));
            }
        }

        let mut aliases: Vec<(String, CatalogTrack)> = albums
            .iter()
            .flat_map(|(_, tracks)| tracks.iter())
            .chain(loose.iter())
            .map(|track| (track.name.clone(), track.clone()))
            .collect();

        if let Some(alias_file) = alias_file {
            aliases.extend(load_aliases(root, alias_file, &albums)?);
        }

        let catalog = Self::from_parts(albums, aliases, threshold);
        info!(
            "Indexed {} albums and {} tracks from {}",
            catalog.albums.len(),
            catalog.search_index.len(),
            root.display()
        );

        Ok(catalog)
    }

    /// Resolves a user query. First match wins: album, alias, fuzzy.
    pub fn resolve(&self, query: &str) -> MusicResult<Resolution> {
        let key = normalize(query);
        if key.is_empty() {
            return Err(MusicError::NotFound(query.to_string()));
        }

        if let Some((title, tracks)) = self.albums.get(&key) {
            return Ok(Resolution::Album {
                name: title.clone(),
                tracks: tracks.clone(),
            });
        }

        if let Some(track) = self.aliases.get(&key) {
            return Ok(Resolution::Alias(track.clone()));
        }

        match self.best_match(&key) {
            Some((track, score)) if score >= self.threshold => {
                debug!("Fuzzy matched '{}' to '{}' ({:.2})", query, track.name, score);
                Ok(Resolution::Fuzzy {
                    track: track.clone(),
                    score,
                })
            }
            _ => Err(MusicError::NotFound(query.to_string())),
        }
    }

    fn best_match(&self, key: &str) -> Option<(&CatalogTrack, f64)> {
        self.search_index
            .iter()
            .map(|(name, track)| (track, sorensen_dice(key, name)))
            .fold(None, |best, (track, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((track, score)),
            })
    }

    /// Album and track names containing `partial`, albums first.
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<String> {
        let key = normalize(partial);
        self.album_titles
            .iter()
            .chain(self.search_index.iter().map(|(_, track)| &track.name))
            .filter(|name| normalize(name).contains(&key))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn track_count(&self) -> usize {
        self.search_index.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn is_audio_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && has_audio_extension(entry.path())
}

fn load_aliases(
    root: &Path,
    alias_file: &Path,
    albums: &[(String, Vec<CatalogTrack>)],
) -> MusicResult<Vec<(String, CatalogTrack)>> {
    let content = fs::read_to_string(alias_file)
        .map_err(|e| MusicError::CatalogError(format!("{}: {}", alias_file.display(), e)))?;
    let entries: HashMap<String, PathBuf> = serde_json::from_str(&content)
        .map_err(|e| MusicError::CatalogError(format!("{}: {}", alias_file.display(), e)))?;

    let mut aliases = Vec::with_capacity(entries.len());
    for (alias, relative) in entries {
        let path = root.join(&relative);
        if !path.is_file() || !has_audio_extension(&path) {
            warn!("Alias '{}' points to missing file {}", alias, path.display());
            continue;
        }
        let album = albums
            .iter()
            .find(|(_, tracks)| tracks.iter().any(|track| track.path == path))
            .map(|(title, _)| title.clone());
        aliases.push((alias, CatalogTrack::new(path, album)));
    }

    Ok(aliases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn track(path: &str) -> CatalogTrack {
        CatalogTrack::new(path, None)
    }

    #[fixture]
    fn catalog() -> ClipCatalog {
        ClipCatalog::from_parts(
            [
                ("moods", vec![track("a.mp3"), track("b.mp3")]),
                ("Chill", vec![track("Vivid_Memories.mp3")]),
            ],
            [("bees", track("x.mp3"))],
            0.5,
        )
    }

    #[rstest]
    fn album_returns_every_track_in_order(catalog: ClipCatalog) {
        let tracks = catalog.resolve("moods").unwrap().into_tracks();
        let paths: Vec<_> = tracks.iter().map(|t| t.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3")]);
    }

    #[rstest]
    fn alias_returns_single_track(catalog: ClipCatalog) {
        let resolution = catalog.resolve("bees").unwrap();
        assert_matches!(&resolution, Resolution::Alias(t) if t.path == PathBuf::from("x.mp3"));
    }

    #[rstest]
    #[case("vivid memories")]
    #[case("Vivid Memory")]
    fn fuzzy_match_above_threshold(catalog: ClipCatalog, #[case] query: &str) {
        let resolution = catalog.resolve(query).unwrap();
        assert_matches!(resolution, Resolution::Fuzzy { track, score } => {
            assert_eq!(track.name, "Vivid_Memories");
            assert!(score >= 0.5);
        });
    }

    #[rstest]
    #[case("zzzz")]
    #[case("   ")]
    fn unknown_query_is_not_found(catalog: ClipCatalog, #[case] query: &str) {
        assert_matches!(catalog.resolve(query), Err(MusicError::NotFound(_)));
    }

    #[rstest]
    #[case("MOODS", "moods")]
    #[case("chill", "Chill")]
    fn album_is_named_by_its_directory(
        catalog: ClipCatalog,
        #[case] query: &str,
        #[case] title: &str,
    ) {
        assert_matches!(catalog.resolve(query), Ok(Resolution::Album { name, .. }) if name == title);
    }

    #[test]
    fn album_wins_over_alias_with_same_name() {
        let catalog = ClipCatalog::from_parts(
            [("bees", vec![track("a.mp3"), track("b.mp3")])],
            [("bees", track("x.mp3"))],
            0.5,
        );
        assert_matches!(catalog.resolve("BEES"), Ok(Resolution::Album { tracks, .. }) if tracks.len() == 2);
    }

    #[test]
    fn stricter_threshold_rejects_loose_matches() {
        let catalog = ClipCatalog::from_parts(
            [("chill", vec![track("vivid_memories.mp3")])],
            Vec::<(String, CatalogTrack)>::new(),
            0.95,
        );
        assert_matches!(catalog.resolve("vivid memory"), Err(MusicError::NotFound(_)));
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize("  Vivid_Memories -  Remix "), "vivid memories remix");
    }

    #[rstest]
    fn suggest_lists_albums_before_tracks(catalog: ClipCatalog) {
        assert_eq!(catalog.suggest("m", 10), vec!["moods", "Vivid_Memories"]);
        assert_eq!(catalog.suggest("", 2).len(), 2);
    }

    #[test]
    fn scan_indexes_artist_album_tree() {
        let root = tempfile::tempdir().unwrap();
        let album = root.path().join("owen").join("moods");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("b.mp3"), b"").unwrap();
        fs::write(album.join("a.mp3"), b"").unwrap();
        fs::write(album.join("cover.jpg"), b"").unwrap();
        fs::write(root.path().join("owen").join("loose.ogg"), b"").unwrap();
        fs::write(root.path().join("top.wav"), b"").unwrap();
        let deep = album.join("bonus");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("hidden.mp3"), b"").unwrap();

        let aliases = root.path().join("aliases.json");
        fs::write(
            &aliases,
            r#"{"bees": "owen/moods/b.mp3", "ghost": "owen/missing.mp3"}"#,
        )
        .unwrap();

        let catalog = ClipCatalog::scan(root.path(), Some(&aliases), 0.5).unwrap();

        assert_eq!(catalog.album_count(), 1);
        assert_eq!(catalog.track_count(), 4);

        let names: Vec<_> = catalog
            .resolve("moods")
            .unwrap()
            .into_tracks()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_matches!(catalog.resolve("loose"), Ok(Resolution::Alias(t)) if t.album.is_none());
        assert_matches!(catalog.resolve("top"), Ok(Resolution::Alias(t)) if t.album.is_none());
        assert_matches!(catalog.resolve("hidden"), Err(MusicError::NotFound(_)));
        assert_matches!(
            catalog.resolve("bees"),
            Ok(Resolution::Alias(t)) if t.name == "b" && t.album.as_deref() == Some("moods")
        );
        assert_matches!(catalog.resolve("ghost"), Err(MusicError::NotFound(_)));
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert_matches!(
            ClipCatalog::scan(&missing, None, 0.5),
            Err(MusicError::CatalogError(_))
        );
    }
}
