//! A `PlayableItem` is one queued clip: either a catalog file that is ready as-is,
//! or a remote URL that has to be downloaded into the scratch directory first.
//!
//! Remote downloads run on their own task so they can start as soon as the item
//! is queued and overlap with whatever is playing. The temporary file belongs to
//! the item and is deleted by `cleanup` (or on drop).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};
use url::Url;

use crate::commands::music::audio_sources::ClipFetcher;
use crate::commands::music::audio_sources::track_metadata::{ClipMetadata, SourceKind};

use super::music_manager::{MusicError, MusicResult};

/// A download running on its own task.
pub type PendingDownload = JoinHandle<MusicResult<TempPath>>;

/// Something the audio sink can open and stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAudio {
    pub path: PathBuf,
}

/// What `PlayableItem::begin` hands back.
#[derive(Debug)]
pub enum Readiness {
    Ready(PreparedAudio),
    /// Still downloading; feed the joined result back through `PlayableItem::complete`.
    Pending(PendingDownload),
    Failed(MusicError),
}

#[derive(Debug)]
enum Download {
    NotStarted,
    Running(PendingDownload),
    /// The running download was handed to the caller of `begin`.
    Handed,
    Ready(TempPath),
    Failed(MusicError),
    CleanedUp,
}

enum Source {
    Local(PathBuf),
    Remote {
        url: String,
        fetcher: Arc<dyn ClipFetcher>,
        scratch_dir: PathBuf,
        download: Download,
    },
}

pub struct PlayableItem {
    metadata: ClipMetadata,
    source: Source,
}

impl std::fmt::Debug for PlayableItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("PlayableItem");
        debug.field("display_name", &self.metadata.display_name);
        match &self.source {
            Source::Local(path) => debug.field("path", path),
            Source::Remote { url, download, .. } => {
                debug.field("url", url).field("download", download)
            }
        };
        debug.finish()
    }
}

impl PlayableItem {
    pub fn local(metadata: ClipMetadata, path: impl Into<PathBuf>) -> Self {
        Self {
            metadata,
            source: Source::Local(path.into()),
        }
    }

    pub fn remote(
        metadata: ClipMetadata,
        url: impl Into<String>,
        fetcher: Arc<dyn ClipFetcher>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            metadata,
            source: Source::Remote {
                url: url.into(),
                fetcher,
                scratch_dir: scratch_dir.into(),
                download: Download::NotStarted,
            },
        }
    }

    pub fn metadata(&self) -> &ClipMetadata {
        &self.metadata
    }

    pub fn display_name(&self) -> &str {
        &self.metadata.display_name
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.source {
            Source::Local(_) => SourceKind::Local,
            Source::Remote { .. } => SourceKind::Remote,
        }
    }

    /// Starts fetching a remote clip in the background. Does nothing for local
    /// items or when the download has already been started.
    pub fn prepare(&mut self) {
        if let Source::Remote {
            url,
            fetcher,
            scratch_dir,
            download,
        } = &mut self.source
        {
            if matches!(download, Download::NotStarted) {
                debug!("Starting download of {}", url);
                *download = Download::Running(tokio::spawn(download_clip(
                    url.clone(),
                    Arc::clone(fetcher),
                    scratch_dir.clone(),
                )));
            }
        }
    }

    /// Begins playback preparation, starting the download if needed.
    ///
    /// A running download is handed out as `Readiness::Pending` so the caller can
    /// await it without holding the item.
    pub fn begin(&mut self) -> Readiness {
        self.prepare();

        let download = match &mut self.source {
            Source::Local(path) => return Readiness::Ready(PreparedAudio { path: path.clone() }),
            Source::Remote { download, .. } => download,
        };

        match std::mem::replace(download, Download::Handed) {
            Download::Running(handle) => Readiness::Pending(handle),
            Download::Ready(temp) => {
                let path = temp.to_path_buf();
                *download = Download::Ready(temp);
                Readiness::Ready(PreparedAudio { path })
            }
            Download::Failed(err) => {
                *download = Download::Failed(err.clone());
                Readiness::Failed(err)
            }
            other => {
                *download = other;
                Readiness::Failed(MusicError::PlaybackError(format!(
                    "'{}' is no longer available",
                    self.metadata.display_name
                )))
            }
        }
    }

    /// Stores the outcome of a download handed out by `begin`.
    pub fn complete(&mut self, result: MusicResult<TempPath>) -> MusicResult<PreparedAudio> {
        let Source::Remote { download, .. } = &mut self.source else {
            return self.ready_local();
        };

        if matches!(download, Download::CleanedUp) {
            // Released while the download was in flight; the file goes with `result`.
            return Err(MusicError::PlaybackError(format!(
                "'{}' is no longer available",
                self.metadata.display_name
            )));
        }

        match result {
            Ok(temp) => {
                let path = temp.to_path_buf();
                *download = Download::Ready(temp);
                Ok(PreparedAudio { path })
            }
            Err(err) => {
                *download = Download::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Prepares the item and waits for it to become playable.
    pub async fn ready(&mut self) -> MusicResult<PreparedAudio> {
        match self.begin() {
            Readiness::Ready(audio) => Ok(audio),
            Readiness::Failed(err) => Err(err),
            Readiness::Pending(handle) => {
                let result = joined(handle.await);
                self.complete(result)
            }
        }
    }

    /// Releases the temporary file and aborts an unfinished download. Safe to
    /// call more than once.
    pub fn cleanup(&mut self) {
        let Source::Remote { url, download, .. } = &mut self.source else {
            return;
        };

        match std::mem::replace(download, Download::CleanedUp) {
            Download::Running(handle) => {
                debug!("Aborting download of {}", url);
                handle.abort();
            }
            Download::Ready(temp) => {
                let path = temp.to_path_buf();
                match temp.close() {
                    Ok(()) => debug!("Removed {}", path.display()),
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
            _ => {}
        }
    }

    fn ready_local(&self) -> MusicResult<PreparedAudio> {
        match &self.source {
            Source::Local(path) => Ok(PreparedAudio { path: path.clone() }),
            Source::Remote { .. } => Err(MusicError::PlaybackError(format!(
                "'{}' has not been downloaded",
                self.metadata.display_name
            ))),
        }
    }
}

impl Drop for PlayableItem {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Flattens a joined download task into the download's own result.
pub fn joined(result: Result<MusicResult<TempPath>, JoinError>) -> MusicResult<TempPath> {
    match result {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(MusicError::PlaybackError(
            "download was cancelled".to_string(),
        )),
        Err(e) => Err(MusicError::PlaybackError(format!("download task failed: {}", e))),
    }
}

async fn download_clip(
    url: String,
    fetcher: Arc<dyn ClipFetcher>,
    scratch_dir: PathBuf,
) -> MusicResult<TempPath> {
    tokio::fs::create_dir_all(&scratch_dir)
        .await
        .map_err(|e| MusicError::AudioSourceError(format!("{}: {}", scratch_dir.display(), e)))?;

    let temp = tempfile::Builder::new()
        .prefix("wow-")
        .suffix(&file_suffix(&url))
        .tempfile_in(&scratch_dir)
        .map_err(|e| MusicError::AudioSourceError(format!("{}: {}", scratch_dir.display(), e)))?
        .into_temp_path();

    fetcher.fetch(&url, &temp).await?;
    debug!("Downloaded {} to {}", url, temp.display());

    Ok(temp)
}

fn file_suffix(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            Path::new(url.path())
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
        })
        .unwrap_or_else(|| ".mp3".to_string())
}
