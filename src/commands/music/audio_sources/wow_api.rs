//! Client for the Owen Wilson "wow" API, which serves random movie clips.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// Where the public API lives.
pub const DEFAULT_WOW_API_URL: &str = "https://owen-wilson-wow-api.onrender.com/";

/// Links to the video versions of a clip, keyed by quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WowVideo {
    #[serde(rename = "1080p", default)]
    pub full_hd: Option<String>,
    #[serde(rename = "720p", default)]
    pub hd: Option<String>,
    #[serde(rename = "480p", default)]
    pub sd: Option<String>,
    #[serde(rename = "360p", default)]
    pub low: Option<String>,
}

/// One "wow" as returned by `GET /wows/random`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WowClip {
    /// Title of the movie the clip is from.
    pub movie: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    /// Who says the line.
    pub character: String,
    #[serde(default)]
    pub movie_duration: Option<String>,
    /// Position of the wow in the movie, e.g. `00:56:25`.
    pub timestamp: String,
    /// The full quoted line.
    pub full_line: String,
    #[serde(default)]
    pub current_wow_in_movie: Option<u32>,
    #[serde(default)]
    pub total_wows_in_movie: Option<u32>,
    /// Movie poster image URL.
    pub poster: String,
    #[serde(default)]
    pub video: Option<WowVideo>,
    /// MP3 of the clip.
    pub audio: String,
}

/// Thin client over one base URL and a shared HTTP client.
#[derive(Debug, Clone)]
pub struct WowApi {
    client: Client,
    base_url: Url,
}

impl WowApi {
    pub fn new(client: Client, base_url: &str) -> MusicResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| MusicError::NetworkError(format!("invalid wow API URL: {}", e)))?;
        // `join` replaces the last path segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// Fetches `results` random wows. The caller clamps `results`.
    pub async fn random(&self, results: usize) -> MusicResult<Vec<WowClip>> {
        let url = self
            .base_url
            .join("wows/random")
            .map_err(|e| MusicError::NetworkError(e.to_string()))?;
        debug!("Requesting {} random wows from {}", results, url);

        let response = self
            .client
            .get(url)
            .query(&[("results", results)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Wow API returned {}", status);
            return Err(MusicError::NetworkError(format!(
                "wow API returned {}",
                status
            )));
        }

        let clips: Vec<WowClip> = response.json().await?;
        debug!("Wow API returned {} clips", clips.len());
        Ok(clips)
    }
}
