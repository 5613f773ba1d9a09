//! Runtime configuration, read from the environment (and `.env` via dotenv).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use poise::serenity_prelude::{ApplicationId, GuildId};
use thiserror::Error;
use url::Url;

use crate::commands::music::audio_sources::wow_api::DEFAULT_WOW_API_URL;
use crate::commands::music::utils::playback_session::SessionSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Guild that receives command installs; global registration without it.
    pub guild_id: Option<GuildId>,
    pub application_id: Option<ApplicationId>,

    pub music_dir: PathBuf,
    /// JSON object of `alias -> path relative to music_dir`.
    pub alias_file: Option<PathBuf>,
    /// Where remote clips are downloaded to.
    pub scratch_dir: PathBuf,
    pub wow_api_url: String,
    pub max_wows: usize,
    pub fuzzy_threshold: f64,

    pub idle_timeout: Duration,
    pub prefetch: usize,
    pub queue_display_limit: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset.
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let guild_id = parse_opt::<u64>(&var, "GUILD_ID")?
            .map(|id| non_zero("GUILD_ID", id).map(GuildId::new))
            .transpose()?;
        let application_id = parse_opt::<u64>(&var, "APP_ID")?
            .map(|id| non_zero("APP_ID", id).map(ApplicationId::new))
            .transpose()?;

        let idle_timeout = match var("IDLE_TIMEOUT") {
            Some(value) => humantime::parse_duration(&value).map_err(|e| ConfigError::Invalid {
                name: "IDLE_TIMEOUT",
                value,
                reason: e.to_string(),
            })?,
            None => Duration::from_secs(120),
        };

        let fuzzy_threshold = parse_opt::<f64>(&var, "FUZZY_THRESHOLD")?.unwrap_or(0.5);
        if !(0.0..=1.0).contains(&fuzzy_threshold) {
            return Err(ConfigError::Invalid {
                name: "FUZZY_THRESHOLD",
                value: fuzzy_threshold.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        let wow_api_url = var("WOW_API_URL").unwrap_or_else(|| DEFAULT_WOW_API_URL.to_string());
        match Url::parse(&wow_api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    name: "WOW_API_URL",
                    reason: format!("unsupported scheme {}", url.scheme()),
                    value: wow_api_url,
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid {
                    name: "WOW_API_URL",
                    value: wow_api_url,
                    reason: e.to_string(),
                });
            }
        }

        Ok(Self {
            discord_token,
            guild_id,
            application_id,
            music_dir: var("MUSIC_DIR").unwrap_or_else(|| "music".to_string()).into(),
            alias_file: var("WOW_ALIASES").map(PathBuf::from),
            scratch_dir: var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("wowbot")),
            wow_api_url,
            max_wows: positive(&var, "MAX_WOWS", 91)?,
            fuzzy_threshold,
            idle_timeout,
            prefetch: positive(&var, "PREFETCH", 3)?,
            queue_display_limit: positive(&var, "QUEUE_DISPLAY_LIMIT", 10)?,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.idle_timeout,
            prefetch: self.prefetch,
        }
    }
}

fn parse_opt<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn positive(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_opt::<usize>(var, name)?.unwrap_or(default);
    non_zero(name, value as u64).map(|_| value)
}

fn non_zero(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}
