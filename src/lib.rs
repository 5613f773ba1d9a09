//! wowbot: a Discord bot that plays Owen Wilson saying "wow", and local music.

use std::sync::Arc;

use tracing::{error, info, warn};

pub mod commands;
pub mod config;
pub mod registration;

use commands::general::test::*;
use commands::music::audio_sources::catalog::ClipCatalog;
use commands::music::audio_sources::wow_api::WowApi;
use commands::music::audio_sources::{ClipSource, HttpClipFetcher};
use commands::music::utils::embedded_messages::error_reply;
use commands::music::utils::music_manager::{MusicManager, MusicResult};
use commands::music::wow;
use config::BotConfig;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub clips: ClipSource,
    pub music: MusicManager,
    pub config: BotConfig,
}

impl Data {
    /// Scans the music catalog and wires up the remote clip clients.
    pub fn new(config: BotConfig) -> MusicResult<Self> {
        let catalog = if config.music_dir.is_dir() {
            ClipCatalog::scan(
                &config.music_dir,
                config.alias_file.as_deref(),
                config.fuzzy_threshold,
            )?
        } else {
            warn!(
                "Music directory {} not found, only random wows are available",
                config.music_dir.display()
            );
            ClipCatalog::default()
        };
        info!(
            "Catalog ready: {} albums, {} tracks",
            catalog.album_count(),
            catalog.track_count()
        );

        let client = reqwest::Client::new();
        let wow_api = WowApi::new(client.clone(), &config.wow_api_url)?;
        let clips = ClipSource::new(
            catalog,
            wow_api,
            Arc::new(HttpClipFetcher::new(client)),
            config.scratch_dir.clone(),
            config.max_wows,
        );

        Ok(Self {
            clips,
            music: MusicManager::new(config.session_settings()),
            config,
        })
    }
}

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Every command the bot knows, in registration order.
pub fn command_table() -> Vec<poise::Command<Data, Error>> {
    vec![
        // Default commands
        register(),
        help(),
        // General commands
        test(),
        // Wow commands
        wow(),
    ]
}

/// Logs errors that escape a command and tells the user something broke.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(
                "Command /{} failed: {}",
                ctx.command().qualified_name,
                error
            );
            if let Err(e) = ctx.send(error_reply("Wow! Something went wrong!")).await {
                error!("Failed to send error reply: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}
