use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use songbird::SerenityInit;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wowbot::config::BotConfig;
use wowbot::registration::{self, Action, RegistrationError};
use wowbot::{Data, Error, command_table, on_error};

/// Owen Wilson says wow in your voice channel
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Install a guild command by name and exit (repeatable)
    #[arg(long, value_name = "NAME")]
    install: Vec<String>,

    /// Update a guild command by name and exit (repeatable)
    #[arg(long, value_name = "NAME")]
    update: Vec<String>,

    /// Delete a guild command by name and exit (repeatable)
    #[arg(long, value_name = "NAME")]
    delete: Vec<String>,
}

impl Cli {
    fn actions(&self) -> Vec<(Action, &str)> {
        let mut actions = Vec::new();
        for (action, names) in [
            (Action::Install, &self.install),
            (Action::Update, &self.update),
            (Action::Delete, &self.delete),
        ] {
            actions.extend(names.iter().map(|name| (action, name.as_str())));
        }
        actions
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wowbot=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let cli = Cli::parse();
    let config = BotConfig::from_env()?;

    let actions = cli.actions();
    if !actions.is_empty() {
        return manage_commands(&config, &actions).await;
    }

    let token = config.discord_token.clone();
    let guild_id = config.guild_id;
    let data = Data::new(config)?;

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: command_table(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                match guild_id {
                    Some(guild_id) => {
                        let installed = registration::install_missing(
                            &ctx.http,
                            guild_id,
                            &framework.options().commands,
                        )
                        .await?;
                        info!("Installed {} commands in guild {}", installed, guild_id);
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                    }
                }
                Ok(data)
            })
        });

    let mut client = ClientBuilder::new(token, intents)
        .framework(framework.build())
        .register_songbird()
        .await?;

    client.start().await.map_err(Into::into)
}

/// Runs the `--install/--update/--delete` reconciliations against `GUILD_ID`.
async fn manage_commands(config: &BotConfig, actions: &[(Action, &str)]) -> Result<(), Error> {
    let guild_id = config.guild_id.ok_or(RegistrationError::MissingGuild)?;
    let http = registration::http_client(&config.discord_token, config.application_id).await?;
    let table = command_table();

    for (action, name) in actions {
        registration::apply(&http, guild_id, *action, name, &table).await?;
    }

    Ok(())
}
