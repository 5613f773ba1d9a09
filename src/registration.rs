//! Reconciles guild slash-command definitions with the bot's command table.
//!
//! Deciding what to do (`plan`) is kept apart from doing it (`apply`) so the
//! decision can be checked without talking to Discord.

use serenity::all::{ApplicationId, CommandId, CreateCommand, GuildId, Http, HttpBuilder};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("No command named {0:?} in the command table")]
    UnknownCommand(String),

    #[error("{0:?} is not a slash command")]
    NotSlashCommand(String),

    #[error("GUILD_ID must be set to manage guild commands")]
    MissingGuild,

    #[error("Discord API error: {0}")]
    Http(#[from] serenity::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create the command unless it is already installed.
    Install,
    /// Overwrite the installed definition, installing it if absent.
    Update,
    /// Remove the command if it is installed.
    Delete,
}

/// What `apply` will send to Discord.
#[derive(Debug)]
pub enum Step {
    Create(CreateCommand),
    Edit(CommandId, CreateCommand),
    Delete(CommandId),
    Unchanged,
}

/// Decides how to bring command `name` in line with `table`, given the
/// `(name, id)` pairs already installed in the guild.
pub fn plan<U, E>(
    action: Action,
    name: &str,
    table: &[poise::Command<U, E>],
    installed: &[(String, CommandId)],
) -> Result<Step, RegistrationError> {
    let installed_id = installed
        .iter()
        .find(|(installed_name, _)| installed_name == name)
        .map(|(_, id)| *id);

    if action == Action::Delete {
        return Ok(installed_id.map_or(Step::Unchanged, Step::Delete));
    }

    let definition = definition(name, table)?;
    Ok(match (action, installed_id) {
        (Action::Install, Some(_)) => Step::Unchanged,
        (Action::Update, Some(id)) => Step::Edit(id, definition),
        _ => Step::Create(definition),
    })
}

fn definition<U, E>(
    name: &str,
    table: &[poise::Command<U, E>],
) -> Result<CreateCommand, RegistrationError> {
    let command = table
        .iter()
        .find(|command| command.name == name)
        .ok_or_else(|| RegistrationError::UnknownCommand(name.to_string()))?;

    command
        .create_as_slash_command()
        .ok_or_else(|| RegistrationError::NotSlashCommand(name.to_string()))
}

async fn installed(
    http: &Http,
    guild_id: GuildId,
) -> Result<Vec<(String, CommandId)>, RegistrationError> {
    Ok(guild_id
        .get_commands(http)
        .await?
        .into_iter()
        .map(|command| (command.name, command.id))
        .collect())
}

/// Runs one reconciliation against the guild.
pub async fn apply<U, E>(
    http: &Http,
    guild_id: GuildId,
    action: Action,
    name: &str,
    table: &[poise::Command<U, E>],
) -> Result<(), RegistrationError> {
    let installed = installed(http, guild_id).await?;

    match plan(action, name, table, &installed)? {
        Step::Create(definition) => {
            guild_id.create_command(http, definition).await?;
            info!("Installed /{} in guild {}", name, guild_id);
        }
        Step::Edit(id, definition) => {
            guild_id.edit_command(http, id, definition).await?;
            info!("Updated /{} in guild {}", name, guild_id);
        }
        Step::Delete(id) => {
            guild_id.delete_command(http, id).await?;
            info!("Deleted /{} from guild {}", name, guild_id);
        }
        Step::Unchanged => debug!("/{} needs no change in guild {}", name, guild_id),
    }

    Ok(())
}

/// Installs every slash command from `table` the guild doesn't have yet.
/// Returns how many were installed.
pub async fn install_missing<U, E>(
    http: &Http,
    guild_id: GuildId,
    table: &[poise::Command<U, E>],
) -> Result<usize, RegistrationError> {
    let installed = installed(http, guild_id).await?;
    let mut created = 0;

    for command in table {
        let Some(definition) = command.create_as_slash_command() else {
            continue;
        };
        if installed.iter().any(|(name, _)| *name == command.name) {
            continue;
        }
        guild_id.create_command(http, definition).await?;
        info!("Installed /{} in guild {}", command.name, guild_id);
        created += 1;
    }

    Ok(created)
}

/// HTTP client for command management outside of a gateway session.
pub async fn http_client(
    token: &str,
    application_id: Option<ApplicationId>,
) -> Result<Http, RegistrationError> {
    let http = HttpBuilder::new(token).build();
    let application_id = match application_id {
        Some(id) => id,
        None => http.get_current_application_info().await?.id,
    };
    http.set_application_id(application_id);
    Ok(http)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_table as commands;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn installed_wow() -> Vec<(String, CommandId)> {
        vec![("wow".to_string(), CommandId::new(42))]
    }

    #[rstest]
    #[case(Action::Install)]
    #[case(Action::Update)]
    fn absent_commands_are_created(#[case] action: Action) {
        let step = plan(action, "wow", &commands(), &[]).unwrap();
        assert_matches!(step, Step::Create(_));
    }

    #[test]
    fn install_leaves_existing_command_alone() {
        let step = plan(Action::Install, "wow", &commands(), &installed_wow()).unwrap();
        assert_matches!(step, Step::Unchanged);
    }

    #[test]
    fn update_edits_existing_command() {
        let step = plan(Action::Update, "wow", &commands(), &installed_wow()).unwrap();
        assert_matches!(step, Step::Edit(id, _) if id == CommandId::new(42));
    }

    #[test]
    fn delete_is_noop_when_absent() {
        assert_matches!(
            plan(Action::Delete, "wow", &commands(), &[]).unwrap(),
            Step::Unchanged
        );
        assert_matches!(
            plan(Action::Delete, "wow", &commands(), &installed_wow()).unwrap(),
            Step::Delete(id) if id == CommandId::new(42)
        );
    }

    #[test]
    fn unknown_and_prefix_only_commands_are_rejected() {
        assert_matches!(
            plan(Action::Install, "wowmix", &commands(), &[]),
            Err(RegistrationError::UnknownCommand(name)) if name == "wowmix"
        );
        assert_matches!(
            plan(Action::Update, "register", &commands(), &[]),
            Err(RegistrationError::NotSlashCommand(name)) if name == "register"
        );
    }
}
