//! The `/wow` command group: random wows and local music playback.

pub mod audio_sources;
pub mod utils;

pub(crate) mod pause;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod random;
pub(crate) mod skip;
pub(crate) mod stop;

use poise::serenity_prelude::{ChannelId, GuildId};
use tracing::warn;

use crate::{CommandResult, Context};
use utils::embedded_messages::{error_reply, music_error, reply};
use utils::music_manager::{MusicError, MusicManager, MusicResult};
use utils::playback_session::SessionHandle;

use pause::{pause, unpause};
use play::{play, playskip};
use queue::{clear, np};
use random::random;
use skip::skip;
use stop::stop;

/// Owen Wilson says wow
#[poise::command(
    slash_command,
    subcommands("random", "play", "playskip", "pause", "unpause", "skip", "clear", "stop", "np"),
    subcommand_required,
    category = "Music"
)]
pub async fn wow(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// The caller's guild and the voice channel they are sitting in.
fn voice_target(ctx: Context<'_>) -> MusicResult<(GuildId, ChannelId)> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    let channel_id =
        MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id)?;
    Ok((guild_id, channel_id))
}

/// The live session of the caller's guild.
fn current_session(ctx: Context<'_>) -> MusicResult<SessionHandle> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    ctx.data().music.session(guild_id)
}

/// Sends the outcome of a music operation; failures go only to the caller.
async fn respond(ctx: Context<'_>, result: MusicResult<String>) -> CommandResult {
    let message = match result {
        Ok(content) => reply(content),
        Err(err) => {
            warn!("/wow {} failed: {}", ctx.invoked_command_name(), err);
            error_reply(music_error(&err))
        }
    };
    ctx.send(message).await?;
    Ok(())
}
