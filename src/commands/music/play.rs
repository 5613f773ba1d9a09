use futures::Stream;
use tracing::info;

use super::*;
use crate::commands::music::utils::embedded_messages::queued;

/// Autocomplete results are capped at this by Discord.
const MAX_SUGGESTIONS: usize = 25;

async fn autocomplete_music<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Stream<Item = String> + 'a {
    futures::stream::iter(ctx.data().clips.suggest(partial, MAX_SUGGESTIONS))
}

/// Play a song, alias or album, or resume playback when given nothing
#[poise::command(slash_command)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Song, alias or album name"]
    #[autocomplete = "autocomplete_music"]
    music: Option<String>,
) -> CommandResult {
    let Some(music) = music else {
        return respond(ctx, resume(ctx).await).await;
    };

    info!("Received play command with query: {}", music);
    ctx.defer().await?;
    respond(ctx, queue_music(ctx, &music).await).await
}

/// Play a song, alias or album right now, skipping the current clip
#[poise::command(slash_command)]
pub async fn playskip(
    ctx: Context<'_>,
    #[description = "Song, alias or album name"]
    #[autocomplete = "autocomplete_music"]
    music: String,
) -> CommandResult {
    info!("Received playskip command with query: {}", music);
    ctx.defer().await?;
    respond(ctx, skip_to_music(ctx, &music).await).await
}

pub(super) async fn resume(ctx: Context<'_>) -> MusicResult<String> {
    let name = current_session(ctx)?.resume().await?;
    Ok(format!("Wow! Resumed {}.", name))
}

async fn queue_music(ctx: Context<'_>, music: &str) -> MusicResult<String> {
    let data = ctx.data();
    let resolved = data.clips.resolve(music)?;
    let (guild_id, voice_channel) = voice_target(ctx)?;

    let enqueued = data
        .music
        .enqueue(
            ctx.serenity_context(),
            guild_id,
            voice_channel,
            ctx.channel_id(),
            resolved.items,
        )
        .await?;

    Ok(queued(&resolved.label, &enqueued))
}

async fn skip_to_music(ctx: Context<'_>, music: &str) -> MusicResult<String> {
    let data = ctx.data();
    let resolved = data.clips.resolve(music)?;
    let (guild_id, voice_channel) = voice_target(ctx)?;

    let skipped = data
        .music
        .play_next(
            ctx.serenity_context(),
            guild_id,
            voice_channel,
            ctx.channel_id(),
            resolved.items,
        )
        .await?;

    Ok(match skipped {
        Some(skipped) => format!("Wow! Skipped {}, now playing {}.", skipped, resolved.label),
        None => format!("Wow! Now playing {}.", resolved.label),
    })
}
