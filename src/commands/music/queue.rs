use super::*;
use crate::commands::music::utils::embedded_messages::queue_listing;

/// Remove everything queued behind the current clip
#[poise::command(slash_command)]
pub async fn clear(ctx: Context<'_>) -> CommandResult {
    respond(ctx, clear_pending(ctx).await).await
}

/// Show what's playing and what's next
#[poise::command(slash_command)]
pub async fn np(ctx: Context<'_>) -> CommandResult {
    respond(ctx, now_playing(ctx).await).await
}

async fn clear_pending(ctx: Context<'_>) -> MusicResult<String> {
    let removed = current_session(ctx)?.clear().await?;
    Ok(match removed {
        0 => "Wow! Nothing was queued.".to_string(),
        1 => "Wow! Cleared 1 queued clip.".to_string(),
        n => format!("Wow! Cleared {} queued clips.", n),
    })
}

async fn now_playing(ctx: Context<'_>) -> MusicResult<String> {
    let limit = ctx.data().config.queue_display_limit;
    let snapshot = current_session(ctx)?.snapshot(limit).await?;
    Ok(queue_listing(&snapshot))
}
