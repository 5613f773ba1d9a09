use super::*;

/// Pause the current clip
#[poise::command(slash_command)]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let result = match current_session(ctx) {
        Ok(session) => session.pause().await,
        Err(err) => Err(err),
    };
    respond(ctx, result.map(|name| format!("Wow! Paused {}.", name))).await
}

/// Resume the paused clip
#[poise::command(slash_command)]
pub async fn unpause(ctx: Context<'_>) -> CommandResult {
    respond(ctx, super::play::resume(ctx).await).await
}
