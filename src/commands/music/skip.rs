use super::*;

/// Skip the current clip
#[poise::command(slash_command)]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    respond(ctx, skip_current(ctx).await).await
}

async fn skip_current(ctx: Context<'_>) -> MusicResult<String> {
    let skipped = current_session(ctx)?
        .skip()
        .await?
        .ok_or(MusicError::NothingPlaying)?;
    Ok(format!("Wow! Skipped {}.", skipped))
}
