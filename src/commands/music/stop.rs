use tracing::info;

use super::*;

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command)]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    respond(ctx, stop_session(ctx).await).await
}

async fn stop_session(ctx: Context<'_>) -> MusicResult<String> {
    let session = current_session(ctx)?;
    let dropped = session.stop().await?;
    info!(
        "Stopped session in guild {} ({} items dropped)",
        session.guild_id(),
        dropped
    );
    Ok("Wow! Stopped and left the channel.".to_string())
}
