use tracing::{debug, warn};

use super::*;
use crate::commands::music::utils::embedded_messages::{MAX_MESSAGE_LEN, format_clips};

/// Play random wows from the movies of Owen Wilson
#[poise::command(slash_command)]
pub async fn random(
    ctx: Context<'_>,
    #[description = "How many wows (1-91)"] num_wows: Option<i64>,
) -> CommandResult {
    ctx.defer().await?;

    let data = ctx.data();
    let count = data.clips.clamp_wows(num_wows);
    let (clips, items) = match data.clips.random(count).await {
        Ok(fetched) => fetched,
        Err(err) => return respond(ctx, Err(err)).await,
    };

    ctx.send(reply(format_clips(&clips, MAX_MESSAGE_LEN))).await?;

    let (guild_id, voice_channel) = match voice_target(ctx) {
        Ok(target) => target,
        Err(err) => {
            debug!("Not queueing random wows: {}", err);
            return Ok(());
        }
    };

    if let Err(err) = data
        .music
        .enqueue(
            ctx.serenity_context(),
            guild_id,
            voice_channel,
            ctx.channel_id(),
            items,
        )
        .await
    {
        warn!("Failed to queue random wows in guild {}: {}", guild_id, err);
        ctx.send(error_reply(music_error(&err))).await?;
    }

    Ok(())
}
