use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::tracks::PlayMode;
use tracing::{info, warn};

use super::playback_session::FinishSignal;

/// Event handler for when a clip ends, cleanly or not
pub struct TrackEndNotifier {
    pub guild_id: GuildId,
    pub finished: FinishSignal,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(tracks) = ctx {
            let failure = tracks.iter().find_map(|(state, _handle)| match &state.playing {
                PlayMode::Errored(e) => Some(e.to_string()),
                _ => None,
            });

            match failure {
                Some(reason) => {
                    warn!("Track failed in guild {}: {}", self.guild_id, reason);
                    self.finished.failed(reason);
                }
                None => {
                    info!("Track ended for guild {}", self.guild_id);
                    self.finished.finished();
                }
            }
        }
        None
    }
}
