//! Songbird and serenity implementations of the session's sink and announcer.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};
use songbird::error::ControlError;
use songbird::input::{File, Input};
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::event_handlers::TrackEndNotifier;
use super::music_manager::{MusicError, MusicResult};
use super::playable::PreparedAudio;
use super::playback_session::{Announcer, AudioSink, FinishSignal};

/// Streams prepared clips into a joined voice call.
pub struct SongbirdSink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>, call: Arc<Mutex<Call>>) -> Self {
        Self {
            guild_id,
            manager,
            call,
            current: Mutex::new(None),
        }
    }

    async fn current(&self) -> MusicResult<TrackHandle> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or(MusicError::NothingPlaying)
    }
}

fn control_error(e: ControlError) -> MusicError {
    MusicError::PlaybackError(e.to_string())
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&self, audio: PreparedAudio, finished: FinishSignal) -> MusicResult<()> {
        debug!("Playing {} in guild {}", audio.path.display(), self.guild_id);
        let input: Input = File::new(audio.path).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id: self.guild_id,
                        finished: finished.clone(),
                    },
                )
                .map_err(control_error)?;
        }

        *self.current.lock().await = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        self.current().await?.pause().map_err(control_error)
    }

    async fn resume(&self) -> MusicResult<()> {
        self.current().await?.play().map_err(control_error)
    }

    async fn stop(&self) {
        if let Some(track) = self.current.lock().await.take() {
            match track.stop() {
                Ok(()) | Err(ControlError::Finished) => {}
                Err(e) => warn!("Failed to stop track in guild {}: {}", self.guild_id, e),
            }
        }
    }

    async fn leave(&self) {
        self.stop().await;
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("Left voice channel in guild {}", self.guild_id),
            Err(e) => warn!("Failed to leave voice channel in guild {}: {}", self.guild_id, e),
        }
    }
}

/// Posts session notices into the text channel the session was started from.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, message: String) {
        if let Err(e) = self.channel_id.say(&self.http, message).await {
            warn!("Failed to post to channel {}: {}", self.channel_id, e);
        }
    }
}
