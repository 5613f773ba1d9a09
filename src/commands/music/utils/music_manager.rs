use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::{Call, Songbird};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use dashmap::DashMap;

use super::playable::PlayableItem;
use super::playback_session::{Announcer, AudioSink, Enqueued, SessionHandle, SessionSettings};
use super::voice::{ChannelAnnouncer, SongbirdSink};

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("No clip, song or album matches \"{0}\"")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Audio source error: {0}")]
    AudioSourceError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Nothing is playing")]
    NothingPlaying,

    #[error("The current clip is still loading")]
    NotPausable,

    #[error("Playback is already paused")]
    AlreadyPaused,

    #[error("Playback is not paused")]
    NotPaused,

    #[error("The playback session has ended")]
    SessionClosed,
}

impl From<reqwest::Error> for MusicError {
    fn from(err: reqwest::Error) -> Self {
        MusicError::NetworkError(err.to_string())
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Keeps one playback session per guild and owns voice connections.
pub struct MusicManager {
    sessions: DashMap<GuildId, SessionHandle>,
    settings: SessionSettings,
    // Serializes session creation so two commands can't both join.
    connect_lock: Mutex<()>,
}

impl MusicManager {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            settings,
            connect_lock: Mutex::new(()),
        }
    }

    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }

    /// The live session for this guild, if there is one.
    pub fn session(&self, guild_id: GuildId) -> MusicResult<SessionHandle> {
        match self.sessions.get(&guild_id) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            _ => Err(MusicError::NotConnected),
        }
    }

    /// Queues items for a guild, joining `voice_channel` first if the guild has
    /// no live session. Replies about failed downloads go to `text_channel`.
    pub async fn enqueue(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        items: Vec<PlayableItem>,
    ) -> MusicResult<Enqueued> {
        self.enqueue_with(guild_id, items, || {
            Self::open_voice(ctx, guild_id, voice_channel, text_channel)
        })
        .await
    }

    /// Like `enqueue`, but the new items jump ahead of the current one.
    pub async fn play_next(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        items: Vec<PlayableItem>,
    ) -> MusicResult<Option<String>> {
        let open = || Self::open_voice(ctx, guild_id, voice_channel, text_channel);
        let session = self.session_or_spawn(guild_id, open).await?;
        match session.play_next(items).await {
            Ok(skipped) => Ok(skipped),
            Err(items) => {
                warn!("Session for guild {} closed mid-request, reopening", guild_id);
                let session = self.session_or_spawn(guild_id, open).await?;
                session
                    .play_next(items)
                    .await
                    .map_err(|_| MusicError::SessionClosed)
            }
        }
    }

    /// Enqueues on the live session, or on a new one built from `open`. A session
    /// that shuts down while the request is in flight is replaced once.
    pub async fn enqueue_with<F, Fut>(
        &self,
        guild_id: GuildId,
        items: Vec<PlayableItem>,
        open: F,
    ) -> MusicResult<Enqueued>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = MusicResult<(Arc<dyn AudioSink>, Arc<dyn Announcer>)>>,
    {
        let session = self.session_or_spawn(guild_id, &open).await?;
        match session.enqueue(items).await {
            Ok(enqueued) => Ok(enqueued),
            Err(items) => {
                warn!("Session for guild {} closed mid-request, reopening", guild_id);
                let session = self.session_or_spawn(guild_id, &open).await?;
                session
                    .enqueue(items)
                    .await
                    .map_err(|_| MusicError::SessionClosed)
            }
        }
    }

    async fn session_or_spawn<F, Fut>(
        &self,
        guild_id: GuildId,
        open: F,
    ) -> MusicResult<SessionHandle>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = MusicResult<(Arc<dyn AudioSink>, Arc<dyn Announcer>)>>,
    {
        let _guard = self.connect_lock.lock().await;
        if let Ok(session) = self.session(guild_id) {
            return Ok(session);
        }

        let (sink, announcer) = open().await?;
        let session = SessionHandle::spawn(guild_id, sink, announcer, self.settings.clone());
        self.sessions.insert(guild_id, session.clone());
        info!("Opened playback session for guild {}", guild_id);

        Ok(session)
    }

    async fn open_voice(
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> MusicResult<(Arc<dyn AudioSink>, Arc<dyn Announcer>)> {
        let songbird = Self::get_songbird(ctx).await?;
        let call = Self::join_channel(&songbird, guild_id, voice_channel).await?;

        let sink: Arc<dyn AudioSink> = Arc::new(SongbirdSink::new(guild_id, songbird, call));
        let announcer: Arc<dyn Announcer> =
            Arc::new(ChannelAnnouncer::new(ctx.http.clone(), text_channel));
        Ok((sink, announcer))
    }

    /// Join a voice channel
    async fn join_channel(
        songbird: &Songbird,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<Mutex<Call>>> {
        songbird.join(guild_id, channel_id).await.map_err(|e| {
            error!(
                "Failed to join voice channel {} for guild {}: {}",
                channel_id, guild_id, e
            );
            MusicError::JoinError(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::audio_sources::track_metadata::ClipMetadata;
    use crate::commands::music::utils::playable::PreparedAudio;
    use crate::commands::music::utils::playback_session::FinishSignal;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SilentSink;

    #[async_trait]
    impl AudioSink for SilentSink {
        async fn play(&self, _audio: PreparedAudio, _finished: FinishSignal) -> MusicResult<()> {
            Ok(())
        }
        async fn pause(&self) -> MusicResult<()> {
            Ok(())
        }
        async fn resume(&self) -> MusicResult<()> {
            Ok(())
        }
        async fn stop(&self) {}
        async fn leave(&self) {}
    }

    struct SilentAnnouncer;

    #[async_trait]
    impl Announcer for SilentAnnouncer {
        async fn announce(&self, _message: String) {}
    }

    fn item(name: &str) -> PlayableItem {
        PlayableItem::local(
            ClipMetadata {
                display_name: name.to_string(),
                ..Default::default()
            },
            format!("{}.mp3", name),
        )
    }

    #[tokio::test]
    async fn sessions_are_reused_until_they_close() {
        let manager = MusicManager::new(SessionSettings::default());
        let guild_id = GuildId::new(7);
        let opened = AtomicUsize::new(0);
        let open = || async {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok((
                Arc::new(SilentSink) as Arc<dyn AudioSink>,
                Arc::new(SilentAnnouncer) as Arc<dyn Announcer>,
            ))
        };

        assert_matches!(manager.session(guild_id), Err(MusicError::NotConnected));

        let first = manager.enqueue_with(guild_id, vec![item("a")], open).await.unwrap();
        assert!(first.started);
        let second = manager.enqueue_with(guild_id, vec![item("b")], open).await.unwrap();
        assert_eq!(second.position, 1);
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        manager.session(guild_id).unwrap().stop().await.unwrap();

        let third = manager.enqueue_with(guild_id, vec![item("c")], open).await.unwrap();
        assert!(third.started);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_join_leaves_no_session() {
        let manager = MusicManager::new(SessionSettings::default());
        let guild_id = GuildId::new(8);

        let result = manager
            .enqueue_with(guild_id, vec![item("a")], || async {
                Err(MusicError::JoinError("timed out".to_string()))
            })
            .await;

        assert_matches!(result, Err(MusicError::JoinError(_)));
        assert_matches!(manager.session(guild_id), Err(MusicError::NotConnected));
    }
}
