//! Per-guild playback controller.
//!
//! Each voice session runs as one task that owns the queue and the audio sink.
//! Commands, "track finished" signals, download completions and the idle
//! timer all arrive as messages on one channel, so queue mutations happen in
//! dispatch order.
//!
//! States: `Idle -> Playing <-> Paused`, `Playing -> DisconnectArmed` once the
//! queue drains, and back to `Idle` (session gone) on stop or idle timeout.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use tempfile::TempPath;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::commands::music::audio_sources::track_metadata::ClipMetadata;

use super::music_manager::{MusicError, MusicResult};
use super::playable::{PlayableItem, PreparedAudio, Readiness, joined};
use super::queue_manager::{Advance, PlaybackQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No session resources in use and nothing queued.
    Idle,
    /// The front item is streaming or about to.
    Playing,
    /// The sink holds the front item but is not streaming it.
    Paused,
    /// Queue drained; the idle-disconnect timer is running.
    DisconnectArmed,
}

/// The voice side of a session.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Replaces whatever is loaded with `audio` and starts streaming it.
    /// `finished` is signalled when the track ends, or fails once decoding has
    /// started.
    async fn play(&self, audio: PreparedAudio, finished: FinishSignal) -> MusicResult<()>;

    async fn pause(&self) -> MusicResult<()>;

    async fn resume(&self) -> MusicResult<()>;

    /// Halts the current track, if any.
    async fn stop(&self);

    /// Disconnects from the voice channel.
    async fn leave(&self);
}

/// Where a session reports problems nobody asked about (failed downloads and
/// clips that could not be decoded).
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, message: String);
}

/// Handed to the sink with every track; tells the session the track is over.
#[derive(Clone)]
pub struct FinishSignal {
    tx: mpsc::UnboundedSender<Message>,
    generation: u64,
}

impl FinishSignal {
    pub fn finished(&self) {
        // A closed channel means the session is already gone.
        let _ = self.tx.send(Message::Finished {
            generation: self.generation,
        });
    }

    /// The track stopped because it could not be played.
    pub fn failed(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Message::Failed {
            generation: self.generation,
            reason: reason.into(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    pub prefetch: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            prefetch: 3,
        }
    }
}

/// Reply to an enqueue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    /// Zero-based queue position of the first new item.
    pub position: usize,
    pub count: usize,
    /// Whether this request started playback.
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub state: PlaybackState,
    /// The front item, if any.
    pub current: Option<ClipMetadata>,
    /// `"<position>. <displayName>"` lines, front first.
    pub entries: Vec<String>,
    pub total: usize,
}

/// Items handed back by a session that has already shut down.
pub type Rejected = Vec<PlayableItem>;

enum Message {
    Enqueue {
        items: Vec<PlayableItem>,
        reply: oneshot::Sender<Result<Enqueued, Rejected>>,
    },
    PlayNext {
        items: Vec<PlayableItem>,
        reply: oneshot::Sender<Result<Option<String>, Rejected>>,
    },
    Pause {
        reply: oneshot::Sender<MusicResult<String>>,
    },
    Resume {
        reply: oneshot::Sender<MusicResult<String>>,
    },
    Skip {
        reply: oneshot::Sender<Option<String>>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        limit: usize,
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Finished {
        generation: u64,
    },
    Failed {
        generation: u64,
        reason: String,
    },
    Prepared {
        generation: u64,
        result: MusicResult<TempPath>,
    },
    IdleTimeout {
        generation: u64,
    },
}

/// Cheap handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<Message>,
}

impl SessionHandle {
    /// Starts a session task in the `Idle` state.
    pub fn spawn(
        guild_id: GuildId,
        sink: Arc<dyn AudioSink>,
        announcer: Arc<dyn Announcer>,
        settings: SessionSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PlaybackSession {
            guild_id,
            queue: PlaybackQueue::new(settings.prefetch),
            state: PlaybackState::Idle,
            sink,
            announcer,
            settings,
            generation: 0,
            timer_generation: 0,
            sink_loaded: false,
            pending: None,
            idle_timer: None,
            tx: tx.clone(),
        };
        tokio::spawn(session.run(rx));

        Self { guild_id, tx }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// True once the session has torn itself down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Appends items and starts playback if the session was idle.
    ///
    /// If the session has already shut down the items are handed back so they
    /// can be queued on a new one.
    pub async fn enqueue(&self, items: Vec<PlayableItem>) -> Result<Enqueued, Rejected> {
        let (reply, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(message)) = self.tx.send(Message::Enqueue { items, reply })
        {
            return Err(message.into_items());
        }
        rx.await.unwrap_or_else(|_| Err(Vec::new()))
    }

    /// Puts items right behind the current one and skips to them. Returns the
    /// name of the skipped item.
    pub async fn play_next(&self, items: Vec<PlayableItem>) -> Result<Option<String>, Rejected> {
        let (reply, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(message)) =
            self.tx.send(Message::PlayNext { items, reply })
        {
            return Err(message.into_items());
        }
        rx.await.unwrap_or_else(|_| Err(Vec::new()))
    }

    pub async fn pause(&self) -> MusicResult<String> {
        self.request(|reply| Message::Pause { reply }).await?
    }

    pub async fn resume(&self) -> MusicResult<String> {
        self.request(|reply| Message::Resume { reply }).await?
    }

    pub async fn skip(&self) -> MusicResult<Option<String>> {
        self.request(|reply| Message::Skip { reply }).await
    }

    /// Drops pending items; the current one keeps playing.
    pub async fn clear(&self) -> MusicResult<usize> {
        self.request(|reply| Message::Clear { reply }).await
    }

    /// Halts playback, empties the queue and leaves the channel.
    pub async fn stop(&self) -> MusicResult<usize> {
        self.request(|reply| Message::Stop { reply }).await
    }

    pub async fn snapshot(&self, limit: usize) -> MusicResult<QueueSnapshot> {
        self.request(|reply| Message::Snapshot { limit, reply }).await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> Message,
    ) -> MusicResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(message(reply))
            .map_err(|_| MusicError::SessionClosed)?;
        rx.await.map_err(|_| MusicError::SessionClosed)
    }
}

impl Message {
    fn into_items(self) -> Vec<PlayableItem> {
        match self {
            Message::Enqueue { items, .. } | Message::PlayNext { items, .. } => items,
            _ => Vec::new(),
        }
    }
}

struct PlaybackSession {
    guild_id: GuildId,
    queue: PlaybackQueue,
    state: PlaybackState,
    sink: Arc<dyn AudioSink>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
    // Bumped whenever the front item changes; stale finish/download events carry an older value.
    generation: u64,
    timer_generation: u64,
    // Whether the front item has been handed to the sink.
    sink_loaded: bool,
    // Forwarder for the front item's download, plus the download itself.
    pending: Option<(JoinHandle<()>, AbortHandle)>,
    idle_timer: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Message>,
}

impl PlaybackSession {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        info!("Playback session started for guild {}", self.guild_id);

        while let Some(message) = rx.recv().await {
            if self.handle(message).await.is_break() {
                break;
            }
        }

        // Anything that raced with shutdown gets its items back.
        rx.close();
        while let Ok(message) = rx.try_recv() {
            match message {
                Message::Enqueue { items, reply } => {
                    let _ = reply.send(Err(items));
                }
                Message::PlayNext { items, reply } => {
                    let _ = reply.send(Err(items));
                }
                _ => {}
            }
        }

        info!("Playback session ended for guild {}", self.guild_id);
    }

    async fn handle(&mut self, message: Message) -> ControlFlow<()> {
        match message {
            Message::Enqueue { items, reply } => {
                let enqueued = self.enqueue(items).await;
                let _ = reply.send(Ok(enqueued));
            }
            Message::PlayNext { items, reply } => {
                let skipped = self.play_next(items).await;
                let _ = reply.send(Ok(skipped));
            }
            Message::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Message::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Message::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            Message::Clear { reply } => {
                let removed = match self.state {
                    PlaybackState::Playing | PlaybackState::Paused => self.queue.clear_pending(),
                    PlaybackState::Idle | PlaybackState::DisconnectArmed => self.queue.clear(),
                };
                debug!("Cleared {} pending items for guild {}", removed, self.guild_id);
                let _ = reply.send(removed);
            }
            Message::Stop { reply } => {
                let removed = self.stop().await;
                let _ = reply.send(removed);
                return ControlFlow::Break(());
            }
            Message::Snapshot { limit, reply } => {
                let _ = reply.send(QueueSnapshot {
                    state: self.state,
                    current: self.queue.front().map(|item| item.metadata().clone()),
                    entries: self.queue.peek(limit),
                    total: self.queue.len(),
                });
            }
            Message::Finished { generation } => {
                if generation != self.generation
                    || !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
                {
                    debug!("Ignoring stale finish event for guild {}", self.guild_id);
                } else {
                    self.finish_front().await;
                }
            }
            Message::Failed { generation, reason } => {
                if generation != self.generation
                    || !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
                {
                    debug!("Ignoring stale failure for guild {}: {}", self.guild_id, reason);
                } else if let Some(name) = self.front_name() {
                    self.report_failure(&name, &MusicError::PlaybackError(reason))
                        .await;
                    self.finish_front().await;
                }
            }
            Message::Prepared { generation, result } => {
                if generation != self.generation {
                    debug!("Discarding stale download for guild {}", self.guild_id);
                } else {
                    self.prepared(result).await;
                }
            }
            Message::IdleTimeout { generation } => {
                if generation == self.timer_generation
                    && self.state == PlaybackState::DisconnectArmed
                    && self.queue.is_empty()
                {
                    info!("Idle timeout elapsed for guild {}, leaving", self.guild_id);
                    self.idle_timer = None;
                    self.sink.leave().await;
                    self.state = PlaybackState::Idle;
                    return ControlFlow::Break(());
                }
            }
        }

        ControlFlow::Continue(())
    }

    async fn enqueue(&mut self, items: Vec<PlayableItem>) -> Enqueued {
        let position = self.queue.len();
        let count = items.len();
        for item in items {
            self.queue.enqueue(item);
        }

        let started = count > 0
            && matches!(
                self.state,
                PlaybackState::Idle | PlaybackState::DisconnectArmed
            );
        if started {
            self.cancel_idle_timer();
            self.start_front().await;
        }

        debug!(
            "Queued {} items at position {} for guild {}",
            count, position, self.guild_id
        );
        Enqueued {
            position,
            count,
            started,
        }
    }

    async fn play_next(&mut self, items: Vec<PlayableItem>) -> Option<String> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.queue.insert_next(items);
                self.skip().await
            }
            PlaybackState::Idle | PlaybackState::DisconnectArmed => {
                self.enqueue(items).await;
                None
            }
        }
    }

    async fn pause(&mut self) -> MusicResult<String> {
        let name = self.front_name().ok_or(MusicError::NothingPlaying)?;
        match self.state {
            PlaybackState::Playing if self.sink_loaded => {
                self.sink.pause().await?;
                self.state = PlaybackState::Paused;
                info!("Paused '{}' in guild {}", name, self.guild_id);
                Ok(name)
            }
            PlaybackState::Playing => Err(MusicError::NotPausable),
            PlaybackState::Paused => Err(MusicError::AlreadyPaused),
            PlaybackState::Idle | PlaybackState::DisconnectArmed => {
                Err(MusicError::NothingPlaying)
            }
        }
    }

    async fn resume(&mut self) -> MusicResult<String> {
        if self.state != PlaybackState::Paused {
            return Err(MusicError::NotPaused);
        }
        let name = self.front_name().ok_or(MusicError::NothingPlaying)?;
        self.sink.resume().await?;
        self.state = PlaybackState::Playing;
        info!("Resumed '{}' in guild {}", name, self.guild_id);
        Ok(name)
    }

    async fn skip(&mut self) -> Option<String> {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return None;
        }
        let name = self.front_name()?;
        if self.sink_loaded {
            self.sink.stop().await;
        }
        info!("Skipping '{}' in guild {}", name, self.guild_id);
        self.finish_front().await;
        Some(name)
    }

    async fn stop(&mut self) -> usize {
        self.cancel_idle_timer();
        self.abort_pending();
        self.generation += 1;
        self.sink.stop().await;
        self.sink_loaded = false;
        let removed = self.queue.clear();
        self.sink.leave().await;
        self.state = PlaybackState::Idle;
        info!(
            "Stopped playback for guild {} ({} items dropped)",
            self.guild_id, removed
        );
        removed
    }

    /// Drops the front item and moves on to the next one.
    async fn finish_front(&mut self) {
        self.abort_pending();
        self.sink_loaded = false;
        self.generation += 1;
        match self.queue.advance() {
            Advance::Next => self.start_front().await,
            Advance::Drained => self.arm_idle_timer(),
            Advance::Empty => {}
        }
    }

    /// Starts the front item, skipping over items that cannot be played.
    async fn start_front(&mut self) {
        loop {
            self.generation += 1;
            let generation = self.generation;
            self.sink_loaded = false;

            let Some(item) = self.queue.front_mut() else {
                self.arm_idle_timer();
                return;
            };
            let name = item.display_name().to_string();

            match item.begin() {
                Readiness::Ready(audio) => {
                    if self.play(audio, &name, generation).await {
                        return;
                    }
                }
                Readiness::Pending(download) => {
                    debug!("Waiting for '{}' to download", name);
                    self.state = PlaybackState::Playing;
                    let abort = download.abort_handle();
                    let tx = self.tx.clone();
                    let forwarder = tokio::spawn(async move {
                        let result = joined(download.await);
                        let _ = tx.send(Message::Prepared { generation, result });
                    });
                    self.pending = Some((forwarder, abort));
                    return;
                }
                Readiness::Failed(err) => self.report_failure(&name, &err).await,
            }

            self.queue.advance();
        }
    }

    async fn prepared(&mut self, result: MusicResult<TempPath>) {
        self.pending = None;
        let generation = self.generation;

        let Some(item) = self.queue.front_mut() else {
            return;
        };
        let name = item.display_name().to_string();

        let played = match item.complete(result) {
            Ok(audio) => self.play(audio, &name, generation).await,
            Err(err) => {
                self.report_failure(&name, &err).await;
                false
            }
        };

        if !played {
            self.queue.advance();
            self.start_front().await;
        }
    }

    async fn play(&mut self, audio: PreparedAudio, name: &str, generation: u64) -> bool {
        let finished = FinishSignal {
            tx: self.tx.clone(),
            generation,
        };
        match self.sink.play(audio, finished).await {
            Ok(()) => {
                info!("Now playing '{}' in guild {}", name, self.guild_id);
                self.state = PlaybackState::Playing;
                self.sink_loaded = true;
                true
            }
            Err(err) => {
                self.report_failure(name, &err).await;
                false
            }
        }
    }

    async fn report_failure(&self, name: &str, err: &MusicError) {
        warn!("Skipping '{}' in guild {}: {}", name, self.guild_id, err);
        self.announcer
            .announce(format!("Wow! Couldn't play {}: {}", name, err))
            .await;
    }

    fn arm_idle_timer(&mut self) {
        self.cancel_idle_timer();
        self.state = PlaybackState::DisconnectArmed;

        let generation = self.timer_generation;
        let timeout = self.settings.idle_timeout;
        let tx = self.tx.clone();
        self.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Message::IdleTimeout { generation });
        }));
        info!(
            "Queue drained for guild {}, leaving in {}",
            self.guild_id,
            humantime::format_duration(timeout)
        );
    }

    fn cancel_idle_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(timer) = self.idle_timer.take() {
            debug!("Cancelled idle timer for guild {}", self.guild_id);
            timer.abort();
        }
    }

    fn abort_pending(&mut self) {
        if let Some((forwarder, download)) = self.pending.take() {
            download.abort();
            forwarder.abort();
        }
    }

    fn front_name(&self) -> Option<String> {
        self.queue.front().map(|item| item.display_name().to_string())
    }
}
