// Export music utilities
pub mod embedded_messages;
pub mod event_handlers;
pub mod music_manager;
pub mod playable;
pub mod playback_session;
pub mod queue_manager;
pub mod voice;
