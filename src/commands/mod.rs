//! This module aggregates all the command modules for the bot.

/// The `/wow` command group: random wows and music playback.
pub mod music;
