//! Argon Core - Terminal audio player engine
//!
//! This crate provides the playlist, the playback controller and its media
//! backend, and the command language the terminal front end speaks.

pub mod command;
pub mod duration;
pub mod library;
pub mod media;
pub mod player;
pub mod playlist;
pub mod session;

pub use command::{ Command, CommandError, Shortcut, UiMode, INPUT_TRIGGER };
pub use duration::TrackTime;
pub use media::{ AudioFormat, MediaBackend, MediaError, SymphoniaBackend, TrackTags };
pub use player::{ PlaybackState, Player, PlayerError };
pub use playlist::{ Playlist, PlaylistError };
pub use session::{ Reply, Session };
