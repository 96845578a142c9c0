//! Media backend seam
//!
//! The player drives audio through [`MediaBackend`] and [`MediaHandle`].
//! A handle is created paused; the backend reports a finished track by
//! firing the [`EndOfStream`] registered when the handle was opened.

pub mod engine;
pub mod output;
pub mod source;

#[cfg( test )]
pub(crate) mod testing;

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

use thiserror::Error;

pub use engine::SymphoniaBackend;


/// Identifies one opened handle. Ids are never reused within a player.
pub type MediaId = u64;


/// Errors reported by a media backend.
#[derive( Debug, Error )]
pub enum MediaError {
    #[error( "Failed to open file: {0}" )]
    Open( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),
}


/// Notifications posted by a backend to the player's event channel.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum MediaEvent {
    /// The handle with this id played through to the end of its stream.
    EndOfStream { id: MediaId },
}


/// End-of-stream handler registered with a handle at creation time.
///
/// Firing it posts [`MediaEvent::EndOfStream`] to the player, which handles
/// it on its own thread. It may be sent to, and fired from, any thread.
#[derive( Debug, Clone )]
pub struct EndOfStream {
    id: MediaId,
    events: Sender<MediaEvent>,
}


impl EndOfStream {
    pub fn new( id: MediaId, events: Sender<MediaEvent> ) -> Self {
        Self { id, events }
    }


    /// The id of the handle this handler belongs to.
    pub fn id( &self ) -> MediaId {
        self.id
    }


    /// Reports that the stream finished. A player that has gone away is
    /// not an error.
    pub fn fire( &self ) {
        if self.events.send( MediaEvent::EndOfStream { id: self.id } ).is_err() {
            tracing::debug!( "End of stream for media {} with no listener", self.id );
        }
    }
}


/// Descriptive tags read from a track.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub genre: Option<String>,
    pub copyright: Option<String>,
    pub comment: Option<String>,
}


impl TrackTags {
    /// Returns true when no tag is set.
    pub fn is_empty( &self ) -> bool {
        *self == Self::default()
    }
}


/// The stream format of a track.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct AudioFormat {
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    /// Bits per sample.
    pub sample_size: Option<u32>,
}


/// Opens tracks for playback.
pub trait MediaBackend {
    /// Loads a track and returns a paused handle for it.
    ///
    /// @param path - The file to open
    /// @param on_end - Fired once if the track plays through to its end
    fn open( &self, path: &Path, on_end: EndOfStream ) -> Result<Box<dyn MediaHandle>, MediaError>;
}


/// A loaded track. Dropping the handle releases it.
///
/// There is no stop: callers pause and then drop the handle.
pub trait MediaHandle {
    /// Starts or resumes output.
    fn play( &mut self ) -> Result<(), MediaError>;

    /// Silences output, keeping the position.
    fn pause( &mut self ) -> Result<(), MediaError>;

    /// Moves playback to `position`.
    fn seek( &mut self, position: Duration ) -> Result<(), MediaError>;

    /// Current playback position.
    fn position( &self ) -> Duration;

    /// Total length, if the stream reports one.
    fn duration( &self ) -> Option<Duration>;

    fn tags( &self ) -> Option<TrackTags>;

    fn format( &self ) -> Option<AudioFormat>;
}
