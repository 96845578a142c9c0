//! Playback controller
//!
//! The Player owns the playlist, the single active media handle and the
//! playback state machine. End-of-stream notifications arrive on a channel
//! and are applied by [`Player::pump_events`] on the caller's thread, so
//! the playlist, cursor and handle only ever have one writer.

use std::path::{ Path, PathBuf };
use std::sync::mpsc::{ self, Receiver, Sender };
use std::time::Duration;

use thiserror::Error;

use crate::duration::TrackTime;
use crate::media::{
    AudioFormat, EndOfStream, MediaBackend, MediaError, MediaEvent, MediaHandle, MediaId, TrackTags,
};
use crate::playlist::{ CursorEffect, Playlist, PlaylistError };


/// Errors that can occur during playback.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( "Cannot play {path:?}: {source}" )]
    Media {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error( "Seek failed: {0}" )]
    Seek( MediaError ),
}


/// Current playback state.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}


impl PlaybackState {
    /// Upper-case label used by the UI.
    pub fn name( &self ) -> &'static str {
        match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
        }
    }
}


/// The loaded track. Exists exactly while the state is not Stopped.
struct ActiveMedia {
    id: MediaId,
    path: PathBuf,
    handle: Box<dyn MediaHandle>,
    /// The stream ended while paused; resuming advances instead.
    finished: bool,
}


/// Core audio player.
pub struct Player {
    backend: Box<dyn MediaBackend>,
    playlist: Playlist,
    state: PlaybackState,
    active: Option<ActiveMedia>,
    next_id: MediaId,
    events_tx: Sender<MediaEvent>,
    events_rx: Receiver<MediaEvent>,
}


impl Player {
    /// Creates a stopped player with an empty playlist.
    pub fn new( backend: Box<dyn MediaBackend> ) -> Self {
        let ( events_tx, events_rx ) = mpsc::channel();
        Self {
            backend,
            playlist: Playlist::new(),
            state: PlaybackState::Stopped,
            active: None,
            next_id: 1,
            events_tx,
            events_rx,
        }
    }


    /// Stops whatever is playing and starts `path`.
    ///
    /// On failure the player is left stopped.
    pub fn play( &mut self, path: &Path ) -> Result<(), PlayerError> {
        self.stop();

        let id = self.next_id;
        self.next_id += 1;

        let on_end = EndOfStream::new( id, self.events_tx.clone() );
        let media_err = |source| PlayerError::Media { path: path.to_path_buf(), source };

        let mut handle = self.backend.open( path, on_end ).map_err( media_err )?;
        handle.play().map_err( media_err )?;

        tracing::info!( "Playing {:?} (media {})", path, id );
        self.active = Some( ActiveMedia { id, path: path.to_path_buf(), handle, finished: false } );
        self.state = PlaybackState::Playing;
        Ok(())
    }


    /// Plays the track under the cursor. Does nothing if the cursor is out
    /// of range.
    ///
    /// @returns true if a track was started
    pub fn play_current( &mut self ) -> Result<bool, PlayerError> {
        match self.playlist.current().cloned() {
            Some( path ) => self.play( &path ).map( |()| true ),
            None => Ok( false ),
        }
    }


    /// Moves the cursor to a 1-based position, then plays the current track.
    pub fn play_index( &mut self, one_based: usize ) -> Result<bool, PlayerError> {
        self.playlist.select( one_based );
        self.play_current()
    }


    /// Playing pauses, Paused resumes the same handle, Stopped plays the
    /// track under the cursor. Resuming a track that ended while paused
    /// advances to the next one.
    pub fn toggle( &mut self ) -> Result<(), PlayerError> {
        let Some( active ) = self.active.as_mut() else {
            self.play_current()?;
            return Ok(());
        };

        match self.state {
            PlaybackState::Playing => {
                pause_handle( active );
                self.state = PlaybackState::Paused;
                tracing::info!( "Paused" );
            }
            PlaybackState::Paused if active.finished => {
                tracing::info!( "Media {} ended while paused, advancing", active.id );
                self.advance()?;
            }
            PlaybackState::Paused => {
                active.handle.play().map_err( |source| PlayerError::Media {
                    path: active.path.clone(),
                    source,
                })?;
                self.state = PlaybackState::Playing;
                tracing::info!( "Resumed" );
            }
            PlaybackState::Stopped => {
                self.play_current()?;
            }
        }
        Ok(())
    }


    /// Halts playback and releases the handle.
    ///
    /// The backend has no stop of its own: the handle is paused and then
    /// dropped, never to be resumed. Always succeeds.
    pub fn stop( &mut self ) {
        if let Some( mut active ) = self.active.take() {
            pause_handle( &mut active );
            tracing::info!( "Stopped media {}", active.id );
        }
        self.state = PlaybackState::Stopped;
    }


    /// Moves the cursor forward (wrapping) and plays that track. This is the
    /// one path for track advance, shared by the skip shortcut and
    /// end-of-stream.
    pub fn skip_next( &mut self ) -> Result<bool, PlayerError> {
        self.playlist.next();
        self.play_current()
    }


    /// Moves the cursor back (wrapping) and plays that track.
    pub fn skip_previous( &mut self ) -> Result<bool, PlayerError> {
        self.playlist.previous();
        self.play_current()
    }


    /// Moves the cursor forward without touching playback.
    pub fn select_next( &mut self ) {
        self.playlist.next();
    }


    /// Moves the cursor back without touching playback.
    pub fn select_previous( &mut self ) {
        self.playlist.previous();
    }


    /// Seeks the active handle. A no-op when nothing is loaded.
    pub fn seek( &mut self, position: Duration ) -> Result<(), PlayerError> {
        match self.active.as_mut() {
            Some( active ) => active.handle.seek( position ).map_err( PlayerError::Seek ),
            None => Ok(()),
        }
    }


    /// Applies pending end-of-stream notifications.
    ///
    /// A notification for the active handle while playing advances to the
    /// next track; with an empty playlist the player stops. While paused it
    /// is held on the handle until the next toggle. Notifications from
    /// handles already replaced are ignored.
    ///
    /// @returns The number of notifications acted on
    pub fn pump_events( &mut self ) -> Result<usize, PlayerError> {
        let mut handled = 0;
        while let Ok( event ) = self.events_rx.try_recv() {
            let MediaEvent::EndOfStream { id } = event;
            let Some( active ) = self.active.as_mut().filter( |a| a.id == id ) else {
                tracing::debug!( "Ignoring stale end of stream for media {}", id );
                continue;
            };

            if self.state == PlaybackState::Paused {
                tracing::debug!( "Media {} ended while paused", id );
                active.finished = true;
                continue;
            }

            handled += 1;
            tracing::info!( "Media {} finished, advancing", id );
            self.advance()?;
        }
        Ok( handled )
    }


    /// Plays the next track, or stops when the playlist is empty.
    fn advance( &mut self ) -> Result<(), PlayerError> {
        if !self.skip_next()? {
            self.stop();
        }
        Ok(())
    }


    /// Adds playable paths to the playlist.
    ///
    /// @returns The number of tracks added
    pub fn add<I, P>( &mut self, paths: I ) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let added = self.playlist.add( paths );
        tracing::info!( "Added {} track(s)", added );
        added
    }


    /// Removes 1-based positions from the playlist, highest first, so earlier
    /// removals never shift later ones. Repeated positions count once.
    ///
    /// Removing the current track stops playback. An out-of-range position
    /// fails; removals already made stay made.
    pub fn remove( &mut self, positions: &[usize] ) -> Result<Vec<PathBuf>, PlaylistError> {
        let mut ordered = positions.to_vec();
        ordered.sort_unstable_by( |a, b| b.cmp( a ) );
        ordered.dedup();

        let mut removed = Vec::with_capacity( ordered.len() );
        for position in ordered {
            let entry = self.playlist.remove( position )?;
            if entry.effect == CursorEffect::Reset {
                self.stop();
            }
            removed.push( entry.path );
        }
        Ok( removed )
    }


    /// Empties the playlist without stopping playback.
    pub fn clear( &mut self ) {
        self.playlist.clear();
    }


    /// Gets the current playback state.
    pub fn state( &self ) -> PlaybackState {
        self.state
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    /// Path of the loaded track, if any. May be a file that is not in the
    /// playlist.
    pub fn current_track( &self ) -> Option<&Path> {
        self.active.as_ref().map( |a| a.path.as_path() )
    }


    /// Playback position of the loaded track, zero when stopped.
    pub fn elapsed( &self ) -> TrackTime {
        self.active.as_ref()
            .map( |a| TrackTime::from( a.handle.position() ) )
            .unwrap_or( TrackTime::ZERO )
    }


    /// Length of the loaded track, zero when stopped or unknown.
    pub fn total( &self ) -> TrackTime {
        self.active.as_ref()
            .and_then( |a| a.handle.duration() )
            .map( TrackTime::from )
            .unwrap_or( TrackTime::ZERO )
    }


    /// Tags and stream format of the loaded track, where available.
    pub fn metadata( &self ) -> ( Option<TrackTags>, Option<AudioFormat> ) {
        match self.active.as_ref() {
            Some( active ) => ( active.handle.tags(), active.handle.format() ),
            None => ( None, None ),
        }
    }
}


impl Drop for Player {
    fn drop( &mut self ) {
        self.stop();
    }
}


fn pause_handle( active: &mut ActiveMedia ) {
    if let Err( e ) = active.handle.pause() {
        tracing::warn!( "Pausing media {} failed: {}", active.id, e );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    use crate::media::testing::{ Call, FakeBackend };


    struct Rig {
        _dir: TempDir,
        backend: FakeBackend,
        player: Player,
        tracks: Vec<PathBuf>,
    }


    fn rig( n: usize ) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let tracks: Vec<PathBuf> = ( 1..=n )
            .map( |i| {
                let path = dir.path().join( format!( "{}.mp3", i ) );
                fs::write( &path, b"x" ).unwrap();
                path
            })
            .collect();

        let backend = FakeBackend::new();
        let mut player = Player::new( Box::new( backend.clone() ) );
        assert_eq!( player.add( &tracks ), n );

        Rig { _dir: dir, backend, player, tracks }
    }


    #[test]
    fn test_toggle_from_stopped_plays_cursor_track() {
        let mut r = rig( 3 );
        r.player.select_next();
        r.player.toggle().unwrap();

        assert_eq!( r.player.state(), PlaybackState::Playing );
        assert_eq!( r.player.current_track(), Some( r.tracks[ 1 ].as_path() ) );
    }


    #[test]
    fn test_toggle_pauses_and_resumes_same_handle() {
        let mut r = rig( 2 );
        r.player.toggle().unwrap();
        let id = r.backend.last_id().unwrap();

        r.player.toggle().unwrap();
        assert_eq!( r.player.state(), PlaybackState::Paused );
        r.player.toggle().unwrap();
        assert_eq!( r.player.state(), PlaybackState::Playing );

        assert_eq!( r.backend.opened().len(), 1 );
        assert_eq!( r.backend.calls(), vec![
            Call::Open( id, r.tracks[ 0 ].clone() ),
            Call::Play( id ),
            Call::Pause( id ),
            Call::Play( id ),
        ]);
    }


    #[test]
    fn test_toggle_on_empty_playlist_stays_stopped() {
        let mut r = rig( 0 );
        r.player.toggle().unwrap();
        assert_eq!( r.player.state(), PlaybackState::Stopped );
        assert!( r.backend.calls().is_empty() );
    }


    #[test]
    fn test_play_replaces_active_handle() {
        let mut r = rig( 2 );
        r.player.play_index( 1 ).unwrap();
        let first = r.backend.last_id().unwrap();
        r.player.play_index( 2 ).unwrap();
        let second = r.backend.last_id().unwrap();

        let calls = r.backend.calls();
        let release = calls.iter().position( |c| *c == Call::Release( first ) ).unwrap();
        let open = calls.iter().position( |c| matches!( c, Call::Open( id, _ ) if *id == second ) ).unwrap();
        assert!( release < open );
        assert_eq!( calls[ release - 1 ], Call::Pause( first ) );
        assert_eq!( r.player.current_track(), Some( r.tracks[ 1 ].as_path() ) );
    }


    #[test]
    fn test_stop_pauses_then_releases() {
        let mut r = rig( 1 );
        r.player.play_current().unwrap();
        let id = r.backend.last_id().unwrap();
        r.player.stop();

        assert_eq!( r.player.state(), PlaybackState::Stopped );
        assert!( r.player.current_track().is_none() );
        assert_eq!( &r.backend.calls()[ 2.. ], &[ Call::Pause( id ), Call::Release( id ) ] );

        // Stopping again is harmless.
        r.player.stop();
        assert_eq!( r.player.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_play_index_out_of_range_is_noop() {
        let mut r = rig( 2 );
        assert!( !r.player.play_index( 5 ).unwrap() );
        assert_eq!( r.player.state(), PlaybackState::Stopped );
        assert!( r.backend.opened().is_empty() );
    }


    #[test]
    fn test_open_failure_leaves_player_stopped() {
        let mut r = rig( 2 );
        r.player.play_index( 1 ).unwrap();
        r.backend.refuse( &r.tracks[ 1 ] );

        let err = r.player.play_index( 2 ).unwrap_err();
        assert!( matches!( err, PlayerError::Media { .. } ) );
        assert_eq!( r.player.state(), PlaybackState::Stopped );
        assert!( r.player.current_track().is_none() );
    }


    #[test]
    fn test_end_of_stream_wraps_to_first_track() {
        let mut r = rig( 3 );
        r.player.play_index( 3 ).unwrap();
        r.backend.finish( r.backend.last_id().unwrap() );

        assert_eq!( r.player.pump_events().unwrap(), 1 );
        assert_eq!( r.player.state(), PlaybackState::Playing );
        assert_eq!( r.player.playlist().cursor(), 0 );
        assert_eq!( r.player.current_track(), Some( r.tracks[ 0 ].as_path() ) );
    }


    #[test]
    fn test_end_of_stream_with_empty_playlist_stops() {
        let mut r = rig( 2 );
        r.player.play_index( 1 ).unwrap();
        r.player.clear();
        r.backend.finish( r.backend.last_id().unwrap() );

        r.player.pump_events().unwrap();
        assert_eq!( r.player.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_stale_end_of_stream_ignored() {
        let mut r = rig( 3 );
        r.player.play_index( 1 ).unwrap();
        let old = r.backend.last_id().unwrap();
        r.player.play_index( 2 ).unwrap();
        r.backend.finish( old );

        assert_eq!( r.player.pump_events().unwrap(), 0 );
        assert_eq!( r.player.current_track(), Some( r.tracks[ 1 ].as_path() ) );
    }


    #[test]
    fn test_end_of_stream_while_paused_waits_for_resume() {
        let mut r = rig( 2 );
        r.player.play_index( 1 ).unwrap();
        r.player.toggle().unwrap();
        r.backend.finish( r.backend.last_id().unwrap() );

        assert_eq!( r.player.pump_events().unwrap(), 0 );
        assert_eq!( r.player.state(), PlaybackState::Paused );
        assert_eq!( r.player.playlist().cursor(), 0 );
    }


    #[test]
    fn test_resume_after_end_while_paused_advances() {
        let mut r = rig( 2 );
        r.player.play_index( 1 ).unwrap();
        let first = r.backend.last_id().unwrap();

        // The track ends just before the pause lands.
        r.backend.finish( first );
        r.player.toggle().unwrap();
        r.player.pump_events().unwrap();
        r.player.toggle().unwrap();
        r.player.pump_events().unwrap();

        assert_eq!( r.player.state(), PlaybackState::Playing );
        assert_eq!( r.player.playlist().cursor(), 1 );
        assert_eq!( r.player.current_track(), Some( r.tracks[ 1 ].as_path() ) );
        assert_eq!( r.backend.opened().len(), 2 );
        let resumed = r.backend.calls().iter().filter( |c| **c == Call::Play( first ) ).count();
        assert_eq!( resumed, 1 );
    }


    #[test]
    fn test_remove_descending_regardless_of_input_order() {
        let expected = |r: &Rig| vec![
            r.tracks[ 1 ].clone(),
            r.tracks[ 3 ].clone(),
            r.tracks[ 4 ].clone(),
        ];

        let mut ascending = rig( 5 );
        let removed = ascending.player.remove( &[ 1, 3 ] ).unwrap();
        assert_eq!( removed, vec![ ascending.tracks[ 2 ].clone(), ascending.tracks[ 0 ].clone() ] );
        assert_eq!( ascending.player.playlist().tracks(), expected( &ascending ).as_slice() );

        let mut descending = rig( 5 );
        let removed = descending.player.remove( &[ 3, 1 ] ).unwrap();
        assert_eq!( removed, vec![ descending.tracks[ 2 ].clone(), descending.tracks[ 0 ].clone() ] );
        assert_eq!( descending.player.playlist().tracks(), expected( &descending ).as_slice() );
    }


    #[test]
    fn test_remove_current_stops_and_resets_cursor() {
        let mut r = rig( 4 );
        r.player.play_index( 3 ).unwrap();
        r.player.remove( &[ 3 ] ).unwrap();

        assert_eq!( r.player.state(), PlaybackState::Stopped );
        assert_eq!( r.player.playlist().cursor(), 0 );
    }


    #[test]
    fn test_remove_before_cursor_keeps_playing() {
        let mut r = rig( 4 );
        r.player.play_index( 3 ).unwrap();
        r.player.remove( &[ 1 ] ).unwrap();

        assert_eq!( r.player.state(), PlaybackState::Playing );
        assert_eq!( r.player.playlist().cursor(), 1 );
        assert_eq!( r.player.playlist().current(), Some( &r.tracks[ 2 ] ) );
    }


    #[test]
    fn test_remove_after_cursor_leaves_cursor() {
        let mut r = rig( 4 );
        r.player.play_index( 2 ).unwrap();
        r.player.remove( &[ 4 ] ).unwrap();
        assert_eq!( r.player.playlist().cursor(), 1 );
    }


    #[test]
    fn test_remove_out_of_range_keeps_earlier_removals() {
        let mut r = rig( 3 );
        let err = r.player.remove( &[ 0, 2 ] ).unwrap_err();

        assert_eq!( err, PlaylistError::OutOfRange { index: 0, len: 2 } );
        assert_eq!( r.player.playlist().len(), 2 );
    }


    #[test]
    fn test_remove_too_high_changes_nothing() {
        let mut r = rig( 3 );
        assert!( r.player.remove( &[ 1, 7 ] ).is_err() );
        assert_eq!( r.player.playlist().len(), 3 );
    }


    #[test]
    fn test_timing_and_metadata_when_stopped() {
        let r = rig( 1 );
        assert_eq!( r.player.elapsed(), TrackTime::ZERO );
        assert_eq!( r.player.total(), TrackTime::ZERO );
        assert_eq!( r.player.metadata(), ( None, None ) );
    }


    #[test]
    fn test_seek_forwards_to_active_handle() {
        let mut r = rig( 1 );
        r.player.seek( Duration::from_secs( 5 ) ).unwrap();
        assert!( r.backend.calls().is_empty() );

        r.player.play_current().unwrap();
        r.player.seek( Duration::from_secs( 42 ) ).unwrap();
        assert_eq!( r.player.elapsed(), TrackTime::from_secs( 42 ) );
        assert_eq!( r.player.total(), TrackTime::from_secs( 180 ) );
        assert!( r.player.metadata().0.is_some() );
    }
}
