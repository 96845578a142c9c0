//! Playlist and cursor management
//!
//! Holds the ordered track list and the cursor pointing at the current
//! track. The cursor is either a valid index or equal to the length of the
//! list, meaning "past the end".

use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::library;


/// Errors that can occur with playlist operations.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum PlaylistError {
    #[error( "No playlist item {index} (playlist has {len} item(s))" )]
    OutOfRange { index: usize, len: usize },
}


/// Where a removed track sat relative to the cursor.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum CursorEffect {
    /// The cursor pointed at the removed track and was reset to 0.
    Reset,
    /// The track was before the cursor; the cursor moved back by one.
    Shifted,
    /// The track was after the cursor.
    Unchanged,
}


/// A track taken out of the playlist.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Removed {
    pub path: PathBuf,
    pub effect: CursorEffect,
}


/// Ordered track list with a current-track cursor.
#[derive( Debug, Default )]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    cursor: usize,
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::default()
    }


    /// Appends every playable path, in order, skipping the rest.
    ///
    /// @param paths - Candidate track paths
    ///
    /// @returns The number of tracks actually added
    pub fn add<I, P>( &mut self, paths: I ) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let before = self.tracks.len();
        for path in paths {
            let path = path.as_ref();
            if library::is_playable( path ) {
                self.tracks.push( path.to_path_buf() );
            } else {
                tracing::debug!( "Skipping unplayable path {:?}", path );
            }
        }
        self.tracks.len() - before
    }


    /// Removes the track at a 1-based position and keeps the cursor on the
    /// same logical track.
    ///
    /// Removing the cursor's own track resets the cursor to 0; stopping
    /// playback is left to the caller.
    pub fn remove( &mut self, one_based: usize ) -> Result<Removed, PlaylistError> {
        if one_based == 0 || one_based > self.tracks.len() {
            return Err( PlaylistError::OutOfRange { index: one_based, len: self.tracks.len() } );
        }

        let index = one_based - 1;
        let path = self.tracks.remove( index );

        let effect = if index == self.cursor {
            self.cursor = 0;
            CursorEffect::Reset
        } else if index < self.cursor {
            self.cursor -= 1;
            CursorEffect::Shifted
        } else {
            CursorEffect::Unchanged
        };

        Ok( Removed { path, effect } )
    }


    /// Empties the playlist.
    ///
    /// The cursor is left alone and may now point past the end.
    pub fn clear( &mut self ) {
        self.tracks.clear();
    }


    /// Moves the cursor forward, wrapping to the first track.
    pub fn next( &mut self ) {
        if !self.tracks.is_empty() {
            self.cursor = ( self.cursor + 1 ) % self.tracks.len();
        }
    }


    /// Moves the cursor back, wrapping to the last track.
    pub fn previous( &mut self ) {
        let len = self.tracks.len();
        if len > 0 {
            // A stale cursor past the end steps back as if from `len`.
            self.cursor = ( self.cursor.min( len ) + len - 1 ) % len;
        }
    }


    /// Points the cursor at a 1-based position.
    ///
    /// Positions outside the list park the cursor past the end, so a
    /// following play is a no-op.
    pub fn select( &mut self, one_based: usize ) {
        self.cursor = match one_based.checked_sub( 1 ) {
            Some( index ) if index < self.tracks.len() => index,
            _ => self.tracks.len(),
        };
    }


    /// Gets the track under the cursor, if the cursor is in range.
    pub fn current( &self ) -> Option<&PathBuf> {
        self.tracks.get( self.cursor )
    }


    /// Gets the cursor position (zero-based).
    pub fn cursor( &self ) -> usize {
        self.cursor
    }


    /// Gets all tracks in the playlist.
    pub fn tracks( &self ) -> &[PathBuf] {
        &self.tracks
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the playlist is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Returns true if a 1-based position names a track.
    pub fn contains_position( &self, one_based: usize ) -> bool {
        one_based >= 1 && one_based <= self.tracks.len()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;


    fn fixture( names: &[&str] ) -> ( TempDir, Vec<PathBuf> ) {
        let dir = tempfile::tempdir().unwrap();
        let paths = names.iter()
            .map( |name| {
                let path = dir.path().join( name );
                fs::write( &path, b"x" ).unwrap();
                path
            })
            .collect();
        ( dir, paths )
    }


    fn filled( n: usize ) -> ( TempDir, Playlist, Vec<PathBuf> ) {
        let names: Vec<String> = ( 1..=n ).map( |i| format!( "t{}.mp3", i ) ).collect();
        let refs: Vec<&str> = names.iter().map( String::as_str ).collect();
        let ( dir, paths ) = fixture( &refs );
        let mut playlist = Playlist::new();
        assert_eq!( playlist.add( &paths ), n );
        ( dir, playlist, paths )
    }


    #[test]
    fn test_add_counts_only_valid() {
        let ( dir, paths ) = fixture( &[ "one.mp3", "two.txt", "three.FLAC" ] );
        let missing = dir.path().join( "missing.ogg" );

        let mut playlist = Playlist::new();
        let input = vec![ paths[ 0 ].clone(), paths[ 1 ].clone(), missing, paths[ 2 ].clone() ];
        assert_eq!( playlist.add( &input ), 2 );
        assert_eq!( playlist.tracks(), &[ paths[ 0 ].clone(), paths[ 2 ].clone() ] );
    }


    #[test]
    fn test_add_allows_duplicates() {
        let ( _dir, paths ) = fixture( &[ "a.wav" ] );
        let mut playlist = Playlist::new();
        assert_eq!( playlist.add( [ &paths[ 0 ], &paths[ 0 ] ] ), 2 );
        assert_eq!( playlist.len(), 2 );
    }


    #[test]
    fn test_next_wraps() {
        let ( _dir, mut playlist, _ ) = filled( 3 );
        playlist.select( 3 );
        playlist.next();
        assert_eq!( playlist.cursor(), 0 );
    }


    #[test]
    fn test_previous_wraps() {
        let ( _dir, mut playlist, _ ) = filled( 3 );
        assert_eq!( playlist.cursor(), 0 );
        playlist.previous();
        assert_eq!( playlist.cursor(), 2 );
    }


    #[test]
    fn test_navigation_noop_when_empty() {
        let mut playlist = Playlist::new();
        playlist.next();
        playlist.previous();
        assert_eq!( playlist.cursor(), 0 );
        assert!( playlist.current().is_none() );
    }


    #[test]
    fn test_remove_before_cursor_shifts() {
        let ( _dir, mut playlist, paths ) = filled( 4 );
        playlist.select( 3 );
        let removed = playlist.remove( 1 ).unwrap();
        assert_eq!( removed.effect, CursorEffect::Shifted );
        assert_eq!( playlist.cursor(), 1 );
        assert_eq!( playlist.current(), Some( &paths[ 2 ] ) );
    }


    #[test]
    fn test_remove_cursor_resets() {
        let ( _dir, mut playlist, _ ) = filled( 4 );
        playlist.select( 3 );
        let removed = playlist.remove( 3 ).unwrap();
        assert_eq!( removed.effect, CursorEffect::Reset );
        assert_eq!( playlist.cursor(), 0 );
    }


    #[test]
    fn test_remove_after_cursor_unchanged() {
        let ( _dir, mut playlist, _ ) = filled( 4 );
        playlist.select( 2 );
        let removed = playlist.remove( 4 ).unwrap();
        assert_eq!( removed.effect, CursorEffect::Unchanged );
        assert_eq!( playlist.cursor(), 1 );
    }


    #[test]
    fn test_remove_out_of_range() {
        let ( _dir, mut playlist, _ ) = filled( 2 );
        assert_eq!( playlist.remove( 0 ), Err( PlaylistError::OutOfRange { index: 0, len: 2 } ) );
        assert_eq!( playlist.remove( 3 ), Err( PlaylistError::OutOfRange { index: 3, len: 2 } ) );
        assert_eq!( playlist.len(), 2 );
    }


    #[test]
    fn test_clear_keeps_cursor() {
        let ( _dir, mut playlist, _ ) = filled( 3 );
        playlist.select( 2 );
        playlist.clear();
        assert!( playlist.is_empty() );
        assert_eq!( playlist.cursor(), 1 );
        assert!( playlist.current().is_none() );
    }


    #[test]
    fn test_select_out_of_range_parks_past_end() {
        let ( _dir, mut playlist, _ ) = filled( 2 );
        playlist.select( 9 );
        assert_eq!( playlist.cursor(), 2 );
        assert!( playlist.current().is_none() );
        playlist.select( 0 );
        assert_eq!( playlist.cursor(), 2 );
    }
}
