//! Command execution against the player.
//!
//! A [`Session`] owns everything the input loop mutates: the player (and
//! with it the playlist) and the main-panel mode. Every line command and
//! shortcut funnels through here so the loop only deals in replies.

use std::path::{ Path, PathBuf };

use crate::command::{ AddTarget, Command, CommandError, PlayTarget, RemoveTarget, Shortcut, UiMode };
use crate::library;
use crate::player::{ PlaybackState, Player, PlayerError };
use crate::playlist::PlaylistError;


/// Outcome of a command, for the input loop to act on.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct Reply {
    /// Status line text, if any.
    pub message: Option<String>,
    /// Wipe and fully redraw the screen.
    pub redraw: bool,
    /// Leave the input loop.
    pub quit: bool,
}


impl Reply {
    fn message( text: impl Into<String> ) -> Self {
        Self { message: Some( text.into() ), ..Self::default() }
    }
}


/// Player plus UI mode, driven by the input loop.
pub struct Session {
    player: Player,
    mode: UiMode,
}


impl Session {
    pub fn new( player: Player ) -> Self {
        Self {
            player,
            mode: UiMode::default(),
        }
    }


    pub fn player( &self ) -> &Player {
        &self.player
    }


    pub fn player_mut( &mut self ) -> &mut Player {
        &mut self.player
    }


    pub fn mode( &self ) -> UiMode {
        self.mode
    }


    /// Parses and runs one command line. A blank line does nothing.
    pub fn execute_line( &mut self, line: &str ) -> Result<Reply, CommandError> {
        if line.trim().is_empty() {
            return Ok( Reply::default() );
        }
        let command = Command::parse( line )?;
        self.run( command )
    }


    /// Runs a parsed command.
    pub fn run( &mut self, command: Command ) -> Result<Reply, CommandError> {
        tracing::debug!( "Running {:?}", command );

        match command {
            Command::Help => Ok( Reply::message(
                "For detailed help, type ':' to enter input mode and type 'mode help'"
            )),

            Command::Refresh => Ok( Reply { redraw: true, ..Reply::default() } ),

            Command::Quit => Ok( Reply { quit: true, ..Reply::default() } ),

            Command::Play( PlayTarget::Toggle ) => {
                self.player.toggle()?;
                Ok( Reply::message( "Playing/pausing current track" ) )
            }

            Command::Play( PlayTarget::Index( n ) ) => {
                let len = self.player.playlist().len();
                if !self.player.playlist().contains_position( n ) {
                    return Err( PlaylistError::OutOfRange { index: n, len }.into() );
                }
                self.player.play_index( n )?;
                Ok( Reply::message( format!( "Playing playlist item {}", n ) ) )
            }

            Command::Play( PlayTarget::File( path ) ) => {
                self.player.play( &path )?;
                Ok( Reply::message( format!( "Playing file {}", path.display() ) ) )
            }

            Command::Stop => {
                self.player.stop();
                Ok( Reply::message( "Stopped current track" ) )
            }

            Command::Add( AddTarget::Paths( paths ) ) => {
                let count = self.player.add( &paths );
                Ok( Reply::message( format!(
                    "Added {} file(s) to playlist: {}",
                    count,
                    join_paths( &paths )
                )))
            }

            Command::Add( AddTarget::WorkingDir ) => {
                let dir = std::env::current_dir()?;
                let count = self.add_directory( &dir )?;
                Ok( Reply::message( format!(
                    "Added {} file(s) from directory: {}",
                    count,
                    dir.display()
                )))
            }

            Command::Remove( RemoveTarget::All ) => {
                self.player.clear();
                Ok( Reply::message( "Playlist cleared" ) )
            }

            Command::Remove( RemoveTarget::Indices( indices ) ) => {
                self.player.remove( &indices )?;
                let listed: Vec<String> = indices.iter().map( usize::to_string ).collect();
                Ok( Reply::message( format!( "Removed from playlist: {}", listed.join( " " ) ) ) )
            }

            Command::Mode( mode ) => {
                self.mode = mode;
                Ok( Reply::message( format!( "Changed mode to {}", mode.label().to_lowercase() ) ) )
            }
        }
    }


    /// Adds the playable files directly inside `dir`.
    ///
    /// @returns The number of tracks added
    pub fn add_directory( &mut self, dir: &Path ) -> Result<usize, CommandError> {
        let files = library::list_directory( dir )?;
        Ok( self.player.add( &files ) )
    }


    /// Adds startup paths: files as given, directories by their contents.
    /// Unreadable directories are logged and skipped.
    pub fn add_startup_paths( &mut self, paths: &[PathBuf] ) -> usize {
        let mut added = 0;
        for path in paths {
            if path.is_dir() {
                match self.add_directory( path ) {
                    Ok( count ) => added += count,
                    Err( e ) => tracing::warn!( "Skipping {:?}: {}", path, e ),
                }
            } else {
                added += self.player.add( [ path ] );
            }
        }
        added
    }


    /// Runs a single-key action. Shortcuts report no message.
    pub fn shortcut( &mut self, shortcut: Shortcut ) -> Result<(), PlayerError> {
        tracing::debug!( "Shortcut {:?}", shortcut );

        match shortcut {
            Shortcut::TogglePlay => self.player.toggle(),
            Shortcut::Stop => {
                self.player.stop();
                Ok(())
            }
            Shortcut::SelectNext => {
                self.player.select_next();
                Ok(())
            }
            Shortcut::SelectPrevious => {
                self.player.select_previous();
                Ok(())
            }
            Shortcut::PlayNext => self.player.skip_next().map( |_| () ),
            Shortcut::PlayPrevious => self.player.skip_previous().map( |_| () ),
        }
    }


    /// Applies pending media events. See [`Player::pump_events`].
    pub fn pump_events( &mut self ) -> Result<usize, PlayerError> {
        self.player.pump_events()
    }


    pub fn state( &self ) -> PlaybackState {
        self.player.state()
    }
}


fn join_paths( paths: &[PathBuf] ) -> String {
    paths
        .iter()
        .map( |p| p.display().to_string() )
        .collect::<Vec<_>>()
        .join( " " )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    use crate::media::testing::FakeBackend;


    fn session_with( names: &[&str] ) -> ( TempDir, FakeBackend, Session, Vec<PathBuf> ) {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = names
            .iter()
            .map( |name| {
                let path = dir.path().join( name );
                fs::write( &path, b"x" ).unwrap();
                path
            })
            .collect();

        let backend = FakeBackend::new();
        let session = Session::new( Player::new( Box::new( backend.clone() ) ) );
        ( dir, backend, session, paths )
    }


    fn line_for( paths: &[PathBuf] ) -> String {
        format!( "add {}", join_paths( paths ) )
    }


    #[test]
    fn test_add_reports_only_valid_files() {
        let ( dir, _backend, mut session, mut paths ) = session_with( &[ "a.mp3", "b.txt", "c.FLAC" ] );
        paths.push( dir.path().join( "missing.mp3" ) );

        let reply = session.execute_line( &line_for( &paths ) ).unwrap();
        let message = reply.message.unwrap();
        assert!( message.starts_with( "Added 2 file(s) to playlist:" ), "{}", message );
        assert_eq!( session.player().playlist().tracks(), &[ paths[ 0 ].clone(), paths[ 2 ].clone() ] );
    }


    #[test]
    fn test_unknown_command_changes_nothing() {
        let ( _dir, backend, mut session, paths ) = session_with( &[ "a.mp3" ] );
        session.execute_line( &line_for( &paths ) ).unwrap();
        session.execute_line( "play 1" ).unwrap();
        let calls_before = backend.calls();

        let err = session.execute_line( "dance 1 2" ).unwrap_err();
        assert!( matches!( err, CommandError::Unknown( _ ) ) );
        assert_eq!( session.state(), PlaybackState::Playing );
        assert_eq!( session.player().playlist().len(), 1 );
        assert_eq!( session.mode(), UiMode::Help );
        assert_eq!( backend.calls(), calls_before );
    }


    #[test]
    fn test_invalid_index_is_parse_error_without_side_effects() {
        let ( _dir, backend, mut session, paths ) = session_with( &[ "a.mp3" ] );
        session.execute_line( &line_for( &paths ) ).unwrap();

        let err = session.execute_line( "p one" ).unwrap_err();
        assert!( err.is_parse_error() );
        assert!( backend.calls().is_empty() );
    }


    #[test]
    fn test_play_index_out_of_range_keeps_current_track() {
        let ( _dir, _backend, mut session, paths ) = session_with( &[ "a.mp3", "b.mp3" ] );
        session.execute_line( &line_for( &paths ) ).unwrap();
        session.execute_line( "p 2" ).unwrap();

        let err = session.execute_line( "p 9" ).unwrap_err();
        assert!( matches!( err, CommandError::Playlist( _ ) ) );
        assert_eq!( session.state(), PlaybackState::Playing );
        assert_eq!( session.player().current_track(), Some( paths[ 1 ].as_path() ) );
    }


    #[test]
    fn test_play_file_outside_playlist() {
        let ( _dir, _backend, mut session, paths ) = session_with( &[ "solo.wav" ] );
        let reply = session.execute_line( &format!( "p -f {}", paths[ 0 ].display() ) ).unwrap();

        assert!( reply.message.unwrap().starts_with( "Playing file " ) );
        assert_eq!( session.player().current_track(), Some( paths[ 0 ].as_path() ) );
        assert!( session.player().playlist().is_empty() );
    }


    #[test]
    fn test_play_file_failure_is_reported() {
        let ( _dir, backend, mut session, paths ) = session_with( &[ "bad.mp3" ] );
        backend.refuse( &paths[ 0 ] );

        let err = session.execute_line( &format!( "p -f {}", paths[ 0 ].display() ) ).unwrap_err();
        assert!( matches!( err, CommandError::Playback( _ ) ) );
        assert_eq!( session.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_remove_and_clear_messages() {
        let ( _dir, _backend, mut session, paths ) = session_with( &[ "1.mp3", "2.mp3", "3.mp3" ] );
        session.execute_line( &line_for( &paths ) ).unwrap();

        let reply = session.execute_line( "r 1 3" ).unwrap();
        assert_eq!( reply.message.as_deref(), Some( "Removed from playlist: 1 3" ) );
        assert_eq!( session.player().playlist().tracks(), &[ paths[ 1 ].clone() ] );

        let reply = session.execute_line( "r -all" ).unwrap();
        assert_eq!( reply.message.as_deref(), Some( "Playlist cleared" ) );
        assert!( session.player().playlist().is_empty() );
    }


    #[test]
    fn test_mode_switch() {
        let ( _dir, _backend, mut session, _paths ) = session_with( &[] );
        let reply = session.execute_line( "m details" ).unwrap();
        assert_eq!( session.mode(), UiMode::Details );
        assert_eq!( reply.message.as_deref(), Some( "Changed mode to details" ) );
    }


    #[test]
    fn test_quit_refresh_and_blank() {
        let ( _dir, _backend, mut session, _paths ) = session_with( &[] );
        assert!( session.execute_line( "q" ).unwrap().quit );
        assert!( session.execute_line( "rf" ).unwrap().redraw );
        assert_eq!( session.execute_line( "   " ).unwrap(), Reply::default() );
    }


    #[test]
    fn test_add_directory_is_sorted_and_filtered() {
        let ( dir, _backend, mut session, paths ) = session_with( &[ "b.ogg", "a.mp3", "notes.md" ] );
        fs::create_dir( dir.path().join( "nested.mp3" ) ).unwrap();

        assert_eq!( session.add_directory( dir.path() ).unwrap(), 2 );
        assert_eq!( session.player().playlist().tracks(), &[ paths[ 1 ].clone(), paths[ 0 ].clone() ] );
    }


    #[test]
    fn test_startup_paths_mix_files_and_dirs() {
        let ( dir, _backend, mut session, paths ) = session_with( &[ "a.mp3", "b.mp3" ] );
        let added = session.add_startup_paths( &[
            paths[ 0 ].clone(),
            dir.path().to_path_buf(),
            dir.path().join( "gone.mp3" ),
        ]);
        assert_eq!( added, 3 );
    }


    #[test]
    fn test_shortcuts_select_and_play() {
        let ( _dir, _backend, mut session, paths ) = session_with( &[ "1.mp3", "2.mp3", "3.mp3" ] );
        session.execute_line( &line_for( &paths ) ).unwrap();

        session.shortcut( Shortcut::SelectPrevious ).unwrap();
        assert_eq!( session.player().playlist().cursor(), 2 );
        assert_eq!( session.state(), PlaybackState::Stopped );

        session.shortcut( Shortcut::PlayNext ).unwrap();
        assert_eq!( session.player().current_track(), Some( paths[ 0 ].as_path() ) );

        session.shortcut( Shortcut::TogglePlay ).unwrap();
        assert_eq!( session.state(), PlaybackState::Paused );

        session.shortcut( Shortcut::Stop ).unwrap();
        assert_eq!( session.state(), PlaybackState::Stopped );
    }
}
