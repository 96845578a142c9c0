//! Command line parsing and key shortcuts.
//!
//! Lines typed after the input trigger are split on whitespace; the first
//! token names the command (case-sensitive, long or short form) and the
//! rest are its arguments. Single keys outside line mode map to a
//! [`Shortcut`].

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::library::LibraryError;
use crate::player::PlayerError;
use crate::playlist::PlaylistError;


/// Key that switches the input loop into line mode.
pub const INPUT_TRIGGER: char = ':';


/// Errors that can occur during command parsing or execution.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),

    #[error( transparent )]
    Playback( #[from] PlayerError ),

    #[error( transparent )]
    Playlist( #[from] PlaylistError ),

    #[error( transparent )]
    Library( #[from] LibraryError ),

    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),
}


impl CommandError {
    /// Returns true if the line itself was malformed, as opposed to a
    /// well-formed command that failed to run.
    pub fn is_parse_error( &self ) -> bool {
        matches!( self, CommandError::InvalidArgument( _ ) | CommandError::MissingArgument( _ ) )
    }
}


/// What the main panel shows.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum UiMode {
    #[default]
    Help,
    Details,
}


impl UiMode {
    pub const ALL: [UiMode; 2] = [ UiMode::Help, UiMode::Details ];


    /// Upper-case label for panel headers.
    pub fn label( &self ) -> &'static str {
        match self {
            UiMode::Help => "HELP",
            UiMode::Details => "DETAILS",
        }
    }
}


impl FromStr for UiMode {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s {
            "help" => Ok( UiMode::Help ),
            "details" => Ok( UiMode::Details ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid mode: '{}'. Use 'help' or 'details'", s )
            )),
        }
    }
}


/// Argument form of `play`.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum PlayTarget {
    /// No argument: play/pause the current track.
    Toggle,
    /// 1-based playlist position.
    Index( usize ),
    /// A file outside (or inside) the playlist.
    File( PathBuf ),
}


/// Argument form of `add`.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum AddTarget {
    Paths( Vec<PathBuf> ),
    WorkingDir,
}


/// Argument form of `remove`.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum RemoveTarget {
    /// 1-based positions, in the order given.
    Indices( Vec<usize> ),
    All,
}


/// Parsed command line.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Command {
    Help,
    Refresh,
    Quit,
    Play( PlayTarget ),
    Stop,
    Add( AddTarget ),
    Remove( RemoveTarget ),
    Mode( UiMode ),
}


impl Command {
    /// Parses a command line (without the input trigger).
    ///
    /// @param input - The raw line as typed
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let mut tokens = input.split_whitespace();
        let name = tokens.next().unwrap_or( "" );
        let args: Vec<&str> = tokens.collect();

        match name {
            "help" | "h" => Ok( Command::Help ),
            "refresh" | "rf" => Ok( Command::Refresh ),
            "quit" | "q" => Ok( Command::Quit ),
            "stop" | "s" => Ok( Command::Stop ),

            "play" | "p" => parse_play( &args ).map( Command::Play ),

            "add" | "a" => {
                if args.contains( &"-dir" ) {
                    Ok( Command::Add( AddTarget::WorkingDir ) )
                } else if args.is_empty() {
                    Err( CommandError::MissingArgument( "path".into() ) )
                } else {
                    let paths = args.iter().map( PathBuf::from ).collect();
                    Ok( Command::Add( AddTarget::Paths( paths ) ) )
                }
            }

            "remove" | "r" => {
                if args.iter().any( |a| *a == "-all" || *a == "-a" ) {
                    return Ok( Command::Remove( RemoveTarget::All ) );
                }
                if args.is_empty() {
                    return Err( CommandError::MissingArgument( "playlist index".into() ) );
                }
                let indices = args
                    .iter()
                    .map( |a| parse_index( a ) )
                    .collect::<Result<Vec<_>, _>>()?;
                Ok( Command::Remove( RemoveTarget::Indices( indices ) ) )
            }

            "mode" | "m" => {
                let mode = args
                    .first()
                    .ok_or_else( || CommandError::MissingArgument( "mode".into() ) )?;
                Ok( Command::Mode( mode.parse()? ) )
            }

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


fn parse_play( args: &[&str] ) -> Result<PlayTarget, CommandError> {
    if let Some( flag ) = args.iter().position( |a| *a == "-f" || *a == "-file" ) {
        let path = args
            .get( flag + 1 )
            .ok_or_else( || CommandError::MissingArgument( "file path".into() ) )?;
        return Ok( PlayTarget::File( PathBuf::from( path ) ) );
    }

    match args.first() {
        Some( index ) => parse_index( index ).map( PlayTarget::Index ),
        None => Ok( PlayTarget::Toggle ),
    }
}


fn parse_index( s: &str ) -> Result<usize, CommandError> {
    s.parse()
        .map_err( |_| CommandError::InvalidArgument( format!( "Not a playlist index: {}", s ) ) )
}


/// Single-key actions available outside line mode.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Shortcut {
    TogglePlay,
    Stop,
    SelectNext,
    PlayNext,
    SelectPrevious,
    PlayPrevious,
}


impl Shortcut {
    /// Maps a typed character to its shortcut. Enter arrives as `'\n'`.
    pub fn from_key( key: char ) -> Option<Self> {
        match key {
            ' ' | 'p' | '\n' => Some( Shortcut::TogglePlay ),
            's' => Some( Shortcut::Stop ),
            'n' => Some( Shortcut::SelectNext ),
            'N' => Some( Shortcut::PlayNext ),
            'b' => Some( Shortcut::SelectPrevious ),
            'B' => Some( Shortcut::PlayPrevious ),
            _ => None,
        }
    }
}


/// Returns help text listing all available commands, one line each.
pub fn help_text() -> &'static [&'static str] {
    &[
        "help|h                  Show a short usage hint",
        "refresh|rf              Redraw the screen",
        "quit|q                  Exit argon",
        "play|p                  Play/pause the current track",
        "play|p <n>              Play playlist item n",
        "play|p -f|-file <path>  Play a file",
        "stop|s                  Stop playback",
        "add|a <path>...         Add files to the playlist",
        "add|a -dir              Add every track in the working directory",
        "remove|r <n>...         Remove playlist items",
        "remove|r -all|-a        Clear the playlist",
        "mode|m help|details     Switch this panel",
        "",
        "Quick controls: p|spacebar:play/pause s:stop b:previous n:next",
        "                B:play previous N:play next  ':' enters a command",
    ]
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_simple_commands() {
        assert_eq!( Command::parse( "help" ).unwrap(), Command::Help );
        assert_eq!( Command::parse( "rf" ).unwrap(), Command::Refresh );
        assert_eq!( Command::parse( "  q  " ).unwrap(), Command::Quit );
        assert_eq!( Command::parse( "s" ).unwrap(), Command::Stop );
    }


    #[test]
    fn test_parse_is_case_sensitive() {
        assert!( matches!( Command::parse( "Quit" ), Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_play_forms() {
        assert_eq!( Command::parse( "play" ).unwrap(), Command::Play( PlayTarget::Toggle ) );
        assert_eq!( Command::parse( "p 3" ).unwrap(), Command::Play( PlayTarget::Index( 3 ) ) );
        assert_eq!(
            Command::parse( "p -f song.mp3" ).unwrap(),
            Command::Play( PlayTarget::File( PathBuf::from( "song.mp3" ) ) )
        );
        assert_eq!(
            Command::parse( "play -file /music/a.flac" ).unwrap(),
            Command::Play( PlayTarget::File( PathBuf::from( "/music/a.flac" ) ) )
        );
    }


    #[test]
    fn test_parse_play_bad_index() {
        let err = Command::parse( "play three" ).unwrap_err();
        assert!( matches!( err, CommandError::InvalidArgument( _ ) ) );
        assert!( err.is_parse_error() );
    }


    #[test]
    fn test_parse_play_file_missing_path() {
        let err = Command::parse( "p -f" ).unwrap_err();
        assert!( matches!( err, CommandError::MissingArgument( _ ) ) );
    }


    #[test]
    fn test_parse_add() {
        assert_eq!(
            Command::parse( "add a.mp3 b.ogg" ).unwrap(),
            Command::Add( AddTarget::Paths( vec![ PathBuf::from( "a.mp3" ), PathBuf::from( "b.ogg" ) ] ) )
        );
        assert_eq!( Command::parse( "a -dir" ).unwrap(), Command::Add( AddTarget::WorkingDir ) );
        assert!( matches!( Command::parse( "add" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_remove() {
        assert_eq!(
            Command::parse( "r 3 1" ).unwrap(),
            Command::Remove( RemoveTarget::Indices( vec![ 3, 1 ] ) )
        );
        assert_eq!( Command::parse( "remove -all" ).unwrap(), Command::Remove( RemoveTarget::All ) );
        assert_eq!( Command::parse( "r -a" ).unwrap(), Command::Remove( RemoveTarget::All ) );
        assert!( Command::parse( "r 1 x" ).unwrap_err().is_parse_error() );
    }


    #[test]
    fn test_parse_mode() {
        assert_eq!( Command::parse( "mode details" ).unwrap(), Command::Mode( UiMode::Details ) );
        assert_eq!( Command::parse( "m help" ).unwrap(), Command::Mode( UiMode::Help ) );
        assert!( Command::parse( "m loud" ).unwrap_err().is_parse_error() );
        assert!( Command::parse( "mode" ).unwrap_err().is_parse_error() );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
        assert!( !result.unwrap_err().is_parse_error() );
    }


    #[test]
    fn test_shortcut_keys() {
        assert_eq!( Shortcut::from_key( ' ' ), Some( Shortcut::TogglePlay ) );
        assert_eq!( Shortcut::from_key( '\n' ), Some( Shortcut::TogglePlay ) );
        assert_eq!( Shortcut::from_key( 'N' ), Some( Shortcut::PlayNext ) );
        assert_eq!( Shortcut::from_key( 'b' ), Some( Shortcut::SelectPrevious ) );
        assert_eq!( Shortcut::from_key( INPUT_TRIGGER ), None );
        assert_eq!( Shortcut::from_key( 'x' ), None );
    }
}
