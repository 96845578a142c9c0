//! Command-line argument parsing for Argon.

use std::path::PathBuf;

use clap::Parser;


/// Argon - A light-weight terminal music player.
#[derive( Parser, Debug )]
#[command( name = "argon" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Skip the welcome splash.
    #[arg( long )]
    pub no_splash: bool,

    /// Start playing the first playlist track.
    #[arg( long )]
    pub play: bool,

    /// Directory for log files. Defaults to the user data directory.
    #[arg( long, value_name = "DIR" )]
    pub log_dir: Option<PathBuf>,

    /// Files or directories to add to the playlist on startup.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_flags_and_files() {
        let args = Args::try_parse_from([ "argon", "--no-splash", "--play", "a.mp3", "music" ]).unwrap();
        assert!( args.no_splash );
        assert!( args.play );
        assert_eq!( args.files, vec![ PathBuf::from( "a.mp3" ), PathBuf::from( "music" ) ] );
        assert!( args.log_dir.is_none() );
    }


    #[test]
    fn test_parse_log_dir() {
        let args = Args::try_parse_from([ "argon", "--log-dir", "/tmp/argon" ]).unwrap();
        assert_eq!( args.log_dir, Some( PathBuf::from( "/tmp/argon" ) ) );
        assert!( args.files.is_empty() );
    }
}
