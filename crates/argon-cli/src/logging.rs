//! File logging setup.
//!
//! The terminal belongs to the UI, so log output goes to a daily-rolling
//! file. The `ARGON_LOG` environment variable takes a tracing filter
//! directive (default `info`).

use std::path::{ Path, PathBuf };

use anyhow::{ Context, Result };
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;


/// Environment variable holding the log filter.
pub const FILTER_ENV: &str = "ARGON_LOG";

const LOG_FILE_PREFIX: &str = "argon.log";


/// Resolves the log directory: the explicit one if given, else
/// `<data-local-dir>/argon/logs`.
pub fn log_dir( explicit: Option<&Path> ) -> Option<PathBuf> {
    explicit
        .map( Path::to_path_buf )
        .or_else( || dirs::data_local_dir().map( |d| d.join( "argon" ).join( "logs" ) ) )
}


/// Installs the global subscriber.
///
/// @returns The writer guard, which must live until exit so buffered lines
/// are flushed; `None` when no log directory could be resolved
pub fn init( explicit_dir: Option<&Path> ) -> Result<Option<WorkerGuard>> {
    let Some( dir ) = log_dir( explicit_dir ) else {
        return Ok( None );
    };

    std::fs::create_dir_all( &dir )
        .with_context( || format!( "Failed to create log directory {}", dir.display() ) )?;

    let appender = tracing_appender::rolling::daily( &dir, LOG_FILE_PREFIX );
    let ( writer, guard ) = tracing_appender::non_blocking( appender );

    let filter = EnvFilter::try_from_env( FILTER_ENV )
        .unwrap_or_else( |_| EnvFilter::new( "info" ) );

    tracing_subscriber::fmt()
        .with_writer( writer )
        .with_ansi( false )
        .with_target( true )
        .with_env_filter( filter )
        .try_init()
        .map_err( |e| anyhow::anyhow!( "Failed to install logger: {}", e ) )?;

    tracing::info!( "Logging to {}", dir.display() );
    Ok( Some( guard ) )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_explicit_dir_wins() {
        let dir = log_dir( Some( Path::new( "/var/tmp/argon-logs" ) ) );
        assert_eq!( dir, Some( PathBuf::from( "/var/tmp/argon-logs" ) ) );
    }


    #[test]
    fn test_default_dir_is_under_argon() {
        if let Some( dir ) = log_dir( None ) {
            assert!( dir.ends_with( "argon/logs" ) );
        }
    }
}
