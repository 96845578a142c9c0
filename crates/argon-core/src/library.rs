//! Track validity and directory listing
//!
//! Decides which files count as playable tracks and lists the
//! playable files of a single directory.

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Supported audio file extensions, compared case-insensitively.
pub const SUPPORTED_FORMATS: &[&str] = &[
    "au", "mp2", "mp3", "ogg", "wav", "wma", "flac", "m4a",
];


/// Errors that can occur while listing a directory.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Access denied: {0}" )]
    AccessDenied( PathBuf ),
}


/// Returns true if the path's extension is in [`SUPPORTED_FORMATS`].
///
/// Only the extension is inspected; the file need not exist.
pub fn has_supported_extension( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| {
            let ext = e.trim().to_lowercase();
            SUPPORTED_FORMATS.contains( &ext.as_str() )
        })
        .unwrap_or( false )
}


/// Returns true if the path is an existing regular file with a supported
/// extension.
pub fn is_playable( path: &Path ) -> bool {
    path.is_file() && has_supported_extension( path )
}


/// Lists the playable files directly inside `dir`, sorted by path.
///
/// Subdirectories are not descended into.
pub fn list_directory( dir: &Path ) -> Result<Vec<PathBuf>, LibraryError> {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err( LibraryError::AccessDenied( dir.to_path_buf() ) );
        }
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    let mut tracks: Vec<PathBuf> = entries
        .flatten()
        .map( |entry| entry.path() )
        .filter( |path| is_playable( path ) )
        .collect();
    tracks.sort();

    tracing::debug!( "Listed {} playable file(s) in {:?}", tracks.len(), dir );
    Ok( tracks )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;


    #[test]
    fn test_extension_case_insensitive() {
        assert!( has_supported_extension( Path::new( "song.MP3" ) ) );
        assert!( has_supported_extension( Path::new( "dir/song.Flac" ) ) );
        assert!( has_supported_extension( Path::new( "a.b.m4a" ) ) );
    }


    #[test]
    fn test_extension_rejected() {
        assert!( !has_supported_extension( Path::new( "notes.txt" ) ) );
        assert!( !has_supported_extension( Path::new( "mp3" ) ) );
        assert!( !has_supported_extension( Path::new( ".mp3" ) ) );
        assert!( !has_supported_extension( Path::new( "song.aac" ) ) );
    }


    #[test]
    fn test_playable_requires_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join( "a.ogg" );
        fs::write( &file, b"x" ).unwrap();
        let folder = dir.path().join( "folder.mp3" );
        fs::create_dir( &folder ).unwrap();

        assert!( is_playable( &file ) );
        assert!( !is_playable( &folder ) );
        assert!( !is_playable( &dir.path().join( "missing.wav" ) ) );
    }


    #[test]
    fn test_list_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [ "c.wav", "a.mp3", "readme.md", "b.FLAC" ] {
            fs::write( dir.path().join( name ), b"x" ).unwrap();
        }
        fs::create_dir( dir.path().join( "nested.mp3" ) ).unwrap();

        let listed = list_directory( dir.path() ).unwrap();
        let names: Vec<_> = listed.iter()
            .map( |p| p.file_name().unwrap().to_string_lossy().into_owned() )
            .collect();
        assert_eq!( names, vec![ "a.mp3", "b.FLAC", "c.wav" ] );
    }


    #[test]
    fn test_list_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_directory( &dir.path().join( "gone" ) );
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }
}
