//! In-memory backend for exercising the player without audio hardware.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{ Path, PathBuf };
use std::rc::Rc;
use std::time::Duration;

use super::{ AudioFormat, EndOfStream, MediaBackend, MediaError, MediaHandle, MediaId, TrackTags };


/// Something the player asked of the backend.
#[derive( Debug, Clone, PartialEq )]
pub enum Call {
    Open( MediaId, PathBuf ),
    Play( MediaId ),
    Pause( MediaId ),
    Seek( MediaId, Duration ),
    Release( MediaId ),
}


#[derive( Default )]
struct Journal {
    calls: Vec<Call>,
    handlers: Vec<EndOfStream>,
    unopenable: HashSet<PathBuf>,
}


/// Backend whose handles only record what was done to them. Clones share
/// one journal, so a test keeps a clone after handing one to the player.
#[derive( Clone, Default )]
pub struct FakeBackend {
    journal: Rc<RefCell<Journal>>,
}


impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }


    /// Makes future opens of `path` fail.
    pub fn refuse( &self, path: &Path ) {
        self.journal.borrow_mut().unopenable.insert( path.to_path_buf() );
    }


    pub fn calls( &self ) -> Vec<Call> {
        self.journal.borrow().calls.clone()
    }


    pub fn opened( &self ) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map( |call| match call {
                Call::Open( _, path ) => Some( path ),
                _ => None,
            })
            .collect()
    }


    /// Id of the most recently opened handle.
    pub fn last_id( &self ) -> Option<MediaId> {
        self.journal.borrow().handlers.last().map( EndOfStream::id )
    }


    /// Fires the end-of-stream handler registered for `id`.
    pub fn finish( &self, id: MediaId ) {
        let journal = self.journal.borrow();
        let handler = journal.handlers.iter().find( |h| h.id() == id );
        handler.expect( "no handle with that id" ).fire();
    }
}


impl MediaBackend for FakeBackend {
    fn open( &self, path: &Path, on_end: EndOfStream ) -> Result<Box<dyn MediaHandle>, MediaError> {
        let mut journal = self.journal.borrow_mut();
        if journal.unopenable.contains( path ) {
            return Err( MediaError::UnsupportedFormat );
        }

        let id = on_end.id();
        journal.calls.push( Call::Open( id, path.to_path_buf() ) );
        journal.handlers.push( on_end );

        Ok( Box::new( FakeHandle {
            id,
            journal: Rc::clone( &self.journal ),
            position: Duration::ZERO,
        }))
    }
}


struct FakeHandle {
    id: MediaId,
    journal: Rc<RefCell<Journal>>,
    position: Duration,
}


impl FakeHandle {
    fn record( &self, call: Call ) {
        self.journal.borrow_mut().calls.push( call );
    }
}


impl MediaHandle for FakeHandle {
    fn play( &mut self ) -> Result<(), MediaError> {
        self.record( Call::Play( self.id ) );
        Ok(())
    }


    fn pause( &mut self ) -> Result<(), MediaError> {
        self.record( Call::Pause( self.id ) );
        Ok(())
    }


    fn seek( &mut self, position: Duration ) -> Result<(), MediaError> {
        self.position = position;
        self.record( Call::Seek( self.id, position ) );
        Ok(())
    }


    fn position( &self ) -> Duration {
        self.position
    }


    fn duration( &self ) -> Option<Duration> {
        Some( Duration::from_secs( 180 ) )
    }


    fn tags( &self ) -> Option<TrackTags> {
        Some( TrackTags {
            title: Some( format!( "Track {}", self.id ) ),
            ..TrackTags::default()
        })
    }


    fn format( &self ) -> Option<AudioFormat> {
        None
    }
}


impl Drop for FakeHandle {
    fn drop( &mut self ) {
        self.record( Call::Release( self.id ) );
    }
}
