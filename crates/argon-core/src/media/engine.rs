//! The shipped media backend
//!
//! Each opened track gets its own output stream and decode thread. The
//! thread decodes ahead into the stream's sample queue, resampling when the
//! device runs at a different rate, and fires the track's end-of-stream
//! handler once the last sample has been played.

use std::path::Path;
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Arc, Mutex };
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };

use super::output::{ OutputStream, SampleQueue };
use super::source::AudioSource;
use super::{ AudioFormat, EndOfStream, MediaBackend, MediaError, MediaHandle, TrackTags };


/// Backend decoding with Symphonia and playing through the default cpal
/// output device.
#[derive( Debug, Default )]
pub struct SymphoniaBackend;


impl SymphoniaBackend {
    pub fn new() -> Self {
        Self
    }
}


impl MediaBackend for SymphoniaBackend {
    fn open( &self, path: &Path, on_end: EndOfStream ) -> Result<Box<dyn MediaHandle>, MediaError> {
        let source = AudioSource::open( path )?;
        let source_rate = source.sample_rate();
        let channels = source.channels();

        let ( output, queue ) = OutputStream::open( source_rate, channels as u16 )?;
        output.start()?;

        let resampler = if output.sample_rate() != source_rate {
            tracing::info!( "Resampling: {} Hz -> {} Hz", source_rate, output.sample_rate() );
            Some( Resampling::new( source_rate, output.sample_rate(), channels )? )
        } else {
            None
        };

        let shared = Arc::new( Shared {
            queue,
            halt: AtomicBool::new( false ),
            decoded_frames: AtomicU64::new( 0 ),
            pending_seek: Mutex::new( None ),
        });

        let duration = source.duration();
        let tags = source.tags().clone();
        let format = source.format();
        let id = on_end.id();

        let thread_shared = Arc::clone( &shared );
        let thread = thread::Builder::new()
            .name( format!( "argon-decode-{}", id ) )
            .spawn( move || decode_loop( source, thread_shared, resampler, on_end ) )
            .map_err( |e| MediaError::Output( format!( "Failed to start decode thread: {}", e ) ) )?;

        Ok( Box::new( StreamHandle {
            shared,
            thread: Some( thread ),
            output,
            source_rate,
            duration,
            tags,
            format,
        }))
    }
}


/// State shared between a handle and its decode thread.
struct Shared {
    queue: Arc<SampleQueue>,
    halt: AtomicBool,
    /// Source frames decoded since the start (or the last seek target).
    decoded_frames: AtomicU64,
    pending_seek: Mutex<Option<Duration>>,
}


impl Shared {
    fn halted( &self ) -> bool {
        self.halt.load( Ordering::Relaxed )
    }


    fn take_seek( &self ) -> Option<Duration> {
        self.pending_seek.lock().ok().and_then( |mut slot| slot.take() )
    }


    fn seek_pending( &self ) -> bool {
        self.pending_seek.lock().map( |slot| slot.is_some() ).unwrap_or( false )
    }
}


/// A playing (or paused) track on the default device.
struct StreamHandle {
    shared: Arc<Shared>,
    thread: Option<thread::JoinHandle<()>>,
    output: OutputStream,
    source_rate: u32,
    duration: Option<Duration>,
    tags: TrackTags,
    format: AudioFormat,
}


impl MediaHandle for StreamHandle {
    fn play( &mut self ) -> Result<(), MediaError> {
        self.shared.queue.set_paused( false );
        Ok(())
    }


    fn pause( &mut self ) -> Result<(), MediaError> {
        self.shared.queue.set_paused( true );
        Ok(())
    }


    fn seek( &mut self, position: Duration ) -> Result<(), MediaError> {
        let position = match self.duration {
            Some( total ) => position.min( total ),
            None => position,
        };
        let mut slot = self.shared.pending_seek
            .lock()
            .map_err( |_| MediaError::Seek( "decode thread failed".into() ) )?;
        *slot = Some( position );
        tracing::info!( "Seek requested: {:?}", position );
        Ok(())
    }


    fn position( &self ) -> Duration {
        let decoded = self.shared.decoded_frames.load( Ordering::Relaxed ) as f64
            / self.source_rate as f64;
        // Samples still queued were decoded but not yet heard.
        let queued = self.shared.queue.len() as f64
            / ( self.shared.queue.source_channels() as f64 * self.output.sample_rate() as f64 );
        Duration::from_secs_f64( ( decoded - queued ).max( 0.0 ) )
    }


    fn duration( &self ) -> Option<Duration> {
        self.duration
    }


    fn tags( &self ) -> Option<TrackTags> {
        Some( self.tags.clone() ).filter( |tags| !tags.is_empty() )
    }


    fn format( &self ) -> Option<AudioFormat> {
        Some( self.format )
    }
}


impl Drop for StreamHandle {
    fn drop( &mut self ) {
        self.shared.halt.store( true, Ordering::Relaxed );
        self.shared.queue.set_paused( true );
        self.shared.queue.clear();

        if let Some( thread ) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!( "Decode thread panicked" );
            }
        }
        // The output stream closes when `output` drops after this.
    }
}


/// How the wait at the end of a stream ended.
enum Drain {
    Finished,
    Halted,
    Seeking,
}


fn decode_loop(
    mut source: AudioSource,
    shared: Arc<Shared>,
    mut resampler: Option<Resampling>,
    on_end: EndOfStream,
) {
    let channels = source.channels();
    // Keep roughly 50ms decoded ahead of the device.
    let high_water = ( source.sample_rate() as usize * channels ) / 20;

    loop {
        if shared.halted() {
            break;
        }

        if let Some( position ) = shared.take_seek() {
            match source.seek( position ) {
                Ok(()) => {
                    shared.queue.clear();
                    let frames = ( position.as_secs_f64() * source.sample_rate() as f64 ) as u64;
                    shared.decoded_frames.store( frames, Ordering::Relaxed );
                    if let Some( r ) = resampler.as_mut() {
                        r.discard();
                    }
                }
                Err( e ) => tracing::warn!( "{}", e ),
            }
        }

        if shared.queue.is_paused() || shared.queue.len() > high_water {
            thread::sleep( Duration::from_millis( 5 ) );
            continue;
        }

        match source.next_chunk() {
            Ok( Some( samples ) ) => {
                shared.decoded_frames.fetch_add( ( samples.len() / channels ) as u64, Ordering::Relaxed );
                match resampler.as_mut() {
                    Some( r ) => push_all( &shared, &r.process( &samples ) ),
                    None => push_all( &shared, &samples ),
                }
            }
            Ok( None ) => {
                if let Some( r ) = resampler.as_mut() {
                    push_all( &shared, &r.flush() );
                }
                match wait_for_drain( &shared ) {
                    Drain::Finished => {
                        tracing::info!( "Reached end of stream for media {}", on_end.id() );
                        on_end.fire();
                        break;
                    }
                    Drain::Halted => break,
                    Drain::Seeking => continue,
                }
            }
            Err( e ) => {
                // An unreadable track counts as finished so playback moves on.
                tracing::error!( "Decode error: {}", e );
                on_end.fire();
                break;
            }
        }
    }

    tracing::debug!( "Decode loop for media {} exiting", on_end.id() );
}


/// Pushes every sample, waiting for room. Gives up on halt or seek.
fn push_all( shared: &Shared, samples: &[f32] ) {
    let mut offset = 0;
    while offset < samples.len() && !shared.halted() && !shared.seek_pending() {
        let pushed = shared.queue.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
}


fn wait_for_drain( shared: &Shared ) -> Drain {
    loop {
        if shared.halted() {
            return Drain::Halted;
        }
        if shared.seek_pending() {
            return Drain::Seeking;
        }
        if shared.queue.is_empty() {
            return Drain::Finished;
        }
        thread::sleep( Duration::from_millis( 10 ) );
    }
}


/// Rate conversion on interleaved samples.
struct Resampling {
    inner: FastFixedOut<f32>,
    /// Planar input waiting for a full chunk.
    pending: Vec<Vec<f32>>,
}


impl Resampling {
    fn new( from: u32, to: u32, channels: usize ) -> Result<Self, MediaError> {
        let inner = FastFixedOut::<f32>::new(
            to as f64 / from as f64,
            2.0,
            PolynomialDegree::Cubic,
            1024,
            channels,
        ).map_err( |e| MediaError::Output( format!( "Failed to create resampler: {}", e ) ) )?;

        Ok( Self {
            inner,
            pending: vec![ Vec::new(); channels ],
        })
    }


    fn process( &mut self, interleaved: &[f32] ) -> Vec<f32> {
        let channels = self.pending.len();
        for frame in interleaved.chunks_exact( channels ) {
            for ( lane, sample ) in self.pending.iter_mut().zip( frame ) {
                lane.push( *sample );
            }
        }

        let mut out = Vec::new();
        while self.pending[ 0 ].len() >= self.inner.input_frames_next() {
            let needed = self.inner.input_frames_next();
            let chunk: Vec<Vec<f32>> = self.pending
                .iter_mut()
                .map( |lane| lane.drain( ..needed ).collect() )
                .collect();

            match self.inner.process( &chunk, None ) {
                Ok( resampled ) => interleave_into( &resampled, &mut out ),
                Err( e ) => {
                    tracing::error!( "Resample error: {}", e );
                    break;
                }
            }
        }
        out
    }


    /// Resamples whatever is left at the end of the stream.
    fn flush( &mut self ) -> Vec<f32> {
        let mut out = Vec::new();
        if self.pending[ 0 ].is_empty() {
            return out;
        }
        match self.inner.process_partial( Some( self.pending.as_slice() ), None ) {
            Ok( resampled ) => interleave_into( &resampled, &mut out ),
            Err( e ) => tracing::error!( "Final resample error: {}", e ),
        }
        self.discard();
        out
    }


    fn discard( &mut self ) {
        self.pending.iter_mut().for_each( Vec::clear );
    }
}


/// Appends planar channels to `out` as interleaved frames.
fn interleave_into( planar: &[Vec<f32>], out: &mut Vec<f32> ) {
    let Some( frames ) = planar.first().map( Vec::len ) else { return };
    out.reserve( frames * planar.len() );
    for f in 0..frames {
        out.extend( planar.iter().map( |lane| lane[ f ] ) );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_interleave_into() {
        let mut out = vec![ 9.0 ];
        interleave_into( &[ vec![ 1.0, 2.0 ], vec![ 3.0, 4.0 ] ], &mut out );
        assert_eq!( out, vec![ 9.0, 1.0, 3.0, 2.0, 4.0 ] );
    }


    #[test]
    fn test_interleave_empty() {
        let mut out = Vec::new();
        interleave_into( &[], &mut out );
        assert!( out.is_empty() );
    }


    #[test]
    fn test_resampling_changes_length() {
        let mut resampling = Resampling::new( 22_050, 44_100, 2 ).unwrap();
        let input = vec![ 0.0f32; 2 * 4096 ];
        let mut produced = resampling.process( &input ).len();
        produced += resampling.flush().len();
        assert!( produced > input.len() );
        assert_eq!( produced % 2, 0 );
    }


    #[test]
    fn test_drain_reports_seek_and_halt() {
        let shared = Shared {
            queue: Arc::new( SampleQueue::new( 8, 1, 1 ) ),
            halt: AtomicBool::new( false ),
            decoded_frames: AtomicU64::new( 0 ),
            pending_seek: Mutex::new( None ),
        };
        assert!( matches!( wait_for_drain( &shared ), Drain::Finished ) );

        *shared.pending_seek.lock().unwrap() = Some( Duration::from_secs( 1 ) );
        assert!( matches!( wait_for_drain( &shared ), Drain::Seeking ) );

        shared.halt.store( true, Ordering::Relaxed );
        assert!( matches!( wait_for_drain( &shared ), Drain::Halted ) );
    }
}
