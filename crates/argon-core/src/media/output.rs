//! Audio output via cpal
//!
//! A [`SampleQueue`] is filled by the decode thread and drained by the
//! device callback, which remixes channels to the device layout.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };

use super::MediaError;


/// Bounded sample queue shared between the decode thread and the device
/// callback. Samples are stored interleaved in the source channel layout.
pub struct SampleQueue {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    source_channels: usize,
    output_channels: usize,
}


impl SampleQueue {
    /// Creates a queue that starts paused.
    ///
    /// - `capacity`: maximum number of queued samples
    /// - `source_channels`: channel count of pushed samples
    /// - `output_channels`: channel count the device expects
    pub fn new( capacity: usize, source_channels: usize, output_channels: usize ) -> Self {
        Self {
            samples: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( true ),
            source_channels: source_channels.max( 1 ),
            output_channels: output_channels.max( 1 ),
        }
    }


    fn lock( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        // A panicking holder leaves only plain samples behind.
        self.samples.lock().unwrap_or_else( |poisoned| poisoned.into_inner() )
    }


    /// Queues as many samples as fit. Returns the number accepted.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut queue = self.lock();
        let accepted = samples.len().min( self.capacity.saturating_sub( queue.len() ) );
        queue.extend( samples[ ..accepted ].iter().copied() );
        accepted
    }


    /// Fills `output` with device frames, padding with silence. While paused
    /// the output is silent and nothing is consumed.
    ///
    /// @returns The number of output samples taken from the queue
    pub fn pop_into( &self, output: &mut [f32] ) -> usize {
        if self.is_paused() {
            output.fill( 0.0 );
            return 0;
        }

        let mut queue = self.lock();
        let frames = ( output.len() / self.output_channels )
            .min( queue.len() / self.source_channels );

        let source: Vec<f32> = queue.drain( ..frames * self.source_channels ).collect();
        drop( queue );

        let written = frames * self.output_channels;
        remix( &source, self.source_channels, &mut output[ ..written ], self.output_channels );
        output[ written.. ].fill( 0.0 );
        written
    }


    /// Number of queued samples.
    pub fn len( &self ) -> usize {
        self.lock().len()
    }


    pub fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    /// Drops everything queued.
    pub fn clear( &self ) {
        self.lock().clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    pub fn source_channels( &self ) -> usize {
        self.source_channels
    }
}


/// Converts interleaved frames between channel layouts.
///
/// Stereo folds to mono by averaging. Otherwise each output channel takes
/// the matching source channel, repeating the last one when the output
/// has more channels.
pub fn remix( source: &[f32], source_channels: usize, output: &mut [f32], output_channels: usize ) {
    let frames = source.chunks_exact( source_channels ).zip( output.chunks_exact_mut( output_channels ) );

    for ( src, out ) in frames {
        if source_channels == 2 && output_channels == 1 {
            out[ 0 ] = ( src[ 0 ] + src[ 1 ] ) * 0.5;
            continue;
        }
        for ( ch, sample ) in out.iter_mut().enumerate() {
            *sample = src[ ch.min( source_channels - 1 ) ];
        }
    }
}


/// An open device stream pulling from a [`SampleQueue`].
///
/// Not `Send`: keep it on the thread that created it.
pub struct OutputStream {
    stream: cpal::Stream,
    sample_rate: u32,
}


impl OutputStream {
    /// Opens the default output device, preferring a configuration that
    /// matches the source rate and channel count.
    ///
    /// @returns The stream and the queue to feed it, sized for about half a
    /// second of audio at the device rate
    pub fn open( source_rate: u32, source_channels: u16 ) -> Result<( Self, Arc<SampleQueue> ), MediaError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else( || MediaError::Output( "no output device available".into() ) )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| MediaError::Output( e.to_string() ) )?
            .collect();

        let supports_rate = |range: &cpal::SupportedStreamConfigRange| {
            range.min_sample_rate().0 <= source_rate && range.max_sample_rate().0 >= source_rate
        };

        let exact = ranges.iter().find( |r| r.channels() == source_channels && supports_rate( *r ) );
        let same_rate = ranges.iter().find( |r| supports_rate( *r ) );

        let config = match exact.or( same_rate ) {
            Some( range ) => range.clone()
                .with_sample_rate( cpal::SampleRate( source_rate ) )
                .config(),
            None => {
                let fallback = device
                    .default_output_config()
                    .map_err( |e| MediaError::Output( e.to_string() ) )?;
                tracing::info!(
                    "Device has no {} Hz mode, using {} Hz",
                    source_rate,
                    fallback.sample_rate().0
                );
                fallback.config()
            }
        };

        tracing::info!(
            "Output config: {} Hz, {} channel(s)",
            config.sample_rate.0,
            config.channels
        );

        let capacity = ( config.sample_rate.0 as usize ) * ( source_channels as usize ) / 2;
        let queue = Arc::new( SampleQueue::new(
            capacity,
            source_channels as usize,
            config.channels as usize,
        ));
        let callback_queue = Arc::clone( &queue );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_queue.pop_into( data );
                },
                |err| tracing::error!( "Audio output error: {}", err ),
                None,
            )
            .map_err( |e| MediaError::Output( e.to_string() ) )?;

        Ok((
            Self {
                stream,
                sample_rate: config.sample_rate.0,
            },
            queue,
        ))
    }


    /// Starts pulling samples from the queue.
    pub fn start( &self ) -> Result<(), MediaError> {
        self.stream
            .play()
            .map_err( |e| MediaError::Output( e.to_string() ) )
    }


    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_paused_queue_outputs_silence() {
        let queue = SampleQueue::new( 16, 2, 2 );
        queue.push( &[ 0.5; 8 ] );
        let mut out = [ 1.0; 4 ];
        assert_eq!( queue.pop_into( &mut out ), 0 );
        assert_eq!( out, [ 0.0; 4 ] );
        assert_eq!( queue.len(), 8 );
    }


    #[test]
    fn test_push_respects_capacity() {
        let queue = SampleQueue::new( 4, 1, 1 );
        assert_eq!( queue.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( queue.push( &[ 0.1; 2 ] ), 0 );
    }


    #[test]
    fn test_pop_pads_with_silence() {
        let queue = SampleQueue::new( 16, 2, 2 );
        queue.set_paused( false );
        queue.push( &[ 0.25, 0.75 ] );
        let mut out = [ 1.0; 6 ];
        assert_eq!( queue.pop_into( &mut out ), 2 );
        assert_eq!( out, [ 0.25, 0.75, 0.0, 0.0, 0.0, 0.0 ] );
        assert!( queue.is_empty() );
    }


    #[test]
    fn test_remix_mono_to_stereo() {
        let mut out = [ 0.0; 4 ];
        remix( &[ 0.1, 0.2 ], 1, &mut out, 2 );
        assert_eq!( out, [ 0.1, 0.1, 0.2, 0.2 ] );
    }


    #[test]
    fn test_remix_stereo_to_mono() {
        let mut out = [ 0.0; 2 ];
        remix( &[ 0.25, 0.75, 1.0, 0.0 ], 2, &mut out, 1 );
        assert_eq!( out, [ 0.5, 0.5 ] );
    }


    #[test]
    fn test_remix_drops_extra_channels() {
        let mut out = [ 0.0; 2 ];
        remix( &[ 0.1, 0.2, 0.3 ], 3, &mut out, 2 );
        assert_eq!( out, [ 0.1, 0.2 ] );
    }
}
