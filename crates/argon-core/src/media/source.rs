//! Track decoding via Symphonia
//!
//! Opens a file, reads its tags and stream format, and yields
//! interleaved f32 samples packet by packet.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, StandardTagKey, Tag };
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use super::{ AudioFormat, MediaError, TrackTags };


/// A decodable audio stream read from a file.
pub struct AudioSource {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<Duration>,
    tags: TrackTags,
    format: AudioFormat,
    samples: Option<SampleBuffer<f32>>,
}


impl AudioSource {
    /// Probes and opens a file for decoding.
    pub fn open( path: &Path ) -> Result<Self, MediaError> {
        let file = File::open( path )?;
        let mss = MediaSourceStream::new(
            Box::new( file ),
            MediaSourceStreamOptions { buffer_len: 64 * 1024 },
        );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let mut probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| MediaError::UnsupportedFormat )?;

        let mut tags = TrackTags::default();
        if let Some( revision ) = probed.metadata.get().as_ref().and_then( |log| log.current() ) {
            collect_tags( &mut tags, revision.tags() );
        }
        let mut reader = probed.format;
        if let Some( revision ) = reader.metadata().current() {
            collect_tags( &mut tags, revision.tags() );
        }

        let track = reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( MediaError::NoAudioTrack )?;

        let track_id = track.id;
        let params = &track.codec_params;
        let sample_rate = params.sample_rate.unwrap_or( 44_100 );
        let channels = params.channels.map( |c| c.count() ).unwrap_or( 2 );
        let duration = params.n_frames
            .map( |frames| Duration::from_secs_f64( frames as f64 / sample_rate as f64 ) );

        let format = AudioFormat {
            channels: params.channels.map( |c| c.count() as u32 ),
            sample_rate: params.sample_rate,
            sample_size: params.bits_per_sample.or( params.bits_per_coded_sample ),
        };

        let decoder = symphonia::default::get_codecs()
            .make( params, &DecoderOptions::default() )
            .map_err( |e| MediaError::DecoderCreation( e.to_string() ) )?;

        tracing::info!(
            "Opened {:?}: {} Hz, {} channel(s), duration {:?}",
            path,
            sample_rate,
            channels,
            duration
        );

        Ok( Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
            tags,
            format,
            samples: None,
        })
    }


    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    pub fn channels( &self ) -> usize {
        self.channels
    }


    pub fn duration( &self ) -> Option<Duration> {
        self.duration
    }


    pub fn tags( &self ) -> &TrackTags {
        &self.tags
    }


    pub fn format( &self ) -> AudioFormat {
        self.format
    }


    /// Decodes the next packet of this track into interleaved samples.
    ///
    /// Returns `None` at the end of the stream. Corrupt packets are skipped.
    pub fn next_chunk( &mut self ) -> Result<Option<Vec<f32>>, MediaError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok( packet ) => packet,
                Err( SymphoniaError::IoError( ref e ) )
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok( None );
                }
                Err( e ) => return Err( MediaError::Decode( e.to_string() ) ),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                Err( SymphoniaError::DecodeError( e ) ) => {
                    tracing::debug!( "Skipping undecodable packet: {}", e );
                    continue;
                }
                Err( e ) => return Err( MediaError::Decode( e.to_string() ) ),
            };

            let spec = *decoded.spec();
            let needed = decoded.capacity();
            if matches!( &self.samples, Some( buf ) if buf.capacity() < needed ) {
                self.samples = None;
            }
            let buf = self.samples
                .get_or_insert_with( || SampleBuffer::new( needed as u64, spec ) );
            buf.copy_interleaved_ref( decoded );

            return Ok( Some( buf.samples().to_vec() ) );
        }
    }


    /// Repositions the stream and resets the decoder.
    pub fn seek( &mut self, position: Duration ) -> Result<(), MediaError> {
        let seek_to = SeekTo::Time {
            time: Time::from( position.as_secs_f64() ),
            track_id: Some( self.track_id ),
        };

        self.reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |e| MediaError::Seek( e.to_string() ) )?;
        self.decoder.reset();

        Ok(())
    }
}


/// Fills unset fields of `tags` from a metadata revision. Earlier
/// sources win.
fn collect_tags( tags: &mut TrackTags, source: &[Tag] ) {
    for tag in source {
        let Some( key ) = tag.std_key else { continue };
        let value = tag.value.to_string();

        match key {
            StandardTagKey::TrackTitle => fill( &mut tags.title, value ),
            StandardTagKey::Artist => fill( &mut tags.artist, value ),
            StandardTagKey::Album => fill( &mut tags.album, value ),
            StandardTagKey::Genre => fill( &mut tags.genre, value ),
            StandardTagKey::Copyright => fill( &mut tags.copyright, value ),
            StandardTagKey::Comment => fill( &mut tags.comment, value ),
            StandardTagKey::TrackNumber => {
                if tags.track_number.is_none() {
                    tags.track_number = parse_track_number( &value );
                }
            }
            StandardTagKey::Date | StandardTagKey::ReleaseDate => {
                if tags.year.is_none() {
                    tags.year = parse_year( &value );
                }
            }
            _ => {}
        }
    }
}


fn fill( slot: &mut Option<String>, value: String ) {
    if slot.is_none() && !value.trim().is_empty() {
        *slot = Some( value );
    }
}


/// Parses `"7"` or `"7/12"`.
fn parse_track_number( value: &str ) -> Option<u32> {
    value.split( '/' ).next()?.trim().parse().ok()
}


/// Parses the year out of `"2023"` or `"2023-01-15"`.
fn parse_year( value: &str ) -> Option<u32> {
    value.split( '-' ).next()?.trim().parse().ok()
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_track_number() {
        assert_eq!( parse_track_number( "7" ), Some( 7 ) );
        assert_eq!( parse_track_number( "3/12" ), Some( 3 ) );
        assert_eq!( parse_track_number( "side A" ), None );
    }


    #[test]
    fn test_parse_year() {
        assert_eq!( parse_year( "1999" ), Some( 1999 ) );
        assert_eq!( parse_year( "2023-01-15" ), Some( 2023 ) );
        assert_eq!( parse_year( "" ), None );
    }


    #[test]
    fn test_fill_keeps_first_value() {
        let mut slot = None;
        fill( &mut slot, "  ".to_string() );
        assert_eq!( slot, None );
        fill( &mut slot, "First".to_string() );
        fill( &mut slot, "Second".to_string() );
        assert_eq!( slot.as_deref(), Some( "First" ) );
    }


    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AudioSource::open( &dir.path().join( "nope.mp3" ) );
        assert!( matches!( result, Err( MediaError::Open( _ ) ) ) );
    }


    #[test]
    fn test_open_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "noise.mp3" );
        std::fs::write( &path, b"definitely not audio" ).unwrap();
        let result = AudioSource::open( &path );
        assert!( matches!( result, Err( MediaError::UnsupportedFormat ) ) );
    }
}
