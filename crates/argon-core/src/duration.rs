//! Track time values for display.
//!
//! Splits a seconds count into hours, minutes and seconds and renders it
//! as a fixed-width `hh:mm:ss` timestamp.

use std::fmt;
use std::time::Duration;


/// A point in, or length of, a track broken into display components.
///
/// The component fields are truncated; `total_seconds` keeps the
/// fractional value the components were derived from.
#[derive( Debug, Clone, Copy, PartialEq, Default )]
pub struct TrackTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_seconds: f64,
}


impl TrackTime {
    /// A zero-length time.
    pub const ZERO: TrackTime = TrackTime {
        hours: 0,
        minutes: 0,
        seconds: 0,
        total_seconds: 0.0,
    };


    /// Builds a time from a whole number of seconds.
    pub fn from_secs( secs: u64 ) -> Self {
        Self {
            hours: secs / 3600,
            minutes: ( secs / 60 ) % 60,
            seconds: secs % 60,
            total_seconds: secs as f64,
        }
    }


    /// Builds a time from fractional seconds. Negative and non-finite
    /// values are treated as zero.
    pub fn from_secs_f64( secs: f64 ) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }

        Self {
            total_seconds: secs,
            ..Self::from_secs( secs.trunc() as u64 )
        }
    }


    /// Returns true when no time has elapsed.
    pub fn is_zero( &self ) -> bool {
        self.total_seconds <= 0.0
    }


    /// Renders the time as `hh:mm:ss`, zero padded. Hours grow past two
    /// digits rather than wrapping.
    pub fn timestamp( &self ) -> String {
        format!( "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds )
    }


    /// Fraction of `total` this time represents, clamped to `0.0..=1.0`.
    ///
    /// @param total - The full length to measure against
    ///
    /// @returns 0.0 when `total` is zero
    pub fn ratio_of( &self, total: &TrackTime ) -> f64 {
        if total.total_seconds <= 0.0 {
            return 0.0;
        }
        ( self.total_seconds / total.total_seconds ).clamp( 0.0, 1.0 )
    }
}


impl From<Duration> for TrackTime {
    fn from( duration: Duration ) -> Self {
        Self::from_secs_f64( duration.as_secs_f64() )
    }
}


impl fmt::Display for TrackTime {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.timestamp() )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_components_recombine() {
        for secs in [ 0, 1, 59, 60, 61, 3599, 3600, 3661, 86_399, 90_061, 1_000_000 ] {
            let t = TrackTime::from_secs( secs );
            assert_eq!( t.hours * 3600 + t.minutes * 60 + t.seconds, secs );
            assert!( t.minutes < 60 );
            assert!( t.seconds < 60 );
        }
    }


    #[test]
    fn test_fractional_seconds_truncate() {
        let t = TrackTime::from_secs_f64( 125.9 );
        assert_eq!( ( t.hours, t.minutes, t.seconds ), ( 0, 2, 5 ) );
        assert_eq!( t.total_seconds, 125.9 );
    }


    #[test]
    fn test_negative_is_zero() {
        assert_eq!( TrackTime::from_secs_f64( -3.0 ), TrackTime::ZERO );
        assert_eq!( TrackTime::from_secs_f64( f64::NAN ), TrackTime::ZERO );
    }


    #[test]
    fn test_timestamp_format() {
        assert_eq!( TrackTime::ZERO.timestamp(), "00:00:00" );
        assert_eq!( TrackTime::from_secs( 3725 ).timestamp(), "01:02:05" );
        assert_eq!( TrackTime::from_secs( 360_000 ).to_string(), "100:00:00" );
    }


    #[test]
    fn test_from_std_duration() {
        let t = TrackTime::from( Duration::from_millis( 61_500 ) );
        assert_eq!( ( t.minutes, t.seconds ), ( 1, 1 ) );
    }


    #[test]
    fn test_ratio_of() {
        let total = TrackTime::from_secs( 200 );
        assert_eq!( TrackTime::from_secs( 50 ).ratio_of( &total ), 0.25 );
        assert_eq!( TrackTime::from_secs( 500 ).ratio_of( &total ), 1.0 );
        assert_eq!( TrackTime::from_secs( 50 ).ratio_of( &TrackTime::ZERO ), 0.0 );
    }
}
