//! Stream descriptors.
//!
//! A [`StreamDescriptor`] is an immutable snapshot of what to stream. A new
//! descriptor is built for every seek, restart, or track change; it is never
//! mutated after creation.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// What kind of media a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Content type of the transcoded byte stream for this kind.
    ///
    /// Only meaningful for audio and video; image responses derive their
    /// content type from the chosen output format instead.
    pub fn stream_content_type(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/aac",
            MediaKind::Video | MediaKind::Image => "video/mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        };
        f.write_str(s)
    }
}

/// Clockwise source rotation to correct for during playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Build a rotation from whole degrees; only right angles are accepted.
    pub fn from_degrees(degrees: u32) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(Error::Validation(format!(
                "rotation must be one of 0/90/180/270 degrees, got {other}"
            ))),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// True when the rotation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

/// Gain limits in dB for each equalizer band.
pub const GAIN_RANGE: std::ops::RangeInclusive<i32> = -10..=10;

/// One equalizer band: center frequency, bandwidth (both Hz) and gain (dB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqBand {
    pub frequency: u32,
    pub width: u32,
    pub gain: i32,
}

/// Per-band equalizer gains, validated to [`GAIN_RANGE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EqualizerGains {
    low: i32,
    mid: i32,
    high: i32,
}

impl EqualizerGains {
    /// Build validated gains; each band must lie within [`GAIN_RANGE`].
    pub fn new(low: i32, mid: i32, high: i32) -> Result<Self> {
        for (band, gain) in [("low", low), ("mid", mid), ("high", high)] {
            if !GAIN_RANGE.contains(&gain) {
                return Err(Error::Validation(format!(
                    "equalizer gain for {band} band must be within {:?}, got {gain}",
                    GAIN_RANGE
                )));
            }
        }
        Ok(Self { low, mid, high })
    }

    /// All-zero gains, the neutral setting.
    pub fn flat() -> Self {
        Self::default()
    }

    /// True iff every band gain is zero.
    pub fn is_flat(&self) -> bool {
        self.low == 0 && self.mid == 0 && self.high == 0
    }

    /// The three fixed bands with their gains, low to high.
    pub fn bands(&self) -> [EqBand; 3] {
        [
            EqBand {
                frequency: 64,
                width: 50,
                gain: self.low,
            },
            EqBand {
                frequency: 1000,
                width: 200,
                gain: self.mid,
            },
            EqBand {
                frequency: 10000,
                width: 2000,
                gain: self.high,
            },
        ]
    }
}

/// Immutable snapshot of what to stream for one playback session.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Local filesystem path or remote URL.
    pub source: String,
    pub kind: MediaKind,
    pub rotation: Rotation,
    /// Subtitle file to burn in (video only).
    pub subtitle_path: Option<PathBuf>,
    /// Playback start offset; 0 means from the beginning.
    pub start_offset_secs: f64,
    /// Source audio codec, used to decide stream-copy vs re-encode.
    pub audio_codec_hint: Option<String>,
}

impl StreamDescriptor {
    pub fn new(source: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            source: source.into(),
            kind,
            rotation: Rotation::None,
            subtitle_path: None,
            start_offset_secs: 0.0,
            audio_codec_hint: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_subtitle(mut self, path: Option<PathBuf>) -> Self {
        self.subtitle_path = path;
        self
    }

    /// Set the start offset; negative values are clamped to zero.
    pub fn with_start_offset(mut self, secs: f64) -> Self {
        self.start_offset_secs = secs.max(0.0);
        self
    }

    pub fn with_audio_codec_hint(mut self, codec: Option<String>) -> Self {
        self.audio_codec_hint = codec;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_from_degrees_round_trips() {
        for degrees in [0u32, 90, 180, 270] {
            assert_eq!(Rotation::from_degrees(degrees).unwrap().degrees(), degrees);
        }
    }

    #[test]
    fn rotation_rejects_odd_angles() {
        assert!(Rotation::from_degrees(45).is_err());
        assert!(Rotation::from_degrees(360).is_err());
    }

    #[test]
    fn rotation_dimension_swap() {
        assert!(!Rotation::None.swaps_dimensions());
        assert!(Rotation::Cw90.swaps_dimensions());
        assert!(!Rotation::Cw180.swaps_dimensions());
        assert!(Rotation::Cw270.swaps_dimensions());
    }

    #[test]
    fn gains_validate_range() {
        assert!(EqualizerGains::new(-10, 0, 10).is_ok());
        assert!(EqualizerGains::new(-11, 0, 0).is_err());
        assert!(EqualizerGains::new(0, 0, 11).is_err());
    }

    #[test]
    fn flat_gains() {
        assert!(EqualizerGains::flat().is_flat());
        assert!(!EqualizerGains::new(0, 1, 0).unwrap().is_flat());
    }

    #[test]
    fn band_constants() {
        let bands = EqualizerGains::new(2, -3, 4).unwrap().bands();
        assert_eq!(bands[0].frequency, 64);
        assert_eq!(bands[1].frequency, 1000);
        assert_eq!(bands[2].frequency, 10000);
        assert_eq!(bands[0].gain, 2);
        assert_eq!(bands[1].gain, -3);
        assert_eq!(bands[2].gain, 4);
    }

    #[test]
    fn descriptor_clamps_negative_offset() {
        let d = StreamDescriptor::new("/a.mp4", MediaKind::Video).with_start_offset(-3.0);
        assert_eq!(d.start_offset_secs, 0.0);
    }

    #[test]
    fn stream_content_types() {
        assert_eq!(MediaKind::Video.stream_content_type(), "video/mp4");
        assert_eq!(MediaKind::Audio.stream_content_type(), "audio/aac");
    }
}
