//! Value objects shared across the analyzers: stream metadata, emitted
//! measurement points, and the level math every classifier uses.

use std::str::FromStr;

use crate::error::{ CarveError, CarveResult };

/// Sample resolution of the source stream as reported by the probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitDepth {
    Pcm8,
    Pcm16,
    Pcm24,
    Pcm32,
    Float32,
}

impl BitDepth {
    /// Map an ffprobe `sample_fmt` string. Planar variants carry a `p`
    /// suffix and decode to the same depth.
    pub fn from_sample_fmt(fmt: &str) -> CarveResult<Self> {
        match fmt.trim_end_matches('p') {
            "u8" => Ok(BitDepth::Pcm8),
            "s16" => Ok(BitDepth::Pcm16),
            "s24" => Ok(BitDepth::Pcm24),
            "s32" => Ok(BitDepth::Pcm32),
            "flt" | "f32" => Ok(BitDepth::Float32),
            other => Err(CarveError::UnsupportedSampleFormat(other.to_string())),
        }
    }
}

impl FromStr for BitDepth {
    type Err = CarveError;

    fn from_str(s: &str) -> CarveResult<Self> {
        match s {
            "8" => Ok(BitDepth::Pcm8),
            "16" => Ok(BitDepth::Pcm16),
            "24" => Ok(BitDepth::Pcm24),
            "32" => Ok(BitDepth::Pcm32),
            "32f" | "f32" => Ok(BitDepth::Float32),
            other => Err(CarveError::invalid(format!("bad bit depth: {:?}", other))),
        }
    }
}

/// Immutable stream metadata, supplied once per input before analysis
/// starts. `estimated_total_frames` is only an estimate (containers lie),
/// so it is used for progress denominators, never for correctness.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: BitDepth,
    pub estimated_total_frames: Option<u64>,
}

impl StreamInfo {
    pub fn validate(&self) -> CarveResult<()> {
        if self.sample_rate == 0 {
            return Err(CarveError::invalid("stream sample rate must be > 0"));
        }
        if self.channels == 0 {
            return Err(CarveError::invalid("stream channel count must be > 0"));
        }
        if let Some(0) = self.estimated_total_frames {
            return Err(CarveError::invalid("estimated total frames must be > 0 when present"));
        }
        Ok(())
    }
}

/// One peak-envelope sample. Ownership passes to the sink on emission.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakPoint {
    pub label: String,
    pub window_ms: u64,
    pub anchor_ms: u64,
    pub value_db: f64,
}

/// One magnitude-spectrum frame for a single channel.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralPoint {
    pub label: String,
    pub channel: u16,
    pub window_samples: usize,
    pub anchor_ms: u64,
    pub bins_db: Vec<f64>,
}

/// `20*log10(peak)`, with -inf at zero/negative amplitude.
#[inline]
pub fn amplitude_to_db(peak: f64) -> f64 {
    if peak <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * peak.log10()
    }
}

/// Max absolute sample across one interleaved frame.
#[inline]
pub fn frame_peak(frame: &[f32]) -> f32 {
    frame.iter().fold(0.0_f32, |m, &v| m.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversion_handles_zero() {
        assert_eq!(amplitude_to_db(0.0), f64::NEG_INFINITY);
        assert_eq!(amplitude_to_db(-0.5), f64::NEG_INFINITY);
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 1e-12);
        assert!((amplitude_to_db(0.1) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn frame_peak_is_max_abs_across_channels() {
        assert_eq!(frame_peak(&[0.1, -0.7, 0.3]), 0.7);
        assert_eq!(frame_peak(&[]), 0.0);
    }

    #[test]
    fn sample_fmt_mapping() {
        assert_eq!(BitDepth::from_sample_fmt("s16").unwrap(), BitDepth::Pcm16);
        assert_eq!(BitDepth::from_sample_fmt("fltp").unwrap(), BitDepth::Float32);
        assert!(BitDepth::from_sample_fmt("dsd").is_err());
    }

    #[test]
    fn stream_info_validation() {
        let good = StreamInfo {
            sample_rate: 44100,
            channels: 2,
            bit_depth: BitDepth::Pcm16,
            estimated_total_frames: Some(1000),
        };
        assert!(good.validate().is_ok());

        let bad = StreamInfo { sample_rate: 0, ..good.clone() };
        assert!(bad.validate().is_err());
    }
}
