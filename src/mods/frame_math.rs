//! Conversions between wall-clock durations/offsets and frame counts.
//!
//! Every other analysis component sizes its thresholds through these
//! helpers, so the rounding rules here are load-bearing: minimum-duration
//! thresholds always round *up* (a requested silence length must never be
//! under-counted) and offsets round half away from zero.

use std::str::FromStr;

use crate::error::{ CarveError, CarveResult };
use crate::mods::types::BitDepth;

/// frames = ceil(seconds * sample_rate), never less than 1.
pub fn duration_to_frame_threshold(seconds: f64, sample_rate: u32) -> CarveResult<u64> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(CarveError::invalid(format!("duration must be > 0 seconds, got {}", seconds)));
    }
    if sample_rate == 0 {
        return Err(CarveError::invalid("sample rate must be > 0"));
    }
    let frames = (seconds * (sample_rate as f64)).ceil() as u64;
    Ok(frames.max(1))
}

/// frames = round-half-away-from-zero(seconds * sample_rate).
///
/// Offsets may be negative. 0.5 ms at 44100 Hz maps to 22, and -0.5 ms
/// to -22 (`f64::round` is away-from-zero, which is exactly the policy
/// the segment planner depends on).
pub fn time_offset_to_frames(seconds: f64, sample_rate: u32) -> CarveResult<i64> {
    if !seconds.is_finite() {
        return Err(CarveError::invalid("offset must be finite"));
    }
    if sample_rate == 0 {
        return Err(CarveError::invalid("sample rate must be > 0"));
    }
    Ok((seconds * (sample_rate as f64)).round() as i64)
}

/// Saturating clamp of a (possibly negative) frame position.
pub fn clamp_frame(frame: i64, min: i64, max: i64) -> CarveResult<i64> {
    if min > max {
        return Err(CarveError::invalid(format!("clamp range inverted: {} > {}", min, max)));
    }
    Ok(frame.clamp(min, max))
}

/// Frame position as seconds, formatted locale-independent with trailing
/// zeros trimmed ("1", "0.5", "3.2625"). Assumes `sample_rate > 0`.
pub fn invariant_time_text(frame: u64, sample_rate: u32) -> String {
    let seconds = (frame as f64) / (sample_rate.max(1) as f64);
    let mut s = format!("{:.6}", seconds);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// A signed duration or offset parsed from the command line.
///
/// Accepted forms: `"500ms"`, `"-200ms"`, `"1.5s"`, bare seconds (`"2.25"`).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeArgument {
    seconds: f64,
}

impl TimeArgument {
    pub fn from_seconds(seconds: f64) -> CarveResult<Self> {
        if !seconds.is_finite() {
            return Err(CarveError::invalid("time argument must be finite"));
        }
        Ok(TimeArgument { seconds })
    }

    pub fn from_millis(ms: f64) -> CarveResult<Self> {
        Self::from_seconds(ms / 1000.0)
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Signed offset in frames at the given rate.
    pub fn offset_frames(&self, sample_rate: u32) -> CarveResult<i64> {
        time_offset_to_frames(self.seconds, sample_rate)
    }

    /// Minimum-duration threshold in frames at the given rate.
    pub fn threshold_frames(&self, sample_rate: u32) -> CarveResult<u64> {
        duration_to_frame_threshold(self.seconds, sample_rate)
    }
}

impl FromStr for TimeArgument {
    type Err = CarveError;

    fn from_str(s: &str) -> CarveResult<Self> {
        let t = s.trim();
        let (num, scale) = if let Some(v) = t.strip_suffix("ms") {
            (v, 0.001)
        } else if let Some(v) = t.strip_suffix('s') {
            (v, 1.0)
        } else {
            (t, 1.0)
        };
        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| CarveError::invalid(format!("bad time argument: {:?}", s)))?;
        TimeArgument::from_seconds(value * scale)
    }
}

/// Stream resolution as given on the command line: bit depth plus sample
/// rate, e.g. `"16/44100"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub bit_depth: BitDepth,
    pub sample_rate: u32,
}

impl FromStr for Resolution {
    type Err = CarveError;

    fn from_str(s: &str) -> CarveResult<Self> {
        let (depth, rate) = s
            .split_once('/')
            .ok_or_else(|| CarveError::invalid(format!("bad resolution {:?}, want DEPTH/RATE", s)))?;
        let bit_depth: BitDepth = depth.trim().parse()?;
        let sample_rate: u32 = rate
            .trim()
            .parse()
            .map_err(|_| CarveError::invalid(format!("bad sample rate: {:?}", rate)))?;
        if sample_rate == 0 {
            return Err(CarveError::invalid("sample rate must be > 0"));
        }
        Ok(Resolution { bit_depth, sample_rate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(duration_to_frame_threshold(2.0, 44100).unwrap(), 88200);
        assert_eq!(duration_to_frame_threshold(0.001, 44100).unwrap(), 45);
        assert_eq!(duration_to_frame_threshold(0.1, 48000).unwrap(), 4800);
    }

    #[test]
    fn threshold_has_floor_of_one() {
        assert_eq!(duration_to_frame_threshold(0.0000001, 8000).unwrap(), 1);
    }

    #[test]
    fn threshold_rejects_nonpositive() {
        assert!(duration_to_frame_threshold(0.0, 44100).is_err());
        assert!(duration_to_frame_threshold(-1.0, 44100).is_err());
        assert!(duration_to_frame_threshold(1.0, 0).is_err());
        assert!(duration_to_frame_threshold(f64::NAN, 44100).is_err());
    }

    #[test]
    fn offset_rounds_away_from_zero() {
        assert_eq!(time_offset_to_frames(0.0005, 44100).unwrap(), 22);
        assert_eq!(time_offset_to_frames(-0.0005, 44100).unwrap(), -22);
        assert_eq!(time_offset_to_frames(0.001, 44100).unwrap(), 44);
        // exact half: 0.5 frames rounds to 1, not 0
        assert_eq!(time_offset_to_frames(0.5, 1).unwrap(), 1);
        assert_eq!(time_offset_to_frames(-0.5, 1).unwrap(), -1);
    }

    #[test]
    fn clamp_saturates_and_validates() {
        assert_eq!(clamp_frame(-5, 0, 100).unwrap(), 0);
        assert_eq!(clamp_frame(500, 0, 100).unwrap(), 100);
        assert_eq!(clamp_frame(50, 0, 100).unwrap(), 50);
        assert!(clamp_frame(50, 100, 0).is_err());
    }

    #[test]
    fn time_text_trims_trailing_zeros() {
        assert_eq!(invariant_time_text(44100, 44100), "1");
        assert_eq!(invariant_time_text(22050, 44100), "0.5");
        assert_eq!(invariant_time_text(0, 44100), "0");
        assert_eq!(invariant_time_text(3100, 1000), "3.1");
    }

    #[test]
    fn time_argument_parses_suffixes() {
        let ms: TimeArgument = "500ms".parse().unwrap();
        assert!((ms.seconds() - 0.5).abs() < 1e-12);
        let neg: TimeArgument = "-200ms".parse().unwrap();
        assert!((neg.seconds() + 0.2).abs() < 1e-12);
        let s: TimeArgument = "1.5s".parse().unwrap();
        assert!((s.seconds() - 1.5).abs() < 1e-12);
        let bare: TimeArgument = "2.25".parse().unwrap();
        assert!((bare.seconds() - 2.25).abs() < 1e-12);
        assert!("abc".parse::<TimeArgument>().is_err());
    }

    #[test]
    fn resolution_parses_depth_and_rate() {
        let r: Resolution = "16/44100".parse().unwrap();
        assert_eq!(r.bit_depth, BitDepth::Pcm16);
        assert_eq!(r.sample_rate, 44100);
        assert!("16".parse::<Resolution>().is_err());
        assert!("16/0".parse::<Resolution>().is_err());
    }
}
