//! Sliding-window peak envelope over a push-style frame stream.
//!
//! The window maximum is kept by a monotonic deque of (frame index, peak)
//! pairs: tail entries dominated by a newer, louder frame are evicted on
//! push, head entries that fell out of the window are evicted on emit.
//! Both ends amortize to O(1) per frame regardless of window size.

use std::collections::VecDeque;

use crate::error::{ CarveError, CarveResult };
use crate::mods::types::{ amplitude_to_db, frame_peak, PeakPoint };

/// Reusable sliding-window maximum over an index+value pair.
#[derive(Debug, Default)]
pub struct SlidingMax {
    deque: VecDeque<(u64, f32)>,
}

impl SlidingMax {
    pub fn new() -> Self {
        SlidingMax { deque: VecDeque::new() }
    }

    /// Push the next value. Indices must be fed in increasing order.
    pub fn push(&mut self, index: u64, value: f32) {
        // dominated tail entries can never again be the window max
        while let Some(&(_, back)) = self.deque.back() {
            if back <= value {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        self.deque.push_back((index, value));
    }

    /// Drop entries whose index precedes the window start.
    pub fn evict_before(&mut self, window_start: u64) {
        while let Some(&(idx, _)) = self.deque.front() {
            if idx < window_start {
                self.deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// Current maximum, or `None` when the window is empty.
    pub fn max(&self) -> Option<f32> {
        self.deque.front().map(|&(_, v)| v)
    }
}

pub struct PeakWindowAnalyzer {
    label: String,
    sample_rate: u32,
    window_ms: u64,
    hop_ms: u64,
    min_limit_db: f64,
    window_frames: u64,
    frame_index: u64,
    next_anchor_ms: u64,
    window: SlidingMax,
}

impl PeakWindowAnalyzer {
    pub fn new(
        label: impl Into<String>,
        sample_rate: u32,
        window_ms: u64,
        hop_ms: u64,
        min_limit_db: f64
    ) -> CarveResult<Self> {
        if sample_rate == 0 {
            return Err(CarveError::invalid("sample rate must be > 0"));
        }
        if window_ms == 0 {
            return Err(CarveError::invalid("envelope window must be > 0 ms"));
        }
        if hop_ms == 0 {
            return Err(CarveError::invalid("envelope hop must be > 0 ms"));
        }
        if !min_limit_db.is_finite() {
            return Err(CarveError::invalid("envelope dB floor must be finite"));
        }
        let window_frames = ((window_ms as u64) * (sample_rate as u64) / 1000).max(1);
        Ok(PeakWindowAnalyzer {
            label: label.into(),
            sample_rate,
            window_ms,
            hop_ms,
            min_limit_db,
            window_frames,
            frame_index: 0,
            next_anchor_ms: hop_ms,
            window: SlidingMax::new(),
        })
    }

    /// Window end (exclusive) for an anchor, in frames.
    fn anchor_end_frame(&self, anchor_ms: u64) -> u64 {
        anchor_ms * (self.sample_rate as u64) / 1000
    }

    /// Feed one interleaved frame; due points go to the sink immediately.
    ///
    /// Anchors are emitted the moment their window is complete — before
    /// the frame that starts the next window is pushed — so the deque
    /// never holds a frame past the anchor's end.
    pub fn add_frame(&mut self, frame: &[f32], sink: &mut dyn FnMut(PeakPoint)) {
        while self.anchor_end_frame(self.next_anchor_ms) <= self.frame_index {
            self.emit(sink);
        }
        self.window.push(self.frame_index, frame_peak(frame));
        self.frame_index += 1;
    }

    /// End of stream: emit every anchor whose window has fully elapsed.
    pub fn finish(&mut self, sink: &mut dyn FnMut(PeakPoint)) {
        while self.anchor_end_frame(self.next_anchor_ms) <= self.frame_index {
            self.emit(sink);
        }
    }

    fn emit(&mut self, sink: &mut dyn FnMut(PeakPoint)) {
        let anchor_ms = self.next_anchor_ms;
        let end_frame = self.anchor_end_frame(anchor_ms);
        let window_start = end_frame.saturating_sub(self.window_frames);
        self.window.evict_before(window_start);

        let peak = self.window.max().unwrap_or(0.0);
        let value_db = amplitude_to_db(peak as f64).max(self.min_limit_db);

        sink(PeakPoint {
            label: self.label.clone(),
            window_ms: self.window_ms,
            anchor_ms,
            value_db,
        });
        self.next_anchor_ms += self.hop_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // deterministic xorshift so the fuzz case reproduces
    struct XorShift(u64);
    impl XorShift {
        fn next_f32(&mut self) -> f32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            ((x % 10_000) as f32) / 10_000.0
        }
    }

    fn collect_points(
        sample_rate: u32,
        window_ms: u64,
        hop_ms: u64,
        peaks: &[f32]
    ) -> Vec<PeakPoint> {
        let mut a = PeakWindowAnalyzer::new("t", sample_rate, window_ms, hop_ms, -90.0).unwrap();
        let mut out = Vec::new();
        let mut sink = |p: PeakPoint| out.push(p);
        for &p in peaks {
            a.add_frame(&[p], &mut sink);
        }
        a.finish(&mut sink);
        out
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(PeakWindowAnalyzer::new("t", 0, 100, 10, -90.0).is_err());
        assert!(PeakWindowAnalyzer::new("t", 44100, 0, 10, -90.0).is_err());
        assert!(PeakWindowAnalyzer::new("t", 44100, 100, 0, -90.0).is_err());
        assert!(PeakWindowAnalyzer::new("t", 44100, 100, 10, f64::NAN).is_err());
    }

    #[test]
    fn sliding_max_tracks_brute_force() {
        let mut sm = SlidingMax::new();
        let values = [0.3_f32, 0.1, 0.5, 0.2, 0.2, 0.9, 0.1];
        let w = 3u64;
        for (i, &v) in values.iter().enumerate() {
            sm.push(i as u64, v);
            let start = (i as u64 + 1).saturating_sub(w);
            sm.evict_before(start);
            let brute = values[start as usize..=i]
                .iter()
                .fold(f32::MIN, |m, &x| m.max(x));
            assert_eq!(sm.max().unwrap(), brute);
        }
    }

    #[test]
    fn anchors_advance_by_hop() {
        // 1 kHz: one frame per ms, window 4 ms, hop 2 ms, 10 frames
        let pts = collect_points(1000, 4, 2, &[0.1; 10]);
        let anchors: Vec<u64> = pts.iter().map(|p| p.anchor_ms).collect();
        assert_eq!(anchors, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn window_peak_matches_naive_reference() {
        let mut rng = XorShift(0x5eed_cafe);
        for &(sr, window_ms, hop_ms, n) in &[
            (1000u32, 5u64, 2u64, 400usize),
            (44100, 50, 10, 5000),
            (8000, 3, 1, 1200),
            (48000, 400, 100, 20_000),
        ] {
            let peaks: Vec<f32> = (0..n).map(|_| rng.next_f32()).collect();
            let pts = collect_points(sr, window_ms, hop_ms, &peaks);
            assert!(!pts.is_empty());
            let window_frames = ((window_ms * (sr as u64)) / 1000).max(1);
            for p in &pts {
                let end = (p.anchor_ms * (sr as u64) / 1000) as usize;
                let start = (end as u64).saturating_sub(window_frames) as usize;
                let brute = peaks[start..end.min(peaks.len())]
                    .iter()
                    .fold(0.0_f32, |m, &v| m.max(v));
                let expected = amplitude_to_db(brute as f64).max(-90.0);
                assert!(
                    (p.value_db - expected).abs() < 1e-9,
                    "anchor {} ms: got {} want {}",
                    p.anchor_ms,
                    p.value_db,
                    expected
                );
            }
        }
    }

    #[test]
    fn empty_window_floors_at_min_limit() {
        // hop shorter than one frame period: the first anchor's window
        // ends before any frame, peak 0 -> -inf -> floored
        let pts = collect_points(500, 2, 1, &[0.9; 4]);
        assert_eq!(pts[0].value_db, -90.0);
    }

    #[test]
    fn independent_instances_yield_identical_sequences() {
        let peaks: Vec<f32> = (0..2000).map(|i| ((i % 91) as f32) / 100.0).collect();
        let a = collect_points(22050, 20, 5, &peaks);
        let b = collect_points(22050, 20, 5, &peaks);
        assert_eq!(a, b);
    }
}
