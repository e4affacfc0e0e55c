//! Windowed-FFT magnitude analysis (STFT) over a push-style frame stream.
//!
//! Frames accumulate into a fixed-size trailing window per channel; at
//! each hop anchor the window is Hann-weighted, zero-padded to the next
//! power of two, and run through a real FFT. One point per channel per
//! anchor, carrying the requested leading bins in dB.

use std::collections::VecDeque;
use std::sync::Arc;

use realfft::{ RealFftPlanner, RealToComplex };
use rustfft::num_complex::Complex;

use crate::error::{ CarveError, CarveResult };
use crate::mods::types::{ amplitude_to_db, SpectralPoint };

/// Hop expressed either directly in samples or in milliseconds of the
/// analysis rate.
#[derive(Clone, Copy, Debug)]
pub enum SpectralHop {
    Samples(usize),
    Millis(u64),
}

fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = (std::f32::consts::PI * (i as f32)) / (n as f32);
            t.sin() * t.sin()
        })
        .collect()
}

pub struct SpectralWindowAnalyzer {
    label: String,
    sample_rate: u32,
    channels: u16,
    window_samples: usize,
    hop_frames: u64,
    bin_count: usize,
    min_limit_db: f64,
    fft_len: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    hann_win: Vec<f32>,
    rings: Vec<VecDeque<f32>>,
    scratch_in: Vec<f32>,
    scratch_out: Vec<Complex<f32>>,
    frame_index: u64,
    next_anchor_frame: u64,
}

impl SpectralWindowAnalyzer {
    pub fn new(
        label: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        window_samples: usize,
        hop: SpectralHop,
        bin_count: usize,
        min_limit_db: f64
    ) -> CarveResult<Self> {
        if sample_rate == 0 {
            return Err(CarveError::invalid("sample rate must be > 0"));
        }
        if channels == 0 {
            return Err(CarveError::invalid("channel count must be > 0"));
        }
        if window_samples == 0 {
            return Err(CarveError::invalid("spectral window must be > 0 samples"));
        }
        if !min_limit_db.is_finite() {
            return Err(CarveError::invalid("spectral dB floor must be finite"));
        }
        let hop_frames = match hop {
            SpectralHop::Samples(n) => {
                if n == 0 {
                    return Err(CarveError::invalid("spectral hop must be > 0 samples"));
                }
                n as u64
            }
            SpectralHop::Millis(ms) => {
                if ms == 0 {
                    return Err(CarveError::invalid("spectral hop must be > 0 ms"));
                }
                (ms * (sample_rate as u64) / 1000).max(1)
            }
        };

        let fft_len = window_samples.next_power_of_two();
        let max_bins = fft_len / 2 + 1;
        if bin_count == 0 || bin_count > max_bins {
            return Err(
                CarveError::invalid(
                    format!(
                        "bin count {} out of range, window of {} samples supports 1..={}",
                        bin_count,
                        window_samples,
                        max_bins
                    )
                )
            );
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_len);
        let scratch_out = r2c.make_output_vec();

        Ok(SpectralWindowAnalyzer {
            label: label.into(),
            sample_rate,
            channels,
            window_samples,
            hop_frames,
            bin_count,
            min_limit_db,
            fft_len,
            r2c,
            hann_win: hann(window_samples),
            rings: (0..channels).map(|_| VecDeque::with_capacity(window_samples)).collect(),
            scratch_in: vec![0.0; fft_len],
            scratch_out,
            frame_index: 0,
            next_anchor_frame: hop_frames,
        })
    }

    /// Feed one interleaved frame (one sample per channel).
    pub fn add_frame(
        &mut self,
        frame: &[f32],
        sink: &mut dyn FnMut(SpectralPoint)
    ) -> CarveResult<()> {
        if frame.len() != (self.channels as usize) {
            return Err(
                CarveError::invalid(
                    format!("frame has {} samples, stream has {} channels", frame.len(), self.channels)
                )
            );
        }
        for (ring, &s) in self.rings.iter_mut().zip(frame) {
            if ring.len() == self.window_samples {
                ring.pop_front();
            }
            ring.push_back(s);
        }
        self.frame_index += 1;

        while self.next_anchor_frame <= self.frame_index {
            self.emit(sink);
        }
        Ok(())
    }

    fn emit(&mut self, sink: &mut dyn FnMut(SpectralPoint)) {
        let anchor_frame = self.next_anchor_frame;
        let anchor_ms = anchor_frame * 1000 / (self.sample_rate as u64);

        for ch in 0..self.channels as usize {
            self.scratch_in.iter_mut().for_each(|v| {
                *v = 0.0;
            });
            for (i, &s) in self.rings[ch].iter().enumerate() {
                self.scratch_in[i] = s * self.hann_win[i];
            }
            self.r2c.process(&mut self.scratch_in, &mut self.scratch_out).ok();

            let bins_db: Vec<f64> = self.scratch_out[..self.bin_count]
                .iter()
                .map(|c| amplitude_to_db(c.norm() as f64).max(self.min_limit_db))
                .collect();

            sink(SpectralPoint {
                label: self.label.clone(),
                channel: ch as u16,
                window_samples: self.window_samples,
                anchor_ms,
                bins_db,
            });
        }

        self.next_anchor_frame += self.hop_frames;
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }
}
