//! Single-pass silence classification over a push-style frame stream.
//!
//! A silence run only "counts" once it ends (or the stream ends), so the
//! in-progress run is an explicit tagged state with one flush transition.
//! No lookahead, no whole-stream buffering.

use crate::error::{ CarveError, CarveResult };
use crate::mods::types::amplitude_to_db;

/// Progress callback cadence, in processed frames.
pub const PROGRESS_CADENCE_FRAMES: u64 = 2048;

/// A maximal contiguous silent range that met the duration threshold.
/// `end_frame` is exclusive; `start_frame < end_frame` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SilenceRun {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl SilenceRun {
    pub fn len(&self) -> u64 {
        self.end_frame - self.start_frame
    }
}

/// Finished, immutable outcome of one streaming pass.
///
/// `first_sound_frame` is `None` exactly when the whole stream was silent.
/// Runs are non-overlapping and strictly increasing.
#[derive(Clone, Debug)]
pub struct SilenceAnalysisResult {
    pub total_frames: u64,
    pub first_sound_frame: Option<u64>,
    pub runs: Vec<SilenceRun>,
}

#[derive(Clone, Copy, Debug)]
struct RunInProgress {
    start_frame: u64,
    len: u64,
}

type ProgressFn = Box<dyn FnMut(u64, Option<u64>) + Send>;

pub struct SilenceStateMachine {
    duration_threshold_frames: u64,
    level_db: f64,
    estimated_total_frames: Option<u64>,
    total_frames: u64,
    first_sound_frame: Option<u64>,
    runs: Vec<SilenceRun>,
    in_progress: Option<RunInProgress>,
    progress: Option<ProgressFn>,
}

impl SilenceStateMachine {
    pub fn new(
        duration_threshold_frames: u64,
        level_db: f64,
        estimated_total_frames: Option<u64>
    ) -> CarveResult<Self> {
        if duration_threshold_frames == 0 {
            return Err(CarveError::invalid("silence duration threshold must be >= 1 frame"));
        }
        if !level_db.is_finite() {
            return Err(CarveError::invalid("silence level threshold must be finite dB"));
        }
        Ok(SilenceStateMachine {
            duration_threshold_frames,
            level_db,
            estimated_total_frames,
            total_frames: 0,
            first_sound_frame: None,
            runs: Vec::new(),
            in_progress: None,
            progress: None,
        })
    }

    /// Attach an optional progress callback, invoked every
    /// [`PROGRESS_CADENCE_FRAMES`] frames and once more at `finish`.
    pub fn with_progress(mut self, progress: impl FnMut(u64, Option<u64>) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Feed one frame's peak amplitude (max abs sample across channels).
    pub fn add_frame(&mut self, peak_amplitude: f64) {
        let db = amplitude_to_db(peak_amplitude);
        let silent = db < self.level_db;

        if silent {
            match self.in_progress.as_mut() {
                Some(run) => {
                    run.len += 1;
                }
                None => {
                    self.in_progress = Some(RunInProgress {
                        start_frame: self.total_frames,
                        len: 1,
                    });
                }
            }
        } else {
            if self.first_sound_frame.is_none() {
                self.first_sound_frame = Some(self.total_frames);
            }
            self.flush_run();
        }

        self.total_frames += 1;

        if self.total_frames % PROGRESS_CADENCE_FRAMES == 0 {
            if let Some(cb) = self.progress.as_mut() {
                cb(self.total_frames, self.estimated_total_frames);
            }
        }
    }

    /// End of stream: flush any trailing run and hand out the result.
    /// Consuming `self` makes a double flush of the same run impossible.
    pub fn finish(mut self) -> SilenceAnalysisResult {
        self.flush_run();
        if let Some(cb) = self.progress.as_mut() {
            cb(self.total_frames, self.estimated_total_frames);
        }
        SilenceAnalysisResult {
            total_frames: self.total_frames,
            first_sound_frame: self.first_sound_frame,
            runs: self.runs,
        }
    }

    fn flush_run(&mut self) {
        if let Some(run) = self.in_progress.take() {
            if run.len >= self.duration_threshold_frames {
                self.runs.push(SilenceRun {
                    start_frame: run.start_frame,
                    end_frame: run.start_frame + run.len,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{ Arc, Mutex };

    // helper: amplitude that classifies silent against -40 dB is anything
    // below 0.01; 0.5 is clearly sound
    const SOUND: f64 = 0.5;
    const QUIET: f64 = 0.001;

    fn run_machine(peaks: &[f64], threshold: u64) -> SilenceAnalysisResult {
        let mut m = SilenceStateMachine::new(threshold, -40.0, None).unwrap();
        for &p in peaks {
            m.add_frame(p);
        }
        m.finish()
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(SilenceStateMachine::new(0, -40.0, None).is_err());
        assert!(SilenceStateMachine::new(10, f64::NAN, None).is_err());
        assert!(SilenceStateMachine::new(10, f64::INFINITY, None).is_err());
    }

    #[test]
    fn short_runs_are_dropped() {
        // 2 quiet frames with threshold 3: no run emitted
        let r = run_machine(&[SOUND, QUIET, QUIET, SOUND], 3);
        assert_eq!(r.total_frames, 4);
        assert_eq!(r.first_sound_frame, Some(0));
        assert!(r.runs.is_empty());
    }

    #[test]
    fn qualifying_run_has_exact_bounds() {
        let r = run_machine(&[SOUND, QUIET, QUIET, QUIET, SOUND, SOUND], 3);
        assert_eq!(r.runs, vec![SilenceRun { start_frame: 1, end_frame: 4 }]);
    }

    #[test]
    fn trailing_run_is_flushed_once_at_finish() {
        let r = run_machine(&[SOUND, SOUND, QUIET, QUIET, QUIET], 2);
        assert_eq!(r.total_frames, 5);
        assert_eq!(r.runs, vec![SilenceRun { start_frame: 2, end_frame: 5 }]);
    }

    #[test]
    fn entirely_silent_stream_has_no_first_sound() {
        let r = run_machine(&[QUIET; 10], 4);
        assert_eq!(r.first_sound_frame, None);
        assert_eq!(r.runs, vec![SilenceRun { start_frame: 0, end_frame: 10 }]);
    }

    #[test]
    fn first_sound_frame_is_index_of_first_loud_frame() {
        let r = run_machine(&[QUIET, QUIET, SOUND, QUIET], 1);
        assert_eq!(r.first_sound_frame, Some(2));
        // leading run [0,2) and trailing run [3,4)
        assert_eq!(r.runs, vec![
            SilenceRun { start_frame: 0, end_frame: 2 },
            SilenceRun { start_frame: 3, end_frame: 4 },
        ]);
    }

    #[test]
    fn zero_amplitude_is_negative_infinity_and_silent() {
        let r = run_machine(&[0.0, 0.0], 1);
        assert_eq!(r.runs, vec![SilenceRun { start_frame: 0, end_frame: 2 }]);
    }

    #[test]
    fn classification_is_strictly_below_threshold() {
        // exactly -40 dB is NOT silent (dB < level, strict)
        let mut m = SilenceStateMachine::new(1, -40.0, None).unwrap();
        m.add_frame(0.01); // 20*log10(0.01) == -40 exactly
        let r = m.finish();
        assert_eq!(r.first_sound_frame, Some(0));
        assert!(r.runs.is_empty());
    }

    #[test]
    fn progress_fires_at_cadence_and_at_end() {
        let calls: Arc<Mutex<Vec<(u64, Option<u64>)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let mut m = SilenceStateMachine::new(1, -40.0, Some(5000))
            .unwrap()
            .with_progress(move |done, total| {
                sink.lock().unwrap().push((done, total));
            });
        for _ in 0..PROGRESS_CADENCE_FRAMES + 10 {
            m.add_frame(SOUND);
        }
        let _ = m.finish();
        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[
                (PROGRESS_CADENCE_FRAMES, Some(5000)),
                (PROGRESS_CADENCE_FRAMES + 10, Some(5000)),
            ]
        );
    }

    #[test]
    fn two_passes_over_same_frames_agree() {
        let peaks: Vec<f64> = (0..500)
            .map(|i| if (i / 37) % 2 == 0 { SOUND } else { QUIET })
            .collect();
        let a = run_machine(&peaks, 10);
        let b = run_machine(&peaks, 10);
        assert_eq!(a.total_frames, b.total_frames);
        assert_eq!(a.first_sound_frame, b.first_sound_frame);
        assert_eq!(a.runs, b.runs);
    }
}
