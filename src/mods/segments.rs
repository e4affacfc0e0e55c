//! Turns a finished silence analysis into the list of playable segments.
//!
//! Pure frame arithmetic: cut after each silence run starts (plus the
//! `after` offset), resume where it ends (plus the `resume` offset).
//! Offsets are signed, so adjacent segments may overlap; that is accepted
//! behavior, it captures crossfade-adjacent audio around a cut.

use crate::error::CarveResult;
use crate::mods::frame_math::{ clamp_frame, TimeArgument };
use crate::mods::silence::SilenceAnalysisResult;

/// A contiguous frame range intended for export as one output unit.
/// `end_frame` is exclusive; each segment satisfies `start < end` even
/// though segments in a list may overlap each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSegment {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl AudioSegment {
    pub fn len(&self) -> u64 {
        self.end_frame - self.start_frame
    }
}

/// Build the segment list for one analyzed stream.
///
/// An entirely silent stream (no first sound frame) yields no segments
/// regardless of offsets. When the stream ends inside a qualifying
/// silence run, the final segment ends at that run's (offset) start
/// instead of at total — there is nothing worth keeping after it.
pub fn plan(
    result: &SilenceAnalysisResult,
    sample_rate: u32,
    after_offset: TimeArgument,
    resume_offset: TimeArgument
) -> CarveResult<Vec<AudioSegment>> {
    let first_sound = match result.first_sound_frame {
        Some(f) => f as i64,
        None => {
            return Ok(Vec::new());
        }
    };

    let after = after_offset.offset_frames(sample_rate)?;
    let resume = resume_offset.offset_frames(sample_rate)?;
    let total = result.total_frames as i64;

    let mut segments = Vec::new();
    let mut current_start = clamp_frame(first_sound + resume, 0, total)?;

    for run in &result.runs {
        let end = clamp_frame((run.start_frame as i64) + after, 0, total)?;
        if end > current_start {
            segments.push(AudioSegment {
                start_frame: current_start as u64,
                end_frame: end as u64,
            });
        }
        current_start = clamp_frame((run.end_frame as i64) + resume, 0, total)?;
    }

    let final_end = match result.runs.last() {
        // stream ends inside a silence run: cut at the run's offset start
        Some(last) if last.end_frame == result.total_frames => {
            clamp_frame((last.start_frame as i64) + after, 0, total)?
        }
        _ => total,
    };
    if final_end > current_start {
        segments.push(AudioSegment {
            start_frame: current_start as u64,
            end_frame: final_end as u64,
        });
    }

    Ok(segments)
}
