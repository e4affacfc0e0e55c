//! External decoder collaborators: ffprobe for stream metadata, ffmpeg
//! for the decoded PCM frame stream.
//!
//! The engine never decodes audio itself. ffmpeg writes raw f32le
//! interleaved PCM to a pipe and this module regroups the bytes into
//! frames and pushes them, one at a time, into the analysis callback.
//! Resampling, when an analysis rate differs from the source rate, is
//! requested from ffmpeg with `-ar` — never performed here.

use std::io::Read;
use std::path::Path;
use std::process::{ Command, Stdio };
use std::sync::atomic::{ AtomicBool, Ordering };

use crate::error::{ CarveError, CarveResult };
use crate::mods::types::{ BitDepth, StreamInfo };

const BYTES_PER_SAMPLE: usize = 4; // f32le

/// Probe one input with ffprobe and build the immutable stream record.
pub fn probe(path: &Path, ffprobe_path: &str) -> CarveResult<StreamInfo> {
    if !path.exists() {
        return Err(CarveError::InputNotFound(path.to_path_buf()));
    }

    let output = Command::new(ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("a:0")
        .arg("-show_entries")
        .arg("stream=sample_rate,channels,sample_fmt,duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1")
        .arg(path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CarveError::Decoder(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe `key=value` lines into a validated `StreamInfo`.
fn parse_probe_output(text: &str) -> CarveResult<StreamInfo> {
    let mut sample_rate: Option<u32> = None;
    let mut channels: Option<u16> = None;
    let mut sample_fmt: Option<&str> = None;
    let mut duration_s: Option<f64> = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "N/A" {
            continue;
        }
        match key.trim() {
            "sample_rate" => {
                sample_rate = value.parse().ok();
            }
            "channels" => {
                channels = value.parse().ok();
            }
            "sample_fmt" => {
                sample_fmt = Some(value);
            }
            "duration" => {
                duration_s = value.parse().ok();
            }
            _ => {}
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| CarveError::Decoder("probe reported no sample rate".to_string()))?;
    let channels = channels
        .ok_or_else(|| CarveError::Decoder("probe reported no channel count".to_string()))?;
    let bit_depth = match sample_fmt {
        Some(fmt) => BitDepth::from_sample_fmt(fmt)?,
        None => {
            return Err(CarveError::Decoder("probe reported no sample format".to_string()));
        }
    };

    // duration is an estimate; frame totals from it feed progress
    // denominators only, never correctness
    let estimated_total_frames = duration_s
        .filter(|d| *d > 0.0)
        .map(|d| (d * (sample_rate as f64)).round() as u64)
        .filter(|&f| f > 0);

    let info = StreamInfo {
        sample_rate,
        channels,
        bit_depth,
        estimated_total_frames,
    };
    info.validate()?;
    Ok(info)
}

/// Stream decoded frames out of an ffmpeg child process.
///
/// `on_frame` receives one interleaved frame at a time, in order. The
/// cancel flag is checked before every frame, so a cancellation request
/// halts within one frame's processing time. Returns the frame count.
pub fn stream_frames(
    path: &Path,
    ffmpeg_path: &str,
    target_rate: Option<u32>,
    channels: u16,
    cancel: &AtomicBool,
    on_frame: &mut dyn FnMut(&[f32]) -> CarveResult<()>
) -> CarveResult<u64> {
    if !path.exists() {
        return Err(CarveError::InputNotFound(path.to_path_buf()));
    }
    if channels == 0 {
        return Err(CarveError::invalid("channel count must be > 0"));
    }
    if let Some(0) = target_rate {
        return Err(CarveError::invalid("analysis sample rate must be > 0"));
    }

    let mut command = Command::new(ffmpeg_path);
    command
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(path);
    if let Some(rate) = target_rate {
        command.arg("-ar").arg(rate.to_string());
    }
    command
        .arg("-ac")
        .arg(channels.to_string())
        .arg("-f")
        .arg("f32le")
        .arg("-acodec")
        .arg("pcm_f32le")
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let stdout = match child.stdout.take() {
        Some(out) => out,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CarveError::Decoder("ffmpeg stdout pipe unavailable".to_string()));
        }
    };

    let result = read_frames(stdout, channels, cancel, on_frame);

    if result.is_err() {
        let _ = child.kill();
        let _ = child.wait();
        return result;
    }

    let mut stderr_text = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut stderr_text);
    }
    let status = child.wait()?;
    if !status.success() {
        return Err(CarveError::Decoder(format!("ffmpeg exited with {}: {}", status, stderr_text.trim())));
    }

    result
}

/// Regroup a raw f32le byte stream into interleaved frames.
///
/// Factored off the child process so the framing and cancellation
/// behavior is testable against an in-memory reader.
fn read_frames<R: Read>(
    mut reader: R,
    channels: u16,
    cancel: &AtomicBool,
    on_frame: &mut dyn FnMut(&[f32]) -> CarveResult<()>
) -> CarveResult<u64> {
    let frame_bytes = (channels as usize) * BYTES_PER_SAMPLE;
    let mut chunk = vec![0u8; 64 * 1024];
    let mut pending: Vec<u8> = Vec::new();
    let mut frame_buf: Vec<f32> = Vec::with_capacity(channels as usize);
    let mut frames: u64 = 0;

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);

        let mut off = 0;
        while pending.len() - off >= frame_bytes {
            if cancel.load(Ordering::Relaxed) {
                return Err(CarveError::Cancelled);
            }
            frame_buf.clear();
            for sample in pending[off..off + frame_bytes].chunks_exact(BYTES_PER_SAMPLE) {
                frame_buf.push(f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]));
            }
            on_frame(&frame_buf)?;
            frames += 1;
            off += frame_bytes;
        }
        pending.drain(..off);
    }

    if !pending.is_empty() {
        return Err(CarveError::IncompleteFrameData {
            got: pending.len(),
            frame_bytes,
        });
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bytes_for(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn probe_output_parses_key_value_lines() {
        let text = "sample_rate=44100\nchannels=2\nsample_fmt=s16p\nduration=2.500000\n";
        let info = parse_probe_output(text).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bit_depth, BitDepth::Pcm16);
        assert_eq!(info.estimated_total_frames, Some(110_250));
    }

    #[test]
    fn probe_tolerates_missing_duration() {
        let text = "sample_rate=48000\nchannels=1\nsample_fmt=fltp\nduration=N/A\n";
        let info = parse_probe_output(text).unwrap();
        assert_eq!(info.estimated_total_frames, None);
        assert_eq!(info.bit_depth, BitDepth::Float32);
    }

    #[test]
    fn probe_rejects_unknown_sample_format() {
        let text = "sample_rate=44100\nchannels=2\nsample_fmt=dsd_lsbf\n";
        assert!(matches!(
            parse_probe_output(text),
            Err(CarveError::UnsupportedSampleFormat(_))
        ));
    }

    #[test]
    fn frames_are_regrouped_in_order() {
        let data = bytes_for(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let cancel = AtomicBool::new(false);
        let mut seen: Vec<Vec<f32>> = Vec::new();
        let frames = read_frames(Cursor::new(data), 2, &cancel, &mut |f| {
            seen.push(f.to_vec());
            Ok(())
        }).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(seen, vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]]);
    }

    #[test]
    fn trailing_partial_frame_is_an_error() {
        let mut data = bytes_for(&[0.1, 0.2]);
        data.extend_from_slice(&[0u8; 3]); // 3 stray bytes
        let cancel = AtomicBool::new(false);
        let err = read_frames(Cursor::new(data), 2, &cancel, &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, CarveError::IncompleteFrameData { got: 3, frame_bytes: 8 }));
    }

    #[test]
    fn cancellation_is_observed_before_the_next_frame() {
        let data = bytes_for(&[0.0; 64]);
        let cancel = AtomicBool::new(false);
        let mut count = 0u32;
        let err = read_frames(Cursor::new(data), 1, &cancel, &mut |_| {
            count += 1;
            if count == 5 {
                cancel.store(true, Ordering::Relaxed);
            }
            Ok(())
        }).unwrap_err();
        assert!(matches!(err, CarveError::Cancelled));
        assert_eq!(count, 5);
    }

    #[test]
    fn callback_errors_propagate_unmodified() {
        let data = bytes_for(&[0.0; 8]);
        let cancel = AtomicBool::new(false);
        let err = read_frames(Cursor::new(data), 1, &cancel, &mut |_| {
            Err(CarveError::invalid("sink refused"))
        }).unwrap_err();
        assert!(matches!(err, CarveError::InvalidArgument(_)));
    }

    #[test]
    fn missing_input_is_reported_as_not_found() {
        let cancel = AtomicBool::new(false);
        let err = stream_frames(
            Path::new("/definitely/not/here.flac"),
            "ffmpeg",
            None,
            2,
            &cancel,
            &mut |_| Ok(())
        ).unwrap_err();
        assert!(matches!(err, CarveError::InputNotFound(_)));
    }
}
