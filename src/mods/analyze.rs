//! Analyze mode — probe one input, stream its frames once, and feed all
//! three analyzers in the same pass. Silence results become segments,
//! envelope and spectral points stream straight into their CSV sinks.

use anyhow::Result;
use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use crate::error::CarveError;
use crate::log_debug;
use crate::logger::Logger;
use crate::mods::decoder;
use crate::mods::envelope::PeakWindowAnalyzer;
use crate::mods::export::{ append_segments_csv, EnvelopeCsvSink, SpectralCsvSink };
use crate::mods::progress::WorkerProgress;
use crate::mods::segments::{ self, AudioSegment };
use crate::mods::silence::{ SilenceAnalysisResult, SilenceStateMachine };
use crate::mods::spectral::{ SpectralHop, SpectralWindowAnalyzer };
use crate::mods::types::{ frame_peak, PeakPoint, SpectralPoint, StreamInfo };
use crate::Config;

/// Where one pipeline's outputs land.
pub struct SinkPaths {
    pub segments: PathBuf,
    pub envelope: PathBuf,
    pub spectral: PathBuf,
}

impl SinkPaths {
    /// Shared output files, as configured for analyze mode.
    pub fn from_config(cli: &Config) -> Self {
        SinkPaths {
            segments: PathBuf::from(&cli.segments_csv_path),
            envelope: PathBuf::from(&cli.envelope_csv_path),
            spectral: PathBuf::from(&cli.spectral_csv_path),
        }
    }

    /// Per-input output files, so batch workers never share a sink.
    pub fn beside_input(input: &Path) -> Self {
        let base = input.to_string_lossy().into_owned();
        SinkPaths {
            segments: PathBuf::from(format!("{}.segments.csv", base)),
            envelope: PathBuf::from(format!("{}.envelope.csv", base)),
            spectral: PathBuf::from(format!("{}.spectral.csv", base)),
        }
    }
}

pub struct AnalysisOutcome {
    pub info: StreamInfo,
    pub analysis_rate: u32,
    pub frames: u64,
    pub result: SilenceAnalysisResult,
    pub segments: Vec<AudioSegment>,
    pub envelope_points: u64,
    pub spectral_points: u64,
}

/// Run the full single-pass pipeline over one input file.
///
/// All `InvalidArgument` conditions surface here before the first frame
/// is decoded; mid-stream failures from the decoder propagate unchanged.
pub fn analyze_file(
    cli: &Config,
    input: &Path,
    paths: &SinkPaths,
    logger: &Arc<Logger>,
    cancel: &AtomicBool,
    worker: Option<&WorkerProgress>
) -> Result<AnalysisOutcome> {
    let label = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string();

    let info = decoder::probe(input, &cli.ffprobe_path)?;
    logger.info(
        &format!(
            "{}: probed {} Hz, {} ch, {:?}, est. frames {}",
            label,
            info.sample_rate,
            info.channels,
            info.bit_depth,
            info.estimated_total_frames
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )
    )?;

    let analysis_rate = if cli.analysis_sample_rate_hz == 0 {
        info.sample_rate
    } else {
        cli.analysis_sample_rate_hz
    };
    // resampling belongs to the decoder; the analyzers only ever see
    // frames already at the analysis rate
    let target_rate = if analysis_rate != info.sample_rate {
        logger.info(&format!("{}: requesting resample {} Hz -> {} Hz", label, info.sample_rate, analysis_rate))?;
        Some(analysis_rate)
    } else {
        None
    };
    let est_frames = info.estimated_total_frames.map(|f| {
        if analysis_rate == info.sample_rate {
            f
        } else {
            ((f as u128) * (analysis_rate as u128) / (info.sample_rate as u128)) as u64
        }
    });

    // eager validation of every analyzer before the first frame
    let threshold = cli.min_silence.threshold_frames(analysis_rate)?;
    let progress_logger = logger.clone();
    let progress_label = label.clone();
    let mut silence = SilenceStateMachine::new(threshold, cli.silence_level_db, est_frames)?
        .with_progress(move |done, total| {
            let _ = log_debug!(
                progress_logger,
                "{}: {} / {} frames",
                progress_label,
                done,
                total.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
            );
        });
    let mut envelope = PeakWindowAnalyzer::new(
        &label,
        analysis_rate,
        cli.env_window_ms,
        cli.env_hop_ms,
        cli.env_min_db
    )?;
    let mut spectral = SpectralWindowAnalyzer::new(
        &label,
        analysis_rate,
        info.channels,
        cli.fft_window_samples,
        SpectralHop::Millis(cli.fft_hop_ms),
        cli.fft_bins,
        cli.fft_min_db
    )?;

    let mut env_csv = EnvelopeCsvSink::open(&paths.envelope)?;
    let mut spec_csv = SpectralCsvSink::open(&paths.spectral)?;

    if let (Some(w), Some(est)) = (worker, est_frames) {
        let est_ms = est * 1000 / (analysis_rate as u64);
        let env_points = est_ms / cli.env_hop_ms;
        let fft_hop_frames = (cli.fft_hop_ms * (analysis_rate as u64) / 1000).max(1);
        let spec_points = (est / fft_hop_frames) * (info.channels as u64);
        w.set_expected(Some(env_points + spec_points));
    }

    let frames = decoder::stream_frames(
        input,
        &cli.ffmpeg_path,
        target_rate,
        info.channels,
        cancel,
        &mut |frame| {
            silence.add_frame(frame_peak(frame) as f64);

            let mut env_err: Option<CarveError> = None;
            {
                let env_csv = &mut env_csv;
                let mut on_point = |p: PeakPoint| {
                    if let Some(w) = worker {
                        w.add_enqueued(1);
                    }
                    match env_csv.write(&p) {
                        Ok(()) => {
                            if let Some(w) = worker {
                                w.add_inserted(1);
                            }
                        }
                        Err(e) => {
                            env_err = Some(e);
                        }
                    }
                };
                envelope.add_frame(frame, &mut on_point);
            }
            if let Some(e) = env_err {
                return Err(e);
            }

            let mut spec_err: Option<CarveError> = None;
            {
                let spec_csv = &mut spec_csv;
                let mut on_point = |p: SpectralPoint| {
                    if let Some(w) = worker {
                        w.add_enqueued(1);
                    }
                    match spec_csv.write(&p) {
                        Ok(()) => {
                            if let Some(w) = worker {
                                w.add_inserted(1);
                            }
                        }
                        Err(e) => {
                            spec_err = Some(e);
                        }
                    }
                };
                spectral.add_frame(frame, &mut on_point)?;
            }
            if let Some(e) = spec_err {
                return Err(e);
            }
            Ok(())
        }
    )?;

    // trailing envelope anchors whose window has fully elapsed
    {
        let env_csv = &mut env_csv;
        let mut tail_err: Option<CarveError> = None;
        let mut on_point = |p: PeakPoint| {
            if let Some(w) = worker {
                w.add_enqueued(1);
            }
            match env_csv.write(&p) {
                Ok(()) => {
                    if let Some(w) = worker {
                        w.add_inserted(1);
                    }
                }
                Err(e) => {
                    tail_err = Some(e);
                }
            }
        };
        envelope.finish(&mut on_point);
        if let Some(e) = tail_err {
            return Err(e.into());
        }
    }

    let result = silence.finish();
    let planned = segments::plan(&result, analysis_rate, cli.after_offset, cli.resume_offset)?;
    append_segments_csv(&paths.segments, &label, analysis_rate, &planned)?;
    env_csv.flush()?;
    spec_csv.flush()?;

    logger.info(
        &format!(
            "{}: {} frames, {} silence run(s), {} segment(s), {} envelope point(s), {} spectral point(s)",
            label,
            frames,
            result.runs.len(),
            planned.len(),
            env_csv.written(),
            spec_csv.written()
        )
    )?;

    Ok(AnalysisOutcome {
        info,
        analysis_rate,
        frames,
        result,
        segments: planned,
        envelope_points: env_csv.written(),
        spectral_points: spec_csv.written(),
    })
}

/// Analyze mode — one input file, shared output CSVs.
pub fn run_analyze(cli: &Config, logger: Arc<Logger>) -> Result<()> {
    let input = cli.inputs
        .first()
        .ok_or_else(|| anyhow::anyhow!("--input <PATH> is required in analyze mode"))?;
    let input = Path::new(input);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let c = cancel.clone();
        let _ = ctrlc::set_handler(move || {
            c.store(true, Ordering::SeqCst);
        });
    }

    logger.info(
        &format!(
            "silence-carver analyze starting…  silence_db={:.1} min_silence={:.3}s after={:+.3}s resume={:+.3}s",
            cli.silence_level_db,
            cli.min_silence.seconds(),
            cli.after_offset.seconds(),
            cli.resume_offset.seconds()
        )
    )?;

    if let Some(res) = &cli.resolution {
        logger.info(
            &format!("forced decode resolution: {:?} at {} Hz", res.bit_depth, res.sample_rate)
        )?;
    }

    let paths = SinkPaths::from_config(cli);
    let outcome = analyze_file(cli, input, &paths, &logger, &cancel, None)?;

    println!(
        "✓ {}: {} segment(s) from {} frames at {} Hz",
        input.display(),
        outcome.segments.len(),
        outcome.frames,
        outcome.analysis_rate
    );
    println!(
        "  source: {} Hz, {} ch, {:?}",
        outcome.info.sample_rate,
        outcome.info.channels,
        outcome.info.bit_depth
    );
    if let Some(first) = outcome.result.first_sound_frame {
        println!(
            "  first sound at {} s",
            crate::mods::frame_math::invariant_time_text(first, outcome.analysis_rate)
        );
    }
    for seg in &outcome.segments {
        println!(
            "  {} .. {}  ({} frames)",
            crate::mods::frame_math::invariant_time_text(seg.start_frame, outcome.analysis_rate),
            crate::mods::frame_math::invariant_time_text(seg.end_frame, outcome.analysis_rate),
            seg.len()
        );
    }
    println!("  segments -> {}", paths.segments.display());
    println!("  envelope -> {} ({} points)", paths.envelope.display(), outcome.envelope_points);
    println!("  spectra  -> {} ({} points)", paths.spectral.display(), outcome.spectral_points);

    Ok(())
}
