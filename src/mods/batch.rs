//! Batch mode — one worker thread per queued input, a shared cancel
//! flag, and a console render loop fed by the progress coordinator.
//!
//! Workers never share frame data or sinks; each writes CSVs beside its
//! own input. The only cross-thread traffic is the work queue, the done
//! channel, and the per-worker atomic counters.

use anyhow::{ bail, Result };
use crossbeam_channel::{ bounded, unbounded };
use std::path::PathBuf;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::CarveError;
use crate::log_error;
use crate::logger::Logger;
use crate::mods::analyze::{ analyze_file, SinkPaths };
use crate::mods::progress::BatchProgressCoordinator;
use crate::Config;

const AUDIO_EXTENSIONS: &[&str] = &[
    "wav",
    "flac",
    "mp3",
    "m4a",
    "aac",
    "ogg",
    "opus",
    "mp4",
    "mkv",
    "webm",
];

const RENDER_INTERVAL: Duration = Duration::from_millis(500);

fn display_label(path: &PathBuf) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string()
}

/// Inputs named explicitly plus everything with an audio extension in
/// the scan directory, deduplicated, in stable order.
fn collect_inputs(cli: &Config) -> Result<Vec<PathBuf>> {
    let mut inputs: Vec<PathBuf> = cli.inputs.iter().map(PathBuf::from).collect();

    if !cli.input_dir.is_empty() {
        let mut found: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&cli.input_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if let Some(ext) = ext {
                if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                    found.push(path);
                }
            }
        }
        found.sort();
        inputs.extend(found);
    }

    inputs.dedup();
    if inputs.is_empty() {
        bail!("no inputs: pass --input <PATH> and/or --input-dir <DIR>");
    }
    Ok(inputs)
}

/// Batch mode entry point.
pub fn run_batch(cli: &Config, logger: Arc<Logger>) -> Result<()> {
    let inputs = collect_inputs(cli)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let c = cancel.clone();
        let _ = ctrlc::set_handler(move || {
            c.store(true, Ordering::SeqCst);
        });
    }

    logger.info(&format!("silence-carver batch starting: {} input(s), {} job(s)", inputs.len(), cli.jobs))?;

    let mut coordinator = BatchProgressCoordinator::new();
    let (work_tx, work_rx) = bounded(inputs.len());
    let (done_tx, done_rx) = unbounded::<(String, Option<String>)>();

    for input in &inputs {
        let worker = coordinator.register(display_label(input));
        work_tx
            .send((input.clone(), worker))
            .map_err(|_| anyhow::anyhow!("work queue closed before seeding"))?;
    }
    drop(work_tx);

    let jobs = cli.jobs.max(1).min(inputs.len());

    thread::scope(|scope| {
        for _ in 0..jobs {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let cancel = cancel.clone();
            let logger = logger.clone();
            scope.spawn(move || {
                while let Ok((path, worker)) = work_rx.recv() {
                    let label = display_label(&path);
                    if cancel.load(Ordering::SeqCst) {
                        worker.mark_finished();
                        let _ = done_tx.send((label, Some("cancelled".to_string())));
                        continue;
                    }
                    let paths = SinkPaths::beside_input(&path);
                    match analyze_file(cli, &path, &paths, &logger, &cancel, Some(&worker)) {
                        Ok(_) => {
                            worker.mark_finished();
                            let _ = done_tx.send((label, None));
                        }
                        Err(e) => {
                            let cancelled = e
                                .downcast_ref::<CarveError>()
                                .map(|c| matches!(c, CarveError::Cancelled))
                                .unwrap_or(false);
                            if cancelled {
                                worker.mark_finished();
                                let _ = done_tx.send((label, Some("cancelled".to_string())));
                            } else {
                                worker.mark_failed();
                                let _ = log_error!(logger, "{}: {:#}", label, e);
                                let _ = done_tx.send((label, Some(format!("{:#}", e))));
                            }
                        }
                    }
                }
            });
        }
        drop(done_tx);

        // render loop on the calling thread until every worker reports in
        while !coordinator.all_finished() {
            thread::sleep(RENDER_INTERVAL);
            for snap in coordinator.snapshot() {
                println!("{}", BatchProgressCoordinator::render_line(&snap));
            }
        }
    });

    let mut failures = 0usize;
    let mut cancelled = 0usize;
    while let Ok((label, error)) = done_rx.recv() {
        match error {
            None => println!("✓ {}", label),
            Some(reason) if reason == "cancelled" => {
                cancelled += 1;
                println!("- {} (cancelled)", label);
            }
            Some(reason) => {
                failures += 1;
                println!("✗ {}: {}", label, reason);
            }
        }
    }

    logger.info(&format!(
        "batch finished: {} ok, {} failed, {} cancelled",
        inputs.len() - failures - cancelled,
        failures,
        cancelled
    ))?;

    if cancel.load(Ordering::SeqCst) {
        bail!("batch interrupted");
    }
    if failures == inputs.len() {
        bail!("every input failed");
    }
    Ok(())
}
