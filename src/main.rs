//! src/main.rs

use anyhow::Result;
use std::{ env, path::Path, sync::Arc };

mod error;
mod logger;
use logger::Logger;

use crate::logger::LogLevel;

// the analysis components live in src/mods/
mod mods;

use crate::mods::frame_math::{ Resolution, TimeArgument };

// ───────────────────────────────────────────────────────────────────────────────
// configuration
// ───────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Analyze,
    Batch,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,

    // inputs
    pub inputs: Vec<String>,
    pub input_dir: String,

    // external decoder binaries
    pub ffmpeg_path: String,
    pub ffprobe_path: String,

    // paths
    pub log_path: String,
    pub segments_csv_path: String,
    pub envelope_csv_path: String,
    pub spectral_csv_path: String,

    // silence classification
    pub silence_level_db: f64,
    pub min_silence: TimeArgument,
    pub after_offset: TimeArgument,
    pub resume_offset: TimeArgument,

    // decode resolution
    pub analysis_sample_rate_hz: u32,
    pub resolution: Option<Resolution>,

    // peak envelope
    pub env_window_ms: u64,
    pub env_hop_ms: u64,
    pub env_min_db: f64,

    // spectral analysis
    pub fft_window_samples: usize,
    pub fft_hop_ms: u64,
    pub fft_bins: usize,
    pub fft_min_db: f64,

    // batch
    pub jobs: usize,

    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        let default_log = env
            ::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("SilenceCarver.log")
            .to_string_lossy()
            .into_owned();

        let beside_log = |name: &str| {
            let p = Path::new(&default_log);
            match p.parent() {
                Some(dir) => dir.join(name).to_string_lossy().into_owned(),
                None => String::from(name),
            }
        };

        Self {
            mode: Mode::Analyze,

            inputs: Vec::new(),
            input_dir: String::new(),

            ffmpeg_path: String::from("ffmpeg"),
            ffprobe_path: String::from("ffprobe"),

            segments_csv_path: beside_log("Segments.csv"),
            envelope_csv_path: beside_log("Envelope.csv"),
            spectral_csv_path: beside_log("Spectral.csv"),
            log_path: default_log,

            silence_level_db: -40.0,
            min_silence: TimeArgument::from_seconds(2.0).unwrap_or_default(),
            after_offset: TimeArgument::default(),
            resume_offset: TimeArgument::default(),

            analysis_sample_rate_hz: 0,
            resolution: None,

            env_window_ms: 300,
            env_hop_ms: 100,
            env_min_db: -90.0,

            fft_window_samples: 1024,
            fft_hop_ms: 250,
            fft_bins: 64,
            fft_min_db: -120.0,

            jobs: 4,

            log_level: LogLevel::Info,
        }
    }
}

fn print_usage(cfg: &Config) {
    println!("Usage: silence-carver [OPTIONS]\n");
    println!("Modes:");
    println!("  --mode analyze        (default) Analyze one input file");
    println!("  --mode batch          Analyze many files on worker threads\n");

    println!("Inputs:");
    println!("  --input <PATH>                Audio file to analyze (repeatable in batch mode)");
    println!("  --input-dir <DIR>             (batch) Also queue every audio file in this directory\n");

    println!("General paths:");
    println!("  --log-path <PATH>             Path to the log file (default: {})", cfg.log_path);
    println!(
        "  --log-level <LEVEL>           Log level: debug, info, warning, error (default: info)"
    );
    println!(
        "  --segments-csv <PATH>         Segment output CSV (default: {})",
        cfg.segments_csv_path
    );
    println!(
        "  --envelope-csv <PATH>         Envelope output CSV (default: {})",
        cfg.envelope_csv_path
    );
    println!(
        "  --spectral-csv <PATH>         Spectral output CSV (default: {})",
        cfg.spectral_csv_path
    );
    println!("  --ffmpeg-path <PATH>          ffmpeg executable (default: {})", cfg.ffmpeg_path);
    println!("  --ffprobe-path <PATH>         ffprobe executable (default: {})\n", cfg.ffprobe_path);

    println!("Silence options:");
    println!(
        "  --silence-db <DB>             Peak level below which a frame is silent (default: {:.0})",
        cfg.silence_level_db
    );
    println!(
        "  --min-silence <TIME>          Shortest silence that counts, e.g. 500ms or 2s (default: {:.1}s)",
        cfg.min_silence.seconds()
    );
    println!(
        "  --after-offset <TIME>         Signed shift applied after each silence run (default: {:+.1}s)",
        cfg.after_offset.seconds()
    );
    println!(
        "  --resume-offset <TIME>        Signed shift applied before sound resumes (default: {:+.1}s)\n",
        cfg.resume_offset.seconds()
    );

    println!("Decode options:");
    println!(
        "  --analysis-sr <HZ>            Resample input to this rate before analysis (default: {}). Use 0 to keep native.",
        cfg.analysis_sample_rate_hz
    );
    println!("  --resolution <DEPTH/RATE>     Force decode resolution, e.g. 16/44100\n");

    println!("Envelope options:");
    println!("  --env-window-ms <MS>          Trailing peak window (default: {})", cfg.env_window_ms);
    println!("  --env-hop-ms <MS>             Anchor spacing (default: {})", cfg.env_hop_ms);
    println!("  --env-min-db <DB>             dB floor for envelope points (default: {:.0})\n", cfg.env_min_db);

    println!("Spectral options:");
    println!(
        "  --fft-window <SAMPLES>        Trailing FFT window (default: {})",
        cfg.fft_window_samples
    );
    println!("  --fft-hop-ms <MS>             Anchor spacing (default: {})", cfg.fft_hop_ms);
    println!("  --fft-bins <N>                Leading bins to export (default: {})", cfg.fft_bins);
    println!("  --fft-min-db <DB>             dB floor for bins (default: {:.0})\n", cfg.fft_min_db);

    println!("Batch options:");
    println!("  --jobs <N>                    Concurrent worker threads (default: {})\n", cfg.jobs);

    println!("Examples:");
    println!("  silence-carver --input track.flac --min-silence 1.5s --silence-db -45");
    println!("  silence-carver --input lecture.mp3 --after-offset 200ms --resume-offset -200ms");
    println!("  silence-carver --mode batch --input-dir ./recordings --jobs 8");
}

fn parse_arguments() -> std::result::Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --mode".to_string());
                }
                match args[i + 1].to_lowercase().as_str() {
                    "analyze" | "analyse" => {
                        config.mode = Mode::Analyze;
                    }
                    "batch" => {
                        config.mode = Mode::Batch;
                    }
                    other => {
                        return Err(format!("Unknown mode: {}", other));
                    }
                }
                i += 2;
            }
            "--input" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --input".to_string());
                }
                config.inputs.push(args[i + 1].to_string());
                i += 2;
            }
            "--input-dir" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --input-dir".to_string());
                }
                config.input_dir = args[i + 1].to_string();
                i += 2;
            }
            "--log-path" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --log-path".to_string());
                }
                config.log_path = args[i + 1].to_string();
                i += 2;
            }
            "--log-level" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --log-level".to_string());
                }
                match args[i + 1].to_lowercase().as_str() {
                    "debug" => {
                        config.log_level = LogLevel::Debug;
                    }
                    "info" => {
                        config.log_level = LogLevel::Info;
                    }
                    "warning" | "warn" => {
                        config.log_level = LogLevel::Warning;
                    }
                    "error" => {
                        config.log_level = LogLevel::Error;
                    }
                    other => {
                        return Err(
                            format!("Invalid log level: {}. Valid options: debug, info, warning, error", other)
                        );
                    }
                }
                i += 2;
            }
            "--segments-csv" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --segments-csv".to_string());
                }
                config.segments_csv_path = args[i + 1].to_string();
                i += 2;
            }
            "--envelope-csv" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --envelope-csv".to_string());
                }
                config.envelope_csv_path = args[i + 1].to_string();
                i += 2;
            }
            "--spectral-csv" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --spectral-csv".to_string());
                }
                config.spectral_csv_path = args[i + 1].to_string();
                i += 2;
            }
            "--ffmpeg-path" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --ffmpeg-path".to_string());
                }
                config.ffmpeg_path = args[i + 1].to_string();
                i += 2;
            }
            "--ffprobe-path" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --ffprobe-path".to_string());
                }
                config.ffprobe_path = args[i + 1].to_string();
                i += 2;
            }
            "--silence-db" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --silence-db".to_string());
                }
                config.silence_level_db = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid silence-db value".to_string())?;
                i += 2;
            }
            "--min-silence" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --min-silence".to_string());
                }
                config.min_silence = args[i + 1].parse().map_err(|e| format!("{}", e))?;
                i += 2;
            }
            "--after-offset" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --after-offset".to_string());
                }
                config.after_offset = args[i + 1].parse().map_err(|e| format!("{}", e))?;
                i += 2;
            }
            "--resume-offset" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --resume-offset".to_string());
                }
                config.resume_offset = args[i + 1].parse().map_err(|e| format!("{}", e))?;
                i += 2;
            }
            "--analysis-sr" | "--sr" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --analysis-sr".to_string());
                }
                config.analysis_sample_rate_hz = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid analysis-sr value".to_string())?;
                i += 2;
            }
            "--resolution" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --resolution".to_string());
                }
                let res: Resolution = args[i + 1].parse().map_err(|e| format!("{}", e))?;
                config.analysis_sample_rate_hz = res.sample_rate;
                config.resolution = Some(res);
                i += 2;
            }
            "--env-window-ms" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --env-window-ms".to_string());
                }
                let v: u64 = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid env-window-ms value".to_string())?;
                config.env_window_ms = v.max(1);
                i += 2;
            }
            "--env-hop-ms" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --env-hop-ms".to_string());
                }
                let v: u64 = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid env-hop-ms value".to_string())?;
                config.env_hop_ms = v.max(1);
                i += 2;
            }
            "--env-min-db" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --env-min-db".to_string());
                }
                config.env_min_db = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid env-min-db value".to_string())?;
                i += 2;
            }
            "--fft-window" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --fft-window".to_string());
                }
                let v: usize = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid fft-window value".to_string())?;
                config.fft_window_samples = v.max(1);
                i += 2;
            }
            "--fft-hop-ms" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --fft-hop-ms".to_string());
                }
                let v: u64 = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid fft-hop-ms value".to_string())?;
                config.fft_hop_ms = v.max(1);
                i += 2;
            }
            "--fft-bins" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --fft-bins".to_string());
                }
                config.fft_bins = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid fft-bins value".to_string())?;
                i += 2;
            }
            "--fft-min-db" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --fft-min-db".to_string());
                }
                config.fft_min_db = args[i + 1]
                    .parse()
                    .map_err(|_| "Invalid fft-min-db value".to_string())?;
                i += 2;
            }
            "--jobs" => {
                if i + 1 >= args.len() {
                    return Err("Missing value for --jobs".to_string());
                }
                let v: usize = args[i + 1].parse().map_err(|_| "Invalid jobs value".to_string())?;
                config.jobs = v.max(1);
                i += 2;
            }
            "-h" | "--help" => {
                print_usage(&config);
                std::process::exit(0);
            }
            other => {
                return Err(format!("Unknown argument: {}", other));
            }
        }
    }

    Ok(config)
}

// ───────────────────────────────────────────────────────────────────────────────
// main
// ───────────────────────────────────────────────────────────────────────────────
fn main() -> Result<()> {
    let cli = match parse_arguments() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}\n", e);
            print_usage(&Config::default());
            std::process::exit(1);
        }
    };

    let logger = Arc::new(Logger::new_with_level(&cli.log_path, cli.log_level)?);

    match cli.mode {
        Mode::Analyze => mods::analyze::run_analyze(&cli, logger),
        Mode::Batch => mods::batch::run_batch(&cli, logger),
    }
}
