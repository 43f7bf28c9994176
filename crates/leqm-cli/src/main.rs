//! `leqm`: command-line Leq(M) / LKFS cinema loudness measurement tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use leqm_core::LeqmError;
use leqm_decode::{CalibratedSource, SampleSource, WavSource};
use leqm_engine::{EngineConfig, GatingMode, LoudnessEngine, MeasurementOutcome};
use log::{info, warn};
use serde::Serialize;

/// Report rendering: `json` (default, machine-readable) or `text` (a
/// human-readable summary table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "leqm", about = "ISO 21727 Leq(M) / BS.1770-4 LKFS loudness measurement")]
struct Cli {
    /// Input audio file (WAV, or any symphonia-supported format with the
    /// `transcode` feature enabled).
    input: PathBuf,

    /// Decode via symphonia instead of the mandatory hound/WAV path
    /// (requires the `transcode` build feature).
    #[arg(long)]
    transcode: bool,

    /// Report rendering.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Write the per-block Leq(M) series as two columns (seconds, dB) to
    /// this file, in addition to the report (requires `--logleqm`).
    #[arg(long, value_name = "PATH")]
    logfile: Option<PathBuf>,

    /// Use FIR convolution with N points instead of the IIR recurrence.
    #[arg(long, value_name = "N")]
    convpoints: Option<usize>,

    /// Worker count (default: CPU count).
    #[arg(long, value_name = "N")]
    numcpus: Option<usize>,

    /// Per-channel calibration gain in dB, one value per channel.
    #[arg(long, value_name = "DB", num_args = 1.., value_delimiter = ' ')]
    chconfcal: Vec<f64>,

    /// Also emit unweighted Leq.
    #[arg(long)]
    leqnw: bool,

    /// Emit per-block Leq(M) series.
    #[arg(long)]
    logleqm: bool,

    /// Emit 10-minute sliding series + Allen metric.
    #[arg(long)]
    logleqm10: bool,

    /// Long-window duration in minutes.
    #[arg(long, value_name = "M", default_value_t = leqm_core::DEFAULT_LONG_PERIOD_MINUTES)]
    longperiod: f64,

    /// Block size in ms (750 recommended for Allen mode).
    #[arg(long, value_name = "MS", default_value_t = leqm_core::DEFAULT_BUFFER_MS)]
    buffersize: u32,

    /// Allen metric threshold in dB.
    #[arg(long, value_name = "DB", default_value_t = leqm_core::DEFAULT_ALLEN_THRESHOLD_DB)]
    threshold: f64,

    /// Enable BS.1770-4 LKFS with gating.
    #[arg(long)]
    lkfs: bool,

    /// Enable dialogue-gated LKFS(DI) / Leq(M,DI).
    #[arg(long)]
    dolbydi: bool,

    /// Gating mode: 0 = none, 1 = level, 2 = dialogue.
    #[arg(long, value_name = "{0,1,2}", default_value_t = 0)]
    chgateconf: u8,

    /// Speech probability threshold for dialogue gating.
    #[arg(long, value_name = "P", default_value_t = leqm_core::DEFAULT_SPEECH_THRESHOLD)]
    agsthreshold: f64,

    /// Force level gating at this threshold, in dB.
    #[arg(long, value_name = "DB")]
    levelgate: Option<f64>,

    /// Emit true-peak.
    #[arg(long)]
    truepeak: bool,

    /// Oversampling factor for true-peak (2, 4, or 8).
    #[arg(long, value_name = "N", default_value_t = leqm_core::DEFAULT_OVERSAMPLING)]
    oversampling: u32,

    /// Emit execution timing.
    #[arg(long)]
    timing: bool,
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    detail: String,
}

#[derive(Serialize)]
struct Metadata {
    file: String,
    original_sample_rate: u32,
    effective_sample_rate: u32,
    channels: usize,
    frames: u64,
    duration_seconds: f64,
}

#[derive(Serialize)]
struct Execution {
    binary_path: String,
    binary_version: &'static str,
    execution_seconds: f64,
    speed_index: f64,
    mbps: f64,
}

#[derive(Serialize)]
struct Report {
    metadata: Metadata,
    measurements: leqm_engine::ReducedMeasurements,
    reference_offset_db: f64,
    channel_stats: Vec<leqm_engine::ChannelStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    true_peak_db: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leq_m_log: Option<Vec<leqm_engine::LeqMLogEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leq_m10_log: Option<Vec<leqm_engine::LeqM10Entry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allen_metric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lkfs: Option<leqm_engine::LkfsOutcome>,
    execution: Execution,
    processing_notes: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => {
            match cli.output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&report).expect("report always serializes")
                ),
                OutputFormat::Text => print_text_report(&report),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("leqm: {err}");
            let record = ErrorRecord {
                error: ErrorDetail {
                    kind: err.kind(),
                    detail: err.to_string(),
                },
            };
            if let Ok(json) = serde_json::to_string(&record) {
                eprintln!("{json}");
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<Report, LeqmError> {
    let start = Instant::now();

    let wav_source = WavSource::open(&cli.input)?;
    let meta = wav_source.meta();
    info!(
        "leqm: opened {} ({} Hz, {} channels)",
        cli.input.display(),
        meta.sample_rate,
        meta.channels
    );

    // Calibration is applied at the decoder boundary (§4.12): the ungated
    // worker, gated pass, and true-peak estimator all see already-scaled
    // samples without needing their own gain table.
    let mut source = CalibratedSource::new(wav_source, &cli.chconfcal);

    // `--levelgate` forces level gating on its own, independent of
    // `--chgateconf`; `--chgateconf 2` still selects dialogue gating.
    let gating_mode = if cli.levelgate.is_some() {
        GatingMode::Level
    } else {
        match cli.chgateconf {
            1 => GatingMode::Level,
            2 => GatingMode::Dialogue,
            _ => GatingMode::None,
        }
    };

    let config = EngineConfig {
        num_workers: cli.numcpus,
        buffer_ms: cli.buffersize,
        conv_points: cli.convpoints,
        leq_no_weight: cli.leqnw,
        log_leqm: cli.logleqm,
        log_leqm10: cli.logleqm10,
        long_period_minutes: cli.longperiod,
        allen_threshold_db: cli.threshold,
        lkfs: cli.lkfs,
        dolby_di: cli.dolbydi,
        gating_mode,
        speech_threshold: cli.agsthreshold,
        level_gate_db: cli.levelgate,
        true_peak: cli.truepeak,
        oversampling: cli.oversampling,
        hop_ratio: leqm_core::DEFAULT_HOP_RATIO,
    };

    let engine = LoudnessEngine::new(config);
    let cancelled = Arc::new(AtomicBool::new(false));
    let outcome = engine.run(&mut source, cancelled)?;

    let execution_seconds = start.elapsed().as_secs_f64();

    if let Some(path) = &cli.logfile {
        if let Some(log) = &outcome.leq_m_log {
            write_logfile(path, log)?;
        } else {
            warn!("leqm: --logfile given without --logleqm, nothing to write");
        }
    }

    Ok(assemble_report(cli, meta.sample_rate, &outcome, execution_seconds))
}

/// Writes the per-block Leq(M) series as two columns (seconds, dB), per
/// §6's "Persisted state" note.
fn write_logfile(path: &std::path::Path, log: &[leqm_engine::LeqMLogEntry]) -> Result<(), LeqmError> {
    let mut file = std::fs::File::create(path)?;
    for entry in log {
        writeln!(file, "{:.6} {:.4}", entry.start_seconds, entry.leq_m_db)?;
    }
    Ok(())
}

fn assemble_report(
    cli: &Cli,
    original_sample_rate: u32,
    outcome: &MeasurementOutcome,
    execution_seconds: f64,
) -> Report {
    let frames = outcome.meta.frames.unwrap_or(0);
    let duration_seconds = frames as f64 / outcome.meta.sample_rate as f64;
    let mbps = if execution_seconds > 0.0 {
        (frames as f64 * outcome.meta.channels as f64 * 8.0 / 1_000_000.0) / execution_seconds
    } else {
        0.0
    };
    let speed_index = if execution_seconds > 0.0 {
        duration_seconds / execution_seconds
    } else {
        0.0
    };

    let mut processing_notes = Vec::new();
    if outcome.silent {
        processing_notes.push("silent".to_string());
    }
    if outcome.truncated {
        processing_notes.push("truncated".to_string());
    }
    if let Some(lkfs) = &outcome.lkfs {
        if lkfs.below_floor {
            processing_notes.push("below_floor".to_string());
        }
    }

    Report {
        metadata: Metadata {
            file: cli.input.display().to_string(),
            original_sample_rate,
            effective_sample_rate: outcome.meta.sample_rate,
            channels: outcome.meta.channels,
            frames,
            duration_seconds,
        },
        measurements: outcome.measurements,
        reference_offset_db: leqm_core::REFERENCE_OFFSET_DB,
        channel_stats: outcome.channel_stats.clone(),
        true_peak_db: outcome.true_peak_db.clone(),
        leq_m_log: outcome.leq_m_log.clone(),
        leq_m10_log: outcome.leq_m10_log.clone(),
        allen_metric: outcome.allen_metric,
        lkfs: outcome.lkfs,
        execution: Execution {
            binary_path: std::env::current_exe()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            binary_version: env!("CARGO_PKG_VERSION"),
            execution_seconds: if cli.timing { execution_seconds } else { 0.0 },
            speed_index,
            mbps,
        },
        processing_notes,
    }
}

/// Renders a human-readable summary table, for `--output text`.
fn print_text_report(report: &Report) {
    println!("file:              {}", report.metadata.file);
    println!(
        "sample rate:       {} Hz (original {} Hz)",
        report.metadata.effective_sample_rate, report.metadata.original_sample_rate
    );
    println!("channels:          {}", report.metadata.channels);
    println!(
        "duration:          {:.3} s ({} frames)",
        report.metadata.duration_seconds, report.metadata.frames
    );
    println!();
    println!("Leq(M):            {:.4} dB", report.measurements.leq_m);
    if let Some(leq_nw) = report.measurements.leq_no_weight {
        println!("Leq(noW):          {leq_nw:.4} dB");
    }
    println!();
    println!("channel stats:");
    for stat in &report.channel_stats {
        println!(
            "  ch{:<2} peak {:>9.4} dB   average {:>9.4} dB",
            stat.channel, stat.peak_db, stat.average_db
        );
    }
    if let Some(tp) = &report.true_peak_db {
        println!();
        for (ch, db) in tp.iter().enumerate() {
            println!("  ch{ch:<2} true peak {db:>9.4} dB");
        }
    }
    if let Some(allen) = report.allen_metric {
        println!();
        println!("Allen metric:      {allen:.4}");
    }
    if let Some(lkfs) = &report.lkfs {
        println!();
        match lkfs.lkfs {
            Some(v) => println!(
                "LKFS:              {v:.4} ({}/{} blocks survived gating)",
                lkfs.surviving_blocks, lkfs.total_blocks
            ),
            None => println!("LKFS:              below_floor (0/{} blocks survived)", lkfs.total_blocks),
        }
    }
    if !report.processing_notes.is_empty() {
        println!();
        println!("notes:             {}", report.processing_notes.join(", "));
    }
    if report.execution.execution_seconds > 0.0 {
        println!();
        println!(
            "execution:         {:.3} s ({:.1}x realtime, {:.2} Mb/s)",
            report.execution.execution_seconds, report.execution.speed_index, report.execution.mbps
        );
    }
}
