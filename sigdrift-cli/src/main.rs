//! Signature Drift Replay CLI
//!
//! Command-line host for the sigdrift-detector library. It replays a scripted
//! editing session through the detector, acting as the editing surface:
//! - Opens the documents listed in the script
//! - Turns each scripted edit into raw and structural notifications
//! - Records what resolve and apply steps report
//! - Prints a TXT or JSON report

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod report;
mod session;

use report::{OutputFormat, Report};
use session::ReplaySession;

/// Signature drift replay - detect signature changes in scripted edits
#[derive(Parser, Debug)]
#[command(name = "sigdrift-cli")]
#[command(about = "Replay an editing script and report detected signature changes", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the replay script (TOML)
    #[arg(short, long, value_name = "FILE")]
    script: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    init_logging(log_level(args.verbose, args.quiet, args.format));

    log::info!("Signature Drift CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using detector library v{}", sigdrift_detector::VERSION);

    log::info!("Loading script from: {:?}", args.script);
    let script = config::load_script(&args.script)?;
    log::debug!(
        "Script loaded: {} document(s), {} step(s)",
        script.documents.len(),
        script.steps.len()
    );

    let mut session = ReplaySession::new(&script)?;
    session.run(&script.steps)?;

    let stats = session.stats();
    let report = Report {
        script: args.script.display().to_string(),
        generated_at: Utc::now(),
        steps_run: script.steps.len(),
        entries: session.finish(),
        stats,
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            let mut out = BufWriter::new(file);
            report::write_report(&report, args.format, &mut out)?;
            out.flush()?;
            log::info!("Report written to {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report::write_report(&report, args.format, &mut out)?;
        }
    }

    Ok(())
}

/// Pick the log level for a replay run
///
/// JSON runs default to warnings, TXT runs to info. Each `-v` raises the
/// level one step from that default.
fn log_level(verbose: u8, quiet: bool, format: OutputFormat) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    let steps = [
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let base = match format {
        OutputFormat::Json => 0,
        OutputFormat::Txt => 1,
    };
    steps[(base + verbose as usize).min(steps.len() - 1)]
}

/// Initialize logging to stderr, keeping stdout for the report
///
/// `RUST_LOG` still overrides the level chosen from the flags.
fn init_logging(level: LevelFilter) {
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} replay] {}",
                record.level(),
                record.args()
            )
        })
        .init();
}
