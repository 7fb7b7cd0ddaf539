//! Report generation
//!
//! Renders the outcome of a replay as plain text or JSON.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sigdrift_detector::{ApplyOutcome, ChangeDescriptor, RegistryStats};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Txt,
    Json,
}

/// What a reported step produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepResult {
    /// `None` means nothing is being changed (or the change was reverted)
    Resolved { change: Option<ChangeDescriptor> },
    Applied {
        outcome: ApplyOutcome,
        change: ChangeDescriptor,
    },
    ApplyFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// 1-based step number in the script
    pub step: usize,
    pub document: String,
    #[serde(flatten)]
    pub result: StepResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub script: String,
    pub generated_at: DateTime<Utc>,
    pub steps_run: usize,
    pub entries: Vec<ReportEntry>,
    pub stats: RegistryStats,
}

pub fn write_report(report: &Report, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Txt => write_txt(report, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

fn write_txt(report: &Report, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Signature drift replay: {}", report.script)?;
    writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "Steps run: {}", report.steps_run)?;
    writeln!(out)?;

    for entry in &report.entries {
        write!(out, "[step {:>3}] {}: ", entry.step, entry.document)?;
        match &entry.result {
            StepResult::Resolved { change: None } => writeln!(out, "no change")?,
            StepResult::Resolved {
                change: Some(change),
            } => {
                writeln!(out, "{}", change)?;
                write_flags(change, out)?;
            }
            StepResult::Applied { outcome, change } => writeln!(out, "{} {}", outcome, change)?,
            StepResult::ApplyFailed { error } => writeln!(out, "apply failed: {}", error)?,
        }
    }

    writeln!(out)?;
    writeln!(out, "Open documents:       {}", report.stats.open_documents)?;
    writeln!(out, "Tracking documents:   {}", report.stats.tracking_documents)?;
    writeln!(out, "Pending observations: {}", report.stats.pending_observations)?;
    Ok(())
}

fn write_flags(change: &ChangeDescriptor, out: &mut dyn Write) -> Result<()> {
    let flags = change.flags();
    let mut names = Vec::new();
    if flags.name_changed {
        names.push("name");
    }
    if flags.visibility_changed {
        names.push("visibility");
    }
    if flags.parameter_set_or_order_changed {
        names.push("parameter order");
    }
    if flags.parameter_names_changed {
        names.push("parameter names");
    }
    if flags.parameter_types_changed {
        names.push("parameter types");
    }
    if flags.return_type_changed {
        names.push("return type");
    }
    writeln!(out, "             changed: {}", names.join(", "))?;
    writeln!(out, "             order:   [{}]", change.new_order().join(", "))?;
    Ok(())
}
