pub mod stage;
pub mod directories;
pub mod quality_check;
pub mod trimming;
pub mod alignment;
pub mod bam_processing;
pub mod count_matrix;
pub mod multiqc;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{info, warn};
use crate::config::defs::{PipelineError, RunConfig, Stage};
use crate::utils::command::ToolOutput;
use crate::utils::dispatch::DispatchSummary;
use crate::utils::file::{collect_files, is_gzipped_fastq};


/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub summary: DispatchSummary,
}

/// Gzipped FASTQ files directly inside `input_dir`.
pub fn collect_inputs(input_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::InvalidConfig(format!(
            "Input directory {} does not exist",
            input_dir.display()
        )));
    }
    let inputs = collect_files(input_dir, is_gzipped_fastq)
        .map_err(|e| PipelineError::IOError(format!("Cannot read {}: {}", input_dir.display(), e)))?;
    if inputs.is_empty() {
        return Err(PipelineError::NoInputFiles(input_dir.to_path_buf()));
    }
    Ok(inputs)
}

fn single_run(output: Option<&ToolOutput>) -> DispatchSummary {
    match output {
        Some(output) if output.success() => DispatchSummary { succeeded: 1, ..Default::default() },
        Some(_) => DispatchSummary { failed: 1, ..Default::default() },
        None => DispatchSummary::default(),
    }
}

fn report(stage: Stage, summary: DispatchSummary) -> StageReport {
    if summary.all_succeeded() {
        info!("Stage {} complete: {} item(s) succeeded", stage, summary.succeeded);
    } else {
        warn!(
            "Stage {} complete: {} succeeded, {} failed, {} timed out",
            stage, summary.succeeded, summary.failed, summary.timed_out
        );
    }
    StageReport { stage, summary }
}

/// Runs every stage in order. Items failing inside a stage are reported and the pipeline
/// carries on; only stage-level errors stop the run.
///
/// # Arguments
///
/// * `config` - Shared run configuration; the output layout must already exist.
/// * `inputs` - Raw gzipped FASTQ files.
///
/// # Returns
/// One StageReport per stage, in run order.
pub async fn run(config: Arc<RunConfig>, inputs: Vec<PathBuf>) -> Result<Vec<StageReport>, PipelineError> {
    let mut reports = Vec::with_capacity(Stage::ALL.len());

    let summary = quality_check::run(config.clone(), &inputs).await?;
    reports.push(report(Stage::QualityCheck, summary));

    let summary = trimming::run(config.clone(), &inputs).await?;
    reports.push(report(Stage::Trimming, summary));

    let summary = alignment::run(config.clone()).await?;
    reports.push(report(Stage::Alignment, summary));

    let summary = bam_processing::run(config.clone()).await?;
    reports.push(report(Stage::BamProcessing, summary));

    let counts = count_matrix::run(config.clone()).await?;
    reports.push(report(Stage::Counts, single_run(counts.as_ref())));

    let report_output = multiqc::run(config.clone()).await?;
    reports.push(report(Stage::MultiQc, single_run(Some(&report_output))));

    Ok(reports)
}
