// src/pipelines/quality_check.rs: FastQC over the raw input files

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use log::info;
use crate::config::defs::{PipelineError, RunConfig, Stage, FASTQC_RESULTS_DIR};
use crate::pipelines::stage::{stage_plan, StageContext, ToolChain};
use crate::utils::command::fastqc;
use crate::utils::dispatch::{dispatch, DispatchSummary};
use crate::utils::file::canonical_name;


async fn check_file(config: Arc<RunConfig>, ctx: Arc<StageContext>, file: PathBuf, threads: usize) -> Result<()> {
    let report_dir = config.results_dir(FASTQC_RESULTS_DIR);
    let mut chain = ToolChain::new(&ctx, canonical_name(&file));
    chain
        .step("fastqc", fastqc::arg_generator(&config.args.fastqc, &file, &report_dir, threads))
        .await?;
    chain.finish()
}

/// Runs FastQC on every input file through the worker pool.
pub async fn run(config: Arc<RunConfig>, inputs: &[PathBuf]) -> Result<DispatchSummary, PipelineError> {
    info!("Quality checking {} file(s)", inputs.len());
    let ctx = Arc::new(StageContext::new(&config, Stage::QualityCheck));
    let plan = stage_plan(&config, inputs.len());

    let op_config = config.clone();
    let summary = dispatch(&plan, inputs.to_vec(), move |file, threads| {
        check_file(op_config.clone(), ctx.clone(), file, threads)
    })
        .await;
    Ok(summary)
}
