// src/pipelines/trimming.rs: adapter and hard trimming with Trim Galore

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use log::info;
use crate::config::defs::{PipelineError, RunConfig, Stage, TRIMMED_DIR};
use crate::pipelines::stage::{stage_plan, StageContext, ToolChain};
use crate::utils::command::trim_galore;
use crate::utils::dispatch::{dispatch, DispatchSummary};
use crate::utils::file::canonical_name;


async fn trim_file(config: Arc<RunConfig>, ctx: Arc<StageContext>, file: PathBuf, cores: usize) -> Result<()> {
    let trimmed_dir = config.preprocessing_dir(TRIMMED_DIR);
    let argv = trim_galore::arg_generator(&config.args.trim_galore, &file, &trimmed_dir, config.args.trim, cores);

    let mut chain = ToolChain::new(&ctx, canonical_name(&file));
    chain.step("trim_galore", argv).await?;
    chain.finish()
}

/// Trims every input file into `Preprocessing/trimmed`.
pub async fn run(config: Arc<RunConfig>, inputs: &[PathBuf]) -> Result<DispatchSummary, PipelineError> {
    match config.args.trim {
        Some(trim) => info!("Trimming {} file(s), hard trim {:?}", inputs.len(), trim),
        None => info!("Trimming {} file(s)", inputs.len()),
    }
    let ctx = Arc::new(StageContext::new(&config, Stage::Trimming));
    let plan = stage_plan(&config, inputs.len());

    let op_config = config.clone();
    let summary = dispatch(&plan, inputs.to_vec(), move |file, cores| {
        trim_file(op_config.clone(), ctx.clone(), file, cores)
    })
        .await;
    Ok(summary)
}
