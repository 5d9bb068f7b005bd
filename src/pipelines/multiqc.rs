// src/pipelines/multiqc.rs: summary report over the whole output directory

use std::sync::Arc;
use log::info;
use crate::config::defs::{PipelineError, RunConfig, Stage, MULTIQC_RESULTS_DIR};
use crate::pipelines::stage::{run_tool, StageContext};
use crate::utils::command::{multiqc, ToolOutput};


pub async fn run(config: Arc<RunConfig>) -> Result<ToolOutput, PipelineError> {
    let report_dir = config.results_dir(MULTIQC_RESULTS_DIR);
    info!("Building MultiQC report in {}", report_dir.display());

    let ctx = StageContext::new(&config, Stage::MultiQc);
    let argv = multiqc::arg_generator(
        &config.args.multiqc,
        &config.out_dir,
        &report_dir,
        config.args.multiqc_config.as_deref(),
    );
    run_tool(&ctx, "report", "multiqc", argv)
        .await
        .map_err(|e| PipelineError::ToolExecution { tool: "multiqc".to_string(), error: format!("{:#}", e) })
}
