// src/pipelines/count_matrix.rs: gene count matrix with featureCounts

use std::sync::Arc;
use log::{info, warn};
use crate::config::defs::{
    PipelineError, RunConfig, Stage, BAM_EXT, COUNTS_DIR, COUNTS_FILE, MARK_DUPLICATES_DIR,
    SORTED_MARKER,
};
use crate::pipelines::stage::{run_tool, StageContext};
use crate::utils::command::{featurecounts, ToolOutput};
use crate::utils::file::{canonical_name, collect_files, has_final_extension};


/// Counts reads per gene over every final sorted BAM.
///
/// # Returns
/// The featureCounts output, or `None` when there was nothing to count.
pub async fn run(config: Arc<RunConfig>) -> Result<Option<ToolOutput>, PipelineError> {
    let marked_dir = config.preprocessing_dir(MARK_DUPLICATES_DIR);
    let bams = collect_files(&marked_dir, |exts| has_final_extension(exts, BAM_EXT))
        .map_err(|e| PipelineError::IOError(format!("Cannot read {}: {}", marked_dir.display(), e)))?
        .into_iter()
        .filter(|bam| canonical_name(bam).ends_with(SORTED_MARKER))
        .collect::<Vec<_>>();

    if bams.is_empty() {
        warn!("No sorted BAM files in {}, skipping the count matrix", marked_dir.display());
        return Ok(None);
    }

    let annotation = config.annotation();
    let output = config.data_dir(COUNTS_DIR).join(COUNTS_FILE);
    info!("Counting {} BAM file(s) against {}", bams.len(), annotation.display());

    let ctx = StageContext::new(&config, Stage::Counts);
    let argv = featurecounts::arg_generator(&config.args.feature_counts, &annotation, &output, config.cores, &bams);
    let result = run_tool(&ctx, "counts", "featureCounts", argv)
        .await
        .map_err(|e| PipelineError::ToolExecution { tool: "featureCounts".to_string(), error: format!("{:#}", e) })?;
    Ok(Some(result))
}
