// src/pipelines/alignment.rs: HISAT2 alignment of trimmed reads, paired where mates resolve

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use log::{info, warn};
use crate::config::defs::{
    PipelineError, RunConfig, SamtoolsSubcommand, Stage, ALIGNED_DIR, BAM_EXT, SAM_EXT, TRIMMED_DIR,
};
use crate::pipelines::stage::{stage_plan, StageContext, ToolChain};
use crate::utils::command::{hisat2, samtools};
use crate::utils::dispatch::{compute_share, dispatch, DispatchSummary};
use crate::utils::file::{collect_files, is_gzipped_fastq};
use crate::utils::mates::{collect_records, resolve, WorkItem};


struct Aligner {
    config: Arc<RunConfig>,
    ctx: StageContext,
    index: PathBuf,
    aligned_dir: PathBuf,
}

impl Aligner {
    fn new(config: Arc<RunConfig>) -> Self {
        Aligner {
            ctx: StageContext::new(&config, Stage::Alignment),
            index: config.hisat2_index(),
            aligned_dir: config.preprocessing_dir(ALIGNED_DIR),
            config,
        }
    }

    /// HISAT2 to SAM, then SAM to BAM. The intermediate SAM is removed afterwards.
    async fn align(self: Arc<Self>, item: WorkItem, threads: usize) -> Result<()> {
        let name = item.name();
        let sam_path = self.aligned_dir.join(format!("{}.{}", name, SAM_EXT));
        let bam_path = self.aligned_dir.join(format!("{}.{}", name, BAM_EXT));

        let mut chain = ToolChain::new(&self.ctx, name);
        chain
            .step(
                "hisat2",
                hisat2::arg_generator(&self.config.args.hisat2, &self.index, &item, threads, &sam_path),
            )
            .await?;

        let view_config = samtools::SamtoolsConfig {
            subcommand: SamtoolsSubcommand::View,
            subcommand_fields: vec![
                ("-b".to_string(), None),
                ("-o".to_string(), Some(bam_path.to_string_lossy().into_owned())),
                (sam_path.to_string_lossy().into_owned(), None),
            ],
        };
        chain
            .step("samtools_view", samtools::arg_generator(&self.config.args.samtools, &view_config))
            .await?;

        if tokio::fs::try_exists(&sam_path).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&sam_path).await {
                warn!("[{}] Could not remove {}: {}", chain.basename(), sam_path.display(), e);
            }
        }
        chain.finish()
    }
}

/// Aligns the trimmed files.
///
/// In paired mode mates are resolved from their FASTQ headers; pairs are aligned first,
/// then any file left without a mate is aligned on its own. Without `--paired` every file is
/// aligned single-ended. Both dispatches use the thread share computed over all files.
///
/// # Returns
/// Result<DispatchSummary, PipelineError> combined over both dispatches.
pub async fn run(config: Arc<RunConfig>) -> Result<DispatchSummary, PipelineError> {
    let trimmed_dir = config.preprocessing_dir(TRIMMED_DIR);
    let files = collect_files(&trimmed_dir, is_gzipped_fastq)
        .map_err(|e| PipelineError::IOError(format!("Cannot read {}: {}", trimmed_dir.display(), e)))?;
    let records = collect_records(&files);

    let mut summary = DispatchSummary::default();
    if records.is_empty() {
        warn!("No trimmed files with readable headers in {}, skipping alignment", trimmed_dir.display());
        return Ok(summary);
    }

    let share = compute_share(config.cores, records.len());
    let aligner = Arc::new(Aligner::new(config.clone()));
    info!("Aligning with index {}", aligner.index.display());

    let (pairs, singles): (Vec<WorkItem>, Vec<WorkItem>) = if config.args.paired {
        let resolution = resolve(&records);
        info!(
            "Resolved {} pair(s) and {} unpaired file(s) from {} file(s)",
            resolution.pairs.len(),
            resolution.singles.len(),
            resolution.total_files()
        );
        (
            resolution.pairs.into_iter().map(WorkItem::Pair).collect(),
            resolution.singles.into_iter().map(WorkItem::Single).collect(),
        )
    } else {
        (Vec::new(), records.into_iter().map(WorkItem::Single).collect())
    };

    for (kind, items) in [("paired", pairs), ("single-end", singles)] {
        if items.is_empty() {
            continue;
        }
        info!("Aligning {} {} item(s), {} thread(s) each", items.len(), kind, share);
        let plan = stage_plan(&config, items.len()).with_share(share);
        let op_aligner = aligner.clone();
        summary.merge(dispatch(&plan, items, move |item, threads| op_aligner.clone().align(item, threads)).await);
    }
    Ok(summary)
}
