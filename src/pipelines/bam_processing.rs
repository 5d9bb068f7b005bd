// src/pipelines/bam_processing.rs: Picard and samtools post-processing of aligned BAMs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use log::{info, warn};
use crate::config::defs::{
    PicardSubcommand, PipelineError, RunConfig, SamtoolsSubcommand, Stage, ADD_OR_REPLACE_DIR,
    ALIGNED_DIR, BAM_EXT, MARK_DUPLICATES_DIR, MERGE_SAM_DIR, READ_GROUP_PLATFORM, SORTED_BAM_DIR,
    SORTED_MARKER,
};
use crate::pipelines::stage::{stage_plan, StageContext, ToolChain};
use crate::utils::command::{picard, samtools};
use crate::utils::dispatch::{dispatch, DispatchSummary};
use crate::utils::file::{canonical_name, collect_files, has_final_extension};


fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn picard_config(subcommand: PicardSubcommand, fields: &[(&str, String)]) -> picard::PicardConfig {
    picard::PicardConfig {
        subcommand,
        subcommand_fields: fields.iter().map(|(flag, value)| (flag.to_string(), value.clone())).collect(),
    }
}

/// Files written for one aligned BAM, one per step.
#[derive(Debug, Clone, PartialEq)]
pub struct BamPaths {
    pub aligned: PathBuf,
    pub sorted: PathBuf,
    pub read_groups: PathBuf,
    pub merged: PathBuf,
    pub marked: PathBuf,
    pub metrics: PathBuf,
    pub final_sorted: PathBuf,
}

impl BamPaths {
    pub fn new(config: &RunConfig, name: &str) -> Self {
        let bam = format!("{}.{}", name, BAM_EXT);
        let marked_dir = config.preprocessing_dir(MARK_DUPLICATES_DIR);
        BamPaths {
            aligned: config.preprocessing_dir(ALIGNED_DIR).join(&bam),
            sorted: config.preprocessing_dir(SORTED_BAM_DIR).join(&bam),
            read_groups: config.preprocessing_dir(ADD_OR_REPLACE_DIR).join(&bam),
            merged: config.preprocessing_dir(MERGE_SAM_DIR).join(&bam),
            marked: marked_dir.join(&bam),
            metrics: marked_dir.join(format!("{}.metrics.log", name)),
            final_sorted: marked_dir.join(format!("{}{}.{}", name, SORTED_MARKER, BAM_EXT)),
        }
    }
}

/// Command lines for the six steps, in run order, paired with their log names.
pub fn step_commands(config: &RunConfig, name: &str) -> Vec<(&'static str, Vec<String>)> {
    let paths = BamPaths::new(config, name);
    let java = &config.args.java;
    let jar = &config.args.picard_jar;

    let sort_sam = picard_config(PicardSubcommand::SortSam, &[
        ("-I", path_arg(&paths.aligned)),
        ("-O", path_arg(&paths.sorted)),
        ("-SO", "queryname".to_string()),
    ]);
    let read_groups = picard_config(PicardSubcommand::AddOrReplaceReadGroups, &[
        ("-I", path_arg(&paths.sorted)),
        ("-O", path_arg(&paths.read_groups)),
        ("-LB", name.to_string()),
        ("-PU", name.to_string()),
        ("-SM", name.to_string()),
        ("-PL", READ_GROUP_PLATFORM.to_string()),
        ("-CREATE_INDEX", "true".to_string()),
    ]);
    // FixMateInformation rewrites its input in place
    let fix_mates = picard_config(PicardSubcommand::FixMateInformation, &[
        ("-INPUT", path_arg(&paths.read_groups)),
    ]);
    let merge = picard_config(PicardSubcommand::MergeSamFiles, &[
        ("-INPUT", path_arg(&paths.read_groups)),
        ("-OUTPUT", path_arg(&paths.merged)),
        ("-CREATE_INDEX", "true".to_string()),
        ("-USE_THREADING", "true".to_string()),
    ]);
    let mark_duplicates = picard_config(PicardSubcommand::MarkDuplicates, &[
        ("-INPUT", path_arg(&paths.merged)),
        ("-OUTPUT", path_arg(&paths.marked)),
        ("-CREATE_INDEX", "true".to_string()),
        ("-METRICS_FILE", path_arg(&paths.metrics)),
    ]);
    let final_sort = samtools::SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Sort,
        subcommand_fields: vec![
            ("-n".to_string(), Some(path_arg(&paths.marked))),
            ("-o".to_string(), Some(path_arg(&paths.final_sorted))),
        ],
    };

    let mut steps: Vec<(&'static str, Vec<String>)> = [sort_sam, read_groups, fix_mates, merge, mark_duplicates]
        .iter()
        .map(|cfg| (cfg.subcommand.as_str(), picard::arg_generator(java, jar, cfg)))
        .collect();
    steps.push(("SamtoolsSort", samtools::arg_generator(&config.args.samtools, &final_sort)));
    steps
}

async fn process_bam(config: Arc<RunConfig>, ctx: Arc<StageContext>, file: PathBuf, _share: usize) -> Result<()> {
    let name = canonical_name(&file);
    let mut chain = ToolChain::new(&ctx, name.as_str());
    for (tool_name, argv) in step_commands(&config, &name) {
        chain.step(tool_name, argv).await?;
    }
    chain.finish()
}

/// Runs the post-alignment chain on every BAM in `Preprocessing/aligned`.
pub async fn run(config: Arc<RunConfig>) -> Result<DispatchSummary, PipelineError> {
    let aligned_dir = config.preprocessing_dir(ALIGNED_DIR);
    let bams = collect_files(&aligned_dir, |exts| has_final_extension(exts, BAM_EXT))
        .map_err(|e| PipelineError::IOError(format!("Cannot read {}: {}", aligned_dir.display(), e)))?;
    if bams.is_empty() {
        warn!("No aligned BAM files in {}, skipping BAM processing", aligned_dir.display());
        return Ok(DispatchSummary::default());
    }

    info!("Processing {} aligned BAM file(s)", bams.len());
    let ctx = Arc::new(StageContext::new(&config, Stage::BamProcessing));
    let plan = stage_plan(&config, bams.len());

    let op_config = config.clone();
    let summary = dispatch(&plan, bams, move |file, share| {
        process_bam(op_config.clone(), ctx.clone(), file, share)
    })
        .await;
    Ok(summary)
}
