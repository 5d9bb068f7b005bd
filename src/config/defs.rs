use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use lazy_static::lazy_static;
use thiserror::Error;
use crate::cli::Arguments;

// External software
pub const GZIP_EXT: &str = "gz";
pub const FASTQC_TAG: &str = "fastqc";
pub const TRIM_GALORE_TAG: &str = "trim_galore";
pub const HISAT2_TAG: &str = "hisat2";
pub const SAMTOOLS_TAG: &str = "samtools";
pub const JAVA_TAG: &str = "java";
pub const FEATURECOUNTS_TAG: &str = "featureCounts";
pub const MULTIQC_TAG: &str = "multiqc";


lazy_static! {
    /// Flag each tool answers with its version string.
    pub static ref TOOL_VERSION_FLAGS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert(FASTQC_TAG, "--version");
        m.insert(TRIM_GALORE_TAG, "--version");
        m.insert(HISAT2_TAG, "--version");
        m.insert(SAMTOOLS_TAG, "--version");
        m.insert(JAVA_TAG, "-version");
        m.insert(FEATURECOUNTS_TAG, "-v");
        m.insert(MULTIQC_TAG, "--version");
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    View,
    Sort,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PicardSubcommand {
    SortSam,
    AddOrReplaceReadGroups,
    FixMateInformation,
    MergeSamFiles,
    MarkDuplicates,
}

impl PicardSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            PicardSubcommand::SortSam => "SortSam",
            PicardSubcommand::AddOrReplaceReadGroups => "AddOrReplaceReadGroups",
            PicardSubcommand::FixMateInformation => "FixMateInformation",
            PicardSubcommand::MergeSamFiles => "MergeSamFiles",
            PicardSubcommand::MarkDuplicates => "MarkDuplicates",
        }
    }
}

// Output layout
pub const PREPROCESSING_DIR: &str = "Preprocessing";
pub const RESULTS_DIR: &str = "Results";
pub const DATA_DIR: &str = "Data";
pub const TOOL_LOGS_DIR: &str = "tool_logs";

pub const TRIMMED_DIR: &str = "trimmed";
pub const ALIGNED_DIR: &str = "aligned";
pub const SORTED_BAM_DIR: &str = "sortedBam";
pub const ADD_OR_REPLACE_DIR: &str = "addOrReplace";
pub const MERGE_SAM_DIR: &str = "mergeSam";
pub const MARK_DUPLICATES_DIR: &str = "markDuplicates";
pub const FASTQC_RESULTS_DIR: &str = "fastQC";
pub const MULTIQC_RESULTS_DIR: &str = "multiQC";
pub const FASTQ_FILES_DIR: &str = "fastqFiles";
pub const COUNTS_DIR: &str = "counts";
pub const GENOME_DIR: &str = "genome";
pub const DEFAULT_HISAT2_INDEX: &str = "grch38/genome";
pub const DEFAULT_ANNOTATION: &str = "Homo_sapiens.GRCh38.84.gtf";

pub const PREPROCESSING_SUBDIRS: &[&str] = &[
    TRIMMED_DIR,
    ALIGNED_DIR,
    SORTED_BAM_DIR,
    ADD_OR_REPLACE_DIR,
    MERGE_SAM_DIR,
    MARK_DUPLICATES_DIR,
];
pub const RESULTS_SUBDIRS: &[&str] = &[FASTQC_RESULTS_DIR, MULTIQC_RESULTS_DIR];
pub const DATA_SUBDIRS: &[&str] = &[FASTQ_FILES_DIR, COUNTS_DIR, GENOME_DIR];

/// Generated subtrees wiped by `--force`. `Data/genome` is deliberately absent.
pub const REMOVABLE_DIRS: &[&str] = &[
    PREPROCESSING_DIR,
    RESULTS_DIR,
    TOOL_LOGS_DIR,
    "Data/fastqFiles",
    "Data/counts",
];

// Static names and parameters
pub const TRIMMED_MARKER: &str = "_trimmed";
pub const SORTED_MARKER: &str = "_sorted";
pub const BAM_EXT: &str = "bam";
pub const SAM_EXT: &str = "sam";
pub const COUNTS_FILE: &str = "counts.txt";
pub const READ_GROUP_PLATFORM: &str = "illumina";
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];

/// Hard-trim request for Trim Galore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSpec {
    /// Clip `end` bases from the 3' end only.
    End { end: u32 },
    /// Clip `start` bases from the 5' end and `end` bases from the 3' end.
    StartEnd { start: u32, end: u32 },
}

impl TrimSpec {
    /// Parses `"3"` (3' end only) or `"3-5"` (5' and 3' ends).
    pub fn parse(value: &str) -> Result<TrimSpec, String> {
        let invalid = || format!(
            "Trim values incorrect: got {:?}, expected \"3-5\" (start and end) or \"3\" (end only)",
            value
        );
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        match value.split_once('-') {
            Some((start, end)) if digits(start) && digits(end) => Ok(TrimSpec::StartEnd {
                start: start.parse().map_err(|_| invalid())?,
                end: end.parse().map_err(|_| invalid())?,
            }),
            None if digits(value) => Ok(TrimSpec::End {
                end: value.parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Stages of the pipeline, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    QualityCheck,
    Trimming,
    Alignment,
    BamProcessing,
    Counts,
    MultiQc,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::QualityCheck,
        Stage::Trimming,
        Stage::Alignment,
        Stage::BamProcessing,
        Stage::Counts,
        Stage::MultiQc,
    ];

    /// Sub-directory of `tool_logs` holding this stage's logs.
    pub fn log_dir_name(&self) -> &'static str {
        match self {
            Stage::QualityCheck => "qualitycheck",
            Stage::Trimming => "trimming",
            Stage::Alignment => "alignment",
            Stage::BamProcessing => "bam_processing",
            Stage::Counts => "counts",
            Stage::MultiQc => "multiqc",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::QualityCheck => "quality check",
            Stage::Trimming => "trimming",
            Stage::Alignment => "alignment",
            Stage::BamProcessing => "BAM processing",
            Stage::Counts => "count matrix",
            Stage::MultiQc => "MultiQC report",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output directory {0:?} is not empty; rerun with --force to clear generated files")]
    OutputNotEmpty(PathBuf),

    #[error("No input files found in {0:?}")]
    NoInputFiles(PathBuf),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("{tool} failed: {error}")]
    ToolExecution { tool: String, error: String },
}


pub struct RunConfig {
    pub input_dir: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub cores: usize,
}

impl RunConfig {
    pub fn preprocessing_dir(&self, sub_dir: &str) -> PathBuf {
        self.out_dir.join(PREPROCESSING_DIR).join(sub_dir)
    }

    pub fn results_dir(&self, sub_dir: &str) -> PathBuf {
        self.out_dir.join(RESULTS_DIR).join(sub_dir)
    }

    pub fn data_dir(&self, sub_dir: &str) -> PathBuf {
        self.out_dir.join(DATA_DIR).join(sub_dir)
    }

    pub fn stage_log_dir(&self, stage: Stage) -> PathBuf {
        self.out_dir.join(TOOL_LOGS_DIR).join(stage.log_dir_name())
    }

    pub fn hisat2_index(&self) -> PathBuf {
        self.args
            .hisat2_index
            .clone()
            .unwrap_or_else(|| self.data_dir(GENOME_DIR).join(DEFAULT_HISAT2_INDEX))
    }

    pub fn annotation(&self) -> PathBuf {
        self.args
            .annotation
            .clone()
            .unwrap_or_else(|| self.data_dir(GENOME_DIR).join(DEFAULT_ANNOTATION))
    }

    /// Per-item deadline, if one was requested.
    pub fn item_deadline(&self) -> Option<Duration> {
        self.args.item_timeout.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}
