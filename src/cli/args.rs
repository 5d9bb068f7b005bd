use std::path::PathBuf;
use clap::Parser;
use crate::config::defs::{
    TrimSpec, FASTQC_TAG, FEATURECOUNTS_TAG, HISAT2_TAG, JAVA_TAG, MULTIQC_TAG, SAMTOOLS_TAG,
    TRIM_GALORE_TAG,
};

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "rnaseq-pipelines",
    version,
    about = "Quality checks, trims, aligns and counts RNA-seq FASTQ files.",
    after_help = "Each stage runs its files over a bounded worker pool. Tool logs are written to <out>/tool_logs."
)]
pub struct Arguments {

    #[arg(short = 'f', long = "files", help = "Directory holding the gzipped FASTQ input files")]
    pub files: PathBuf,

    #[arg(short = 'd', long = "directory-out", help = "Directory where all generated files are saved")]
    pub directory_out: PathBuf,

    #[arg(short = 'p', long, action, help = "Resolve and align paired-end mates. Without it every file is aligned single-ended")]
    pub paired: bool,

    #[arg(short = 't', long, value_parser = TrimSpec::parse, help = "Hard trim: \"3\" clips the last 3 bp, \"3-5\" clips 3 bp from the start and 5 bp from the end")]
    pub trim: Option<TrimSpec>,

    #[arg(short = 'c', long, help = "Cores to use; defaults to two thirds of the detected cores")]
    pub cores: Option<usize>,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, default_value_t = false, help = "Clear previously generated files from a non-empty output directory")]
    pub force: bool,

    #[arg(long, help = "Optional per-file deadline in seconds; files exceeding it are abandoned and logged")]
    pub item_timeout: Option<u64>,

    #[arg(long, help = "HISAT2 index basename. Defaults to <out>/Data/genome/grch38/genome")]
    pub hisat2_index: Option<PathBuf>,

    #[arg(long, help = "GTF annotation for featureCounts. Defaults to <out>/Data/genome/Homo_sapiens.GRCh38.84.gtf")]
    pub annotation: Option<PathBuf>,

    #[arg(long, default_value = "lib/Picard_2.23.9/picard.jar")]
    pub picard_jar: String,

    // Programs; override to point at a specific install
    #[arg(long, default_value = FASTQC_TAG)]
    pub fastqc: String,

    #[arg(long, default_value = TRIM_GALORE_TAG)]
    pub trim_galore: String,

    #[arg(long, default_value = HISAT2_TAG)]
    pub hisat2: String,

    #[arg(long, default_value = SAMTOOLS_TAG)]
    pub samtools: String,

    #[arg(long, default_value = JAVA_TAG)]
    pub java: String,

    #[arg(long, default_value = FEATURECOUNTS_TAG)]
    pub feature_counts: String,

    #[arg(long, default_value = MULTIQC_TAG)]
    pub multiqc: String,

    #[arg(long)]
    pub multiqc_config: Option<PathBuf>,
}
