use anyhow::Result;
use std::fs::{self, File, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;
use rnaseq_pipelines::cli::Arguments;
use rnaseq_pipelines::config::defs::{RunConfig, Stage};
use rnaseq_pipelines::pipelines::{self, directories::prepare_output_dir};


const FAKE_TRIM_GALORE: &str = r#"#!/bin/sh
in="$1"; out="$3"
base=$(basename "$in"); base=${base%%.*}
cp "$in" "$out/${base}_trimmed.fq.gz"
echo "trimmed $base"
"#;

const FAKE_HISAT2: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  if [ "$1" = "-S" ]; then sam="$2"; fi
  shift
done
echo "@HD" > "$sam"
echo "100.00% overall alignment rate" >&2
"#;

const FAKE_SAMTOOLS: &str = r#"#!/bin/sh
case "$1" in
  view) cp "$5" "$4" ;;
  sort) cp "$3" "$5" ;;
  *) exit 1 ;;
esac
"#;

const FAKE_JAVA: &str = r#"#!/bin/sh
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -I|-INPUT) in="$2" ;;
    -O|-OUTPUT) out="$2" ;;
  esac
  shift
done
if [ -n "$out" ]; then cp "$in" "$out"; fi
"#;

const FAKE_FEATURECOUNTS: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
echo "Geneid counts" > "$out"
"#;

const FAKE_REPORTER: &str = "#!/bin/sh\necho \"$@\"\n";


fn write_tool(dir: &Path, name: &str, body: &str) -> Result<String> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    fs::set_permissions(&path, Permissions::from_mode(0o755))?;
    Ok(path.to_string_lossy().into_owned())
}

fn write_fastq(path: &Path, header: &str) -> Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    writeln!(encoder, "{}\nACGTACGT\n+\nIIIIIIII", header)?;
    encoder.finish()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paired_run_with_stand_in_tools() -> Result<()> {
    let dir = tempdir()?;
    let tools = dir.path().join("bin");
    let input_dir = dir.path().join("raw");
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&tools)?;
    fs::create_dir_all(&input_dir)?;

    let args = Arguments {
        files: input_dir.clone(),
        directory_out: out_dir.clone(),
        paired: true,
        fastqc: write_tool(&tools, "fastqc", FAKE_REPORTER)?,
        trim_galore: write_tool(&tools, "trim_galore", FAKE_TRIM_GALORE)?,
        hisat2: write_tool(&tools, "hisat2", FAKE_HISAT2)?,
        samtools: write_tool(&tools, "samtools", FAKE_SAMTOOLS)?,
        java: write_tool(&tools, "java", FAKE_JAVA)?,
        picard_jar: "picard.jar".to_string(),
        feature_counts: write_tool(&tools, "featureCounts", FAKE_FEATURECOUNTS)?,
        multiqc: write_tool(&tools, "multiqc", FAKE_REPORTER)?,
        ..Default::default()
    };

    write_fastq(&input_dir.join("S1_R1.fastq.gz"), "@INST01.1 read/1")?;
    write_fastq(&input_dir.join("S1_R2.fastq.gz"), "@INST01.1 read/2")?;
    write_fastq(&input_dir.join("S2.fq.gz"), "@INST02.4 length=8")?;

    let config = Arc::new(RunConfig {
        input_dir: input_dir.clone(),
        out_dir: out_dir.clone(),
        args,
        cores: 2,
    });

    prepare_output_dir(&out_dir, false)?;
    let inputs = pipelines::collect_inputs(&input_dir)?;
    assert_eq!(inputs.len(), 3);

    let reports = pipelines::run(config, inputs).await?;
    let stages: Vec<Stage> = reports.iter().map(|r| r.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());

    let succeeded: Vec<usize> = reports.iter().map(|r| r.summary.succeeded).collect();
    assert_eq!(succeeded, vec![3, 3, 2, 2, 1, 1]);
    assert!(reports.iter().all(|r| r.summary.all_succeeded()));

    let expect = |rel: &str| -> PathBuf { out_dir.join(rel) };
    assert!(expect("Preprocessing/trimmed/S1_R1_trimmed.fq.gz").exists());
    assert!(expect("Preprocessing/aligned/S1_R1_S1_R2.bam").exists());
    assert!(expect("Preprocessing/aligned/S2.bam").exists());
    assert!(!expect("Preprocessing/aligned/S2.sam").exists());
    assert!(expect("Preprocessing/markDuplicates/S1_R1_S1_R2_sorted.bam").exists());
    assert!(expect("Data/counts/counts.txt").exists());

    let hisat2_log = fs::read_to_string(expect("tool_logs/alignment/S1_R1_S1_R2_hisat2.log"))?;
    assert!(hisat2_log.contains("overall alignment rate"));
    assert!(expect("tool_logs/trimming/S2_trim_galore.log").exists());
    assert!(expect("tool_logs/bam_processing/S2_MarkDuplicates.log").exists());
    assert!(expect("tool_logs/counts/counts_featureCounts.log").exists());
    assert!(expect("tool_logs/multiqc/report_multiqc.log").exists());

    // Second run refuses to reuse the output without --force
    assert!(prepare_output_dir(&out_dir, false).is_err());
    Ok(())
}
