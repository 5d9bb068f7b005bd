/// Functions and structs for running external tools and building their command lines

use std::path::Path;
use std::process::Stdio;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use crate::config::defs::TOOL_VERSION_FLAGS;


/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs `argv[0]` with the remaining arguments and waits for it to exit.
///
/// # Arguments
///
/// * `argv` - Program followed by its arguments.
///
/// # Returns
/// ToolOutput with both output streams. A non-zero exit status is not an error; failing to
/// spawn the program is.
pub async fn run_command(argv: &[String]) -> Result<ToolOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("Cannot run an empty command"))?;
    debug!("Running: {}", argv.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is {} installed?", program, e, program))?;

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.status.code(),
    })
}

/// Writes stdout followed by stderr to `destination`, replacing any existing file.
pub async fn save_log(output: &ToolOutput, destination: &Path) -> Result<()> {
    let mut file = File::create(destination)
        .await
        .map_err(|e| anyhow!("Failed to create log {:?}: {}", destination, e))?;
    file.write_all(&output.stdout).await?;
    file.write_all(&output.stderr).await?;
    file.flush().await?;
    Ok(())
}


pub mod fastqc {
    use std::path::Path;

    pub fn arg_generator(program: &str, input: &Path, out_dir: &Path, threads: usize) -> Vec<String> {
        vec![
            program.to_string(),
            input.to_string_lossy().into_owned(),
            "-o".to_string(),
            out_dir.to_string_lossy().into_owned(),
            "-t".to_string(),
            threads.to_string(),
        ]
    }
}

pub mod trim_galore {
    use std::path::Path;
    use crate::config::defs::TrimSpec;

    pub fn arg_generator(program: &str, input: &Path, out_dir: &Path, trim: Option<TrimSpec>, cores: usize) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![
            program.to_string(),
            input.to_string_lossy().into_owned(),
            "-o".to_string(),
            out_dir.to_string_lossy().into_owned(),
            "--cores".to_string(),
            cores.to_string(),
        ];

        match trim {
            Some(TrimSpec::StartEnd { start, end }) => {
                args_vec.push("--clip_R1".to_string());
                args_vec.push(start.to_string());
                args_vec.push("--three_prime_clip_R1".to_string());
                args_vec.push(end.to_string());
            }
            Some(TrimSpec::End { end }) => {
                args_vec.push("--three_prime_clip_R1".to_string());
                args_vec.push(end.to_string());
            }
            None => {}
        }
        args_vec
    }
}

pub mod hisat2 {
    use std::path::Path;
    use crate::utils::mates::WorkItem;

    pub fn arg_generator(program: &str, index: &Path, item: &WorkItem, threads: usize, sam_out: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![
            program.to_string(),
            "-x".to_string(),
            index.to_string_lossy().into_owned(),
        ];

        match item {
            WorkItem::Single(record) => {
                args_vec.push("-U".to_string());
                args_vec.push(record.path().to_string_lossy().into_owned());
            }
            WorkItem::Pair(pair) => {
                args_vec.push("-1".to_string());
                args_vec.push(pair.first.path().to_string_lossy().into_owned());
                args_vec.push("-2".to_string());
                args_vec.push(pair.second.path().to_string_lossy().into_owned());
            }
        }

        args_vec.push("-p".to_string());
        args_vec.push(threads.to_string());
        args_vec.push("-S".to_string());
        args_vec.push(sam_out.to_string_lossy().into_owned());
        args_vec
    }
}

pub mod samtools {
    use crate::config::defs::SamtoolsSubcommand;

    pub struct SamtoolsConfig {
        pub subcommand: SamtoolsSubcommand,
        pub subcommand_fields: Vec<(String, Option<String>)>,
    }

    pub fn arg_generator(program: &str, config: &SamtoolsConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![program.to_string()];
        let subcommand = match config.subcommand {
            SamtoolsSubcommand::View => "view",
            SamtoolsSubcommand::Sort => "sort",
        };
        args_vec.push(subcommand.to_string());
        for (flag, value) in &config.subcommand_fields {
            args_vec.push(flag.clone());
            if let Some(value) = value {
                args_vec.push(value.clone());
            }
        }
        args_vec
    }
}

pub mod picard {
    use crate::config::defs::PicardSubcommand;

    pub struct PicardConfig {
        pub subcommand: PicardSubcommand,
        pub subcommand_fields: Vec<(String, String)>,
    }

    pub fn arg_generator(java: &str, jar: &str, config: &PicardConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![
            java.to_string(),
            "-jar".to_string(),
            jar.to_string(),
            config.subcommand.as_str().to_string(),
        ];
        for (flag, value) in &config.subcommand_fields {
            args_vec.push(flag.clone());
            args_vec.push(value.clone());
        }
        args_vec
    }
}

pub mod featurecounts {
    use std::path::{Path, PathBuf};

    pub fn arg_generator(program: &str, annotation: &Path, output: &Path, threads: usize, bams: &[PathBuf]) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![
            program.to_string(),
            "-a".to_string(),
            annotation.to_string_lossy().into_owned(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "-T".to_string(),
            threads.to_string(),
        ];
        args_vec.extend(bams.iter().map(|b| b.to_string_lossy().into_owned()));
        args_vec
    }
}

pub mod multiqc {
    use std::path::Path;

    pub fn arg_generator(program: &str, search_dir: &Path, report_dir: &Path, config: Option<&Path>) -> Vec<String> {
        let mut args_vec: Vec<String> = vec![
            program.to_string(),
            search_dir.to_string_lossy().into_owned(),
            "-o".to_string(),
            report_dir.to_string_lossy().into_owned(),
            "--force".to_string(),
        ];
        if let Some(config) = config {
            args_vec.push("-c".to_string());
            args_vec.push(config.to_string_lossy().into_owned());
        }
        args_vec
    }
}


/// Asks a tool for its version.
///
/// # Arguments
///
/// * `tool` - Program name or path; its version flag is looked up by file name.
///
/// # Returns
/// First non-empty output line (stdout, else stderr).
pub async fn check_version(tool: &str) -> Result<String> {
    let tool_name = Path::new(tool)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| tool.to_string());
    let flag = TOOL_VERSION_FLAGS
        .get(tool_name.as_str())
        .copied()
        .unwrap_or("--version");

    let output = run_command(&[tool.to_string(), flag.to_string()]).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let first_line = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("No output from {} {}", tool, flag))?;
    Ok(first_line.to_string())
}

/// Logs the version of every tool. Missing tools are warned about, not fatal.
///
/// # Returns
/// The tools that could not be run.
pub async fn check_versions(tools: &[&str]) -> Vec<String> {
    let mut missing = Vec::new();
    for tool in tools {
        match check_version(tool).await {
            Ok(version) => info!("{}: {}", tool, version),
            Err(e) => {
                warn!("{} unavailable: {}", tool, e);
                missing.push(tool.to_string());
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::config::defs::{PicardSubcommand, SamtoolsSubcommand, TrimSpec};
    use crate::utils::mates::{FileRecord, MatePair, WorkItem};
    use tempfile::tempdir;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_command_captures_output_and_status() -> Result<()> {
        let output = run_command(&argv(&["sh", "-c", "echo out; echo err >&2; exit 3"])).await?;
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_command_spawn_errors() {
        assert!(run_command(&[]).await.is_err());
        assert!(run_command(&argv(&["definitely-not-a-real-tool-xyz"])).await.is_err());
    }

    #[tokio::test]
    async fn test_save_log_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let log_path = dir.path().join("s1_tool.log");
        std::fs::write(&log_path, "stale content that is longer than the new log")?;

        let output = ToolOutput {
            stdout: b"stdout line\n".to_vec(),
            stderr: b"stderr line\n".to_vec(),
            exit_code: Some(0),
        };
        save_log(&output, &log_path).await?;
        assert_eq!(std::fs::read_to_string(&log_path)?, "stdout line\nstderr line\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_check_version_missing_tool() {
        assert!(check_version("definitely-not-a-real-tool-xyz").await.is_err());
        let missing = check_versions(&["definitely-not-a-real-tool-xyz"]).await;
        assert_eq!(missing, vec!["definitely-not-a-real-tool-xyz".to_string()]);
    }

    #[test]
    fn test_trim_galore_args() {
        let input = Path::new("raw/S1.fastq.gz");
        let out = Path::new("out/Preprocessing/trimmed");
        assert_eq!(
            trim_galore::arg_generator("trim_galore", input, out, None, 2),
            argv(&["trim_galore", "raw/S1.fastq.gz", "-o", "out/Preprocessing/trimmed", "--cores", "2"])
        );
        assert_eq!(
            trim_galore::arg_generator("tg", input, out, Some(TrimSpec::StartEnd { start: 3, end: 5 }), 1)[6..],
            argv(&["--clip_R1", "3", "--three_prime_clip_R1", "5"])[..]
        );
        assert_eq!(
            trim_galore::arg_generator("tg", input, out, Some(TrimSpec::End { end: 4 }), 1)[6..],
            argv(&["--three_prime_clip_R1", "4"])[..]
        );
    }

    #[test]
    fn test_hisat2_args() {
        let index = Path::new("genome/grch38/genome");
        let sam = PathBuf::from("aligned/S1.sam");
        let single = WorkItem::Single(FileRecord::new("t/S1_trimmed.fq.gz", "@A.1"));
        assert_eq!(
            hisat2::arg_generator("hisat2", index, &single, 4, &sam),
            argv(&["hisat2", "-x", "genome/grch38/genome", "-U", "t/S1_trimmed.fq.gz", "-p", "4", "-S", "aligned/S1.sam"])
        );

        let pair = WorkItem::Pair(MatePair {
            first: FileRecord::new("t/a.fq.gz", "@A.1 r/1"),
            second: FileRecord::new("t/b.fq.gz", "@A.1 r/2"),
        });
        assert_eq!(
            hisat2::arg_generator("hisat2", index, &pair, 2, &sam)[3..7],
            argv(&["-1", "t/a.fq.gz", "-2", "t/b.fq.gz"])[..]
        );
    }

    #[test]
    fn test_samtools_and_picard_args() {
        let config = samtools::SamtoolsConfig {
            subcommand: SamtoolsSubcommand::View,
            subcommand_fields: vec![
                ("-b".to_string(), None),
                ("-o".to_string(), Some("x.bam".to_string())),
                ("x.sam".to_string(), None),
            ],
        };
        assert_eq!(samtools::arg_generator("samtools", &config), argv(&["samtools", "view", "-b", "-o", "x.bam", "x.sam"]));

        let config = picard::PicardConfig {
            subcommand: PicardSubcommand::SortSam,
            subcommand_fields: vec![("-I".to_string(), "in.bam".to_string())],
        };
        assert_eq!(
            picard::arg_generator("java", "picard.jar", &config),
            argv(&["java", "-jar", "picard.jar", "SortSam", "-I", "in.bam"])
        );
    }

    #[test]
    fn test_featurecounts_and_multiqc_args() {
        let bams = vec![PathBuf::from("a_sorted.bam"), PathBuf::from("b_sorted.bam")];
        assert_eq!(
            featurecounts::arg_generator("featureCounts", Path::new("g.gtf"), Path::new("counts.txt"), 8, &bams),
            argv(&["featureCounts", "-a", "g.gtf", "-o", "counts.txt", "-T", "8", "a_sorted.bam", "b_sorted.bam"])
        );
        assert_eq!(
            multiqc::arg_generator("multiqc", Path::new("out"), Path::new("out/Results/multiQC"), Some(Path::new("mqc.yaml"))),
            argv(&["multiqc", "out", "-o", "out/Results/multiQC", "--force", "-c", "mqc.yaml"])
        );
        assert_eq!(
            fastqc::arg_generator("fastqc", Path::new("a.fq.gz"), Path::new("qc"), 2),
            argv(&["fastqc", "a.fq.gz", "-o", "qc", "-t", "2"])
        );
    }
}
