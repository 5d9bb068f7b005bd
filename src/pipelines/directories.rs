// src/pipelines/directories.rs: output directory layout

use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};
use crate::config::defs::{
    PipelineError, Stage, DATA_DIR, DATA_SUBDIRS, PREPROCESSING_DIR, PREPROCESSING_SUBDIRS,
    REMOVABLE_DIRS, RESULTS_DIR, RESULTS_SUBDIRS, TOOL_LOGS_DIR,
};


/// Every directory the pipeline writes into, relative to the output root.
pub fn layout(out_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for sub in PREPROCESSING_SUBDIRS {
        dirs.push(out_dir.join(PREPROCESSING_DIR).join(sub));
    }
    for sub in RESULTS_SUBDIRS {
        dirs.push(out_dir.join(RESULTS_DIR).join(sub));
    }
    for sub in DATA_SUBDIRS {
        dirs.push(out_dir.join(DATA_DIR).join(sub));
    }
    for stage in Stage::ALL {
        dirs.push(out_dir.join(TOOL_LOGS_DIR).join(stage.log_dir_name()));
    }
    dirs
}

/// Generated subtrees already present under `out_dir`.
pub fn previous_outputs(out_dir: &Path) -> Vec<PathBuf> {
    REMOVABLE_DIRS
        .iter()
        .map(|sub| out_dir.join(sub))
        .filter(|path| path.exists())
        .collect()
}

/// Creates the output layout.
///
/// A directory that already holds generated output is only reused with `force`, in which
/// case the generated subtrees are removed first. Reference data under `Data/genome` is
/// left alone either way.
///
/// # Arguments
///
/// * `out_dir` - Output root.
/// * `force` - Clear earlier generated output instead of refusing to run.
///
/// # Returns
/// Result<(), PipelineError>
pub fn prepare_output_dir(out_dir: &Path, force: bool) -> Result<(), PipelineError> {
    fs::create_dir_all(out_dir)
        .map_err(|e| PipelineError::IOError(format!("Cannot create {}: {}", out_dir.display(), e)))?;

    let previous = previous_outputs(out_dir);
    if !previous.is_empty() {
        if !force {
            return Err(PipelineError::OutputNotEmpty(out_dir.to_path_buf()));
        }
        for path in previous {
            warn!("Removing previous output {}", path.display());
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| PipelineError::IOError(format!("Cannot remove {}: {}", path.display(), e)))?;
        }
    }

    for dir in layout(out_dir) {
        fs::create_dir_all(&dir)
            .map_err(|e| PipelineError::IOError(format!("Cannot create {}: {}", dir.display(), e)))?;
    }
    info!("Output directory ready: {}", out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prepare_creates_layout() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let out = dir.path().join("out");
        prepare_output_dir(&out, false)?;

        for expected in [
            "Preprocessing/trimmed",
            "Preprocessing/markDuplicates",
            "Results/fastQC",
            "Results/multiQC",
            "Data/genome",
            "Data/counts",
            "tool_logs/alignment",
            "tool_logs/bam_processing",
        ] {
            assert!(out.join(expected).is_dir(), "missing {}", expected);
        }
        Ok(())
    }

    #[test]
    fn test_prepare_refuses_previous_output_without_force() -> anyhow::Result<()> {
        let dir = tempdir()?;
        prepare_output_dir(dir.path(), false)?;
        let result = prepare_output_dir(dir.path(), false);
        assert!(matches!(result, Err(PipelineError::OutputNotEmpty(_))));
        Ok(())
    }

    #[test]
    fn test_force_keeps_genome() -> anyhow::Result<()> {
        let dir = tempdir()?;
        prepare_output_dir(dir.path(), false)?;
        fs::write(dir.path().join("Data/genome/ref.gtf"), "gene")?;
        fs::write(dir.path().join("Preprocessing/trimmed/old_trimmed.fq.gz"), "old")?;

        prepare_output_dir(dir.path(), true)?;
        assert!(dir.path().join("Data/genome/ref.gtf").exists());
        assert!(!dir.path().join("Preprocessing/trimmed/old_trimmed.fq.gz").exists());
        assert!(dir.path().join("Preprocessing/trimmed").is_dir());
        Ok(())
    }

    #[test]
    fn test_genome_only_is_not_previous_output() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("Data/genome"))?;
        assert!(previous_outputs(dir.path()).is_empty());
        prepare_output_dir(dir.path(), false)?;
        Ok(())
    }
}
