// src/utils/system.rs: System functions

use std::time::Duration;
use anyhow::Result;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::time::sleep;


/// Determines the number of cores visible to the pipeline and the current load.
///
/// # Returns
///
/// Result<(usize, f32)> logical cores, current cpu usage
pub async fn detect_cores_and_load() -> Result<(usize, f32)> {
    let refresh_kind = RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage());
    let mut system = System::new_with_specifics(refresh_kind);
    system.refresh_cpu_usage();
    sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(100))).await;
    system.refresh_cpu_usage();

    let cores = match system.cpus().len() {
        0 => num_cpus::get(),
        n => n,
    };
    Ok((cores.max(1), system.global_cpu_usage()))
}


/// Default core budget: two thirds of the detected cores, rounded up.
pub fn default_cores(detected_cores: usize) -> usize {
    (detected_cores * 2).div_ceil(3).max(1)
}


/// Chooses the core budget for the run.
///
/// # Arguments
///
/// * `requested` - Cores asked for on the command line, if any.
/// * `detected_cores` - Cores found on the machine.
///
/// # Returns
///
/// usize within `[1, detected_cores]`
pub fn resolve_cores(requested: Option<usize>, detected_cores: usize) -> usize {
    let detected_cores = detected_cores.max(1);
    requested
        .unwrap_or_else(|| default_cores(detected_cores))
        .clamp(1, detected_cores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cores() {
        assert_eq!(default_cores(1), 1);
        assert_eq!(default_cores(3), 2);
        assert_eq!(default_cores(4), 3);
        assert_eq!(default_cores(32), 22);
        assert_eq!(default_cores(0), 1);
    }

    #[test]
    fn test_resolve_cores_clamps() {
        assert_eq!(resolve_cores(None, 12), 8);
        assert_eq!(resolve_cores(Some(0), 12), 1);
        assert_eq!(resolve_cores(Some(64), 12), 12);
        assert_eq!(resolve_cores(Some(5), 12), 5);
        assert_eq!(resolve_cores(Some(5), 0), 1);
    }

    #[tokio::test]
    async fn test_detect_cores_and_load() -> Result<()> {
        let (cores, load) = detect_cores_and_load().await?;
        assert!(cores >= 1);
        assert!(load >= 0.0);
        Ok(())
    }
}
