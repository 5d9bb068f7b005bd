use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{LevelFilter, debug, error, info, warn};

use rnaseq_pipelines::cli::parse;
use rnaseq_pipelines::config::defs::{PipelineError, RunConfig};
use rnaseq_pipelines::pipelines;
use rnaseq_pipelines::pipelines::directories::prepare_output_dir;
use rnaseq_pipelines::utils::command::check_versions;
use rnaseq_pipelines::utils::system::{detect_cores_and_load, resolve_cores};


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n RNA-seq pipeline\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let (detected_cores, cpu_load) = detect_cores_and_load().await?;
    let cores = resolve_cores(args.cores, detected_cores);
    if let Some(requested) = args.cores {
        if requested != cores {
            warn!("Requested {} cores, using {} ({} detected)", requested, cores, detected_cores);
        }
    }
    debug!("Detected {} cores; CPU load {:.1}%; using {} cores", detected_cores, cpu_load, cores);

    let input_dir = absolute(&args.files, &dir);
    let out_dir = absolute(&args.directory_out, &dir);
    let run_config = Arc::new(RunConfig {
        input_dir,
        out_dir,
        args,
        cores,
    });

    if let Err(e) = run(run_config).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


async fn run(run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let inputs = pipelines::collect_inputs(&run_config.input_dir)?;
    info!("Found {} input file(s) in {}", inputs.len(), run_config.input_dir.display());

    prepare_output_dir(&run_config.out_dir, run_config.args.force)?;

    let args = &run_config.args;
    let tools = [
        args.fastqc.as_str(),
        args.trim_galore.as_str(),
        args.hisat2.as_str(),
        args.samtools.as_str(),
        args.java.as_str(),
        args.feature_counts.as_str(),
        args.multiqc.as_str(),
    ];
    let missing = check_versions(&tools).await;
    if !missing.is_empty() {
        warn!("Missing tools, their steps will fail: {}", missing.join(", "));
    }

    let reports = pipelines::run(run_config.clone(), inputs).await?;
    let failed: usize = reports.iter().map(|r| r.summary.failed + r.summary.timed_out).sum();
    if failed > 0 {
        warn!("{} item(s) did not complete cleanly; see {}", failed, run_config.out_dir.join("tool_logs").display());
    }
    Ok(())
}

/// Resolves `path` against `cwd` unless it is already absolute.
fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
