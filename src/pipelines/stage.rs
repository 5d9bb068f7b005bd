//! Shared plumbing for running one stage's external tools.

use std::path::PathBuf;
use anyhow::{anyhow, Result};
use log::{info, warn};
use crate::config::defs::{RunConfig, Stage};
use crate::utils::command::{run_command, save_log, ToolOutput};
use crate::utils::dispatch::DispatchPlan;


/// Where a stage writes its tool logs.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub stage: Stage,
    pub log_dir: PathBuf,
}

impl StageContext {
    pub fn new(config: &RunConfig, stage: Stage) -> Self {
        StageContext {
            stage,
            log_dir: config.stage_log_dir(stage),
        }
    }

    /// `{log_dir}/{basename}_{tool_name}.log`
    pub fn log_path(&self, basename: &str, tool_name: &str) -> PathBuf {
        self.log_dir.join(format!("{}_{}.log", basename, tool_name))
    }
}


/// Worker plan for a stage over `item_count` items, honouring the configured deadline.
pub fn stage_plan(config: &RunConfig, item_count: usize) -> DispatchPlan {
    DispatchPlan::new(config.cores, item_count).with_deadline(config.item_deadline())
}


/// Runs one tool invocation and stores its combined output as the item's log.
///
/// # Arguments
///
/// * `ctx` - Stage whose log directory receives the log.
/// * `basename` - Canonical name of the file or pair being processed.
/// * `tool_name` - Short name of the step, used in the log file name.
/// * `argv` - Full command line.
///
/// # Returns
/// ToolOutput of the finished process. A non-zero exit is logged, not returned as an error.
pub async fn run_tool(ctx: &StageContext, basename: &str, tool_name: &str, argv: Vec<String>) -> Result<ToolOutput> {
    info!("[{}] {} started", basename, tool_name);
    let output = run_command(&argv).await?;

    let log_path = ctx.log_path(basename, tool_name);
    save_log(&output, &log_path).await?;

    match output.exit_code {
        Some(0) => info!("[{}] {} finished, log at {}", basename, tool_name, log_path.display()),
        Some(code) => warn!(
            "[{}] {} exited with status {}, see {}",
            basename, tool_name, code, log_path.display()
        ),
        None => warn!(
            "[{}] {} was terminated by a signal, see {}",
            basename, tool_name, log_path.display()
        ),
    }
    Ok(output)
}


/// Sequence of tool steps for one item. Every step is attempted even if an earlier one
/// exits non-zero; the chain reports failure once all steps have run.
pub struct ToolChain<'a> {
    ctx: &'a StageContext,
    basename: String,
    failed_steps: Vec<String>,
}

impl<'a> ToolChain<'a> {
    pub fn new(ctx: &'a StageContext, basename: impl Into<String>) -> Self {
        ToolChain {
            ctx,
            basename: basename.into(),
            failed_steps: Vec::new(),
        }
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Runs one step. Only a failure to launch or to write the log is an error.
    pub async fn step(&mut self, tool_name: &str, argv: Vec<String>) -> Result<()> {
        let output = run_tool(self.ctx, &self.basename, tool_name, argv).await?;
        if !output.success() {
            self.failed_steps.push(tool_name.to_string());
        }
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        if self.failed_steps.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{} step(s) exited non-zero: {}", self.failed_steps.len(), self.failed_steps.join(", ")))
        }
    }
}
