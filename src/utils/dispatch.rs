//! Bounded parallel dispatch of per-item stage operations.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use crate::utils::file::canonical_name;
use crate::utils::mates::{FileRecord, MatePair, WorkItem};

/// Anything the dispatcher can run an operation on.
pub trait DispatchItem: Send + 'static {
    /// Short name used in status lines.
    fn label(&self) -> String;
}

impl DispatchItem for PathBuf {
    fn label(&self) -> String {
        canonical_name(self)
    }
}

impl DispatchItem for FileRecord {
    fn label(&self) -> String {
        self.name()
    }
}

impl DispatchItem for MatePair {
    fn label(&self) -> String {
        self.name()
    }
}

impl DispatchItem for WorkItem {
    fn label(&self) -> String {
        self.name()
    }
}

/// Threads each item may use: `core_budget / item_count`, never below 1.
///
/// # Arguments
///
/// * `core_budget` - Cores allotted to the whole dispatch.
/// * `item_count` - Number of items sharing them.
///
/// # Returns
/// usize share per item
pub fn compute_share(core_budget: usize, item_count: usize) -> usize {
    if item_count == 0 {
        return core_budget.max(1);
    }
    (core_budget / item_count).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    pub worker_count: usize,
    pub per_item_share: usize,
    pub deadline: Option<Duration>,
}

impl DispatchPlan {
    pub fn new(core_budget: usize, item_count: usize) -> Self {
        let core_budget = core_budget.max(1);
        let worker_count = if item_count == 0 {
            core_budget
        } else {
            core_budget.min(item_count)
        };
        DispatchPlan {
            worker_count,
            per_item_share: compute_share(core_budget, item_count),
            deadline: None,
        }
    }

    /// Overrides the per-item share, e.g. when it was computed over a larger file set.
    pub fn with_share(mut self, share: usize) -> Self {
        self.per_item_share = share.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }

    pub fn merge(&mut self, other: DispatchSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
    }
}

/// Runs `operation(item, per_item_share)` once for every item, with at most
/// `plan.worker_count` operations in flight.
///
/// Returns after every item has finished. A failing, panicking or timed out item is
/// logged and counted; it never stops its siblings.
///
/// # Arguments
///
/// * `plan` - Worker bound, per-item share and optional deadline.
/// * `items` - The work items, consumed.
/// * `operation` - Per-item stage operation.
///
/// # Returns
/// DispatchSummary of item outcomes.
pub async fn dispatch<T, F, Fut>(plan: &DispatchPlan, items: Vec<T>, operation: F) -> DispatchSummary
where
    T: DispatchItem,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut summary = DispatchSummary::default();
    if items.is_empty() {
        return summary;
    }

    let semaphore = Arc::new(Semaphore::new(plan.worker_count.max(1)));
    let operation = Arc::new(operation);
    let mut labels = Vec::with_capacity(items.len());
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let label = item.label();
        labels.push(label.clone());
        let semaphore = semaphore.clone();
        let operation = operation.clone();
        let share = plan.per_item_share;
        let deadline = plan.deadline;

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("[{}] Not started, worker pool closed: {}", label, e);
                    return ItemOutcome::Failed;
                }
            };

            info!("[{}] Started", label);
            let result = match deadline {
                Some(limit) => match timeout(limit, operation(item, share)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("[{}] Abandoned after exceeding the {}s deadline", label, limit.as_secs_f64());
                        return ItemOutcome::TimedOut;
                    }
                },
                None => operation(item, share).await,
            };

            match result {
                Ok(()) => {
                    info!("[{}] Finished", label);
                    ItemOutcome::Succeeded
                }
                Err(e) => {
                    error!("[{}] Failed: {:#}", label, e);
                    ItemOutcome::Failed
                }
            }
        }));
    }

    for (label, joined) in labels.iter().zip(join_all(handles).await) {
        match joined {
            Ok(ItemOutcome::Succeeded) => summary.succeeded += 1,
            Ok(ItemOutcome::Failed) => summary.failed += 1,
            Ok(ItemOutcome::TimedOut) => summary.timed_out += 1,
            Err(e) => {
                error!("[{}] Worker aborted: {}", label, e);
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    struct Job(usize);

    impl DispatchItem for Job {
        fn label(&self) -> String {
            format!("job{}", self.0)
        }
    }

    #[test]
    fn test_compute_share() {
        assert_eq!(compute_share(10, 3), 3);
        assert_eq!(compute_share(2, 5), 1);
        assert_eq!(compute_share(0, 1), 1);
        assert_eq!(compute_share(8, 0), 8);
        assert_eq!(compute_share(0, 0), 1);
    }

    #[test]
    fn test_dispatch_plan_bounds() {
        let plan = DispatchPlan::new(4, 10);
        assert_eq!(plan.worker_count, 4);
        assert_eq!(plan.per_item_share, 1);

        let plan = DispatchPlan::new(16, 3);
        assert_eq!(plan.worker_count, 3);
        assert_eq!(plan.per_item_share, 5);

        let plan = DispatchPlan::new(0, 5);
        assert_eq!(plan.worker_count, 1);
        assert_eq!(plan.per_item_share, 1);

        let plan = DispatchPlan::new(6, 2).with_share(0).with_deadline(Some(Duration::from_secs(3)));
        assert_eq!(plan.per_item_share, 1);
        assert_eq!(plan.deadline, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_dispatch_empty() {
        let plan = DispatchPlan::new(4, 0);
        let summary = dispatch(&plan, Vec::<Job>::new(), |_job, _share| async { Ok(()) }).await;
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatch_passes_share() {
        let seen = Arc::new(AtomicUsize::new(0));
        let plan = DispatchPlan::new(9, 3);
        let seen_op = seen.clone();
        let summary = dispatch(&plan, (0..3).map(Job).collect(), move |_job, share| {
            let seen = seen_op.clone();
            async move {
                seen.fetch_add(share, Ordering::SeqCst);
                Ok(())
            }
        })
            .await;
        assert_eq!(summary.succeeded, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_dispatch_isolates_errors_and_panics() {
        let plan = DispatchPlan::new(2, 5);
        let summary = dispatch(&plan, (0..5).map(Job).collect(), |job, _share| async move {
            match job.0 {
                1 => Err(anyhow!("tool exploded")),
                3 => panic!("worker panic"),
                _ => Ok(()),
            }
        })
            .await;
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total(), 5);
        assert!(!summary.all_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_deadline_abandons_slow_item() {
        let plan = DispatchPlan::new(3, 3).with_deadline(Some(Duration::from_secs(1)));
        let summary = dispatch(&plan, (0..3).map(Job).collect(), |job, _share| async move {
            if job.0 == 0 {
                sleep(Duration::from_secs(60)).await;
            } else {
                sleep(Duration::from_millis(10)).await;
            }
            Ok(())
        })
            .await;
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = DispatchSummary { succeeded: 2, failed: 1, timed_out: 0 };
        total.merge(DispatchSummary { succeeded: 1, failed: 0, timed_out: 1 });
        assert_eq!(total, DispatchSummary { succeeded: 3, failed: 1, timed_out: 1 });
    }
}
