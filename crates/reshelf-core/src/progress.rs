use crate::executor::ExecutionResult;
use crate::resolver::ResolvedPlanItem;

/// Trait for reporting pipeline progress.
///
/// The CLI implements it with stdout lines and an indicatif bar; tests use
/// [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_resolve_complete(&self, _plan_items: usize, _collisions: usize) {}
    fn on_execute_start(&self, _total_items: usize, _dry_run: bool) {}
    /// Called once per item in dry-run mode, before its result is recorded.
    fn on_planned_action(&self, _item: &ResolvedPlanItem) {}
    fn on_item_complete(&self, _index: usize, _result: &ExecutionResult) {}
    fn on_execute_complete(&self, _moved: usize, _skipped: usize, _failed: usize) {}
    fn on_verify_start(&self, _total_files: usize) {}
    fn on_verify_complete(&self, _verified: usize, _problems: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
