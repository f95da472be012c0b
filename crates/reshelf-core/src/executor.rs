use crate::platform;
use crate::progress::ProgressReporter;
use crate::resolver::ResolvedPlanItem;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const REASON_DRY_RUN: &str = "dry-run";
pub const REASON_IN_PLACE: &str = "already in place";
pub const REASON_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Moved,
    Skipped,
    Failed,
}

/// Outcome of one plan item. `detail` holds the skip reason or failure text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub id: String,
    pub source_path: PathBuf,
    pub destination: PathBuf,
    pub status: ItemStatus,
    pub detail: Option<String>,
}

/// Why a single move did not happen. Never aborts the run.
#[derive(Error, Debug)]
pub enum MoveFailure {
    #[error("source missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("destination already exists: {}", .0.display())]
    DestinationOccupied(PathBuf),

    #[error("cannot create directory {}: {source}", path.display())]
    CreateParent {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("move failed: {0}")]
    Move(#[source] io::Error),

    #[error("destination {} resolves outside {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("cross-device copy failed: {0}")]
    CrossDeviceCopy(#[source] io::Error),

    #[error("copied across devices but could not remove source ({0}); copy discarded")]
    SourceNotRemoved(#[source] io::Error),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<ExecutionResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        let count = |status: ItemStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            moved: count(ItemStatus::Moved),
            skipped: count(ItemStatus::Skipped),
            failed: count(ItemStatus::Failed),
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.status == ItemStatus::Failed)
    }
}

/// Applies a resolved plan, one item at a time, in plan order.
pub struct Executor {
    dry_run: bool,
    cross_device_copy: bool,
    destination_root: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            cross_device_copy: true,
            destination_root: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cross_device_copy(mut self, enabled: bool) -> Self {
        self.cross_device_copy = enabled;
        self
    }

    /// Refuse moves whose destination directory resolves outside `root`.
    pub fn with_destination_root(mut self, root: PathBuf) -> Self {
        self.destination_root = Some(root);
        self
    }

    pub fn with_cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Setting the token stops new moves; remaining items are reported as cancelled.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn execute(
        &self,
        plan: &[ResolvedPlanItem],
        reporter: &dyn ProgressReporter,
    ) -> RunSummary {
        reporter.on_execute_start(plan.len(), self.dry_run);

        let mut results = Vec::with_capacity(plan.len());
        for (index, item) in plan.iter().enumerate() {
            let result = if self.cancel.load(Ordering::Relaxed) {
                skipped(item, REASON_CANCELLED)
            } else {
                self.execute_item(item, reporter)
            };
            reporter.on_item_complete(index, &result);
            results.push(result);
        }

        let summary = RunSummary::from_results(results);
        info!(
            "Plan executed{}: {} moved, {} skipped, {} failed",
            if self.dry_run { " (dry run)" } else { "" },
            summary.moved,
            summary.skipped,
            summary.failed
        );
        reporter.on_execute_complete(summary.moved, summary.skipped, summary.failed);
        summary
    }

    fn execute_item(
        &self,
        item: &ResolvedPlanItem,
        reporter: &dyn ProgressReporter,
    ) -> ExecutionResult {
        if self.dry_run {
            reporter.on_planned_action(item);
            return skipped(item, REASON_DRY_RUN);
        }

        if item.is_no_op() {
            debug!("{} is already in place", item.source_path.display());
            return skipped(item, REASON_IN_PLACE);
        }

        let outcome = match &self.destination_root {
            Some(root) => ensure_within(root, &item.final_destination),
            None => Ok(()),
        }
        .and_then(|()| {
            move_file(
                &item.source_path,
                &item.final_destination,
                self.cross_device_copy,
            )
        });

        match outcome {
            Ok(()) => {
                debug!(
                    "moved: {} -> {}",
                    item.source_path.display(),
                    item.final_destination.display()
                );
                result(item, ItemStatus::Moved, None)
            }
            Err(failure) => {
                warn!(
                    "Failed to move '{}' (id {}): {}",
                    item.source_path.display(),
                    item.id,
                    failure
                );
                result(item, ItemStatus::Failed, Some(failure.to_string()))
            }
        }
    }
}

/// Moves `source` to `destination`, creating missing ancestors. Refuses to
/// replace anything already present at `destination`.
pub fn move_file(
    source: &Path,
    destination: &Path,
    cross_device_copy: bool,
) -> Result<(), MoveFailure> {
    if fs::symlink_metadata(source).is_err() {
        return Err(MoveFailure::SourceMissing(source.to_path_buf()));
    }
    if fs::symlink_metadata(destination).is_ok() {
        return Err(MoveFailure::DestinationOccupied(destination.to_path_buf()));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| MoveFailure::CreateParent {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if cross_device_copy && platform::is_cross_device(&err) => {
            debug!(
                "{} and {} are on different devices, copying",
                source.display(),
                destination.display()
            );
            copy_then_remove(source, destination)
        }
        Err(err) => Err(MoveFailure::Move(err)),
    }
}

/// Checks the deepest existing ancestor of `destination`, so a symlinked
/// directory below `root` cannot carry the move elsewhere.
fn ensure_within(root: &Path, destination: &Path) -> Result<(), MoveFailure> {
    let outside = || MoveFailure::OutsideRoot {
        path: destination.to_path_buf(),
        root: root.to_path_buf(),
    };
    if !destination.starts_with(root) {
        return Err(outside());
    }
    let existing = destination
        .ancestors()
        .skip(1)
        .find(|ancestor| fs::symlink_metadata(ancestor).is_ok());
    let existing = match existing {
        // Nothing below the root exists yet.
        Some(existing) if existing.starts_with(root) => existing,
        _ => return Ok(()),
    };
    let resolved = fs::canonicalize(existing).map_err(MoveFailure::Move)?;
    let root = fs::canonicalize(root).map_err(MoveFailure::Move)?;
    if resolved.starts_with(&root) {
        Ok(())
    } else {
        Err(outside())
    }
}

/// The copy is discarded again unless the source is removed, so the file
/// exists in exactly one place afterwards.
fn copy_then_remove(source: &Path, destination: &Path) -> Result<(), MoveFailure> {
    if let Err(err) = fs::copy(source, destination) {
        let _ = fs::remove_file(destination);
        return Err(MoveFailure::CrossDeviceCopy(err));
    }
    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(MoveFailure::SourceNotRemoved(err));
    }
    Ok(())
}

fn skipped(item: &ResolvedPlanItem, reason: &str) -> ExecutionResult {
    result(item, ItemStatus::Skipped, Some(reason.to_string()))
}

fn result(item: &ResolvedPlanItem, status: ItemStatus, detail: Option<String>) -> ExecutionResult {
    ExecutionResult {
        id: item.id.clone(),
        source_path: item.source_path.clone(),
        destination: item.final_destination.clone(),
        status,
        detail,
    }
}
