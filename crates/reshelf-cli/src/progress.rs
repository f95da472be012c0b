use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use reshelf_core::{ExecutionResult, ItemStatus, ProgressReporter, ResolvedPlanItem};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter.
///
/// - Scan / verify phases: spinner
/// - Live execution: progress bar (plan length known up front)
/// - Dry run: one `source -> destination` line per item on stdout
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.guard();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.guard().take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(&self, message: &'static str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        self.spinner("Cataloguing files...");
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Catalog complete: {} files in {:.2}s",
            "✓".green(),
            total_files,
            duration_secs
        );
    }

    fn on_resolve_complete(&self, plan_items: usize, collisions: usize) {
        eprintln!(
            "  {} Plan resolved: {} items, {} renamed to avoid collisions",
            "✓".green(),
            plan_items,
            collisions
        );
    }

    fn on_execute_start(&self, total_items: usize, dry_run: bool) {
        if dry_run {
            return;
        }
        let pb = ProgressBar::new(total_items as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Moving [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining)",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_planned_action(&self, item: &ResolvedPlanItem) {
        println!(
            "{} -> {}",
            item.source_path.display(),
            item.final_destination.display()
        );
    }

    fn on_item_complete(&self, _index: usize, result: &ExecutionResult) {
        if let Some(pb) = self.guard().as_ref() {
            pb.inc(1);
            if result.status == ItemStatus::Failed {
                pb.println(format!(
                    "  {} {}: {}",
                    "✗".red(),
                    result.source_path.display(),
                    result.detail.as_deref().unwrap_or("failed")
                ));
            }
        }
    }

    fn on_execute_complete(&self, moved: usize, skipped: usize, failed: usize) {
        self.finish_bar();
        let mark = if failed == 0 { "✓".green() } else { "✗".red() };
        eprintln!(
            "  {} Execution complete: {} moved, {} skipped, {} failed",
            mark, moved, skipped, failed
        );
    }

    fn on_verify_start(&self, _total_files: usize) {
        self.spinner("Fingerprinting sources...");
    }

    fn on_verify_complete(&self, verified: usize, problems: usize) {
        self.finish_bar();
        let mark = if problems == 0 { "✓".green() } else { "✗".red() };
        eprintln!(
            "  {} Verification complete: {} intact, {} lost or altered",
            mark, verified, problems
        );
    }
}
