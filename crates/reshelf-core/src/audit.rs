//! Content fingerprints taken before a live run and re-checked afterwards.
//!
//! Every file that was part of the plan must exist exactly once after the run,
//! with unchanged content: at its destination when it was moved, at its source
//! otherwise.

use crate::executor::{ItemStatus, RunSummary};
use crate::hasher;
use crate::resolver::ResolvedPlanItem;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Content hash per file id.
pub type Fingerprints = HashMap<String, u64>;

/// How a moved file's location changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    Moved,
    Renamed,
    MovedRenamed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub verified: Vec<String>,
    pub mismatched: Vec<String>,
    pub missing: Vec<String>,
    /// Ids whose source could not be read before the run.
    pub unfingerprinted: Vec<String>,
    pub moved: usize,
    pub renamed: usize,
    pub moved_renamed: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

enum Check {
    Verified,
    Mismatched,
    Missing,
    Unfingerprinted,
}

/// Hashes every plan source in parallel. Unreadable sources are logged and
/// left out of the map.
pub fn fingerprint_sources(plan: &[ResolvedPlanItem]) -> Fingerprints {
    plan.par_iter()
        .filter_map(|item| match hasher::hash_file(&item.source_path) {
            Ok(hash) => Some((item.id.clone(), hash)),
            Err(e) => {
                error!("Error hashing '{}': {}", item.source_path.display(), e);
                None
            }
        })
        .collect()
}

/// Re-hashes where each file should now live and compares against `before`.
pub fn verify_run(before: &Fingerprints, summary: &RunSummary) -> AuditReport {
    let checks: Vec<(String, Check)> = summary
        .results
        .par_iter()
        .map(|result| {
            let expected_at = if result.status == ItemStatus::Moved {
                &result.destination
            } else {
                &result.source_path
            };
            let check = match before.get(&result.id) {
                None => Check::Unfingerprinted,
                Some(&expected) => compare(expected_at, expected),
            };
            (result.id.clone(), check)
        })
        .collect();

    let mut report = AuditReport::default();
    for (id, check) in checks {
        match check {
            Check::Verified => report.verified.push(id),
            Check::Mismatched => report.mismatched.push(id),
            Check::Missing => report.missing.push(id),
            Check::Unfingerprinted => report.unfingerprinted.push(id),
        }
    }

    for result in summary.results.iter().filter(|r| r.status == ItemStatus::Moved) {
        match change_kind(&result.source_path, &result.destination) {
            ChangeKind::Moved => report.moved += 1,
            ChangeKind::Renamed => report.renamed += 1,
            ChangeKind::MovedRenamed => report.moved_renamed += 1,
            ChangeKind::Unchanged => {}
        }
    }

    debug!(
        "Audit: {} verified, {} mismatched, {} missing, {} unfingerprinted",
        report.verified.len(),
        report.mismatched.len(),
        report.missing.len(),
        report.unfingerprinted.len()
    );
    report
}

fn compare(path: &Path, expected: u64) -> Check {
    match hasher::hash_file(path) {
        Ok(actual) if actual == expected => Check::Verified,
        Ok(_) => {
            error!("Content of '{}' changed during the run", path.display());
            Check::Mismatched
        }
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                error!("Error hashing '{}': {}", path.display(), e);
            }
            Check::Missing
        }
    }
}

pub fn change_kind(from: &Path, to: &Path) -> ChangeKind {
    let moved = from.parent() != to.parent();
    let renamed = from.file_name() != to.file_name();
    match (moved, renamed) {
        (false, false) => ChangeKind::Unchanged,
        (true, false) => ChangeKind::Moved,
        (false, true) => ChangeKind::Renamed,
        (true, true) => ChangeKind::MovedRenamed,
    }
}
