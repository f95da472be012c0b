use crate::audit::{self, AuditReport};
use crate::catalog::{self, Catalog};
use crate::config::AppConfig;
use crate::error::Error;
use crate::executor::{Executor, RunSummary};
use crate::mapping::{self, MappingEntry};
use crate::platform;
use crate::progress::ProgressReporter;
use crate::resolver::{self, ResolvedPlanItem};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct RelocationEngine {
    config: AppConfig,
    dry_run: bool,
    verify: bool,
    catalog_file: Option<PathBuf>,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct RunReport {
    pub scan_duration: Duration,
    pub resolve_duration: Duration,
    pub execute_duration: Duration,
    pub verify_duration: Duration,
    pub catalog_files: usize,
    pub collisions: usize,
    pub plan: Vec<ResolvedPlanItem>,
    pub summary: RunSummary,
    pub audit: Option<AuditReport>,
}

impl RunReport {
    /// Any failed item, or an audit that found a lost or altered file.
    pub fn has_problems(&self) -> bool {
        self.summary.has_failures() || self.audit.as_ref().is_some_and(|a| !a.is_clean())
    }
}

impl RelocationEngine {
    pub fn new(config: AppConfig) -> Self {
        let verify = config.verify_after_move;
        Self {
            config,
            dry_run: false,
            verify,
            catalog_file: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Use a catalog written by an earlier `scan` instead of walking the source root again.
    pub fn with_catalog_file(mut self, path: Option<PathBuf>) -> Self {
        self.catalog_file = path;
        self
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn scan(
        &self,
        source_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Catalog, Error> {
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let catalog = match &self.catalog_file {
            Some(path) => {
                info!("Loading catalog from {}", path.display());
                let file = File::open(path)?;
                Catalog::from_json(source_root, BufReader::new(file))?
            }
            None => {
                info!("Scanning {}", source_root.display());
                catalog::build_catalog(source_root, &self.config.ignore_patterns)?
            }
        };
        for warning in catalog.warnings() {
            warn!("Skipped during scan: {}", warning);
        }
        reporter.on_scan_complete(catalog.len(), scan_start.elapsed().as_secs_f64());
        Ok(catalog)
    }

    /// Validates `entries` against `catalog` and resolves collisions. Reads only.
    pub fn plan(
        &self,
        catalog: &Catalog,
        entries: &[MappingEntry],
        destination_root: &Path,
    ) -> Result<Vec<ResolvedPlanItem>, Error> {
        let pairs = mapping::validate(catalog, entries)?;
        let destination_root = platform::absolute_root(destination_root)?;
        resolver::resolve(
            catalog,
            &pairs,
            &destination_root,
            self.config.max_suffix_attempts,
        )
    }

    /// Run the full relocation pipeline:
    /// 1. Catalog the source root (or load a saved catalog)
    /// 2. Load and validate the mapping, then resolve collisions
    /// 3. Dry-run or move every plan item
    /// 4. Optionally verify content fingerprints
    pub fn run(
        &self,
        source_root: &Path,
        destination_root: &Path,
        mapping_path: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunReport, Error> {
        // Phase 1: Catalog
        let scan_start = Instant::now();
        let catalog = self.scan(source_root, reporter)?;
        let scan_duration = scan_start.elapsed();
        debug!(
            "Catalog ready in {:.2}s: {} files",
            scan_duration.as_secs_f64(),
            catalog.len()
        );

        // Phase 2: Mapping + resolution
        info!("Resolving plan from {}", mapping_path.display());
        let resolve_start = Instant::now();
        let entries = mapping::load_mapping(mapping_path)?;
        let destination_root = platform::absolute_root(destination_root)?;
        let plan = self.plan(&catalog, &entries, &destination_root)?;
        let resolve_duration = resolve_start.elapsed();
        let collisions = plan.iter().filter(|item| item.collision).count();
        reporter.on_resolve_complete(plan.len(), collisions);
        debug!(
            "Plan resolved in {:.2}s: {} items, {} collisions",
            resolve_duration.as_secs_f64(),
            plan.len(),
            collisions
        );

        let verify = self.verify && !self.dry_run;
        let fingerprints = if verify {
            reporter.on_verify_start(plan.len());
            Some(audit::fingerprint_sources(&plan))
        } else {
            None
        };

        // Phase 3: Execute
        info!(
            "{} {} plan items...",
            if self.dry_run { "Simulating" } else { "Moving" },
            plan.len()
        );
        let execute_start = Instant::now();
        let executor = Executor::new(self.dry_run)
            .with_cross_device_copy(self.config.cross_device_copy)
            .with_destination_root(destination_root)
            .with_cancel_token(self.cancel_token());
        let summary = executor.execute(&plan, reporter);
        let execute_duration = execute_start.elapsed();

        // Phase 4: Verify
        let verify_start = Instant::now();
        let audit = fingerprints.map(|before| {
            let report = audit::verify_run(&before, &summary);
            reporter.on_verify_complete(
                report.verified.len(),
                report.mismatched.len() + report.missing.len(),
            );
            report
        });
        let verify_duration = verify_start.elapsed();

        Ok(RunReport {
            scan_duration,
            resolve_duration,
            execute_duration,
            verify_duration,
            catalog_files: catalog.len(),
            collisions,
            plan,
            summary,
            audit,
        })
    }
}
