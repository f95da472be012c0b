use super::{Catalog, FileRecord};
use crate::error::Error;
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

/// Walks `root` in lexicographic order and assigns sequential ids ("1", "2", ...)
/// to every regular, non-hidden file. Symlinks are never followed or catalogued,
/// and dot-prefixed directories are pruned along with their contents.
pub fn build_catalog(root: &Path, ignore_globs: &[String]) -> Result<Catalog, Error> {
    let scan_error = |source: io::Error| Error::Scan {
        root: root.to_path_buf(),
        source,
    };

    let root = fs::canonicalize(root).map_err(scan_error)?;
    if !root.is_dir() {
        return Err(scan_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }
    fs::read_dir(&root).map_err(scan_error)?;

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry) && !is_ignored(&root, entry, &ignore_patterns));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                match err.io_error().map(|e| e.kind()) {
                    Some(io::ErrorKind::PermissionDenied) | Some(io::ErrorKind::NotFound) => {
                        warn!("Skipping unreadable entry {}: {}", path, err);
                        warnings.push(format!("{}: {}", path, err));
                        continue;
                    }
                    _ => {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::Other,
                            format!("Error walking {}: {}", path, err),
                        )));
                    }
                }
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Error getting metadata for {}: {}", entry.path().display(), err);
                warnings.push(format!("{}: {}", entry.path().display(), err));
                continue;
            }
        };

        let relative_path = match entry.path().strip_prefix(&root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        // The catalog transport carries paths as JSON strings.
        if relative_path.to_str().is_none() {
            warn!("Skipping non UTF-8 path {}", entry.path().display());
            warnings.push(format!("{}: not valid UTF-8", entry.path().display()));
            continue;
        }

        let modified_time: DateTime<Utc> = metadata
            .modified()
            .unwrap_or(UNIX_EPOCH)
            .into();

        records.push(FileRecord {
            id: (records.len() + 1).to_string(),
            source_path: entry.path().to_path_buf(),
            relative_path,
            size: metadata.len(),
            modified_time,
        });
    }

    debug!(
        "Catalogued {} files under {} ({} warnings)",
        records.len(),
        root.display(),
        warnings.len()
    );

    Ok(Catalog::new(root, records, warnings))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().as_encoded_bytes().starts_with(b".")
}

fn is_ignored(root: &Path, entry: &DirEntry, patterns: &[Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    match entry.path().strip_prefix(root) {
        Ok(relative) => patterns.iter().any(|pattern| pattern.matches_path(relative)),
        Err(_) => false,
    }
}
