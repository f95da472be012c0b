use crate::catalog::Catalog;
use crate::error::Error;
use crate::mapping::ValidatedPair;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source file paired with the destination it will actually be moved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlanItem {
    pub id: String,
    pub source_path: PathBuf,
    /// Destination as requested, relative to the destination root.
    pub original_destination: PathBuf,
    /// Absolute destination after disambiguation.
    pub final_destination: PathBuf,
    pub collision: bool,
}

impl ResolvedPlanItem {
    /// The file already sits at its destination.
    pub fn is_no_op(&self) -> bool {
        self.source_path == self.final_destination
    }
}

/// Destinations granted so far, plus every directory they require.
#[derive(Default)]
struct Claims {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl Claims {
    fn claim(&mut self, destination_root: &Path, destination: &Path) {
        self.dirs.extend(intermediate_dirs(destination_root, destination));
        self.files.insert(destination.to_path_buf());
    }
}

/// Assigns a unique absolute destination to every pair.
///
/// Claims are granted in catalog order, so the file found first during the walk
/// keeps the requested name and later claimants get `_1`, `_2`, ... suffixes.
/// Anything already on disk at a destination is never displaced, unless it is
/// the source file itself. A directory the destination needs that is already
/// claimed as a file, or exists on disk as anything but a real directory, is
/// suffixed the same way. Items are returned in the order of `pairs`.
pub fn resolve(
    catalog: &Catalog,
    pairs: &[ValidatedPair],
    destination_root: &Path,
    max_attempts: u32,
) -> Result<Vec<ResolvedPlanItem>, Error> {
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.sort_by_key(|&idx| {
        catalog
            .position(&pairs[idx].record.id)
            .unwrap_or(usize::MAX)
    });

    let mut claims = Claims::default();
    let mut resolved: Vec<Option<ResolvedPlanItem>> = vec![None; pairs.len()];

    for idx in order {
        let pair = &pairs[idx];
        let source = pair.record.source_path.as_path();
        let requested = destination_root.join(&pair.destination);

        let mut desired = requested.clone();
        let dir_free = |dir: &Path| !claims.files.contains(dir) && !blocks_directory(dir);
        while let Some(blocked) = intermediate_dirs(destination_root, &desired)
            .into_iter()
            .find(|dir| !dir_free(dir.as_path()))
        {
            let replacement = disambiguate(&blocked, dir_free, max_attempts)?;
            let Ok(rest) = desired.strip_prefix(&blocked).map(Path::to_path_buf) else {
                break;
            };
            debug!(
                "{} cannot be a directory for id {}, using {}",
                blocked.display(),
                pair.record.id,
                replacement.display()
            );
            desired = replacement.join(rest);
        }

        let file_free = |candidate: &Path| {
            !claims.files.contains(candidate)
                && !claims.dirs.contains(candidate)
                && (candidate == source || !exists_on_disk(candidate))
        };
        let final_destination = if file_free(desired.as_path()) {
            desired
        } else {
            let candidate = disambiguate(&desired, file_free, max_attempts)?;
            debug!(
                "Collision on {} for id {}, using {}",
                desired.display(),
                pair.record.id,
                candidate.display()
            );
            candidate
        };
        let collision = final_destination != requested;

        claims.claim(destination_root, &final_destination);
        resolved[idx] = Some(ResolvedPlanItem {
            id: pair.record.id.clone(),
            source_path: pair.record.source_path.clone(),
            original_destination: pair.destination.clone(),
            final_destination,
            collision,
        });
    }

    Ok(resolved.into_iter().flatten().collect())
}

/// First `stem_N.ext` candidate (N = 1, 2, ...) for which `is_free` holds.
pub fn disambiguate<F>(desired: &Path, is_free: F, max_attempts: u32) -> Result<PathBuf, Error>
where
    F: Fn(&Path) -> bool,
{
    (1..=max_attempts)
        .map(|n| with_suffix(desired, n))
        .find(|candidate| is_free(candidate.as_path()))
        .ok_or_else(|| Error::CollisionUnresolvable {
            path: desired.to_path_buf(),
            attempts: max_attempts,
        })
}

/// `notes/report.txt` with `n = 2` becomes `notes/report_2.txt`.
pub fn with_suffix(path: &Path, n: u32) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    let mut name = OsString::from(stem);
    name.push(format!("_{}", n));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Directories strictly between `root` and `path`, shallowest first.
fn intermediate_dirs(root: &Path, path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .take_while(|dir| *dir != root && dir.starts_with(root))
        .map(Path::to_path_buf)
        .collect();
    dirs.reverse();
    dirs
}

/// Dangling symlinks count as occupied.
fn exists_on_disk(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Files and symlinks (even to directories) cannot hold a planned subtree.
fn blocks_directory(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| !metadata.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use crate::mapping::{validate, MappingEntry};

    fn entry(id: &str, destination: &str) -> MappingEntry {
        MappingEntry {
            id: id.to_string(),
            destination_path: destination.to_string(),
        }
    }

    #[test]
    fn test_with_suffix_keeps_extension() {
        assert_eq!(
            with_suffix(Path::new("notes/report.txt"), 1),
            PathBuf::from("notes/report_1.txt")
        );
        assert_eq!(with_suffix(Path::new("Makefile"), 3), PathBuf::from("Makefile_3"));
        assert_eq!(with_suffix(Path::new("a/b.tar.gz"), 2), PathBuf::from("a/b.tar_2.gz"));
    }

    #[test]
    fn test_disambiguate_skips_taken_and_occupied() {
        let desired = PathBuf::from("/dst/report.txt");
        let unavailable = [
            PathBuf::from("/dst/report_1.txt"),
            PathBuf::from("/dst/report_2.txt"),
        ];
        let is_free = |p: &Path| !unavailable.iter().any(|u| u == p);
        let result = disambiguate(&desired, is_free, 10).unwrap();
        assert_eq!(result, PathBuf::from("/dst/report_3.txt"));
    }

    #[test]
    fn test_disambiguate_gives_up_after_bound() {
        let desired = PathBuf::from("/dst/report.txt");
        let err = disambiguate(&desired, |_| false, 5).unwrap_err();
        assert!(matches!(err, Error::CollisionUnresolvable { attempts: 5, .. }));
    }

    #[test]
    fn test_same_destination_suffixed_in_catalog_order() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "a").unwrap();
        fs::write(src.path().join("b.txt"), "b").unwrap();
        let catalog = build_catalog(src.path(), &[]).unwrap();

        // Mapping lists b before a; traversal order still decides who keeps the name.
        let pairs = validate(
            &catalog,
            &[entry("2", "notes/report.txt"), entry("1", "notes/report.txt")],
        )
        .unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        assert_eq!(plan[0].id, "2");
        assert_eq!(plan[0].final_destination, dst.path().join("notes/report_1.txt"));
        assert!(plan[0].collision);
        assert_eq!(plan[1].id, "1");
        assert_eq!(plan[1].final_destination, dst.path().join("notes/report.txt"));
        assert!(!plan[1].collision);
    }

    #[test]
    fn test_existing_unrelated_file_is_never_displaced() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("new.txt"), "incoming").unwrap();
        fs::create_dir_all(dst.path().join("archive")).unwrap();
        fs::write(dst.path().join("archive/old.txt"), "resident").unwrap();
        let catalog = build_catalog(src.path(), &[]).unwrap();

        let pairs = validate(&catalog, &[entry("1", "archive/old.txt")]).unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        assert_eq!(plan[0].final_destination, dst.path().join("archive/old_1.txt"));
        assert!(plan[0].collision);
    }

    #[test]
    fn test_mapping_onto_itself_is_no_op() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("docs")).unwrap();
        fs::write(root.path().join("docs/a.txt"), "a").unwrap();
        let catalog = build_catalog(root.path(), &[]).unwrap();

        let pairs = validate(&catalog, &[entry("1", "docs/a.txt")]).unwrap();
        let plan = resolve(&catalog, &pairs, catalog.root(), 100).unwrap();

        assert!(!plan[0].collision);
        assert!(plan[0].is_no_op());
    }

    #[test]
    fn test_resolution_is_deterministic_and_distinct() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for name in ["c.md", "a.md", "b.md", "d.md"] {
            fs::write(src.path().join(name), name).unwrap();
        }
        fs::write(dst.path().join("same.md"), "resident").unwrap();
        fs::write(dst.path().join("same_2.md"), "resident").unwrap();
        let catalog = build_catalog(src.path(), &[]).unwrap();
        let entries: Vec<MappingEntry> = (1..=4)
            .rev()
            .map(|id| entry(&id.to_string(), "same.md"))
            .collect();
        let pairs = validate(&catalog, &entries).unwrap();

        let first = resolve(&catalog, &pairs, dst.path(), 100).unwrap();
        let second = resolve(&catalog, &pairs, dst.path(), 100).unwrap();
        assert_eq!(first, second);

        let finals: HashSet<&PathBuf> = first.iter().map(|item| &item.final_destination).collect();
        assert_eq!(finals.len(), 4);
        assert!(!finals.contains(&dst.path().join("same.md")));
        assert!(!finals.contains(&dst.path().join("same_2.md")));
        // id 1 is a.md, first in traversal order
        let first_claim = first.iter().find(|item| item.id == "1").unwrap();
        assert_eq!(first_claim.final_destination, dst.path().join("same_1.md"));
    }

    fn two_file_catalog() -> (tempfile::TempDir, Catalog) {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "a").unwrap();
        fs::write(src.path().join("b.txt"), "b").unwrap();
        let catalog = build_catalog(src.path(), &[]).unwrap();
        (src, catalog)
    }

    #[test]
    fn test_file_claim_blocks_later_directory_claim() {
        let (_src, catalog) = two_file_catalog();
        let dst = tempfile::tempdir().unwrap();

        let pairs = validate(&catalog, &[entry("1", "notes"), entry("2", "notes/b.txt")]).unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        assert_eq!(plan[0].final_destination, dst.path().join("notes"));
        assert!(!plan[0].collision);
        assert_eq!(plan[1].final_destination, dst.path().join("notes_1/b.txt"));
        assert!(plan[1].collision);
    }

    #[test]
    fn test_directory_claim_blocks_later_file_claim() {
        let (_src, catalog) = two_file_catalog();
        let dst = tempfile::tempdir().unwrap();

        let pairs = validate(&catalog, &[entry("1", "notes/a.txt"), entry("2", "notes")]).unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        assert_eq!(plan[0].final_destination, dst.path().join("notes/a.txt"));
        assert_eq!(plan[1].final_destination, dst.path().join("notes_1"));
        assert!(plan[1].collision);
    }

    #[test]
    fn test_resident_file_in_place_of_directory_is_routed_around() {
        let (_src, catalog) = two_file_catalog();
        let dst = tempfile::tempdir().unwrap();
        fs::write(dst.path().join("notes"), "resident").unwrap();
        fs::create_dir_all(dst.path().join("notes_1/deep")).unwrap();
        fs::write(dst.path().join("notes_1/deep/x"), "resident").unwrap();

        let pairs = validate(&catalog, &[entry("1", "notes/deep/a.txt")]).unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        // notes_1 already exists as a directory and is shared.
        assert_eq!(plan[0].final_destination, dst.path().join("notes_1/deep/a.txt"));
        assert!(plan[0].collision);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_not_written_through() {
        let (_src, catalog) = two_file_catalog();
        let dst = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dst.path().join("link")).unwrap();

        let pairs = validate(&catalog, &[entry("1", "link/x.txt")]).unwrap();
        let plan = resolve(&catalog, &pairs, dst.path(), 100).unwrap();

        assert_eq!(plan[0].final_destination, dst.path().join("link_1/x.txt"));
    }
}
