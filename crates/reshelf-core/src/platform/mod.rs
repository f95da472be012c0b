#[cfg(target_os = "windows")]
pub mod windows;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
pub fn is_cross_device(err: &io::Error) -> bool {
    windows::is_cross_device(err)
}

/// `EXDEV`: rename(2) cannot move between filesystems.
#[cfg(unix)]
pub fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(18)
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn is_cross_device(_err: &io::Error) -> bool {
    false
}

/// Canonical form of `path` when it exists, otherwise `path` made absolute
/// against the working directory. Destination roots may not exist yet.
pub fn absolute_root(path: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                Ok(env::current_dir()?.join(path))
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_root_of_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not/yet/created");
        assert_eq!(absolute_root(&missing).unwrap(), missing);
    }

    #[test]
    fn test_absolute_root_canonicalizes_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dotted = dir.path().join(".");
        assert_eq!(
            absolute_root(&dotted).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
    }
}
