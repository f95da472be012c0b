use crate::catalog::{deserialize_id, Catalog, FileRecord};
use crate::error::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One requested relocation, as supplied by the organizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub id: String,
    /// Relative to the destination root. A trailing `/` keeps the source file name.
    pub destination_path: String,
}

/// A mapping entry whose id and destination have been checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPair {
    pub record: FileRecord,
    pub destination: PathBuf,
}

/// Accepts both `{id, destination_path}` and the organizer's `{id, new_path, new_name}`.
#[derive(Debug, Deserialize)]
struct RawMappingEntry {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    destination_path: Option<String>,
    #[serde(default)]
    new_path: Option<String>,
    #[serde(default)]
    new_name: Option<String>,
}

impl RawMappingEntry {
    fn into_entry(self) -> MappingEntry {
        let destination_path = match self.destination_path {
            Some(path) => path,
            None => {
                let folder = self
                    .new_path
                    .unwrap_or_default()
                    .trim_end_matches(['/', '\\'])
                    .to_string();
                let name = self.new_name.unwrap_or_default();
                match (folder.is_empty(), name.is_empty()) {
                    (true, true) => String::new(),
                    (true, false) => name,
                    (false, true) => format!("{}/", folder),
                    (false, false) => format!("{}/{}", folder, name),
                }
            }
        };
        MappingEntry {
            id: self.id,
            destination_path,
        }
    }
}

pub fn parse_mapping<R: Read>(reader: R) -> Result<Vec<MappingEntry>, Error> {
    let raw: Vec<RawMappingEntry> =
        serde_json::from_reader(reader).map_err(Error::MappingFormat)?;
    Ok(raw.into_iter().map(RawMappingEntry::into_entry).collect())
}

pub fn load_mapping(path: &Path) -> Result<Vec<MappingEntry>, Error> {
    let file = File::open(path)?;
    let entries = parse_mapping(BufReader::new(file))?;
    debug!("Loaded {} mapping entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Checks every entry against the catalog, failing on the first offending entry
/// in input order. Touches nothing on disk.
pub fn validate(
    catalog: &Catalog,
    entries: &[MappingEntry],
) -> Result<Vec<ValidatedPair>, Error> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut pairs = Vec::with_capacity(entries.len());

    for entry in entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(Error::DuplicateMapping(entry.id.clone()));
        }

        let record = catalog
            .get(&entry.id)
            .ok_or_else(|| Error::UnknownId(entry.id.clone()))?;

        let invalid = |reason: &str| Error::InvalidPath {
            id: entry.id.clone(),
            path: entry.destination_path.clone(),
            reason: reason.to_string(),
        };

        let requested = if ends_with_separator(&entry.destination_path) {
            let name = record
                .relative_path
                .file_name()
                .ok_or_else(|| invalid("source has no file name"))?;
            format!("{}{}", entry.destination_path, name.to_string_lossy())
        } else {
            entry.destination_path.clone()
        };

        let destination = normalize_relative(&requested).map_err(invalid)?;
        pairs.push(ValidatedPair {
            record: record.clone(),
            destination,
        });
    }

    Ok(pairs)
}

fn ends_with_separator(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Turns a transport path into a relative `PathBuf` that cannot leave its root.
/// Both `/` and `\` separate components; `.` and empty components are dropped.
pub(crate) fn normalize_relative(raw: &str) -> Result<PathBuf, &'static str> {
    if raw.trim().is_empty() {
        return Err("path is empty");
    }
    if raw.starts_with('/') || raw.starts_with('\\') || Path::new(raw).has_root() {
        return Err("absolute paths are not allowed");
    }
    if ends_with_separator(raw) {
        return Err("path does not name a file");
    }

    let mut normalized = PathBuf::new();
    for (pos, part) in raw.split(['/', '\\']).enumerate() {
        match part {
            "" | "." => continue,
            ".." => return Err("parent directory traversal is not allowed"),
            _ if pos == 0 && is_drive_prefix(part) => {
                return Err("drive prefixes are not allowed");
            }
            _ => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err("path does not name a file");
    }
    Ok(normalized)
}

fn is_drive_prefix(part: &str) -> bool {
    let bytes = part.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
