mod walk;

pub use walk::build_catalog;

use crate::error::Error;
use crate::mapping;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

/// A regular file discovered under the catalog root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

/// Every file of one pipeline run, in traversal order, with an id lookup.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    records: Vec<FileRecord>,
    index: HashMap<String, usize>,
    warnings: Vec<String>,
}

/// One element of the catalog transport array.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    path: String,
    size: u64,
    modified_time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

/// Accepts ids written either as JSON strings or as integers.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

impl Catalog {
    pub(crate) fn new(root: PathBuf, records: Vec<FileRecord>, warnings: Vec<String>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.id.clone(), pos))
            .collect();
        Self {
            root,
            records,
            index,
            warnings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// Traversal position of `id`, used as the deterministic tie-break order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Directories or entries skipped during the walk.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Writes the catalog as a pretty JSON array of `{id, path, size, modified_time}`.
    pub fn to_json<W: Write>(&self, writer: W) -> Result<(), Error> {
        let entries: Vec<CatalogEntry> = self
            .records
            .iter()
            .map(|record| CatalogEntry {
                id: record.id.clone(),
                path: transport_path(&record.relative_path),
                size: record.size,
                modified_time: record.modified_time,
            })
            .collect();
        serde_json::to_writer_pretty(writer, &entries)
            .map_err(|e| Error::CatalogFormat(e.to_string()))
    }

    /// Reloads a catalog written by [`Catalog::to_json`], resolving paths against `root`.
    pub fn from_json<R: Read>(root: &Path, reader: R) -> Result<Self, Error> {
        let root = fs::canonicalize(root).map_err(|source| Error::Scan {
            root: root.to_path_buf(),
            source,
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_reader(reader).map_err(|e| Error::CatalogFormat(e.to_string()))?;

        let mut records = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for entry in entries {
            if !seen.insert(entry.id.clone()) {
                return Err(Error::CatalogFormat(format!(
                    "duplicate id '{}'",
                    entry.id
                )));
            }
            let relative_path = mapping::normalize_relative(&entry.path).map_err(|reason| {
                Error::CatalogFormat(format!(
                    "id '{}' has unusable path '{}': {}",
                    entry.id, entry.path, reason
                ))
            })?;
            records.push(FileRecord {
                id: entry.id,
                source_path: root.join(&relative_path),
                relative_path,
                size: entry.size,
                modified_time: entry.modified_time,
            });
        }

        Ok(Self::new(root, records, Vec::new()))
    }
}

/// Root-relative path with `/` separators, independent of the host platform.
/// The walk only records UTF-8 paths, so the conversion is exact for built catalogs.
fn transport_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
