use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot scan '{}': {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mapping references unknown file id '{0}'")]
    UnknownId(String),

    #[error("Invalid destination '{path}' for file id '{id}': {reason}")]
    InvalidPath {
        id: String,
        path: String,
        reason: String,
    },

    #[error("File id '{0}' is mapped more than once")]
    DuplicateMapping(String),

    #[error("Malformed mapping payload: {0}")]
    MappingFormat(#[source] serde_json::Error),

    #[error("Malformed catalog: {0}")]
    CatalogFormat(String),

    #[error("No free name for '{}' after {attempts} attempts", path.display())]
    CollisionUnresolvable { path: PathBuf, attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
