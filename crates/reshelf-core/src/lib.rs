pub mod audit;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hasher;
pub mod mapping;
pub mod platform;
pub mod progress;
pub mod resolver;

pub use catalog::{Catalog, FileRecord};
pub use config::AppConfig;
pub use engine::{RelocationEngine, RunReport};
pub use error::Error;
pub use executor::{ExecutionResult, Executor, ItemStatus, RunSummary};
pub use mapping::{MappingEntry, ValidatedPair};
pub use progress::{ProgressReporter, SilentReporter};
pub use resolver::ResolvedPlanItem;
