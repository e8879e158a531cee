//! # rusty-wrds
//!
//! Preparation of CRSP and Compustat research tables: filtered scans of a
//! remote source, row-level derivations, temporal joins and a local SQLite
//! table store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_wrds::prelude::*;
//!
//! # fn main() -> rusty_wrds::error::Result<()> {
//! let mut config = PipelineConfig::default();
//! config.apply_env();
//! config.validate()?;
//!
//! let root = config.source.root.clone().unwrap_or_default();
//! let source = FileSource::new(root, config.source.format);
//! let mut store = SqliteStore::open(&config.database_path)?;
//! let refs = References::load(&config.reference)?;
//!
//! let ctx = PipelineContext::new(config)?;
//! let mut pipeline = Pipeline::new(ctx, &source, &mut store);
//! pipeline.run_all(&refs, &mut LogProgress::default())?;
//! println!("{}", pipeline.finish().to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod query;
pub mod reduce;
pub mod store;
pub mod transform;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::batch::{BatchDriver, BatchOptions, BatchReport, LogProgress, ProgressSink};
    pub use crate::calendar::DateRange;
    pub use crate::config::PipelineConfig;
    pub use crate::data::{FileFormat, FileSource, MemorySource, ReferenceSeries, RemoteSource};
    pub use crate::error::{Result, WrdsError};
    pub use crate::pipeline::{Pipeline, PipelineContext, References, RunSummary};
    pub use crate::query::{Predicate, ScanRequest};
    pub use crate::store::{ProgressLedger, SqliteStore, TableStore, WriteMode};
    pub use crate::types::*;
}
