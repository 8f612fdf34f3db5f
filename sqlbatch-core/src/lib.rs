//! Split SQL scripts into statements and run them one at a time.
//!
//! # Quick Start
//!
//! ```rust
//! let statements = sqlbatch_core::split("SELECT 'a;b'; -- note\nSELECT 2;");
//! assert_eq!(statements, vec!["SELECT 'a;b'", "SELECT 2"]);
//! ```
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use sqlbatch_core::commands::run::RunOptions;
//! use sqlbatch_core::config::{CliOverrides, SqlBatchConfig};
//! use sqlbatch_core::{ScriptSource, SqlBatch};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SqlBatchConfig::load(None, &CliOverrides::default())?;
//! let batch = SqlBatch::new(config).await?;
//! let source = ScriptSource::File(PathBuf::from("sql/queries.sql"));
//! let report = batch.run(&source, &RunOptions::default()).await?;
//! println!("{} of {} statements succeeded", report.batch.succeeded, report.batch.statements_total);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`scanner`]: Comment- and literal-aware statement splitting
//! - [`script`]: Script sources and checksums
//! - [`runner`]: Best-effort sequential execution
//! - [`results`]: Result sets and CSV artifacts
//! - [`engine`]: The query execution seam
//! - [`db`]: PostgreSQL connections, TLS, retries
//! - [`commands`]: `split` and `run`
//! - [`config`]: Configuration loading (TOML, env vars, CLI overrides)
//! - [`error`]: Error types

pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod results;
pub mod runner;
pub mod scanner;
pub mod script;

use config::SqlBatchConfig;
use error::Result;
use tokio_postgres::Client;

pub use commands::run::{RunOptions, RunReport};
pub use commands::split::SplitReport;
pub use config::CliOverrides;
pub use engine::QueryEngine;
pub use runner::{BatchReport, StatementOutcome, StatementStatus};
pub use scanner::{scan, split, ScanAnomaly, ScanOutcome};
pub use script::ScriptSource;

/// Connected entry point for running scripts against PostgreSQL.
pub struct SqlBatch {
    pub config: SqlBatchConfig,
    client: Client,
}

impl SqlBatch {
    /// Connect using the database settings in `config`.
    ///
    /// If `connect_retries` is configured, retries with exponential backoff.
    pub async fn new(config: SqlBatchConfig) -> Result<Self> {
        let client = db::connect(&config).await?;
        Ok(Self { config, client })
    }

    /// Wrap an existing database client.
    pub fn with_client(config: SqlBatchConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Get a reference to the underlying database client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Split (for files) and run a script, persisting each result.
    pub async fn run(&self, source: &ScriptSource, options: &RunOptions) -> Result<RunReport> {
        commands::run::execute(&self.client, &self.config, source, options).await
    }

    /// Split a script without running it (no DB required).
    pub fn split_script(source: &ScriptSource) -> Result<SplitReport> {
        commands::split::execute(source)
    }
}
