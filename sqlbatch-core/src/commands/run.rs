//! Run a script statement by statement and persist every result.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::split::reject_anomaly;
use crate::config::SqlBatchConfig;
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::results::ResultSink;
use crate::runner::{run_statements, BatchReport};
use crate::scanner::{self, ScanAnomaly};
use crate::script::ScriptSource;

/// Per-invocation options that do not belong in the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write a single statement's result to this exact file.
    pub output_file: Option<PathBuf>,
    /// Refuse to run a script that ends inside a literal or block comment.
    pub strict: bool,
}

/// Report returned after a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// File path or `<inline query>`.
    pub source: String,
    /// CRC32 of the script text.
    pub checksum: i32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Set when the script ended inside a literal or block comment.
    pub anomaly: Option<ScanAnomaly>,
    /// Directory holding the result files.
    pub output_directory: PathBuf,
    /// Statement outcomes and counts.
    #[serde(flatten)]
    pub batch: BatchReport,
}

/// Execute the run command.
///
/// A file is split into statements; an inline query runs as exactly one
/// statement. Statement failures are recorded in the report rather than
/// returned as errors.
pub async fn execute<E: QueryEngine>(
    engine: &E,
    config: &SqlBatchConfig,
    source: &ScriptSource,
    options: &RunOptions,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let script = source.load()?;

    let (statements, anomaly) = match source {
        ScriptSource::File(_) => {
            let outcome = scanner::scan(&script.text);
            (outcome.statements, outcome.anomaly)
        }
        ScriptSource::Inline(sql) => {
            let sql = sql.trim();
            let statements = if sql.is_empty() {
                Vec::new()
            } else {
                vec![sql.to_string()]
            };
            (statements, None)
        }
    };

    if let Some(a) = &anomaly {
        if options.strict {
            reject_anomaly(&script.origin, Some(a))?;
        }
        log::warn!(
            "Script ends inside an unterminated construct, running best-effort; source={}, detail={}",
            script.origin,
            a
        );
    }
    if statements.is_empty() {
        log::warn!("No statements found; source={}", script.origin);
    }

    let sink = match &options.output_file {
        Some(path) => ResultSink::single_file(path, &config.output)?,
        None => ResultSink::create(&config.output)?,
    };

    log::info!(
        "Running script; source={}, statements={}, checksum={}",
        script.origin,
        statements.len(),
        script.checksum
    );

    let batch = run_statements(engine, &statements, &sink, &config.runner).await;

    Ok(RunReport {
        source: script.origin,
        checksum: script.checksum,
        started_at,
        anomaly,
        output_directory: sink.directory().to_path_buf(),
        batch,
    })
}
