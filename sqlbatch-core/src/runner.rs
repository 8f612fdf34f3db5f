//! Best-effort sequential execution of split statements.
//!
//! Each statement runs on its own; a failure is logged and recorded, and the
//! batch moves on to the next statement. Only `fail_fast` or a lost
//! connection stops the batch early, and the remaining statements are then
//! reported as skipped.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use crate::config::RunnerSettings;
use crate::db::is_transient_error;
use crate::engine::QueryEngine;
use crate::error::{Result, SqlBatchError};
use crate::results::{ResultSet, ResultSink};

/// What happened to one statement of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    /// Executed and persisted.
    Succeeded,
    /// Execution or persistence failed.
    Failed,
    /// Not attempted because the batch stopped early.
    Skipped,
}

impl std::fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementStatus::Succeeded => write!(f, "succeeded"),
            StatementStatus::Failed => write!(f, "failed"),
            StatementStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of a single statement within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct StatementOutcome {
    /// 1-based position in the batch.
    pub index: usize,
    /// The statement text as executed.
    pub statement: String,
    /// Whether it succeeded, failed, or was skipped.
    pub status: StatementStatus,
    /// Column names of the returned rows.
    pub columns: Vec<String>,
    /// Number of rows returned.
    pub row_count: usize,
    /// Rows affected as reported by the engine.
    pub rows_affected: Option<u64>,
    /// Wall-clock execution time in milliseconds.
    pub execution_time_ms: i32,
    /// CSV file holding the result.
    pub artifact: Option<PathBuf>,
    /// Error message for failed statements, or for a succeeded statement
    /// whose final result copy could not be written.
    pub error: Option<String>,
    /// Rows kept for terminal display; not serialized.
    #[serde(skip)]
    pub result: Option<ResultSet>,
}

impl StatementOutcome {
    fn skipped(index: usize, statement: &str) -> Self {
        Self {
            index,
            statement: statement.to_string(),
            status: StatementStatus::Skipped,
            columns: Vec::new(),
            row_count: 0,
            rows_affected: None,
            execution_time_ms: 0,
            artifact: None,
            error: None,
            result: None,
        }
    }
}

/// Aggregate result of running a batch of statements.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Number of statements in the batch.
    pub statements_total: usize,
    /// Statements that executed and were persisted.
    pub succeeded: usize,
    /// Statements that failed.
    pub failed: usize,
    /// Statements never attempted.
    pub skipped: usize,
    /// Total wall-clock time of the batch in milliseconds.
    pub total_time_ms: i32,
    /// Per-statement details in batch order.
    pub outcomes: Vec<StatementOutcome>,
    /// Copy of the last statement's result under the final result name.
    pub final_artifact: Option<PathBuf>,
}

impl BatchReport {
    /// True when every statement succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Convert a partially failed batch into an error value.
    pub fn into_result(self) -> Result<Self> {
        if self.all_succeeded() {
            Ok(self)
        } else {
            Err(SqlBatchError::BatchIncomplete {
                failed: self.failed + self.skipped,
                total: self.statements_total,
            })
        }
    }
}

/// Persisted locations of one statement's result.
struct Persisted {
    numbered: PathBuf,
    final_copy: Option<PathBuf>,
    /// The numbered file exists but the final copy failed.
    final_error: Option<SqlBatchError>,
}

async fn execute_one<E: QueryEngine>(
    engine: &E,
    sink: &ResultSink,
    index: usize,
    total: usize,
    statement: &str,
) -> Result<(ResultSet, Persisted)> {
    let result = engine.query(statement).await?;
    let numbered = sink.write_numbered(index, total, &result)?;
    log::info!("Results saved; index={}, path={}", index, numbered.display());

    let mut persisted = Persisted {
        numbered,
        final_copy: None,
        final_error: None,
    };
    if index == total {
        match sink.write_final(&result) {
            Ok(path) => {
                log::info!("Final result saved; path={}", path.display());
                persisted.final_copy = Some(path);
            }
            Err(e) => {
                log::error!("Failed to write final result; index={}, error={}", index, e);
                persisted.final_error = Some(e);
            }
        }
    }

    Ok((result, persisted))
}

/// Run `statements` in order against `engine`, persisting each result to `sink`.
///
/// Never fails as a whole: per-statement errors are recorded in the report.
pub async fn run_statements<E: QueryEngine>(
    engine: &E,
    statements: &[String],
    sink: &ResultSink,
    settings: &RunnerSettings,
) -> BatchReport {
    let batch_start = Instant::now();
    let total = statements.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut final_artifact = None;
    let mut halted = false;

    for (offset, statement) in statements.iter().enumerate() {
        let index = offset + 1;
        if halted {
            outcomes.push(StatementOutcome::skipped(index, statement));
            continue;
        }

        log::info!("Executing statement; index={}, total={}", index, total);
        log::debug!("Statement {}: {}", index, statement);

        let start = Instant::now();
        let outcome = execute_one(engine, sink, index, total, statement).await;
        let execution_time_ms = start.elapsed().as_millis() as i32;

        match outcome {
            Ok((result, persisted)) => {
                log::info!(
                    "Statement executed successfully; index={}, rows={}, time_ms={}",
                    index,
                    result.rows.len(),
                    execution_time_ms
                );
                if persisted.final_copy.is_some() {
                    final_artifact = persisted.final_copy;
                }
                outcomes.push(StatementOutcome {
                    index,
                    statement: statement.clone(),
                    status: StatementStatus::Succeeded,
                    columns: result.columns.clone(),
                    row_count: result.rows.len(),
                    rows_affected: result.rows_affected,
                    execution_time_ms,
                    artifact: Some(persisted.numbered),
                    error: persisted
                        .final_error
                        .map(|e| format!("final result not written: {}", e)),
                    result: Some(result),
                });
            }
            Err(e) => {
                let transient = is_transient_error(&e);
                let failure = SqlBatchError::StatementFailed {
                    index,
                    reason: e.to_string(),
                };
                log::error!("{}", failure);
                outcomes.push(StatementOutcome {
                    execution_time_ms,
                    error: Some(failure.to_string()),
                    status: StatementStatus::Failed,
                    ..StatementOutcome::skipped(index, statement)
                });

                if settings.fail_fast {
                    log::warn!("fail_fast is set, skipping remaining statements");
                    halted = true;
                } else if transient {
                    if let Err(ping_err) = engine.ping().await {
                        log::error!(
                            "Connection is gone, skipping remaining statements: {}",
                            ping_err
                        );
                        halted = true;
                    }
                }
            }
        }
    }

    let count = |status: StatementStatus| outcomes.iter().filter(|o| o.status == status).count();
    let report = BatchReport {
        statements_total: total,
        succeeded: count(StatementStatus::Succeeded),
        failed: count(StatementStatus::Failed),
        skipped: count(StatementStatus::Skipped),
        total_time_ms: batch_start.elapsed().as_millis() as i32,
        final_artifact,
        outcomes,
    };

    log::info!(
        "Batch finished; total={}, succeeded={}, failed={}, skipped={}, total_time_ms={}",
        report.statements_total,
        report.succeeded,
        report.failed,
        report.skipped,
        report.total_time_ms
    );

    report
}
