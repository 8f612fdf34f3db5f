//! Split a script into statements without touching a database.

use serde::Serialize;

use crate::error::{Result, SqlBatchError};
use crate::scanner::{self, ScanAnomaly};
use crate::script::ScriptSource;

/// Statements found in one script.
#[derive(Debug, Serialize)]
pub struct SplitReport {
    /// File path or `<inline query>`.
    pub source: String,
    /// CRC32 of the script text.
    pub checksum: i32,
    /// Statements in source order.
    pub statements: Vec<String>,
    /// Set when the script ended inside a literal or block comment.
    pub anomaly: Option<ScanAnomaly>,
}

impl SplitReport {
    /// Fail with [`SqlBatchError::ScriptRejected`] if the scan reported an anomaly.
    pub fn ensure_clean(&self) -> Result<()> {
        reject_anomaly(&self.source, self.anomaly.as_ref())
    }
}

/// Turn an anomaly into an error for callers that want strict scripts.
pub fn reject_anomaly(source: &str, anomaly: Option<&ScanAnomaly>) -> Result<()> {
    match anomaly {
        Some(a) => Err(SqlBatchError::ScriptRejected(format!("{}: {}", source, a))),
        None => Ok(()),
    }
}

/// Execute the split command. Inline text is split the same way as a file.
pub fn execute(source: &ScriptSource) -> Result<SplitReport> {
    let script = source.load()?;
    let outcome = scanner::scan(&script.text);

    if let Some(anomaly) = &outcome.anomaly {
        log::warn!(
            "Script ends inside an unterminated construct; source={}, detail={}",
            script.origin,
            anomaly
        );
    }
    log::debug!(
        "Split complete; source={}, statements={}",
        script.origin,
        outcome.statements.len()
    );

    Ok(SplitReport {
        source: script.origin,
        checksum: script.checksum,
        statements: outcome.statements,
        anomaly: outcome.anomaly,
    })
}
