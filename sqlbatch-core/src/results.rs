//! Tabular result sets and their CSV artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::OutputSettings;
use crate::error::Result;

/// Rows returned by one statement. Values arrive as text; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    /// Column names in select-list order. Empty for non-returning statements.
    pub columns: Vec<String>,
    /// Row values, one entry per column.
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows affected, when the engine reported a command tag.
    pub rows_affected: Option<u64>,
}

impl ResultSet {
    /// A result with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the statement returned a row description.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Writes result sets as numbered CSV files in one directory.
#[derive(Debug, Clone)]
pub struct ResultSink {
    directory: PathBuf,
    final_name: String,
    /// Exact destination for a single-statement run.
    single_file: Option<PathBuf>,
}

impl ResultSink {
    /// Prepare the output directory described by `settings`.
    ///
    /// With `timestamped` set, a `%Y%m%d_%H%M%S` subdirectory is used.
    pub fn create(settings: &OutputSettings) -> Result<Self> {
        let directory = if settings.timestamped {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            settings.directory.join(stamp)
        } else {
            settings.directory.clone()
        };
        std::fs::create_dir_all(&directory)?;
        log::debug!("Result directory ready; path={}", directory.display());

        Ok(Self {
            directory,
            final_name: settings.final_result_name.clone(),
            single_file: None,
        })
    }

    /// Sink that writes a lone statement's result to exactly `path`.
    pub fn single_file(path: impl Into<PathBuf>, settings: &OutputSettings) -> Result<Self> {
        let path = path.into();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            final_name: settings.final_result_name.clone(),
            single_file: Some(path),
        })
    }

    /// Directory that receives the artifacts.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist the result of statement `index` (1-based) out of `total`.
    ///
    /// A single-file sink writes a lone result to its exact path and numbers
    /// the file stem (`answer_2.csv`) when the batch has several statements.
    pub fn write_numbered(&self, index: usize, total: usize, result: &ResultSet) -> Result<PathBuf> {
        let path = match &self.single_file {
            Some(path) if total == 1 => path.clone(),
            Some(path) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "query_result".to_string());
                self.directory.join(format!("{}_{}.csv", stem, index))
            }
            None => self.directory.join(format!("query_result_{}.csv", index)),
        };
        write_csv(&path, result)?;
        Ok(path)
    }

    /// Persist the last statement's result under the fixed final name.
    pub fn write_final(&self, result: &ResultSet) -> Result<PathBuf> {
        let path = self.directory.join(&self.final_name);
        write_csv(&path, result)?;
        Ok(path)
    }
}

/// Write a result set as CSV with a header row. NULL becomes an empty field.
///
/// A result without columns produces an empty file.
pub fn write_csv(path: &Path, result: &ResultSet) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if result.has_columns() {
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
    }
    writer.flush()?;
    Ok(())
}
