//! Where a script comes from, and loading it into memory.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Result, SqlBatchError};

/// Source of the SQL to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A script file, split into statements before running.
    File(PathBuf),
    /// A single query passed directly; it is run as-is without splitting.
    Inline(String),
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::File(path) => write!(f, "{}", path.display()),
            ScriptSource::Inline(_) => write!(f, "<inline query>"),
        }
    }
}

/// A script loaded into memory.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedScript {
    /// Human-readable origin (file path or `<inline query>`).
    pub origin: String,
    /// Full script text.
    #[serde(skip)]
    pub text: String,
    /// CRC32 of the script text.
    pub checksum: i32,
}

impl ScriptSource {
    /// Read the script text. A leading UTF-8 byte order mark is dropped.
    pub fn load(&self) -> Result<LoadedScript> {
        let text = match self {
            ScriptSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    SqlBatchError::IoError(std::io::Error::new(
                        e.kind(),
                        format!("cannot read script '{}': {}", path.display(), e),
                    ))
                })?;
                match text.strip_prefix('\u{feff}') {
                    Some(rest) => rest.to_string(),
                    None => text,
                }
            }
            ScriptSource::Inline(sql) => sql.clone(),
        };
        Ok(LoadedScript {
            origin: self.to_string(),
            checksum: checksum(&text),
            text,
        })
    }
}

/// CRC32 checksum of the script text, as a signed integer.
pub fn checksum(text: &str) -> i32 {
    crc32fast::hash(text.as_bytes()) as i32
}
