//! The seam between the runner and whatever executes SQL.

use crate::error::Result;
use crate::results::ResultSet;

/// Something that can execute one SQL statement and return its rows.
///
/// Implemented for [`tokio_postgres::Client`] in [`crate::db`]. Statements
/// that return no rows yield a [`ResultSet`] without columns.
#[allow(async_fn_in_trait)]
pub trait QueryEngine {
    /// Execute a single statement.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Minimal round-trip used to tell a dead connection from a bad statement.
    async fn ping(&self) -> Result<()>;
}
