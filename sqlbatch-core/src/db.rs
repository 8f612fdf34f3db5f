//! Database connection with TLS support, retries, and statement execution.

use std::time::Duration;

use tokio_postgres::{Client, SimpleQueryMessage};

use crate::config::{DatabaseConfig, SqlBatchConfig, SslMode};
use crate::engine::QueryEngine;
use crate::error::{Result, SqlBatchError};
use crate::results::ResultSet;

/// Quote a SQL identifier, escaping embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate that a SQL identifier contains only `[a-zA-Z0-9_]`.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SqlBatchError::ConfigError(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqlBatchError::ConfigError(format!(
            "Identifier '{}' contains invalid characters. Only [a-zA-Z0-9_] are allowed.",
            name
        )));
    }
    Ok(())
}

/// Session settings issued right after connecting.
fn session_setup_sql(db: &DatabaseConfig) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    if db.statement_timeout_secs > 0 {
        statements.push(format!(
            "SET statement_timeout = '{}s'",
            db.statement_timeout_secs
        ));
    }
    if let Some(ref schema) = db.schema {
        validate_identifier(schema)?;
        statements.push(format!("SET search_path TO {}, public", quote_ident(schema)));
    }
    Ok(statements)
}

/// Build a rustls ClientConfig using the Mozilla CA bundle and ring crypto provider.
fn make_rustls_config() -> Result<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder_with_provider(std::sync::Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| SqlBatchError::ConfigError(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(root_store)
    .with_no_client_auth();
    Ok(config)
}

/// Check if a postgres error is a permanent authentication failure that should not be retried.
fn is_permanent_error(e: &tokio_postgres::Error) -> bool {
    if let Some(db_err) = e.as_db_error() {
        let code = db_err.code().code();
        // 28P01 = invalid_password, 28000 = invalid_authorization_specification
        return code == "28P01" || code == "28000";
    }
    false
}

/// Inject TCP keepalive parameters into a connection string if not already present.
///
/// Returns the string unchanged if `keepalive_secs == 0` or keepalive params already exist.
pub fn inject_keepalive(conn_string: &str, keepalive_secs: u32) -> String {
    if keepalive_secs == 0 || conn_string.to_lowercase().contains("keepalives") {
        return conn_string.to_string();
    }
    if conn_string.starts_with("postgres://") || conn_string.starts_with("postgresql://") {
        let sep = if conn_string.contains('?') { '&' } else { '?' };
        format!(
            "{}{}keepalives=1&keepalives_idle={}",
            conn_string, sep, keepalive_secs
        )
    } else {
        format!(
            "{} keepalives=1 keepalives_idle={}",
            conn_string, keepalive_secs
        )
    }
}

/// Run the background connection driver task, logging its termination error.
fn spawn_connection_task<F>(connection: F)
where
    F: std::future::Future<Output = std::result::Result<(), tokio_postgres::Error>>
        + Send
        + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("Database connection error: {}", e);
        }
    });
}

async fn connect_plain(conn_string: &str) -> std::result::Result<Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(conn_string, tokio_postgres::NoTls).await?;
    spawn_connection_task(connection);
    Ok(client)
}

async fn connect_tls(
    conn_string: &str,
    tls_config: rustls::ClientConfig,
) -> std::result::Result<Client, tokio_postgres::Error> {
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
    let (client, connection) = tokio_postgres::connect(conn_string, tls).await?;
    spawn_connection_task(connection);
    Ok(client)
}

/// One connection attempt honoring the SSL mode and connect timeout.
async fn connect_once(
    conn_string: &str,
    ssl_mode: &SslMode,
    connect_timeout_secs: u32,
) -> Result<std::result::Result<Client, tokio_postgres::Error>> {
    let tls_config = match ssl_mode {
        SslMode::Disable => None,
        SslMode::Prefer | SslMode::Require => Some(make_rustls_config()?),
    };

    let attempt = async {
        match (ssl_mode, tls_config) {
            (SslMode::Prefer, Some(tls)) => match connect_tls(conn_string, tls).await {
                Ok(client) => Ok(client),
                Err(e) => {
                    log::debug!("TLS connection failed, falling back to plaintext: {}", e);
                    connect_plain(conn_string).await
                }
            },
            (_, Some(tls)) => connect_tls(conn_string, tls).await,
            (_, None) => connect_plain(conn_string).await,
        }
    };

    if connect_timeout_secs == 0 {
        return Ok(attempt.await);
    }
    match tokio::time::timeout(Duration::from_secs(connect_timeout_secs as u64), attempt).await {
        Ok(result) => Ok(result),
        Err(_) => Err(SqlBatchError::ConnectionLost {
            operation: "connect".to_string(),
            detail: format!("timed out after {}s", connect_timeout_secs),
        }),
    }
}

/// Connect using every connection option from the config.
///
/// Retries up to `connect_retries` times, waiting `min(2^attempt, 30)s` plus
/// up to one second of jitter between attempts. Authentication failures are
/// not retried. Sets `statement_timeout` and `search_path` on the session
/// when configured.
pub async fn connect(config: &SqlBatchConfig) -> Result<Client> {
    let db = &config.database;
    let setup = session_setup_sql(db)?;
    let conn_string = inject_keepalive(&config.connection_string()?, db.keepalive_secs);
    let retries = db.connect_retries;
    let mut last_err = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let base_delay = std::cmp::min(1u64 << attempt, 30);
            let delay =
                Duration::from_secs(base_delay) + Duration::from_millis(fastrand::u64(0..1000));
            log::info!(
                "Connection attempt failed, retrying; attempt={}, max_attempts={}, delay_ms={}",
                attempt + 1,
                retries + 1,
                delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
        }

        let outcome = match connect_once(&conn_string, &db.ssl_mode, db.connect_timeout_secs).await
        {
            Ok(outcome) => outcome,
            Err(e @ SqlBatchError::ConfigError(_)) => return Err(e),
            Err(timeout) => {
                log::warn!("{}", timeout);
                last_err = Some(timeout);
                continue;
            }
        };

        match outcome {
            Ok(client) => {
                if attempt > 0 {
                    log::info!(
                        "Connected successfully after retry; attempt={}, max_attempts={}",
                        attempt + 1,
                        retries + 1
                    );
                }
                for sql in &setup {
                    log::debug!("Session setup; sql={}", sql);
                    client.batch_execute(sql).await?;
                }
                return Ok(client);
            }
            Err(e) => {
                if is_permanent_error(&e) {
                    log::error!("Permanent connection error, not retrying: {}", e);
                    return Err(SqlBatchError::DatabaseError(e));
                }
                last_err = Some(SqlBatchError::DatabaseError(e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SqlBatchError::ConnectionLost {
        operation: "connect".to_string(),
        detail: "no connection attempt was made".to_string(),
    }))
}

/// Check if an error is a transient connection error.
///
/// Detects PostgreSQL server shutdown codes, connection exception codes,
/// closed connections, and common network error message patterns.
pub fn is_transient_error(e: &SqlBatchError) -> bool {
    match e {
        SqlBatchError::DatabaseError(pg_err) => {
            if pg_err.is_closed() {
                return true;
            }
            if let Some(db_err) = pg_err.as_db_error() {
                let code = db_err.code().code();
                // 57P01 = admin_shutdown, 57P02 = crash_shutdown, 57P03 = cannot_connect_now
                // 08000 = connection_exception, 08003 = connection_does_not_exist,
                // 08006 = connection_failure
                return matches!(
                    code,
                    "57P01" | "57P02" | "57P03" | "08000" | "08003" | "08006"
                );
            }
            let msg = pg_err.to_string().to_lowercase();
            msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("connection closed")
                || msg.contains("unexpected eof")
        }
        SqlBatchError::ConnectionLost { .. } => true,
        _ => false,
    }
}

/// Collect simple-query protocol messages into a result set.
/// Keep the result of the last statement in a simple-query response.
///
/// A query string holding several statements yields one message group per
/// statement; each group ends with `CommandComplete`.
fn collect_messages(messages: Vec<SimpleQueryMessage>) -> ResultSet {
    let mut result = ResultSet::empty();
    let mut completed = false;
    for message in messages {
        if completed {
            result = ResultSet::empty();
            completed = false;
        }
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                result.columns = columns.iter().map(|c| c.name().to_string()).collect();
            }
            SimpleQueryMessage::Row(row) => {
                if result.columns.is_empty() {
                    result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values = (0..row.len())
                    .map(|i| row.get(i).map(str::to_string))
                    .collect();
                result.rows.push(values);
            }
            SimpleQueryMessage::CommandComplete(n) => {
                result.rows_affected = Some(n);
                completed = true;
            }
            _ => {}
        }
    }
    result
}

impl QueryEngine for Client {
    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let messages = self.simple_query(sql).await?;
        Ok(collect_messages(messages))
    }

    async fn ping(&self) -> Result<()> {
        self.simple_query("")
            .await
            .map_err(|e| SqlBatchError::ConnectionLost {
                operation: "health check".to_string(),
                detail: e.to_string(),
            })?;
        Ok(())
    }
}
