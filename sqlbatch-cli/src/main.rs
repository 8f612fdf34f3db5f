//! CLI entry point for sqlbatch.
//! Provides clap-based command routing for the `split` and `run` subcommands
//! and exit code mapping based on error type.

mod output;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

use sqlbatch_core::config::{CliOverrides, SqlBatchConfig};
use sqlbatch_core::error::SqlBatchError;
use sqlbatch_core::{RunOptions, ScriptSource, SqlBatch};

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "sqlbatch",
    about = "Split SQL scripts into statements and run them one by one",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Database URL (overrides config)
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Database host (overrides config)
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Database port (overrides config)
    #[arg(long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Database user (overrides config)
    #[arg(long, value_name = "USER", global = true)]
    user: Option<String>,

    /// Database name (overrides config)
    #[arg(long, value_name = "NAME", global = true)]
    dbname: Option<String>,

    /// Schema searched first for unqualified table names (overrides config)
    #[arg(long, value_name = "SCHEMA", global = true)]
    schema: Option<String>,

    /// Number of retries when connecting to the database
    #[arg(long, value_name = "N", global = true)]
    connect_retries: Option<u32>,

    /// SSL/TLS mode: disable, prefer, require
    #[arg(long, value_name = "MODE", global = true)]
    ssl_mode: Option<String>,

    /// Connection timeout in seconds (default: 30, 0 = no timeout)
    #[arg(long, value_name = "SECS", global = true)]
    connect_timeout: Option<u32>,

    /// Statement timeout in seconds (default: 0 = no limit)
    #[arg(long, value_name = "SECS", global = true)]
    statement_timeout: Option<u32>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the SQL for `run` comes from.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct QueryInput {
    /// Run this single query as-is, without splitting
    #[arg(long, value_name = "SQL")]
    query: Option<String>,

    /// Split this script file and run each statement
    #[arg(long, value_name = "FILE")]
    query_file: Option<PathBuf>,
}

impl QueryInput {
    fn into_source(self) -> ScriptSource {
        match (self.query, self.query_file) {
            (Some(sql), _) => ScriptSource::Inline(sql),
            (None, Some(path)) => ScriptSource::File(path),
            // clap's required group guarantees one of the two
            (None, None) => ScriptSource::Inline(String::new()),
        }
    }
}

/// All available sqlbatch subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Split a script into statements and print them (no database needed)
    Split {
        /// Script file to split
        file: PathBuf,

        /// Fail if the script ends inside a literal or block comment
        #[arg(long)]
        strict: bool,
    },

    /// Run a query or every statement of a script, saving results as CSV
    Run {
        #[command(flatten)]
        input: QueryInput,

        /// Write a single statement's result to this CSV file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Directory for numbered result files (overrides config)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Skip the remaining statements after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Refuse to run a script that ends inside a literal or block comment
        #[arg(long)]
        strict: bool,

        /// Rows of each result to preview in the terminal (0 = none)
        #[arg(long, value_name = "N", default_value_t = 10)]
        preview_rows: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &SqlBatchError) -> i32 {
    match error {
        SqlBatchError::ConfigError(_) => 2,
        SqlBatchError::IoError(_) => 3,
        SqlBatchError::CsvError(_) => 3,
        SqlBatchError::DatabaseError(_) => 4,
        SqlBatchError::ConnectionLost { .. } => 4,
        SqlBatchError::StatementFailed { .. } => 5,
        SqlBatchError::BatchIncomplete { .. } => 5,
        SqlBatchError::ScriptRejected(_) => 9,
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize report: {}", e),
    }
}

/// Build configuration and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), SqlBatchError> {
    let json_output = cli.json;
    let quiet = cli.quiet;

    // === Commands that don't need a DB connection ===

    let (input, output, output_dir, fail_fast, strict, preview_rows) = match cli.command {
        Commands::Split { file, strict } => {
            let report = SqlBatch::split_script(&ScriptSource::File(file))?;
            if json_output {
                print_json(&report);
            } else {
                output::print_split_report(&report);
            }
            if strict {
                report.ensure_clean()?;
            }
            return Ok(());
        }
        Commands::Run {
            input,
            output,
            output_dir,
            fail_fast,
            strict,
            preview_rows,
        } => (input, output, output_dir, fail_fast, strict, preview_rows),
    };

    let source = input.into_source();

    // Reject an unterminated script before opening a connection for it
    if strict && matches!(source, ScriptSource::File(_)) {
        SqlBatch::split_script(&source)?.ensure_clean()?;
    }

    let overrides = CliOverrides {
        url: cli.url,
        host: cli.host,
        port: cli.port,
        user: cli.user,
        database: cli.dbname,
        schema: cli.schema,
        connect_retries: cli.connect_retries,
        ssl_mode: cli.ssl_mode,
        connect_timeout: cli.connect_timeout,
        statement_timeout: cli.statement_timeout,
        keepalive: None,
        output_dir,
        fail_fast: if fail_fast { Some(true) } else { None },
    };

    let config = SqlBatchConfig::load(cli.config.as_deref(), &overrides)?;

    // === Commands that need a DB connection ===

    let batch = SqlBatch::new(config).await?;
    let options = RunOptions {
        output_file: output,
        strict,
    };
    let report = batch.run(&source, &options).await?;

    if json_output {
        print_json(&report);
    } else if quiet {
        output::print_run_totals(&report);
    } else {
        output::print_run_report(&report, preview_rows);
    }

    report.batch.into_result().map(|_| ())
}

/// Print an error message with actionable hints.
fn print_error(error: &SqlBatchError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        SqlBatchError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your sqlbatch.toml or set SQLBATCH_DATABASE_URL environment variable."
                    .dimmed()
            );
        }
        SqlBatchError::DatabaseError(_) | SqlBatchError::ConnectionLost { .. } => {
            eprintln!(
                "{}",
                "Hint: Verify database is running and connection details are correct.".dimmed()
            );
        }
        SqlBatchError::ScriptRejected(_) => {
            eprintln!(
                "{}",
                "Hint: Close the quote or block comment, or drop --strict to run best-effort."
                    .dimmed()
            );
        }
        SqlBatchError::BatchIncomplete { .. } => {
            eprintln!(
                "{}",
                "Hint: Run with --verbose to see each statement's error.".dimmed()
            );
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_exactly_one_input() {
        assert!(Cli::try_parse_from(["sqlbatch", "run"]).is_err());
        assert!(Cli::try_parse_from([
            "sqlbatch",
            "run",
            "--query",
            "SELECT 1",
            "--query-file",
            "q.sql"
        ])
        .is_err());
    }

    #[test]
    fn test_run_query_file_flags() {
        let cli = Cli::try_parse_from([
            "sqlbatch",
            "run",
            "--query-file",
            "sql/queries.sql",
            "--output-dir",
            "out",
            "--fail-fast",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run {
                input,
                output_dir,
                fail_fast,
                preview_rows,
                ..
            } => {
                assert_eq!(
                    input.into_source(),
                    ScriptSource::File(PathBuf::from("sql/queries.sql"))
                );
                assert_eq!(output_dir, Some(PathBuf::from("out")));
                assert!(fail_fast);
                assert_eq!(preview_rows, 10);
            }
            Commands::Split { .. } => panic!("expected run"),
        }
    }

    #[tokio::test]
    async fn test_strict_run_rejects_script_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("queries.sql");
        std::fs::write(&script, "SELECT 1;\nSELECT 'never closed\n").unwrap();
        let script = script.to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "sqlbatch",
            "--url",
            "postgres://nobody@127.0.0.1:1/unreachable",
            "--connect-timeout",
            "1",
            "run",
            "--query-file",
            script.as_str(),
            "--strict",
        ])
        .unwrap();

        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, SqlBatchError::ScriptRejected(_)));
        assert_eq!(exit_code(&err), 9);
    }

    #[test]
    fn test_schema_flag_is_global() {
        let cli = Cli::try_parse_from([
            "sqlbatch",
            "run",
            "--query",
            "SELECT 1",
            "--schema",
            "parquet_data",
        ])
        .unwrap();
        assert_eq!(cli.schema.as_deref(), Some("parquet_data"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&SqlBatchError::ConfigError("x".into())), 2);
        assert_eq!(
            exit_code(&SqlBatchError::BatchIncomplete { failed: 1, total: 2 }),
            5
        );
        assert_eq!(exit_code(&SqlBatchError::ScriptRejected("x".into())), 9);
        assert_eq!(
            exit_code(&SqlBatchError::IoError(std::io::Error::other("x"))),
            3
        );
    }
}
