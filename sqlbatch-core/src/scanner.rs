//! Comment- and literal-aware splitting of SQL scripts into statements.
//!
//! The scanner is a small state machine driven over the script one line at a
//! time. State carries across line boundaries, so block comments and string
//! literals may span lines. Each emitted statement is a single logical line:
//! every physical line is trimmed, and the fragments a statement collects
//! from consecutive lines are joined with one space.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use serde::Serialize;

/// Lexical state of the scanner. Exactly one is active at any position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ScanState {
    /// Ordinary SQL text, where `;` terminates a statement.
    #[default]
    Code,
    /// Inside a `'...'` literal.
    InSingleQuote,
    /// Inside a `"..."` quoted identifier or literal.
    InDoubleQuote,
    /// After `--`, until the end of the current line.
    InLineComment,
    /// Between `/*` and the first following `*/`.
    InBlockComment,
}

/// The kind of construct that was still open when the input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A `'` literal was never closed.
    UnterminatedSingleQuote,
    /// A `"` literal was never closed.
    UnterminatedDoubleQuote,
    /// A `/*` comment was never closed.
    UnterminatedBlockComment,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::UnterminatedSingleQuote => write!(f, "unterminated single-quoted literal"),
            AnomalyKind::UnterminatedDoubleQuote => write!(f, "unterminated double-quoted literal"),
            AnomalyKind::UnterminatedBlockComment => write!(f, "unterminated block comment"),
        }
    }
}

/// Non-fatal diagnostic for a script that ends inside a quote or block comment.
///
/// The scanner still flushes whatever it had accumulated as a best-effort
/// final statement; the anomaly lets the caller decide whether to warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanAnomaly {
    /// What was left open.
    pub kind: AnomalyKind,
    /// 1-based line on which the unterminated construct was opened.
    pub line: usize,
}

impl fmt::Display for ScanAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} opened on line {}", self.kind, self.line)
    }
}

/// Result of scanning a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    /// Trimmed, non-empty statements in source order, without delimiters.
    pub statements: Vec<String>,
    /// Set when the input ended inside a quote or block comment.
    pub anomaly: Option<ScanAnomaly>,
}

/// Split a SQL script into individual statements.
///
/// Never fails. Use [`scan`] to also observe an unterminated construct.
pub fn split(sql: &str) -> Vec<String> {
    scan(sql).statements
}

/// Split a SQL script into statements, reporting any unterminated construct.
pub fn scan(sql: &str) -> ScanOutcome {
    let mut scanner = Scanner::default();
    for (idx, line) in sql.lines().enumerate() {
        scanner.feed_line(line, idx + 1);
    }
    scanner.finish()
}

#[derive(Default)]
struct Scanner {
    state: ScanState,
    /// Line on which the current quote or block comment was opened.
    opened_on: usize,
    /// Trimmed, non-empty fragments of the statement being built.
    fragments: Vec<String>,
    /// Text collected from the current line.
    line_buf: String,
    statements: Vec<String>,
}

impl Scanner {
    fn feed_line(&mut self, raw: &str, line_no: usize) {
        let mut chars = raw.trim().chars().peekable();

        while let Some(ch) = chars.next() {
            match self.state {
                ScanState::Code => self.code_char(ch, &mut chars, line_no),
                ScanState::InSingleQuote => {
                    self.line_buf.push(ch);
                    if ch == '\'' {
                        self.state = ScanState::Code;
                    }
                }
                ScanState::InDoubleQuote => {
                    self.line_buf.push(ch);
                    if ch == '"' {
                        self.state = ScanState::Code;
                    }
                }
                ScanState::InLineComment => break,
                ScanState::InBlockComment => {
                    if ch == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        self.state = ScanState::Code;
                    }
                }
            }
        }

        // A line comment never outlives its line.
        if self.state == ScanState::InLineComment {
            self.state = ScanState::Code;
        }
        self.flush_line();
    }

    fn code_char(&mut self, ch: char, rest: &mut Peekable<Chars<'_>>, line_no: usize) {
        match ch {
            '\'' => {
                self.open(ScanState::InSingleQuote, line_no);
                self.line_buf.push(ch);
            }
            '"' => {
                self.open(ScanState::InDoubleQuote, line_no);
                self.line_buf.push(ch);
            }
            '-' if rest.peek() == Some(&'-') => {
                self.state = ScanState::InLineComment;
            }
            '/' if rest.peek() == Some(&'*') => {
                rest.next();
                self.open(ScanState::InBlockComment, line_no);
            }
            ';' => self.emit(),
            _ => self.line_buf.push(ch),
        }
    }

    fn open(&mut self, state: ScanState, line_no: usize) {
        self.state = state;
        self.opened_on = line_no;
    }

    fn flush_line(&mut self) {
        let fragment = self.line_buf.trim();
        if !fragment.is_empty() {
            self.fragments.push(fragment.to_string());
        }
        self.line_buf.clear();
    }

    fn emit(&mut self) {
        self.flush_line();
        if !self.fragments.is_empty() {
            self.statements.push(self.fragments.join(" "));
            self.fragments.clear();
        }
    }

    fn finish(mut self) -> ScanOutcome {
        let kind = match self.state {
            ScanState::InSingleQuote => Some(AnomalyKind::UnterminatedSingleQuote),
            ScanState::InDoubleQuote => Some(AnomalyKind::UnterminatedDoubleQuote),
            ScanState::InBlockComment => Some(AnomalyKind::UnterminatedBlockComment),
            ScanState::Code | ScanState::InLineComment => None,
        };
        let anomaly = kind.map(|kind| ScanAnomaly {
            kind,
            line: self.opened_on,
        });

        self.emit();

        ScanOutcome {
            statements: self.statements,
            anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        assert_eq!(split("SELECT 1; SELECT 2;"), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_split_trailing_whitespace_after_delimiter() {
        assert_eq!(split("SELECT 1; SELECT 2; "), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_split_no_trailing_semicolon() {
        assert_eq!(split("SELECT 1"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_split_empty_input() {
        let outcome = scan("");
        assert!(outcome.statements.is_empty());
        assert!(outcome.anomaly.is_none());
    }

    #[test]
    fn test_split_whitespace_only() {
        assert!(split("   \n\t  \n").is_empty());
    }

    #[test]
    fn test_consecutive_delimiters_are_dropped() {
        assert!(split(";;").is_empty());
        assert_eq!(split("SELECT 1;;;SELECT 2"), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_plain_script_matches_naive_split() {
        let sql = "CREATE TABLE a (id INT);\n  INSERT INTO a VALUES (1) ;;\nSELECT id FROM a;  ";
        let naive: Vec<String> = sql
            .split(';')
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(split(sql), naive);
    }

    #[test]
    fn test_semicolon_in_single_quotes() {
        let stmts = split("SELECT 'a;b' AS x;");
        assert_eq!(stmts, vec!["SELECT 'a;b' AS x"]);
    }

    #[test]
    fn test_semicolon_in_double_quotes() {
        let stmts = split(r#"SELECT 1 AS "odd;name"; SELECT 2;"#);
        assert_eq!(stmts, vec![r#"SELECT 1 AS "odd;name""#, "SELECT 2"]);
    }

    #[test]
    fn test_comment_markers_inside_literals_are_literal() {
        let stmts = split("SELECT '-- not a comment', '/* nor this */';");
        assert_eq!(stmts, vec!["SELECT '-- not a comment', '/* nor this */'"]);
    }

    #[test]
    fn test_quote_kinds_do_not_close_each_other() {
        let stmts = split(r#"SELECT "it's" FROM t; SELECT 'say "hi"; ok';"#);
        assert_eq!(stmts, vec![r#"SELECT "it's" FROM t"#, r#"SELECT 'say "hi"; ok'"#]);
    }

    #[test]
    fn test_line_comment_with_semicolon() {
        assert_eq!(split("-- drop table;\nSELECT 1;"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_indented_line_comment() {
        assert_eq!(
            split("SELECT 1\n    -- trailing; comment\n  FROM t;"),
            vec!["SELECT 1 FROM t"]
        );
    }

    #[test]
    fn test_inline_line_comment_is_stripped() {
        assert_eq!(
            split("SELECT * FROM t -- comment\nWHERE id = 1;"),
            vec!["SELECT * FROM t WHERE id = 1"]
        );
    }

    #[test]
    fn test_line_comment_ends_at_newline() {
        assert_eq!(
            split("SELECT 1; -- one\nSELECT 2; -- two\n"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn test_block_comment_with_delimiters() {
        assert_eq!(split("/* ; ; */ SELECT 2;"), vec!["SELECT 2"]);
    }

    #[test]
    fn test_multiline_block_comment() {
        let sql = "SELECT a /* first;\n second;\n third */ FROM t;\nSELECT 3;";
        assert_eq!(split(sql), vec!["SELECT a FROM t", "SELECT 3"]);
    }

    #[test]
    fn test_block_comment_markers_are_discarded() {
        assert_eq!(split("SELECT/**/1;"), vec!["SELECT1"]);
    }

    #[test]
    fn test_block_comments_do_not_nest() {
        let stmts = split("SELECT /* outer /* inner */ 1; SELECT 2;");
        assert_eq!(stmts, vec!["SELECT  1", "SELECT 2"]);
    }

    #[test]
    fn test_comment_only_statements_are_dropped() {
        let sql = "-- header\n/* banner */;\n  -- another\n;\nSELECT 1;\n-- footer";
        assert_eq!(split(sql), vec!["SELECT 1"]);
    }

    #[test]
    fn test_doubled_quote_is_close_then_reopen() {
        let stmts = split("SELECT 'it''s; here'; SELECT 2;");
        assert_eq!(stmts, vec!["SELECT 'it''s; here'", "SELECT 2"]);
    }

    #[test]
    fn test_backslash_does_not_escape_quote() {
        let stmts = split(r"SELECT 'a\'; SELECT 2;");
        assert_eq!(stmts, vec![r"SELECT 'a\'", "SELECT 2"]);
    }

    #[test]
    fn test_multiline_statement_joined_with_single_spaces() {
        let sql = "SELECT\n    episode_id,\n    COUNT(*) AS like_count\nFROM\n    user_actions\n\nGROUP BY episode_id;\n";
        assert_eq!(
            split(sql),
            vec!["SELECT episode_id, COUNT(*) AS like_count FROM user_actions GROUP BY episode_id"]
        );
    }

    #[test]
    fn test_newline_inside_literal_collapses_to_space() {
        let sql = "INSERT INTO notes VALUES ('line one\n   line two;');";
        assert_eq!(
            split(sql),
            vec!["INSERT INTO notes VALUES ('line one line two;')"]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            split("SELECT 1\r\nFROM t;\r\n-- c\r\nSELECT 2;\r\n"),
            vec!["SELECT 1 FROM t", "SELECT 2"]
        );
    }

    #[test]
    fn test_unterminated_single_quote() {
        let outcome = scan("SELECT 'abc");
        assert_eq!(outcome.statements, vec!["SELECT 'abc"]);
        assert_eq!(
            outcome.anomaly,
            Some(ScanAnomaly {
                kind: AnomalyKind::UnterminatedSingleQuote,
                line: 1,
            })
        );
    }

    #[test]
    fn test_unterminated_double_quote_reports_opening_line() {
        let outcome = scan("SELECT 1;\nSELECT \"col\nFROM t;");
        assert_eq!(outcome.statements, vec!["SELECT 1", "SELECT \"col FROM t;"]);
        let anomaly = outcome.anomaly.unwrap();
        assert_eq!(anomaly.kind, AnomalyKind::UnterminatedDoubleQuote);
        assert_eq!(anomaly.line, 2);
    }

    #[test]
    fn test_unterminated_block_comment_flushes_prior_text() {
        let outcome = scan("SELECT 1; SELECT 2 /* never\nclosed; SELECT 3;");
        assert_eq!(outcome.statements, vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(
            outcome.anomaly.map(|a| a.kind),
            Some(AnomalyKind::UnterminatedBlockComment)
        );
    }

    #[test]
    fn test_unterminated_block_comment_with_nothing_buffered() {
        let outcome = scan("SELECT 1;\n/* dangling");
        assert_eq!(outcome.statements, vec!["SELECT 1"]);
        assert!(outcome.anomaly.is_some());
    }

    #[test]
    fn test_trailing_line_comment_is_not_an_anomaly() {
        let outcome = scan("SELECT 1 -- done");
        assert_eq!(outcome.statements, vec!["SELECT 1"]);
        assert!(outcome.anomaly.is_none());
    }

    #[test]
    fn test_resplitting_a_statement_is_idempotent() {
        let sql = "SELECT 'a;b', \"c--d\" /* x; */ FROM t -- y\n WHERE z = '/*';\nSELECT 2;";
        for stmt in split(sql) {
            assert_eq!(split(&format!("{stmt};")), vec![stmt.clone()]);
        }
    }

    #[test]
    fn test_anomaly_display() {
        let anomaly = ScanAnomaly {
            kind: AnomalyKind::UnterminatedBlockComment,
            line: 7,
        };
        assert_eq!(
            anomaly.to_string(),
            "unterminated block comment opened on line 7"
        );
    }
}
