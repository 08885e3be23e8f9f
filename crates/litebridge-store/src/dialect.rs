//! SQLite dialect helpers — pure string-level SQL construction.
//!
//! Nothing in this module touches a connection. Identifier quoting,
//! paging clauses, and script splitting all work on text only, so
//! precondition failures ([`StoreError::InvalidArgument`]) are raised
//! before any SQL reaches the engine.

use crate::error::{StoreError, StoreResult};

/// Prefix reserved by the engine for its own catalog tables.
pub const RESERVED_PREFIX: &str = "sqlite_";

/// Line-comment marker recognized by [`split_script`].
const COMMENT_MARKER: &str = "--";

/// Statement delimiter recognized by [`split_script`].
const STATEMENT_DELIMITER: char = ';';

/// Wrap an identifier in double quotes.
///
/// SQLite (like the SQL standard) treats `"name"` as a quoted
/// identifier. Fails on an empty identifier; no other validation is
/// performed, and re-quoting an already-quoted value is not detected.
pub fn quote_identifier(ident: &str) -> StoreResult<String> {
    if ident.is_empty() {
        return Err(StoreError::InvalidArgument(
            "identifier must not be empty".into(),
        ));
    }
    Ok(format!("\"{ident}\""))
}

/// Append a `LIMIT <take> OFFSET <skip>` clause to `query`.
///
/// Both counts must be non-negative; negative values fail before any
/// SQL is issued.
pub fn paging_clause(query: &str, skip: i64, take: i64) -> StoreResult<String> {
    if skip < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "skip must be non-negative, got {skip}"
        )));
    }
    if take < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "take must be non-negative, got {take}"
        )));
    }
    Ok(format!("{query} LIMIT {take} OFFSET {skip}"))
}

/// Split a multi-statement script into individual statements.
///
/// Line-oriented: lines whose trimmed form starts with `--` are dropped,
/// other lines accumulate into a buffer joined by `\n`, and a line whose
/// trimmed form ends with `;` completes the current statement (with the
/// trailing delimiter stripped). A non-empty buffer remaining at end of
/// input is flushed as a final statement rather than discarded, so a
/// script whose last statement lacks its `;` still yields it.
pub fn split_script(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut buffer = String::new();

    for line in script.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(COMMENT_MARKER) {
            continue;
        }

        if let Some(rest) = trimmed.strip_suffix(STATEMENT_DELIMITER) {
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(rest);
            if !buffer.trim().is_empty() {
                statements.push(std::mem::take(&mut buffer));
            } else {
                buffer.clear();
            }
        } else {
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(trimmed);
        }
    }

    if !buffer.trim().is_empty() {
        statements.push(buffer);
    }

    statements
}

// ── tests ────────────────────────────────────────────────────────────
