//! SQL schema for the carebook SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sheets (
    sheet_id    INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- Sparse grid content. Blank cells have no row here.
CREATE TABLE IF NOT EXISTS cells (
    sheet_id  INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
    row_idx   INTEGER NOT NULL,   -- 1-based
    col_idx   INTEGER NOT NULL,   -- 1-based
    kind      TEXT NOT NULL,      -- 'text' | 'number' | 'bool' | 'datetime'
    value     TEXT NOT NULL,
    PRIMARY KEY (sheet_id, row_idx, col_idx)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS cells_col_idx ON cells(sheet_id, col_idx, row_idx);

PRAGMA user_version = 1;
";
