//! SQL schema for the Waves SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout so later migrations can gate on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (variable, survey year). Names are case-sensitive.
CREATE TABLE IF NOT EXISTS variables (
    variable_name TEXT    NOT NULL,
    year          INTEGER NOT NULL,
    label         TEXT,
    storage_type  TEXT    NOT NULL DEFAULT 'unknown',  -- 'numeric' | 'string' | 'unknown'
    PRIMARY KEY (variable_name, year)
);

-- coded_value keeps the codebook's spelling; decoding canonicalises.
CREATE TABLE IF NOT EXISTS value_labels (
    variable_name TEXT    NOT NULL,
    year          INTEGER NOT NULL,
    coded_value   TEXT    NOT NULL,
    label_text    TEXT    NOT NULL,
    PRIMARY KEY (variable_name, year, coded_value),
    FOREIGN KEY (variable_name, year)
        REFERENCES variables(variable_name, year) ON DELETE CASCADE
);

-- Provenance of the most recent load of each year.
CREATE TABLE IF NOT EXISTS survey_years (
    year      INTEGER PRIMARY KEY,
    source    TEXT,
    mode      TEXT NOT NULL,   -- 'replace' | 'append'
    loaded_at TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS variables_year_idx    ON variables(year);
CREATE INDEX IF NOT EXISTS value_labels_year_idx ON value_labels(year);

PRAGMA user_version = 1;
";
