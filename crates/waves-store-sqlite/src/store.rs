//! [`SqliteStore`], the SQLite implementation of [`MetadataStore`].

use std::{
  collections::{BTreeMap, BTreeSet, HashSet},
  path::Path,
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, functions::FunctionFlags};
use tracing::debug;

use waves_core::{
  metadata::{
    LoadCounts, LoadMode, ValueLabel, ValueLabelRecord, VariableDefinition, VariableRecord,
    YearMetadata, YearSummary,
  },
  store::MetadataStore,
};

use crate::{
  Result,
  encode::{
    RawValueLabel, RawVariable, RawYearSummary, contains_pattern, encode_dt, encode_load_mode,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The variable registry and value-label store in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What the write closure decided. A conflict leaves the transaction
/// uncommitted, so it rolls back on drop.
enum WriteOutcome {
  Written(LoadCounts),
  Conflict(Vec<String>),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        register_fold_case(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Make every insert of `variable_name` into `variables` fail, so a load
  /// can be broken after its delete has run.
  #[cfg(test)]
  pub(crate) async fn refuse_inserts_of(&self, variable_name: &str) -> Result<()> {
    let sql = format!(
      "CREATE TEMP TRIGGER refuse_insert BEFORE INSERT ON variables
       WHEN NEW.variable_name = '{}'
       BEGIN SELECT RAISE(ABORT, 'insert refused'); END;",
      variable_name.replace('\'', "''")
    );
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `fold_case(text)`: Unicode lowercase, NULL-preserving. SQLite's own
/// `lower()` and `LIKE` only fold ASCII.
fn register_fold_case(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "fold_case",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text = ctx.get::<Option<String>>(0)?;
      Ok(text.map(|t| t.to_lowercase()))
    },
  )
}

/// Names from `variables` already stored for `year`, sorted.
fn existing_names(
  conn: &rusqlite::Connection,
  year: i32,
  variables: &[VariableRecord],
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT variable_name FROM variables WHERE year = ?1")?;
  let stored = stmt
    .query_map(rusqlite::params![year], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<HashSet<_>>>()?;

  let mut clashes: Vec<String> = variables
    .iter()
    .filter(|v| stored.contains(&v.name))
    .map(|v| v.name.clone())
    .collect();
  clashes.sort();
  Ok(clashes)
}

fn insert_rows(
  conn: &rusqlite::Connection,
  year: i32,
  variables: &[VariableRecord],
  value_labels: &[ValueLabelRecord],
) -> rusqlite::Result<()> {
  let mut insert_variable = conn.prepare(
    "INSERT INTO variables (variable_name, year, label, storage_type)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for v in variables {
    insert_variable.execute(rusqlite::params![
      v.name,
      year,
      v.label,
      v.storage_type.as_ref(),
    ])?;
  }

  let mut insert_label = conn.prepare(
    "INSERT INTO value_labels (variable_name, year, coded_value, label_text)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for l in value_labels {
    insert_label.execute(rusqlite::params![
      l.variable_name,
      year,
      l.coded_value,
      l.label_text,
    ])?;
  }
  Ok(())
}

// ─── MetadataStore impl ──────────────────────────────────────────────────────

impl MetadataStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn load_year(&self, metadata: YearMetadata, mode: LoadMode) -> Result<LoadCounts> {
    metadata.validate()?;

    let YearMetadata {
      year,
      source,
      variables,
      value_labels,
    } = metadata;
    let mode_str = encode_load_mode(mode);
    let loaded_at = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        match mode {
          LoadMode::Replace => {
            tx.execute(
              "DELETE FROM value_labels WHERE year = ?1",
              rusqlite::params![year],
            )?;
            tx.execute("DELETE FROM variables WHERE year = ?1", rusqlite::params![year])?;
          }
          LoadMode::Append => {
            let clashes = existing_names(&tx, year, &variables)?;
            if !clashes.is_empty() {
              return Ok(WriteOutcome::Conflict(clashes));
            }
          }
        }

        insert_rows(&tx, year, &variables, &value_labels)?;

        tx.execute(
          "INSERT INTO survey_years (year, source, mode, loaded_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(year) DO UPDATE SET
             source    = excluded.source,
             mode      = excluded.mode,
             loaded_at = excluded.loaded_at",
          rusqlite::params![year, source, mode_str, loaded_at],
        )?;

        tx.commit()?;

        Ok(WriteOutcome::Written(LoadCounts {
          variables_inserted: variables.len(),
          labels_inserted:    value_labels.len(),
        }))
      })
      .await?;

    match outcome {
      WriteOutcome::Written(counts) => {
        debug!(
          year,
          mode = mode_str,
          variables = counts.variables_inserted,
          labels = counts.labels_inserted,
          "year committed"
        );
        Ok(counts)
      }
      WriteOutcome::Conflict(keys) => {
        Err(waves_core::Error::DuplicateMetadata { year, keys }.into())
      }
    }
  }

  // ── Point reads ───────────────────────────────────────────────────────────

  async fn get_variable(&self, name: &str, year: i32) -> Result<Option<VariableDefinition>> {
    let name = name.to_owned();

    let raw: Option<RawVariable> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT variable_name, year, label, storage_type
               FROM variables WHERE variable_name = ?1 AND year = ?2",
              rusqlite::params![name, year],
              RawVariable::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawVariable::into_definition))
  }

  async fn get_value_labels(&self, name: &str, year: i32) -> Result<Vec<ValueLabel>> {
    let name = name.to_owned();

    let raws: Vec<RawValueLabel> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT variable_name, year, coded_value, label_text
           FROM value_labels
           WHERE variable_name = ?1 AND year = ?2
           ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name, year], RawValueLabel::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawValueLabel::into_label).collect())
  }

  async fn variable_history(&self, name: &str) -> Result<Vec<VariableDefinition>> {
    let name = name.to_owned();

    let raws: Vec<RawVariable> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT variable_name, year, label, storage_type
           FROM variables WHERE variable_name = ?1
           ORDER BY year",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], RawVariable::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawVariable::into_definition).collect())
  }

  // ── Year-level reads ──────────────────────────────────────────────────────

  async fn years_present(&self, name: &str) -> Result<BTreeSet<i32>> {
    let name = name.to_owned();

    let years = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT year FROM variables WHERE variable_name = ?1")?;
        let years = stmt
          .query_map(rusqlite::params![name], |row| row.get::<_, i32>(0))?
          .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(years)
      })
      .await?;

    Ok(years)
  }

  async fn variable_years(&self) -> Result<BTreeMap<String, BTreeSet<i32>>> {
    let pairs: Vec<(String, i32)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT variable_name, year FROM variables")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut map: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();
    for (name, year) in pairs {
      map.entry(name).or_default().insert(year);
    }
    Ok(map)
  }

  async fn loaded_years(&self) -> Result<BTreeSet<i32>> {
    let years = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT year FROM variables")?;
        let years = stmt
          .query_map([], |row| row.get::<_, i32>(0))?
          .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(years)
      })
      .await?;

    Ok(years)
  }

  async fn year_summaries(&self) -> Result<Vec<YearSummary>> {
    let raws: Vec<RawYearSummary> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT
             s.year, s.source, s.mode, s.loaded_at,
             (SELECT COUNT(*) FROM variables    v WHERE v.year = s.year),
             (SELECT COUNT(*) FROM value_labels l WHERE l.year = s.year)
           FROM survey_years s
           ORDER BY s.year",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawYearSummary {
              year:         row.get(0)?,
              source:       row.get(1)?,
              mode:         row.get(2)?,
              loaded_at:    row.get(3)?,
              variables:    row.get(4)?,
              value_labels: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawYearSummary::into_summary).collect()
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search_variables(
    &self,
    keyword: &str,
    year: Option<i32>,
  ) -> Result<Vec<VariableDefinition>> {
    let pattern = contains_pattern(&keyword.to_lowercase());

    let raws: Vec<RawVariable> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT variable_name, year, label, storage_type
           FROM variables
           WHERE (fold_case(variable_name) LIKE ?1 ESCAPE '\\'
                  OR fold_case(label) LIKE ?1 ESCAPE '\\')
             AND (?2 IS NULL OR year = ?2)
           ORDER BY variable_name, year",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, year], RawVariable::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawVariable::into_definition).collect())
  }
}
