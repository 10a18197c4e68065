//! Registry services against an in-memory `SqliteStore`.

use std::sync::Arc;

use polars::prelude::df;
use proptest::prelude::*;
use waves_codebook::{CodebookFormat, TextSource};
use waves_core::{
  codes::{CodedValue, Decoded},
  harmonize::YearSpan,
  metadata::LoadMode,
  store::MetadataStore,
};
use waves_store_sqlite::SqliteStore;

use crate::{DecodeService, Error, HarmonizationIndex, MetadataLoader};

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn spss(name: &str, text: &str) -> TextSource {
  TextSource::new(name, CodebookFormat::SpssSyntax, text)
}

const SEX_2023: &str = "\
VARIABLE LABELS SEX 'Sex of respondent' /AGE 'Age in years'.
VALUE LABELS SEX 1 'Male' 2 'Female'.
FORMATS SEX (F1.0) AGE (F3.0).
";

/// A codebook declaring exactly `names`.
fn declaring(names: &[&str]) -> String {
  let body = names
    .iter()
    .map(|n| format!("{n} '{n}'"))
    .collect::<Vec<_>>()
    .join(" /");
  format!("VARIABLE LABELS {body}.\n")
}

async fn loaded_sex_2023() -> (Arc<SqliteStore>, DecodeService<SqliteStore>) {
  let s = store().await;
  MetadataLoader::new(Arc::clone(&s))
    .load_year(2023, &spss("2023.sps", SEX_2023), LoadMode::Replace)
    .await
    .unwrap();
  let decode = DecodeService::new(Arc::clone(&s));
  (s, decode)
}

// ─── MetadataLoader ──────────────────────────────────────────────────────────

#[tokio::test]
async fn load_reports_counts() {
  let s = store().await;
  let loader = MetadataLoader::new(Arc::clone(&s));

  let report = loader
    .load_year(2023, &spss("2023.sps", SEX_2023), LoadMode::Replace)
    .await
    .unwrap();
  assert_eq!(report.year, 2023);
  assert_eq!(report.source, "2023.sps");
  assert_eq!(report.variables_inserted, 2);
  assert_eq!(report.labels_inserted, 2);

  let again = loader
    .load_year(2023, &spss("2023.sps", SEX_2023), LoadMode::Replace)
    .await
    .unwrap();
  assert_eq!(again, report);
}

#[tokio::test]
async fn unparsable_codebook_is_extraction_error() {
  let s = store().await;
  let loader = MetadataLoader::new(Arc::clone(&s));

  let err = loader
    .load_year(2016, &spss("2016.sps", "VARIABLE LABELS SEX 'Sex\n"), LoadMode::Replace)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Metadata(waves_core::Error::MetadataExtraction { year: 2016, .. })
  ));

  let err = loader
    .load_year(2016, &spss("2016.sps", "EXECUTE.\n"), LoadMode::Replace)
    .await
    .unwrap_err();
  assert_eq!(err.rejection().and_then(waves_core::Error::year), Some(2016));
  assert!(s.loaded_years().await.unwrap().is_empty());
}

#[tokio::test]
async fn orphaned_codebook_leaves_store_untouched() {
  let (s, _) = loaded_sex_2023().await;
  let loader = MetadataLoader::new(Arc::clone(&s));

  let orphaned = "VARIABLE LABELS AGE 'Age'.\nVALUE LABELS RACE 1 'White'.\n";
  let err = loader
    .load_year(2023, &spss("bad.sps", orphaned), LoadMode::Replace)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Metadata(waves_core::Error::OrphanedValueLabel { year: 2023, ref variables })
      if variables == &["RACE"]
  ));

  // The earlier 2023 load survives intact.
  assert_eq!(s.get_value_labels("SEX", 2023).await.unwrap().len(), 2);
}

#[tokio::test]
async fn append_collision_names_keys() {
  let (s, _) = loaded_sex_2023().await;
  let loader = MetadataLoader::new(Arc::clone(&s));

  let err = loader
    .load_year(2023, &spss("more.sps", &declaring(&["INCOME", "SEX"])), LoadMode::Append)
    .await
    .unwrap_err();
  let Some(waves_core::Error::DuplicateMetadata { keys, .. }) = err.rejection() else {
    panic!("expected DuplicateMetadata, got {err:?}");
  };
  assert_eq!(keys, &["SEX"]);
  assert!(s.get_variable("INCOME", 2023).await.unwrap().is_none());

  loader
    .load_year(2023, &spss("more.sps", &declaring(&["INCOME"])), LoadMode::Append)
    .await
    .unwrap();
  assert!(s.get_variable("INCOME", 2023).await.unwrap().is_some());
}

#[tokio::test]
async fn batch_continues_past_failures() {
  let s = store().await;
  let loader = MetadataLoader::new(Arc::clone(&s));

  let summary = loader
    .load_batch(
      vec![
        (2016, spss("2016.sps", &declaring(&["SEX"]))),
        (2017, spss("2017.sps", "VALUE LABELS SEX 1 'Male'.\n")),
        (2018, spss("2018.sps", &declaring(&["SEX", "AGE"]))),
      ],
      LoadMode::Replace,
    )
    .await;

  assert!(!summary.is_success());
  assert_eq!(summary.succeeded.len(), 2);
  assert_eq!(summary.failed.len(), 1);
  assert_eq!(summary.failed[0].year, 2017);
  assert_eq!(summary.total_variables(), 3);

  let years: Vec<_> = s.loaded_years().await.unwrap().into_iter().collect();
  assert_eq!(years, [2016, 2018]);
}

// ─── HarmonizationIndex ──────────────────────────────────────────────────────

/// Eight years, 2016-2023. `ALL` is in every year, `X` in seven (not 2019),
/// `LATE` in 2021-2023, `Y` in 2016, 2020 and 2023, `ONCE` only in 2023.
async fn eight_years() -> Arc<SqliteStore> {
  let s = store().await;
  let loader = MetadataLoader::new(Arc::clone(&s));
  for year in 2016..=2023 {
    let mut names = vec!["ALL"];
    if year != 2019 {
      names.push("X");
    }
    if year >= 2021 {
      names.push("LATE");
    }
    if [2016, 2020, 2023].contains(&year) {
      names.push("Y");
    }
    if year == 2023 {
      names.push("ONCE");
    }
    loader
      .load_year(year, &spss("gen", &declaring(&names)), LoadMode::Replace)
      .await
      .unwrap();
  }
  s
}

#[tokio::test]
async fn availability_labels_follow_the_rules() {
  let s = eight_years().await;
  let index = HarmonizationIndex::new(Arc::clone(&s));
  let span = index.known_span().await.unwrap().unwrap();
  assert_eq!(span, YearSpan::new(2016, 2023).unwrap());

  assert_eq!(index.availability_label("ALL", span).await.unwrap(), "All (2016-2023)");
  assert_eq!(
    index.availability_label("LATE", span).await.unwrap(),
    "2021-2023 (3 years)"
  );
  assert_eq!(
    index.availability_label("Y", span).await.unwrap(),
    "2016, 2020, 2023"
  );
  assert_eq!(index.availability_label("ONCE", span).await.unwrap(), "2023");
  assert_eq!(
    index.availability_label("X", span).await.unwrap(),
    "2016, 2017, 2018, 2020, 2021, 2022, 2023"
  );

  assert!(matches!(
    index.availability_label("NOPE", span).await,
    Err(Error::Metadata(waves_core::Error::UnknownVariable(_)))
  ));
}

#[tokio::test]
async fn configured_span_overrides_loaded_years() {
  let s = eight_years().await;
  let index =
    HarmonizationIndex::new(Arc::clone(&s)).with_span(YearSpan::new(2016, 2024).unwrap());

  let record = index.record("ALL").await.unwrap().unwrap();
  assert_eq!(record.availability_label, "2016-2023 (8 years)");
  assert!(index.record("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn common_variables_filter_by_year_count() {
  let s = eight_years().await;
  let index = HarmonizationIndex::new(Arc::clone(&s));

  assert_eq!(index.common_variables(7).await.unwrap(), ["ALL", "X"]);
  assert_eq!(index.common_variables(3).await.unwrap().len(), 4);
  assert_eq!(index.common_variables(1).await.unwrap().len(), 5);

  let records = index.records().await.unwrap();
  assert_eq!(records.len(), 5);
  assert_eq!(records[0].variable_name, "ALL");
  assert_eq!(records[0].year_count(), 8);
}

#[tokio::test]
async fn empty_registry_has_no_span() {
  let index = HarmonizationIndex::new(store().await);
  assert!(index.known_span().await.unwrap().is_none());
  assert!(index.records().await.unwrap().is_empty());
  assert!(index.common_variables(1).await.unwrap().is_empty());
}

// ─── DecodeService ───────────────────────────────────────────────────────────

#[tokio::test]
async fn decode_int_and_string_agree() {
  let (_, decode) = loaded_sex_2023().await;

  let from_int = decode.decode_value("SEX", 2023, 1).await.unwrap();
  let from_str = decode.decode_value("SEX", 2023, "1").await.unwrap();
  let from_float = decode.decode_value("SEX", 2023, 1.0).await.unwrap();
  assert_eq!(from_int, Decoded::Label("Male".into()));
  assert_eq!(from_str, from_int);
  assert_eq!(from_float, from_int);
}

#[tokio::test]
async fn decode_miss_returns_original() {
  let (_, decode) = loaded_sex_2023().await;

  assert_eq!(
    decode.decode_value("UNKNOWNVAR", 2023, 1).await.unwrap(),
    Decoded::Raw(CodedValue::Int(1))
  );
  assert_eq!(
    decode.decode_value("SEX", 2016, "2").await.unwrap(),
    Decoded::Raw(CodedValue::Text("2".into()))
  );
  assert_eq!(decode.decode_value("SEX", 2023, 7).await.unwrap().into_text(), "7");
}

#[tokio::test]
async fn decode_columns_adds_label_columns() {
  let (_, decode) = loaded_sex_2023().await;
  let df = df! {
    "SEX" => [1i64, 2, 9],
    "AGE" => [30i64, 41, 52],
  }
  .unwrap();

  let out = decode.decode_columns(df, &["SEX", "AGE"], 2023).await.unwrap();

  let names: Vec<_> = out
    .get_column_names()
    .iter()
    .map(|c| c.to_string())
    .collect();
  assert_eq!(names, ["SEX", "AGE", "SEX_label", "AGE_label"]);

  let sex: Vec<_> = out.column("SEX").unwrap().i64().unwrap().iter().collect();
  assert_eq!(sex, [Some(1), Some(2), Some(9)]);

  let labels: Vec<_> = out
    .column("SEX_label")
    .unwrap()
    .str()
    .unwrap()
    .iter()
    .collect();
  assert_eq!(labels, [Some("Male"), Some("Female"), Some("9")]);

  // AGE has no value labels; every cell keeps its code.
  let ages: Vec<_> = out
    .column("AGE_label")
    .unwrap()
    .str()
    .unwrap()
    .iter()
    .collect();
  assert_eq!(ages, [Some("30"), Some("41"), Some("52")]);
}

#[tokio::test]
async fn decode_columns_rejects_missing_columns() {
  let (_, decode) = loaded_sex_2023().await;
  let df = df! { "SEX" => [1i64] }.unwrap();

  assert!(matches!(
    decode.decode_columns(df, &["RACE"], 2023).await,
    Err(Error::MissingColumn(name)) if name == "RACE"
  ));
}

#[tokio::test]
async fn search_returns_one_row_per_name() {
  let s = eight_years().await;
  MetadataLoader::new(Arc::clone(&s))
    .load_year(2024, &spss("2024.sps", SEX_2023), LoadMode::Replace)
    .await
    .unwrap();
  let decode = DecodeService::new(Arc::clone(&s));

  let hits = decode.search_variables("x", None).await.unwrap();
  let names: Vec<_> = hits.iter().map(|m| m.variable_name.as_str()).collect();
  assert_eq!(names, ["SEX", "X"]);

  let x = &hits[1];
  assert_eq!(x.year, 2023);
  assert_eq!(x.years_present.len(), 7);
  assert_eq!(x.label.as_deref(), Some("X"));

  let sex = &hits[0];
  assert_eq!(sex.availability.as_deref(), Some("2024"));

  let in_2019 = decode.search_variables("", Some(2019)).await.unwrap();
  assert_eq!(in_2019.len(), 1);
  assert_eq!(in_2019[0].variable_name, "ALL");
  assert_eq!(in_2019[0].availability.as_deref(), Some("2016-2023 (8 years)"));

  assert!(decode.search_variables("zzz", None).await.unwrap().is_empty());
}

// ─── Properties ──────────────────────────────────────────────────────────────

const NAMES: [&str; 4] = ["SEX", "AGE", "RACE", "INCOME"];

/// Label targets include a name that is never declared.
const TARGETS: [&str; 5] = ["SEX", "AGE", "RACE", "INCOME", "GHOST"];

fn codebook(declared: &[usize], labels: &[(usize, u8)]) -> String {
  let names: Vec<&str> = declared.iter().map(|&i| NAMES[i]).collect();
  let mut text = if names.is_empty() {
    String::new()
  } else {
    declaring(&names)
  };
  for &(target, code) in labels {
    text.push_str(&format!(
      "ADD VALUE LABELS {} {code} 'label {code}'.\n",
      TARGETS[target]
    ));
  }
  text
}

fn year_batch() -> impl Strategy<Value = (i32, Vec<usize>, Vec<(usize, u8)>, bool)> {
  (
    2016..2020i32,
    prop::sample::subsequence((0..NAMES.len()).collect::<Vec<_>>(), 0..=NAMES.len()),
    prop::collection::vec((0..TARGETS.len(), 1..4u8), 0..6),
    any::<bool>(),
  )
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(24))]

  #[test]
  fn loaded_labels_always_have_variables(batches in prop::collection::vec(year_batch(), 1..6)) {
    let rt = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .unwrap();

    rt.block_on(async {
      let s = store().await;
      let loader = MetadataLoader::new(Arc::clone(&s));

      for (year, declared, labels, append) in &batches {
        let mode = if *append { LoadMode::Append } else { LoadMode::Replace };
        let source = spss("generated", &codebook(declared, labels));
        // Rejections are expected; only the invariant matters.
        let _ = loader.load_year(*year, &source, mode).await;
      }

      for year in 2016..2020 {
        for name in TARGETS {
          let labels = s.get_value_labels(name, year).await.unwrap();
          if !labels.is_empty() {
            assert!(
              s.get_variable(name, year).await.unwrap().is_some(),
              "{name}/{year} has labels but no definition"
            );
          }
        }
      }
    });
  }
}
