//! `waves`: load survey codebooks into a registry, query it, or serve it.
//!
//! Reads `waves.toml` (or the path given with `--config`) and `WAVES_*`
//! environment variables, then opens the SQLite registry named there.

mod report;
mod settings;
mod sources;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use settings::Settings;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use waves_api::{ApiState, api_router};
use waves_core::{codes::CodedValue, metadata::LoadMode};
use waves_registry::{DecodeService, HarmonizationIndex, MetadataLoader};
use waves_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Survey codebook registry")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "waves.toml")]
  config: PathBuf,

  /// Registry database, overriding `store_path`.
  #[arg(long)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load codebooks, one per year.
  Load {
    /// `YEAR=PATH` pairs. Without any, every codebook in `--dir` is loaded.
    #[arg(value_parser = sources::parse_pair)]
    pairs: Vec<(i32, PathBuf)>,

    /// Directory of codebooks named by year, e.g. `2016.sps`.
    #[arg(long, conflicts_with = "pairs")]
    dir: Option<PathBuf>,

    /// `replace` drops a year's previous load; `append` only adds names.
    #[arg(long, default_value = "replace")]
    mode: LoadMode,
  },
  /// Find variables whose name or label contains a keyword.
  Search {
    #[arg(default_value = "")]
    keyword: String,
    #[arg(long)]
    year:    Option<i32>,
  },
  /// Show which years each variable appears in.
  Availability { names: Vec<String> },
  /// List variables present in at least `--min-years` years.
  Common {
    #[arg(long, default_value_t = 2)]
    min_years: usize,
  },
  /// Resolve one coded value to its label.
  Decode {
    name:  String,
    year:  i32,
    value: String,
  },
  /// List loaded years.
  Years,
  /// Serve the read-only JSON API.
  Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let span = settings.year_span()?;

  let store_path = cli
    .store
    .as_deref()
    .map(settings::expand_tilde)
    .unwrap_or_else(|| settings.store_path());
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let mut index = HarmonizationIndex::new(Arc::clone(&store));
  let mut decode = DecodeService::new(Arc::clone(&store));
  if let Some(span) = span {
    index = index.with_span(span);
    decode = decode.with_span(span);
  }

  match cli.command {
    Command::Load { pairs, dir, mode } => {
      let found = if pairs.is_empty() {
        let dir = dir
          .or_else(|| settings.codebook_dir.clone())
          .context("give YEAR=PATH pairs, --dir, or set codebook_dir")?;
        sources::discover(&settings::expand_tilde(&dir))?
      } else {
        sources::from_pairs(&pairs)?
      };
      if found.is_empty() {
        anyhow::bail!("no codebooks to load");
      }

      let summary = MetadataLoader::new(store).load_batch(found, mode).await;
      report::batch(&summary);
      if !summary.is_success() {
        return Ok(ExitCode::FAILURE);
      }
    }
    Command::Search { keyword, year } => {
      let matches = decode.search_variables(&keyword, year).await?;
      report::matches(&matches);
    }
    Command::Availability { names } => {
      let records = if names.is_empty() {
        index.records().await?
      } else {
        let mut records = Vec::with_capacity(names.len());
        for name in &names {
          match index.record(name).await? {
            Some(r) => records.push(r),
            None => eprintln!("{name}: not in the registry"),
          }
        }
        records
      };
      report::records(&records);
    }
    Command::Common { min_years } => {
      for name in index.common_variables(min_years).await? {
        println!("{name}");
      }
    }
    Command::Decode { name, year, value } => {
      let decoded = decode
        .decode_value(&name, year, CodedValue::Text(value))
        .await?;
      report::decoded(&name, year, &decoded);
    }
    Command::Years => {
      use waves_core::store::MetadataStore as _;
      let years = store.year_summaries().await?;
      report::years(&years);
    }
    Command::Serve => {
      let mut state = ApiState::new(store);
      if let Some(span) = span {
        state = state.with_span(span);
      }
      let app = api_router(state).layer(TraceLayer::new_for_http());
      let address = format!("{}:{}", settings.host, settings.port);

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }
  }

  Ok(ExitCode::SUCCESS)
}
