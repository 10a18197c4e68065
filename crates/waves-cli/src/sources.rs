//! Turning `load` arguments into `(year, codebook)` pairs.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use tracing::debug;
use waves_codebook::FileSource;

/// Parse a `YEAR=PATH` argument.
pub fn parse_pair(arg: &str) -> Result<(i32, PathBuf), String> {
  let (year, path) = arg
    .split_once('=')
    .ok_or_else(|| format!("expected YEAR=PATH, got {arg:?}"))?;
  let year = year
    .trim()
    .parse()
    .map_err(|_| format!("not a year: {year:?}"))?;
  Ok((year, PathBuf::from(path)))
}

/// The first run of exactly four digits in a file stem, e.g.
/// `codebook_2016_v2` → 2016.
pub fn year_from_stem(path: &Path) -> Option<i32> {
  let stem = path.file_stem()?.to_str()?;
  stem
    .split(|c: char| !c.is_ascii_digit())
    .find(|run| run.len() == 4)
    .and_then(|run| run.parse().ok())
}

/// Every codebook in `dir` with a recognised extension and a year in its
/// name, sorted by year. Two files for one year is an error.
pub fn discover(dir: &Path) -> anyhow::Result<Vec<(i32, FileSource)>> {
  let entries =
    std::fs::read_dir(dir).with_context(|| format!("failed to read directory {dir:?}"))?;

  let mut found: Vec<(i32, FileSource)> = Vec::new();
  for entry in entries {
    let path = entry?.path();
    if !path.is_file() {
      continue;
    }
    let Some(year) = year_from_stem(&path) else {
      debug!(?path, "skipping file without a year in its name");
      continue;
    };
    let Ok(source) = FileSource::detect(&path) else {
      debug!(?path, "skipping file with unrecognised extension");
      continue;
    };
    found.push((year, source));
  }

  found.sort_by_key(|(year, _)| *year);
  if let Some(pair) = found.windows(2).find(|w| w[0].0 == w[1].0) {
    bail!(
      "two codebooks for {}: {:?} and {:?}",
      pair[0].0,
      pair[0].1.path(),
      pair[1].1.path()
    );
  }
  Ok(found)
}

/// Sources named on the command line, in the order given.
pub fn from_pairs(pairs: &[(i32, PathBuf)]) -> anyhow::Result<Vec<(i32, FileSource)>> {
  pairs
    .iter()
    .map(|(year, path)| {
      let source = FileSource::detect(path)
        .with_context(|| format!("cannot load {path:?} as a codebook for {year}"))?;
      Ok((*year, source))
    })
    .collect()
}
