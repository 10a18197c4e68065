//! Read-only access to one year's raw codebook.

use std::path::{Path, PathBuf};

use crate::{CodebookFormat, Error, Result};

/// Supplies the raw text of a codebook and says how to read it.
pub trait CodebookSource: Send + Sync {
  fn format(&self) -> CodebookFormat;

  fn read_to_string(&self) -> Result<String>;

  /// Short human-readable provenance, recorded in the load log.
  fn describe(&self) -> String;
}

impl<T: CodebookSource + ?Sized> CodebookSource for Box<T> {
  fn format(&self) -> CodebookFormat { (**self).format() }

  fn read_to_string(&self) -> Result<String> { (**self).read_to_string() }

  fn describe(&self) -> String { (**self).describe() }
}

// ─── FileSource ──────────────────────────────────────────────────────────────

/// A codebook on disk. Bytes that are not valid UTF-8 are replaced rather
/// than rejected, since older extracts are often Latin-1.
#[derive(Debug, Clone)]
pub struct FileSource {
  path:   PathBuf,
  format: CodebookFormat,
}

impl FileSource {
  pub fn new(path: impl Into<PathBuf>, format: CodebookFormat) -> Self {
    Self {
      path: path.into(),
      format,
    }
  }

  /// Build a source whose format is inferred from the file extension.
  pub fn detect(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let format =
      CodebookFormat::from_path(&path).ok_or_else(|| Error::UnknownFormat(path.clone()))?;
    Ok(Self { path, format })
  }

  pub fn path(&self) -> &Path { &self.path }
}

impl CodebookSource for FileSource {
  fn format(&self) -> CodebookFormat { self.format }

  fn read_to_string(&self) -> Result<String> {
    let bytes = std::fs::read(&self.path).map_err(|source| Error::Io {
      path: self.path.clone(),
      source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }

  fn describe(&self) -> String { self.path.display().to_string() }
}

// ─── TextSource ──────────────────────────────────────────────────────────────

/// An in-memory codebook, e.g. one already extracted by an upstream step.
#[derive(Debug, Clone)]
pub struct TextSource {
  name:   String,
  format: CodebookFormat,
  text:   String,
}

impl TextSource {
  pub fn new(name: impl Into<String>, format: CodebookFormat, text: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      format,
      text: text.into(),
    }
  }
}

impl CodebookSource for TextSource {
  fn format(&self) -> CodebookFormat { self.format }

  fn read_to_string(&self) -> Result<String> { Ok(self.text.clone()) }

  fn describe(&self) -> String { self.name.clone() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detect_rejects_unknown_extension() {
    assert!(matches!(
      FileSource::detect("survey_2016.sav"),
      Err(Error::UnknownFormat(_))
    ));
    let src = FileSource::detect("survey_2016.sps").unwrap();
    assert_eq!(src.format(), CodebookFormat::SpssSyntax);
    assert_eq!(src.describe(), "survey_2016.sps");
  }

  #[test]
  fn missing_file_is_io_error() {
    let src = FileSource::new("/nonexistent/waves/2016.sps", CodebookFormat::SpssSyntax);
    assert!(matches!(src.read_to_string(), Err(Error::Io { .. })));
  }

  #[test]
  fn boxed_sources_delegate() {
    let src: Box<dyn CodebookSource> =
      Box::new(TextSource::new("boxed", CodebookFormat::SpssSyntax, "EXECUTE."));
    assert_eq!(src.format(), CodebookFormat::SpssSyntax);
    assert_eq!(src.describe(), "boxed");
  }

  #[test]
  fn text_source_round_trips() {
    let src = TextSource::new("inline", CodebookFormat::Ddi, "<codeBook/>");
    assert_eq!(src.read_to_string().unwrap(), "<codeBook/>");
    assert_eq!(src.describe(), "inline");
  }
}
