//! DDI Codebook XML reader.
//!
//! Only the data-dictionary subset is read:
//!
//! ```xml
//! <var name="SEX">
//!   <labl>Sex of respondent</labl>
//!   <catgry><catValu>1</catValu><labl>Male</labl></catgry>
//!   <varFormat type="numeric"/>
//! </var>
//! ```
//!
//! Namespace prefixes are ignored. Everything outside `<var>` is skipped.

use quick_xml::{
  Reader,
  events::{BytesStart, Event},
};
use tracing::{debug, warn};
use waves_core::metadata::{StorageType, ValueLabelRecord, VariableRecord};

use crate::{
  ParsedCodebook,
  error::{Error, Result},
};

#[derive(Default)]
struct VarBuilder {
  name:       Option<String>,
  label:      Option<String>,
  storage:    StorageType,
  categories: Vec<Category>,
}

#[derive(Default)]
struct Category {
  value: Option<String>,
  label: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
  Nothing,
  VarLabel,
  CatValue,
  CatLabel,
}

pub(crate) fn parse_codebook(input: &str) -> Result<ParsedCodebook> {
  let mut reader = Reader::from_str(input);
  reader.config_mut().trim_text(true);

  let mut parsed = ParsedCodebook::default();
  let mut var: Option<VarBuilder> = None;
  let mut category: Option<Category> = None;
  let mut capture = Capture::Nothing;

  loop {
    match reader.read_event() {
      Ok(Event::Start(ref e)) => {
        let name_buf = e.name();
        match local_name(name_buf.as_ref()) {
          b"var" => var = Some(start_var(e)?),
          b"catgry" if var.is_some() => category = Some(Category::default()),
          b"catValu" if category.is_some() => capture = Capture::CatValue,
          b"labl" if category.is_some() => capture = Capture::CatLabel,
          b"labl" if var.is_some() => capture = Capture::VarLabel,
          b"varFormat" => set_format(var.as_mut(), e)?,
          _ => {}
        }
      }
      Ok(Event::Empty(ref e)) => {
        let name_buf = e.name();
        match local_name(name_buf.as_ref()) {
          b"var" => finish_var(start_var(e)?, &mut parsed),
          b"varFormat" => set_format(var.as_mut(), e)?,
          _ => {}
        }
      }
      Ok(Event::Text(ref t)) => {
        let text = t.unescape().map_err(|e| Error::Xml(e.to_string()))?;
        append(capture, &text, var.as_mut(), category.as_mut());
      }
      Ok(Event::CData(ref t)) => {
        let text = String::from_utf8_lossy(t);
        append(capture, &text, var.as_mut(), category.as_mut());
      }
      Ok(Event::End(ref e)) => {
        let name_buf = e.name();
        match local_name(name_buf.as_ref()) {
          b"labl" | b"catValu" => capture = Capture::Nothing,
          b"catgry" => {
            if let (Some(cat), Some(v)) = (category.take(), var.as_mut()) {
              v.categories.push(cat);
            }
          }
          b"var" => {
            if let Some(v) = var.take() {
              finish_var(v, &mut parsed);
            }
          }
          _ => {}
        }
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(Error::Xml(e.to_string())),
      _ => {}
    }
  }

  Ok(parsed)
}

fn local_name(name: &[u8]) -> &[u8] {
  // strip "prefix:" if present
  if let Some(pos) = name.iter().rposition(|&b| b == b':') {
    &name[pos + 1..]
  } else {
    name
  }
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
  let attr = e
    .try_get_attribute(key)
    .map_err(|err| Error::Xml(err.to_string()))?;
  attr
    .map(|a| {
      a.unescape_value()
        .map(|v| v.trim().to_owned())
        .map_err(|err| Error::Xml(err.to_string()))
    })
    .transpose()
}

fn start_var(e: &BytesStart<'_>) -> Result<VarBuilder> {
  Ok(VarBuilder {
    name: attribute(e, "name")?.filter(|n| !n.is_empty()),
    ..VarBuilder::default()
  })
}

fn set_format(var: Option<&mut VarBuilder>, e: &BytesStart<'_>) -> Result<()> {
  let Some(var) = var else { return Ok(()) };
  var.storage = match attribute(e, "type")?.as_deref() {
    Some(t) if t.eq_ignore_ascii_case("numeric") => StorageType::Numeric,
    Some(t) if t.eq_ignore_ascii_case("character") => StorageType::Text,
    other => {
      warn!(variable = ?var.name, format = ?other, "unrecognised varFormat type");
      StorageType::Unknown
    }
  };
  Ok(())
}

fn append(
  capture: Capture,
  text: &str,
  var: Option<&mut VarBuilder>,
  category: Option<&mut Category>,
) {
  let slot = match (capture, var, category) {
    (Capture::VarLabel, Some(v), _) => &mut v.label,
    (Capture::CatValue, _, Some(c)) => &mut c.value,
    (Capture::CatLabel, _, Some(c)) => &mut c.label,
    _ => return,
  };
  slot.get_or_insert_with(String::new).push_str(text);
}

fn finish_var(var: VarBuilder, parsed: &mut ParsedCodebook) {
  let Some(name) = var.name else {
    warn!("skipping <var> without a name attribute");
    return;
  };

  for cat in var.categories {
    match (cat.value, cat.label) {
      (Some(value), Some(label)) => {
        parsed
          .value_labels
          .push(ValueLabelRecord::new(name.clone(), value.trim(), label));
      }
      (value, _) => debug!(variable = %name, ?value, "skipping unlabelled category"),
    }
  }

  parsed.variables.push(VariableRecord {
    name,
    label: var.label,
    storage_type: var.storage,
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  const CODEBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<codeBook xmlns="ddi:codebook:2_5">
  <stdyDscr><citation><titlStmt><titl>Wave 2019</titl></titlStmt></citation></stdyDscr>
  <dataDscr>
    <var name="SEX" ID="V1">
      <labl>Sex of respondent</labl>
      <catgry><catValu>1</catValu><labl>Male</labl></catgry>
      <catgry><catValu> 2 </catValu><labl>Female</labl></catgry>
      <varFormat type="numeric" schema="SPSS"/>
    </var>
    <var name="REGION">
      <labl>Region &amp; district</labl>
      <catgry><catValu>NE</catValu><labl><![CDATA[North-east]]></labl></catgry>
      <catgry><catValu>9</catValu></catgry>
      <varFormat type="character"/>
    </var>
    <var name="WEIGHT"/>
    <var><labl>nameless</labl></var>
  </dataDscr>
</codeBook>"#;

  #[test]
  fn reads_variables_and_categories() {
    let parsed = parse_codebook(CODEBOOK).unwrap();

    let names: Vec<_> = parsed.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["SEX", "REGION", "WEIGHT"]);

    let sex = &parsed.variables[0];
    assert_eq!(sex.label.as_deref(), Some("Sex of respondent"));
    assert_eq!(sex.storage_type, StorageType::Numeric);

    let region = &parsed.variables[1];
    assert_eq!(region.label.as_deref(), Some("Region & district"));
    assert_eq!(region.storage_type, StorageType::Text);

    let weight = &parsed.variables[2];
    assert_eq!(weight.label, None);
    assert_eq!(weight.storage_type, StorageType::Unknown);

    let labels: Vec<_> = parsed
      .value_labels
      .iter()
      .map(|l| (l.variable_name.as_str(), l.coded_value.as_str(), l.label_text.as_str()))
      .collect();
    assert_eq!(
      labels,
      [
        ("SEX", "1", "Male"),
        ("SEX", "2", "Female"),
        ("REGION", "NE", "North-east"),
      ]
    );
  }

  #[test]
  fn prefixed_elements() {
    let parsed = parse_codebook(
      r#"<ddi:codeBook xmlns:ddi="x"><ddi:dataDscr>
           <ddi:var name="AGE"><ddi:labl>Age</ddi:labl></ddi:var>
         </ddi:dataDscr></ddi:codeBook>"#,
    )
    .unwrap();
    assert_eq!(parsed.variables[0].name, "AGE");
    assert_eq!(parsed.variables[0].label.as_deref(), Some("Age"));
  }

  #[test]
  fn malformed_xml() {
    let err = parse_codebook("<codeBook><var name=\"A\"></codeBook>").unwrap_err();
    assert!(matches!(err, Error::Xml(_)));
  }
}
