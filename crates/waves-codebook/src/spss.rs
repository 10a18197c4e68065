//! SPSS command-syntax dictionary parser.
//!
//! Pipeline:
//!   raw &str
//!     └─ split_commands()        → Vec<Chunk>  (comments dropped)
//!          └─ Chunk::into_command() → Command  (only for dictionary commands)
//!               └─ Dictionary::apply() → accumulate declarations
//!                    └─ Dictionary::finish() → ParsedCodebook
//!
//! A period ends a command only as the last character of a line, so format
//! specifications such as `F8.2` and codes such as `1.5` survive intact.
//! Commands other than the dictionary ones are skipped unlexed; their text
//! (`TITLE Children's health.`) need not follow quoting rules.

use std::collections::HashMap;

use tracing::{debug, warn};
use waves_core::metadata::{StorageType, ValueLabelRecord, VariableRecord};

use crate::{
  ParsedCodebook,
  error::{Error, Result},
};

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Word(String),
  Quoted(String),
  Slash,
  Open,
  Close,
  End,
}

// ─── Command splitting ───────────────────────────────────────────────────────

/// The source lines of one command, right-trimmed, with 1-based numbers.
struct Chunk<'a> {
  lines: Vec<(usize, &'a str)>,
}

fn split_commands(input: &str) -> Vec<Chunk<'_>> {
  let mut chunks = Vec::new();
  let mut current: Vec<(usize, &str)> = Vec::new();
  let mut in_comment = false;

  for (idx, raw) in input.lines().enumerate() {
    let line = raw.trim_end();
    let ends = line.ends_with('.');
    if in_comment {
      in_comment = !ends;
      continue;
    }
    if current.is_empty() {
      let start = line.trim_start();
      if start.is_empty() {
        continue;
      }
      if is_comment_start(start) {
        in_comment = !ends;
        continue;
      }
    }
    current.push((idx + 1, line));
    if ends {
      chunks.push(Chunk {
        lines: std::mem::take(&mut current),
      });
    }
  }
  // A final command missing its period is still honoured.
  if !current.is_empty() {
    chunks.push(Chunk { lines: current });
  }
  chunks
}

fn is_comment_start(s: &str) -> bool {
  s.starts_with('*') || s.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("COMMENT"))
}

fn is_word_break(c: char) -> bool {
  c.is_whitespace() || matches!(c, '\'' | '"' | '/' | '(' | ')')
}

/// The dictionary commands; everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
  VariableLabels,
  ValueLabels(LabelMerge),
  Formats,
  Declare(StorageType),
}

impl Kind {
  /// The command named by `head`, and how many keywords its name spans.
  fn classify(head: &[String]) -> Option<(Self, usize)> {
    let word = |n: usize| head.get(n).map_or("", String::as_str);
    match (word(0), word(1), word(2)) {
      ("VARIABLE" | "VAR", "LABELS" | "LABEL", _) => Some((Self::VariableLabels, 2)),
      ("VALUE", "LABELS" | "LABEL", _) => Some((Self::ValueLabels(LabelMerge::Replace), 2)),
      ("ADD", "VALUE", "LABELS" | "LABEL") => Some((Self::ValueLabels(LabelMerge::Add), 3)),
      ("FORMATS", _, _) => Some((Self::Formats, 1)),
      ("PRINT" | "WRITE", "FORMATS", _) => Some((Self::Formats, 2)),
      ("STRING", _, _) => Some((Self::Declare(StorageType::Text), 1)),
      ("NUMERIC", _, _) => Some((Self::Declare(StorageType::Numeric), 1)),
      _ => None,
    }
  }
}

struct Command {
  line:   usize,
  kind:   Kind,
  /// Everything after the command name.
  tokens: Vec<Token>,
}

impl Chunk<'_> {
  fn line(&self) -> usize { self.lines.first().map_or(0, |(n, _)| *n) }

  /// The first three bare words, uppercased, without quote-lexing.
  fn head(&self) -> Vec<String> {
    self
      .lines
      .iter()
      .flat_map(|(_, l)| l.split(is_word_break))
      .filter(|w| !w.is_empty())
      .take(3)
      .map(|w| w.trim_end_matches('.').to_ascii_uppercase())
      .collect()
  }

  /// Lex a dictionary command; `None` for any other command.
  fn into_command(self) -> Result<Option<Command>> {
    let line = self.line();
    let head = self.head();
    let Some((kind, keywords)) = Kind::classify(&head) else {
      let name = head.first().map_or("", String::as_str);
      debug!(line, command = name, "skipping SPSS command");
      return Ok(None);
    };

    let mut tokens = Vec::new();
    for &(line_no, text) in &self.lines {
      lex_line(text, line_no, &mut tokens)?;
    }
    let tokens = join_concatenations(tokens)
      .into_iter()
      .filter(|t| *t != Token::End)
      .skip(keywords)
      .collect();
    Ok(Some(Command { line, kind, tokens }))
  }
}

// ─── Lexer ───────────────────────────────────────────────────────────────────

/// Lex one right-trimmed line.
fn lex_line(line: &str, line_no: usize, out: &mut Vec<Token>) -> Result<()> {
  let chars: Vec<char> = line.chars().collect();
  let mut i = 0;

  while i < chars.len() {
    match chars[i] {
      c if c.is_whitespace() => i += 1,
      '\'' | '"' => {
        let (text, next) = read_quoted(&chars, i, line_no)?;
        out.push(Token::Quoted(text));
        i = next;
      }
      '/' => {
        out.push(Token::Slash);
        i += 1;
      }
      '(' => {
        out.push(Token::Open);
        i += 1;
      }
      ')' => {
        out.push(Token::Close);
        i += 1;
      }
      _ => {
        let start = i;
        while i < chars.len() && !is_word_break(chars[i]) {
          i += 1;
        }
        let mut word: String = chars[start..i].iter().collect();
        if i == chars.len() && word.ends_with('.') {
          word.pop();
          if !word.is_empty() {
            out.push(Token::Word(word));
          }
          out.push(Token::End);
        } else {
          out.push(Token::Word(word));
        }
      }
    }
  }
  Ok(())
}

/// Read a quoted string starting at `start`; a doubled quote is a literal.
/// Returns the text and the index just past the closing quote.
fn read_quoted(chars: &[char], start: usize, line: usize) -> Result<(String, usize)> {
  let quote = chars[start];
  let mut text = String::new();
  let mut i = start + 1;
  loop {
    match chars.get(i) {
      None => return Err(Error::UnterminatedQuote { line }),
      Some(&c) if c == quote => {
        if chars.get(i + 1) == Some(&quote) {
          text.push(quote);
          i += 2;
        } else {
          return Ok((text, i + 1));
        }
      }
      Some(&c) => {
        text.push(c);
        i += 1;
      }
    }
  }
}

/// Fold `'abc' + 'def'` into a single quoted token.
fn join_concatenations(tokens: Vec<Token>) -> Vec<Token> {
  let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
  let mut iter = tokens.into_iter().peekable();

  while let Some(token) = iter.next() {
    let is_plus = matches!(&token, Token::Word(w) if w == "+");
    let prev_quoted = matches!(out.last(), Some(Token::Quoted(_)));
    let next_quoted = matches!(iter.peek(), Some(Token::Quoted(_)));
    if is_plus && prev_quoted && next_quoted {
      if let (Some(Token::Quoted(tail)), Some(Token::Quoted(head))) = (iter.next(), out.last_mut())
      {
        head.push_str(&tail);
      }
      continue;
    }
    out.push(token);
  }
  out
}

// ─── Dictionary accumulator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelMerge {
  /// `VALUE LABELS`: the new set replaces the variable's existing labels.
  Replace,
  /// `ADD VALUE LABELS`: new codes are added, repeated codes relabelled.
  Add,
}

#[derive(Default)]
struct Dictionary {
  /// Declared variable names in first-seen order.
  order:        Vec<String>,
  index:        HashMap<String, usize>,
  labels:       HashMap<String, String>,
  types:        HashMap<String, StorageType>,
  /// Variables with value labels, in first-seen order. May include names
  /// never declared.
  label_order:  Vec<String>,
  value_labels: HashMap<String, Vec<(String, String)>>,
}

impl Dictionary {
  fn apply(&mut self, cmd: &Command) {
    let (tokens, line) = (cmd.tokens.as_slice(), cmd.line);
    match cmd.kind {
      Kind::VariableLabels => self.variable_labels(tokens, line),
      Kind::ValueLabels(merge) => self.value_labels(tokens, line, merge),
      Kind::Formats => self.formats(tokens, line),
      Kind::Declare(storage) => self.declare_typed(tokens, line, storage),
    }
  }

  fn declare(&mut self, name: &str) {
    if !self.index.contains_key(name) {
      self.index.insert(name.to_owned(), self.order.len());
      self.order.push(name.to_owned());
    }
  }

  /// Expand `A TO C` over declaration order; other names pass through.
  fn expand_names(&self, words: &[String], line: usize) -> Vec<String> {
    let mut names = Vec::new();
    let mut i = 0;
    while i < words.len() {
      let is_range = words
        .get(i + 1)
        .is_some_and(|w| w.eq_ignore_ascii_case("TO"));
      if is_range && let Some(end) = words.get(i + 2) {
        match self.declared_range(&words[i], end) {
          Some(run) => names.extend(run),
          None => warn!(
            line,
            from = %words[i],
            to = %end,
            "cannot expand TO range over undeclared variables"
          ),
        }
        i += 3;
      } else {
        names.push(words[i].clone());
        i += 1;
      }
    }
    names
  }

  fn declared_range(&self, from: &str, to: &str) -> Option<Vec<String>> {
    let (a, b) = (*self.index.get(from)?, *self.index.get(to)?);
    (a <= b).then(|| self.order[a..=b].to_vec())
  }

  // ── VARIABLE LABELS ─────────────────────────────────────────────────────

  fn variable_labels(&mut self, tokens: &[Token], line: usize) {
    let mut i = 0;
    while i < tokens.len() {
      match (&tokens[i], tokens.get(i + 1)) {
        (Token::Slash, _) => i += 1,
        (Token::Word(name), Some(Token::Quoted(label))) => {
          self.declare(name);
          self.labels.insert(name.clone(), label.clone());
          i += 2;
        }
        (other, _) => {
          warn!(line, token = ?other, "skipping malformed VARIABLE LABELS entry");
          i += 1;
        }
      }
    }
  }

  // ── VALUE LABELS / ADD VALUE LABELS ──────────────────────────────────────

  fn value_labels(&mut self, tokens: &[Token], line: usize, merge: LabelMerge) {
    for group in tokens.split(|t| *t == Token::Slash) {
      let mut i = 0;
      let mut words = Vec::new();
      while let Some(Token::Word(w)) = group.get(i) {
        if looks_numeric(w) {
          break;
        }
        words.push(w.clone());
        i += 1;
      }

      let names = self.expand_names(&words, line);
      if names.is_empty() {
        if !group.is_empty() {
          warn!(line, "skipping value label group with no variable names");
        }
        continue;
      }

      let mut pairs = Vec::new();
      while i < group.len() {
        match (&group[i], group.get(i + 1)) {
          (Token::Word(code) | Token::Quoted(code), Some(Token::Quoted(label))) => {
            pairs.push((code.clone(), label.clone()));
            i += 2;
          }
          (other, _) => {
            warn!(line, token = ?other, "skipping malformed value label pair");
            i += 1;
          }
        }
      }

      for name in names {
        self.set_value_labels(name, &pairs, merge);
      }
    }
  }

  fn set_value_labels(&mut self, name: String, pairs: &[(String, String)], merge: LabelMerge) {
    if !self.value_labels.contains_key(&name) {
      self.label_order.push(name.clone());
    }
    let entries = self.value_labels.entry(name).or_default();
    if merge == LabelMerge::Replace {
      entries.clear();
    }
    for (code, label) in pairs {
      match entries.iter_mut().find(|(c, _)| c == code) {
        Some(slot) => slot.1 = label.clone(),
        None => entries.push((code.clone(), label.clone())),
      }
    }
  }

  // ── FORMATS / STRING / NUMERIC ──────────────────────────────────────────

  fn formats(&mut self, tokens: &[Token], line: usize) {
    for (words, spec) in format_groups(tokens, line) {
      let Some(spec) = spec else {
        warn!(line, names = ?words, "variables listed without a format");
        continue;
      };
      let storage = storage_from_format(&spec);
      if storage == StorageType::Unknown {
        warn!(line, format = %spec, "unrecognised SPSS format; storage type unknown");
      }
      for name in self.expand_names(&words, line) {
        self.declare(&name);
        self.types.insert(name, storage);
      }
    }
  }

  fn declare_typed(&mut self, tokens: &[Token], line: usize, storage: StorageType) {
    for (words, _) in format_groups(tokens, line) {
      for name in self.expand_names(&words, line) {
        self.declare(&name);
        self.types.insert(name, storage);
      }
    }
  }

  // ── Output ──────────────────────────────────────────────────────────────

  fn finish(self) -> ParsedCodebook {
    let Self {
      order,
      mut labels,
      types,
      label_order,
      mut value_labels,
      ..
    } = self;

    let variables = order
      .into_iter()
      .map(|name| VariableRecord {
        label:        labels.remove(&name),
        storage_type: types.get(&name).copied().unwrap_or_default(),
        name,
      })
      .collect();

    let value_labels = label_order
      .into_iter()
      .flat_map(|name| {
        value_labels
          .remove(&name)
          .unwrap_or_default()
          .into_iter()
          .map(move |(code, label)| ValueLabelRecord::new(name.clone(), code, label))
      })
      .collect();

    ParsedCodebook {
      variables,
      value_labels,
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// SPSS names start with a letter or `@#$`, so anything numeric-looking is a
/// code.
fn looks_numeric(word: &str) -> bool {
  word.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
    && word.parse::<f64>().is_ok()
}

/// Split `a b (F8.2) c (A10)` into name runs and their format specs.
fn format_groups(tokens: &[Token], line: usize) -> Vec<(Vec<String>, Option<String>)> {
  let mut groups = Vec::new();
  let mut pending = Vec::new();
  let mut i = 0;
  while i < tokens.len() {
    match (&tokens[i], tokens.get(i + 1), tokens.get(i + 2)) {
      (Token::Word(w), _, _) => {
        pending.push(w.clone());
        i += 1;
      }
      (Token::Open, Some(Token::Word(spec)), Some(Token::Close)) => {
        groups.push((std::mem::take(&mut pending), Some(spec.clone())));
        i += 3;
      }
      (Token::Slash, _, _) => i += 1,
      (other, _, _) => {
        warn!(line, token = ?other, "skipping unexpected token in variable list");
        i += 1;
      }
    }
  }
  if !pending.is_empty() {
    groups.push((pending, None));
  }
  groups
}

fn storage_from_format(spec: &str) -> StorageType {
  let kind = spec
    .chars()
    .take_while(char::is_ascii_alphabetic)
    .collect::<String>()
    .to_ascii_uppercase();
  match kind.as_str() {
    "A" | "AHEX" => StorageType::Text,
    "F" | "N" | "E" | "Z" | "P" | "PK" | "IB" | "PIB" | "PIBHEX" | "RB" | "RBHEX" | "COMMA"
    | "DOT" | "DOLLAR" | "PCT" | "CCA" | "CCB" | "CCC" | "CCD" | "CCE" | "DATE" | "ADATE"
    | "EDATE" | "JDATE" | "SDATE" | "QYR" | "MOYR" | "WKYR" | "DATETIME" | "YMDHMS"
    | "TIME" | "DTIME" | "MTIME" | "WKDAY" | "MONTH" => StorageType::Numeric,
    _ => StorageType::Unknown,
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub(crate) fn parse_syntax(input: &str) -> Result<ParsedCodebook> {
  let mut dictionary = Dictionary::default();
  for chunk in split_commands(input) {
    if let Some(cmd) = chunk.into_command()? {
      dictionary.apply(&cmd);
    }
  }
  Ok(dictionary.finish())
}
