// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reading jobs from a file. Two layouts are understood:
//!
//! - text or CSV: one `private public` pair per record, separated by a comma, a semicolon, tabs
//!   or spaces. Blank lines and `#` comments are skipped. The first line is a header only if
//!   none of its fields holds a digit or a `/`.
//! - YAML: a list of `{ private: <cidr>, public: <cidr> }` mappings.
//!
//! The layout is picked from the file extension. Pools are not validated here: a malformed
//! pool makes its own job fail, not the whole run.

use cgnat::{Job, JobError, JobSource};
use std::path::{Path, PathBuf};
#[allow(unused)]
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Text,
    Yaml,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                InputFormat::Yaml
            }
            _ => InputFormat::Text,
        }
    }
}

/// Separators tried in order on the first line; spaces are the fallback.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Field separator of a text input, and whether its first record is a header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayout {
    pub delimiter: u8,
    pub has_headers: bool,
}

impl TextLayout {
    /// Guess the layout from the first line that is neither blank nor a comment.
    pub fn sniff(text: &str) -> Self {
        let first = first_line(text);
        let delimiter = DELIMITERS
            .into_iter()
            .find(|d| first.contains(char::from(*d)))
            .unwrap_or(b' ');
        Self::sniff_header(text, delimiter)
    }

    /// Keep `delimiter`, only guess whether there is a header.
    pub fn sniff_header(text: &str, delimiter: u8) -> Self {
        let first = first_line(text);
        // a mistyped pool still has digits: only a line without any is a header
        let has_headers = !first.is_empty()
            && first
                .split(char::from(delimiter))
                .all(|field| !field.contains(|c: char| c.is_ascii_digit() || c == '/'));
        Self {
            delimiter,
            has_headers,
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .unwrap_or_default()
}

/// Parse the text layout, guessing its separator.
///
/// # Errors
///
/// Fails on a record that does not hold exactly two fields.
pub fn parse_text(text: &str) -> Result<Vec<Job>, JobError> {
    parse_text_with(text, TextLayout::sniff(text))
}

/// Parse the text layout with a known separator and header setting.
///
/// # Errors
///
/// Fails on a record that does not hold exactly two fields, or that is not valid UTF-8.
pub fn parse_text_with(text: &str, layout: TextLayout) -> Result<Vec<Job>, JobError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(layout.has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());
    if layout.has_headers {
        let header = reader
            .headers()
            .map_err(|e| JobError::Source(e.to_string()))?;
        debug!("Skipping header {header:?}");
    }

    let mut jobs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| JobError::Source(e.to_string()))?;
        let line = record.position().map_or(0, csv::Position::line);
        // repeated spaces make empty fields
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        match fields.as_slice() {
            [] => {}
            [first, ..] if first.starts_with('#') => {}
            [private, public] => jobs.push(Job::new(*private, *public)),
            _ => {
                return Err(JobError::Source(format!(
                    "line {line}: expected a private and a public pool, found {} field(s)",
                    fields.len()
                )));
            }
        }
    }
    Ok(jobs)
}

/// Parse the YAML layout.
///
/// # Errors
///
/// Fails if the document is not a list of `{private, public}` mappings.
pub fn parse_yaml(text: &str) -> Result<Vec<Job>, JobError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml_ng::from_str(text).map_err(|e| JobError::Source(e.to_string()))
}

/// Jobs read from a file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: InputFormat,
    delimiter: Option<u8>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = InputFormat::from_path(&path);
        Self {
            path,
            format,
            delimiter: None,
        }
    }

    /// Use this separator for the text layout instead of guessing it
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse(&self, text: &str) -> Result<Vec<Job>, JobError> {
        match (self.format, self.delimiter) {
            (InputFormat::Yaml, _) => parse_yaml(text),
            (InputFormat::Text, None) => parse_text(text),
            (InputFormat::Text, Some(delimiter)) => {
                parse_text_with(text, TextLayout::sniff_header(text, delimiter))
            }
        }
    }
}

impl JobSource for FileSource {
    fn jobs(&mut self) -> Result<Vec<Job>, JobError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| JobError::Source(format!("{}: {e}", self.path.display())))?;
        let jobs = self.parse(&text).map_err(|e| match e {
            JobError::Source(reason) => {
                JobError::Source(format!("{}: {reason}", self.path.display()))
            }
            other @ JobError::Sink(_) => other,
        })?;
        if jobs.is_empty() {
            warn!("No jobs found in {}", self.path.display());
        }
        debug!("Read {} jobs from {}", jobs.len(), self.path.display());
        Ok(jobs)
    }
}
