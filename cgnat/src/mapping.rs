// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tabular export of allocation records, for auditing.

use crate::alloc::AllocationRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("unexpected CSV header '{0}'")]
    Header(String),
    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One row of the mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    #[serde(rename = "Private IP")]
    pub private_ip: Ipv4Addr,
    #[serde(rename = "Public IP")]
    pub public_ip: Ipv4Addr,
    #[serde(rename = "Port Start")]
    pub port_start: u16,
    #[serde(rename = "Port End")]
    pub port_end: u16,
}

impl From<&AllocationRecord> for MappingRow {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            private_ip: record.host,
            public_ip: record.public,
            port_start: record.ports.start(),
            port_end: record.ports.end(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MappingFormat {
    #[default]
    Csv,
    Yaml,
}

impl MappingFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            MappingFormat::Csv => "csv",
            MappingFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for MappingFormat {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(MappingFormat::Csv),
            "yaml" | "yml" => Ok(MappingFormat::Yaml),
            other => Err(format!("Unknown mapping format '{other}': expected csv or yaml")),
        }
    }
}

impl Display for MappingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

const CSV_COLUMNS: [&str; 4] = ["Private IP", "Public IP", "Port Start", "Port End"];

/// The mapping rows of a whole run, in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    rows: Vec<MappingRow>,
}

impl MappingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a AllocationRecord>) {
        self.rows.extend(records.into_iter().map(MappingRow::from));
    }
    #[must_use]
    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV, with a header line. The header is written even when the table is empty.
    ///
    /// # Errors
    ///
    /// Fails if a row cannot be serialized.
    pub fn to_csv(&self) -> Result<String, MappingError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let data = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8(data)?)
    }

    /// Parse the output of [`MappingTable::to_csv`].
    ///
    /// # Errors
    ///
    /// Fails on a missing or unexpected header, and on rows that do not have four valid fields.
    pub fn from_csv(text: &str) -> Result<Self, MappingError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let header = reader.headers()?;
        if header.iter().ne(CSV_COLUMNS) {
            return Err(MappingError::Header(header.iter().collect::<Vec<_>>().join(",")));
        }
        let rows = reader
            .deserialize::<MappingRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn to_yaml(&self) -> Result<String, MappingError> {
        Ok(serde_yaml_ng::to_string(&self.rows)?)
    }

    /// # Errors
    ///
    /// Fails if the text is not a YAML list of mapping rows.
    pub fn from_yaml(text: &str) -> Result<Self, MappingError> {
        Ok(Self {
            rows: serde_yaml_ng::from_str(text)?,
        })
    }

    /// # Errors
    ///
    /// Fails if YAML serialization fails.
    pub fn render(&self, format: MappingFormat) -> Result<String, MappingError> {
        match format {
            MappingFormat::Csv => self.to_csv(),
            MappingFormat::Yaml => self.to_yaml(),
        }
    }
}
