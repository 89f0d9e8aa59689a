use anyhow::Context;
use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::IndexMap;

use crate::error::Result;

pub type Row = IndexMap<String, String>;

/// A delimited export keyed by its header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl CsvTable {
    pub fn parse(body: &str, delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .context("error reading csv header row")?
            .iter()
            .map(|h| h.to_owned())
            .collect::<Vec<_>>();

        let mut rows = vec![];
        for (idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("error reading csv row {}", idx + 1))?;
            rows.push(to_row(&headers, &record));
        }

        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Short rows get empty values for the missing columns, long rows lose the
// fields that have no header.
fn to_row(headers: &[String], record: &StringRecord) -> Row {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            (
                header.to_owned(),
                record.get(idx).unwrap_or_default().to_owned(),
            )
        })
        .collect()
}

/// Compact `key=value` rendering used in error messages.
pub fn describe_row(row: &Row) -> String {
    row.iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
