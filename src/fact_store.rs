//! Flat CSV persistence of the fact table
//!
//! Columns: timestamp, station, total_bikes, hour, hour_str, weekday,
//! day_name, month, month_name, year, description, lat, lon.
//! Null metadata is written as an empty field.
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{FactRow, FactTable, FACT_COLUMNS};
use crate::pipeline::calendar::CalendarFields;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected header: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Calendar fields disagree with timestamp {timestamp} on line {line}")]
    InconsistentCalendar { line: u64, timestamp: String },
}

/// Write the fact table to `path`, replacing any existing file
pub fn write_fact_table(path: impl AsRef<Path>, table: &FactTable) -> Result<(), StoreError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_fact_rows(file, table)?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_fact_rows<W: Write>(writer: W, table: &FactTable) -> Result<(), StoreError> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    // Serialized headers follow the FactRow field order, which matches FACT_COLUMNS
    if table.is_empty() {
        writer.write_record(FACT_COLUMNS)?;
    }
    for row in table.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a previously written fact table
pub fn read_fact_table(path: impl AsRef<Path>) -> Result<FactTable, StoreError> {
    let path = path.as_ref();
    debug!("Reading fact table from {}", path.display());
    let table = read_fact_rows(File::open(path)?)?;
    info!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

pub fn read_fact_rows<R: Read>(reader: R) -> Result<FactTable, StoreError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let found: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if found != FACT_COLUMNS {
        return Err(StoreError::HeaderMismatch {
            expected: FACT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            found,
        });
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<FactRow>().enumerate() {
        let row = result?;
        if row.calendar() != CalendarFields::from_timestamp(row.timestamp) {
            return Err(StoreError::InconsistentCalendar {
                // Header is line 1
                line: idx as u64 + 2,
                timestamp: row.timestamp.to_string(),
            });
        }
        rows.push(row);
    }

    Ok(FactTable::from_rows(rows))
}
