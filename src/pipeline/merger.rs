use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::FactTable;
use crate::pipeline::normalizer::YearTable;

#[derive(Error, Debug, PartialEq)]
pub enum MergeError {
    #[error("No tables to merge")]
    NoTables,

    #[error("Schema mismatch in year {year}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        year: i32,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Concatenate normalized year tables in the order given.
///
/// Each table keeps its internal order; nothing is deduplicated or re-sorted,
/// so years may arrive in any order. All tables must carry the same set of
/// fields as the first table; field order does not matter.
pub fn merge_years(tables: Vec<YearTable>) -> Result<FactTable, MergeError> {
    let expected = match tables.first() {
        Some(first) => first.schema.clone(),
        None => return Err(MergeError::NoTables),
    };
    let expected_fields: BTreeSet<&str> = expected.iter().map(String::as_str).collect();

    for table in &tables {
        let fields: BTreeSet<&str> = table.schema.iter().map(String::as_str).collect();
        if fields != expected_fields {
            return Err(MergeError::SchemaMismatch {
                year: table.source_year,
                expected: expected.clone(),
                found: table.schema.clone(),
            });
        }
    }

    let total: usize = tables.iter().map(|t| t.rows.len()).sum();
    let mut rows = Vec::with_capacity(total);
    for table in tables {
        debug!(
            "Appending {} rows from year {}",
            table.rows.len(),
            table.source_year
        );
        rows.extend(table.rows);
    }

    info!("Merged fact table with {} rows", rows.len());
    Ok(FactTable::from_rows(rows))
}
