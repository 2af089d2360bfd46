use thiserror::Error;

use crate::fact_store::StoreError;
use crate::importers::workbook::LoadError;
use crate::pipeline::merger::MergeError;
use crate::pipeline::normalizer::NormalizeError;

/// A query named a station (or location / description) the fact table does not contain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown station: {station}")]
pub struct UnknownStationError {
    pub station: String,
}

impl UnknownStationError {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
        }
    }
}

/// Typed failures of the aggregation queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    UnknownStation(#[from] UnknownStationError),

    #[error("At least one year must be selected")]
    EmptyYearSet,

    #[error("Unknown frequency: {0}")]
    UnknownFrequency(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown aggregation: {0}")]
    UnknownAggregation(String),

    #[error("Unknown radial range: {0}")]
    UnknownRangeKind(String),
}

/// Anything that aborts a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}
