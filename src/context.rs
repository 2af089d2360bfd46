use std::collections::BTreeMap;

use crate::models::{FactTable, StationInfo, StationMetadata};
use crate::services::{BarchartService, ComparisonService, PolarService};

/// Fact table and station metadata, built once and only read afterwards.
///
/// Queries borrow from the context, so it can be shared by reference
/// between concurrent readers without locking.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    facts: FactTable,
    metadata: StationMetadata,
}

impl PipelineContext {
    pub fn new(facts: FactTable, metadata: StationMetadata) -> Self {
        Self { facts, metadata }
    }

    /// Context for a persisted fact table; metadata is recovered from the rows
    pub fn from_fact_table(facts: FactTable) -> Self {
        let mut metadata = StationMetadata::new();
        for row in facts.rows() {
            if metadata.get(&row.station).is_some() {
                continue;
            }
            if let (Some(description), Some(lat), Some(lon)) = (&row.description, row.lat, row.lon) {
                metadata.insert(
                    row.station.clone(),
                    StationInfo {
                        description: description.clone(),
                        lat,
                        lon,
                    },
                );
            }
        }
        Self { facts, metadata }
    }

    pub fn facts(&self) -> &FactTable {
        &self.facts
    }

    pub fn metadata(&self) -> &StationMetadata {
        &self.metadata
    }

    pub fn barchart(&self) -> BarchartService<'_> {
        BarchartService::new(&self.facts)
    }

    pub fn polar(&self) -> PolarService<'_> {
        PolarService::new(&self.facts)
    }

    pub fn comparison(&self) -> ComparisonService<'_> {
        ComparisonService::new(&self.facts)
    }

    /// Description -> location id
    pub fn location_directory(&self) -> BTreeMap<String, String> {
        self.facts.location_directory()
    }
}
