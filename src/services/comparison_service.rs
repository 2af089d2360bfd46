use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::error::{QueryError, UnknownStationError};
use crate::models::{Aggregation, FactTable, YearSet};
use crate::presentation::{self, Palette};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub description: String,
    pub total_bikes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSeries {
    pub years: Vec<i32>,
    /// Compressed year label, e.g. "2017/19"
    pub years_label: String,
    pub aggregation: Aggregation,
    pub axis_label: String,
    /// Ascending by value
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonSeries {
    pub fn value_of(&self, description: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.description == description)
            .map(|r| r.total_bikes)
    }
}

/// Bar order plus description -> color for a highlighted comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarColors {
    pub order: Vec<String>,
    pub colors: BTreeMap<String, String>,
}

#[derive(Clone, Copy)]
pub struct ComparisonService<'a> {
    facts: &'a FactTable,
}

impl<'a> ComparisonService<'a> {
    pub fn new(facts: &'a FactTable) -> Self {
        Self { facts }
    }

    /// Same as [`ComparisonService::compare`], for callers holding a plain year list
    pub fn compare_years(
        &self,
        years: &[i32],
        aggregation: Aggregation,
    ) -> Result<ComparisonSeries, QueryError> {
        let years = YearSet::new(years.iter().copied())?;
        Ok(self.compare(&years, aggregation))
    }

    /// One value per station description for the selected years.
    ///
    /// `Total` sums hourly counts. `AveragePerDay` sums each calendar day first
    /// and averages over the days that have readings, so stations with gaps
    /// are not skewed by their missing hours.
    #[instrument(skip(self))]
    pub fn compare(&self, years: &YearSet, aggregation: Aggregation) -> ComparisonSeries {
        let mut daily: BTreeMap<&str, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
        let mut without_description = 0usize;

        for row in self.facts.rows() {
            if !years.contains(row.year) {
                continue;
            }
            let Some(description) = row.description.as_deref() else {
                without_description += 1;
                continue;
            };
            *daily
                .entry(description)
                .or_default()
                .entry(row.timestamp.date())
                .or_insert(0) += u64::from(row.total_bikes);
        }

        if without_description > 0 {
            debug!(
                "Excluded {} rows without station description from comparison",
                without_description
            );
        }

        let mut rows: Vec<ComparisonRow> = daily
            .into_iter()
            .map(|(description, days)| {
                let total: u64 = days.values().sum();
                let value = match aggregation {
                    Aggregation::Total => total as f64,
                    Aggregation::AveragePerDay => total as f64 / days.len() as f64,
                };
                ComparisonRow {
                    description: description.to_string(),
                    total_bikes: value,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            a.total_bikes
                .total_cmp(&b.total_bikes)
                .then_with(|| a.description.cmp(&b.description))
        });

        ComparisonSeries {
            years: years.iter().collect(),
            years_label: presentation::year_label(years),
            aggregation,
            axis_label: presentation::comparison_axis_label(aggregation).to_string(),
            rows,
        }
    }
}

/// Color every bar neutral except the highlighted station.
///
/// Fails when the highlighted description is not part of the comparison.
pub fn highlight_colors(
    series: &ComparisonSeries,
    highlighted: &str,
    palette: &Palette,
) -> Result<BarColors, UnknownStationError> {
    if series.value_of(highlighted).is_none() {
        return Err(UnknownStationError::new(highlighted));
    }

    let order: Vec<String> = series.rows.iter().map(|r| r.description.clone()).collect();
    let colors = order
        .iter()
        .map(|description| {
            let color = if description == highlighted {
                &palette.highlight
            } else {
                &palette.neutral
            };
            (description.clone(), color.clone())
        })
        .collect();

    Ok(BarColors { order, colors })
}
