//! Turns raw year tables into the long-format fact table

pub mod calendar;
pub mod merger;
pub mod normalizer;
pub mod station_code;

pub use merger::{merge_years, MergeError};
pub use normalizer::{MalformedCountError, MissingCellPolicy, NormalizeError, Normalizer, YearTable};
