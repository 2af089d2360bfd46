pub mod config;
pub mod context;
pub mod error;
pub mod fact_store;
pub mod importers;
pub mod models;
pub mod pipeline;
pub mod presentation;
pub mod services;

pub use context::PipelineContext;
pub use error::{PipelineError, QueryError, UnknownStationError};
