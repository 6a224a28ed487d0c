//! FHIR R4 client surface: transport, lenient resource models, paginated
//! search aggregation and observation classification.

mod client;
pub mod model;
mod observations;
mod search;

pub use client::{FhirClient, FhirError};
pub use observations::{classify, ObservationGroups, ALL_OBSERVATIONS};
pub use search::SearchParams;
