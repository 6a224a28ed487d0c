use crate::fhir::model::Observation;
use indexmap::IndexMap;

/// Reserved group key holding every fetched observation, unfiltered.
pub const ALL_OBSERVATIONS: &str = "all";

/// Observations grouped by classification label, in first-occurrence order.
pub type ObservationGroups = IndexMap<String, Vec<Observation>>;

/// Groups observations by their classification label.
///
/// The reserved [`ALL_OBSERVATIONS`] key comes first and holds the full
/// input in input order; every other key holds the observations sharing
/// that exact label (no normalization). Observations without a displayable
/// coding land under the empty-string label.
pub fn classify(observations: Vec<Observation>) -> ObservationGroups {
	let mut groups = ObservationGroups::new();
	groups.insert(ALL_OBSERVATIONS.to_owned(), observations.clone());
	for observation in observations {
		let label = observation.type_label().to_owned();
		groups.entry(label).or_default().push(observation);
	}
	groups
}
