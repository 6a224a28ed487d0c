use crate::activity::ActivityScope;
use crate::fhir::client::{FhirClient, FhirError};
use crate::fhir::model::Bundle;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Default page size requested from the server, mirroring the `_count`
/// hint the browser has always sent.
pub const DEFAULT_PAGE_SIZE: usize = 200;

const COMMUNICATION_ERROR: &str = "Error occurred while communicating with the FHIR server.";

/// Search criteria for one resource type.
#[derive(Debug, Clone)]
pub struct SearchParams {
	resource_type: String,
	filters: Vec<(String, String)>,
	count: usize,
}

impl SearchParams {
	pub fn resource(resource_type: impl Into<String>) -> Self {
		Self {
			resource_type: resource_type.into(),
			filters: Vec::new(),
			count: DEFAULT_PAGE_SIZE,
		}
	}

	pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.filters.push((key.into(), value.into()));
		self
	}

	pub fn count(mut self, count: usize) -> Self {
		self.count = count;
		self
	}

	pub fn resource_type(&self) -> &str {
		&self.resource_type
	}

	pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
		let mut pairs = self.filters.clone();
		pairs.push(("_count".to_owned(), self.count.to_string()));
		pairs
	}
}

impl FhirClient {
	/// Executes a single search request, returning the first result page.
	pub async fn search(&self, params: &SearchParams) -> Result<Bundle, FhirError> {
		let url = self.api_url(params.resource_type())?;
		let _busy = ActivityScope::begin(&*self.activity, "FHIR search");
		debug!(%url, "FHIR search");
		let response = self
			.http
			.get(url)
			.query(&params.query_pairs())
			.send()
			.await?
			.error_for_status()?;
		Ok(response.json().await?)
	}

	/// Executes a search and follows the bundle's `next` links until the
	/// server declares no further page, flattening all entries in page order.
	///
	/// Transport failures are reported to the problem reporter and yield an
	/// empty result; a failure on a later page discards the pages already
	/// gathered. Entries that do not deserialize as `T` are skipped.
	pub async fn fetch_all<T: DeserializeOwned>(&self, params: &SearchParams) -> Vec<T> {
		let mut bundle = match self.search(params).await {
			Ok(bundle) => bundle,
			Err(err) => {
				warn!(resource = params.resource_type(), "FHIR search failed: {err}");
				self.reporter.report("Error", COMMUNICATION_ERROR);
				return Vec::new();
			}
		};

		let mut resources = Vec::new();
		loop {
			for entry in std::mem::take(&mut bundle.entry) {
				let Some(resource) = entry.resource else {
					continue;
				};
				match serde_json::from_value::<T>(resource) {
					Ok(resource) => resources.push(resource),
					Err(err) => warn!(
						resource = params.resource_type(),
						"skipping malformed resource: {err}"
					),
				}
			}

			let Some(next) = bundle.next_link() else {
				break;
			};
			let tail = trailing_segment(next).to_owned();

			let page = match self.request_json(&tail).await {
				Ok(page) => page,
				Err(err) => {
					warn!("FHIR pagination fetch failed: {err}");
					self.reporter.report("Error", COMMUNICATION_ERROR);
					return Vec::new();
				}
			};
			bundle = match serde_json::from_value(page) {
				Ok(bundle) => bundle,
				Err(err) => {
					warn!("malformed FHIR bundle page: {err}");
					self.reporter.report("Error", COMMUNICATION_ERROR);
					return Vec::new();
				}
			};
		}

		resources
	}
}

/// The path tail a pagination link is re-issued as, relative to the server
/// root.
fn trailing_segment(url: &str) -> &str {
	url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trailing_segment_keeps_query() {
		assert_eq!(
			trailing_segment("http://server/fhir?_getpages=abc&_getpagesoffset=200"),
			"fhir?_getpages=abc&_getpagesoffset=200"
		);
	}

	#[test]
	fn query_pairs_append_count() {
		let params = SearchParams::resource("Observation")
			.filter("subject", "p1")
			.count(50);
		assert_eq!(
			params.query_pairs(),
			vec![
				("subject".to_owned(), "p1".to_owned()),
				("_count".to_owned(), "50".to_owned()),
			]
		);
	}
}
