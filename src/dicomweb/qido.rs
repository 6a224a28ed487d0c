use crate::activity::ActivityScope;
use crate::dicomweb::{DicomWebClient, DicomWebError};
use dicom::object::InMemDicomObject;
use reqwest::{header, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Client-side query parameters for a QIDO-RS request.
///
/// <https://dicom.nema.org/medical/dicom/current/output/html/part18.html#table_8.3.4-1>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QidoQuery {
	match_criteria: Vec<(String, String)>,
	include_fields: Vec<String>,
	limit: Option<usize>,
	offset: usize,
}

impl QidoQuery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an attribute match, keyed by DICOM keyword (e.g. `PatientID`).
	pub fn matching(mut self, keyword: impl Into<String>, value: impl Into<String>) -> Self {
		self.match_criteria.push((keyword.into(), value.into()));
		self
	}

	/// Requests an attribute beyond the server's default return set.
	pub fn include(mut self, keyword: impl Into<String>) -> Self {
		self.include_fields.push(keyword.into());
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: usize) -> Self {
		self.offset = offset;
		self
	}

	fn query_pairs(&self) -> Vec<(String, String)> {
		let mut pairs = self.match_criteria.clone();
		for field in &self.include_fields {
			pairs.push(("includefield".to_owned(), field.clone()));
		}
		if let Some(limit) = self.limit {
			pairs.push(("limit".to_owned(), limit.to_string()));
		}
		pairs.push(("offset".to_owned(), self.offset.to_string()));
		pairs
	}
}

impl DicomWebClient {
	/// Search transaction over all studies.
	///
	/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_10.6.html>
	pub async fn search_studies(
		&self,
		query: &QidoQuery,
	) -> Result<Vec<InMemDicomObject>, DicomWebError> {
		let url = self.resource_url(&["studies"])?;
		self.search(url, query).await
	}

	/// Search transaction over the series of one study.
	pub async fn search_series(
		&self,
		study_uid: &str,
		query: &QidoQuery,
	) -> Result<Vec<InMemDicomObject>, DicomWebError> {
		let url = self.resource_url(&["studies", study_uid, "series"])?;
		self.search(url, query).await
	}

	/// Search transaction over the instances of one series.
	pub async fn search_instances(
		&self,
		study_uid: &str,
		series_uid: &str,
		query: &QidoQuery,
	) -> Result<Vec<InMemDicomObject>, DicomWebError> {
		let url =
			self.resource_url(&["studies", study_uid, "series", series_uid, "instances"])?;
		self.search(url, query).await
	}

	async fn search(
		&self,
		url: Url,
		query: &QidoQuery,
	) -> Result<Vec<InMemDicomObject>, DicomWebError> {
		let _busy = ActivityScope::begin(&*self.activity, "DICOMweb search");
		debug!(%url, "QIDO-RS search");
		let response = self
			.http
			.get(url)
			.query(&query.query_pairs())
			.header(header::ACCEPT, "application/dicom+json")
			.send()
			.await?
			.error_for_status()?;

		// Servers report an empty result set as 204 rather than `[]`.
		if response.status() == StatusCode::NO_CONTENT {
			return Ok(Vec::new());
		}

		let records: Vec<Value> = response.json().await?;
		records
			.into_iter()
			.map(|record| {
				dicom_json::from_str(&record.to_string()).map_err(DicomWebError::from)
			})
			.collect()
	}
}
