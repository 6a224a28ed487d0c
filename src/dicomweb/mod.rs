//! DICOMweb client surface: QIDO-RS searches, the patient study/series
//! resolver and WADO-RS instance staging.

mod hierarchy;
mod qido;
mod wado;

pub use hierarchy::{ImagingSeries, ImagingStudy};
pub use qido::QidoQuery;

use crate::activity::ActivityListener;
use crate::report::ProblemReporter;
use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// UI (Unique Identifier) value representation.
pub type UI = String;

#[derive(Debug, Error)]
pub enum DicomWebError {
	#[error("the DICOMweb server URL is empty")]
	EmptyUrl,
	#[error("invalid DICOMweb server URL `{url}`: {source}")]
	InvalidUrl {
		url: String,
		source: url::ParseError,
	},
	#[error("DICOMweb server URL `{0}` cannot be used as a base")]
	CannotBeABase(String),
	#[error("DICOMweb request failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("malformed DICOM JSON payload: {0}")]
	Malformed(#[from] serde_json::Error),
	#[error("malformed multipart response: {0}")]
	Multipart(#[from] multer::Error),
	#[error("retrieve response contained no payload part")]
	EmptyRetrieve,
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Client for a single DICOMweb origin server.
pub struct DicomWebClient {
	pub(crate) http: reqwest::Client,
	pub(crate) base: Url,
	pub(crate) reporter: Arc<dyn ProblemReporter>,
	pub(crate) activity: Arc<dyn ActivityListener>,
}

impl DicomWebClient {
	pub fn new(
		url: &str,
		reporter: Arc<dyn ProblemReporter>,
		activity: Arc<dyn ActivityListener>,
	) -> Result<Self, DicomWebError> {
		let trimmed = url.trim_end_matches('/');
		if trimmed.is_empty() {
			return Err(DicomWebError::EmptyUrl);
		}
		let base = Url::parse(trimmed).map_err(|source| DicomWebError::InvalidUrl {
			url: trimmed.to_owned(),
			source,
		})?;
		if base.cannot_be_a_base() {
			return Err(DicomWebError::CannotBeABase(trimmed.to_owned()));
		}

		Ok(Self {
			http: reqwest::Client::new(),
			base,
			reporter,
			activity,
		})
	}

	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Initial connectivity probe: an unfiltered study search.
	pub async fn probe(&self) -> Result<(), DicomWebError> {
		self.search_studies(&QidoQuery::new()).await.map(drop)
	}

	pub(crate) fn resource_url(&self, segments: &[&str]) -> Result<Url, DicomWebError> {
		let mut url = self.base.clone();
		url.path_segments_mut()
			.map_err(|()| DicomWebError::CannotBeABase(self.base.to_string()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}
}

/// Reads a single-valued string attribute, trimmed, treating an absent tag
/// or an empty value as missing.
pub(crate) fn element_str(object: &InMemDicomObject, tag: Tag) -> Option<String> {
	object
		.element(tag)
		.ok()
		.and_then(|element| element.to_str().ok())
		.map(|value| value.trim().to_owned())
		.filter(|value| !value.is_empty())
}
