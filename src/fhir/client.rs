use crate::activity::{ActivityListener, ActivityScope};
use crate::report::ProblemReporter;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FhirError {
	#[error("the FHIR server URL is empty")]
	EmptyUrl,
	#[error("invalid FHIR server URL `{url}`: {source}")]
	InvalidUrl {
		url: String,
		source: url::ParseError,
	},
	#[error("FHIR request failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("malformed FHIR payload: {0}")]
	Malformed(#[from] serde_json::Error),
}

/// Client for a single FHIR endpoint.
///
/// Search requests go to the API base (the configured root with a trailing
/// `fhir/` segment); [`FhirClient::request_json`] goes to the root itself,
/// which is where the path tails of bundle pagination links resolve.
pub struct FhirClient {
	pub(crate) http: reqwest::Client,
	pub(crate) root: Url,
	pub(crate) api_base: Url,
	pub(crate) reporter: Arc<dyn ProblemReporter>,
	pub(crate) activity: Arc<dyn ActivityListener>,
}

impl FhirClient {
	pub fn new(
		url: &str,
		reporter: Arc<dyn ProblemReporter>,
		activity: Arc<dyn ActivityListener>,
	) -> Result<Self, FhirError> {
		if url.is_empty() {
			return Err(FhirError::EmptyUrl);
		}
		let normalized = if url.ends_with('/') {
			url.to_owned()
		} else {
			format!("{url}/")
		};
		let root = Url::parse(&normalized).map_err(|source| FhirError::InvalidUrl {
			url: normalized.clone(),
			source,
		})?;
		let api_base = root.join("fhir/").map_err(|source| FhirError::InvalidUrl {
			url: normalized,
			source,
		})?;

		Ok(Self {
			http: reqwest::Client::new(),
			root,
			api_base,
			reporter,
			activity,
		})
	}

	pub fn root(&self) -> &Url {
		&self.root
	}

	pub fn api_base(&self) -> &Url {
		&self.api_base
	}

	/// Initial connectivity probe: an unfiltered Patient request against the
	/// API base.
	pub async fn probe(&self) -> Result<(), FhirError> {
		let url = self.api_url("Patient")?;
		self.get_json(url).await.map(drop)
	}

	/// Raw JSON request against the server root.
	///
	/// Pagination tails such as `fhir?_getpages=…` are relative to the root,
	/// not to the API base.
	pub async fn request_json(&self, relative: &str) -> Result<Value, FhirError> {
		let url = self.root.join(relative).map_err(|source| FhirError::InvalidUrl {
			url: relative.to_owned(),
			source,
		})?;
		self.get_json(url).await
	}

	pub(crate) fn api_url(&self, segment: &str) -> Result<Url, FhirError> {
		self.api_base.join(segment).map_err(|source| FhirError::InvalidUrl {
			url: segment.to_owned(),
			source,
		})
	}

	pub(crate) async fn get_json(&self, url: Url) -> Result<Value, FhirError> {
		let _busy = ActivityScope::begin(&*self.activity, "FHIR request");
		debug!(%url, "FHIR GET");
		let response = self.http.get(url).send().await?.error_for_status()?;
		Ok(response.json().await?)
	}
}
