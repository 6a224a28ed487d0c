//! Session-scoped browsing state: the connected clients, the fetched
//! patients and observations, the imaging tree of the selected patient and
//! the cache of series already imported into the host.

use crate::activity::{ActivityListener, NullActivity};
use crate::dicomweb::{DicomWebClient, ImagingStudy, UI};
use crate::fhir::model::{Observation, Patient};
use crate::fhir::{classify, FhirClient, ObservationGroups, SearchParams};
use crate::report::{LogReporter, ProblemReporter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Host import pipeline: consumes a directory of staged instance files and
/// answers with an opaque node identifier for the imported series.
pub trait ImportPipeline {
	fn import_series(&self, staged: &Path, series_uid: &str) -> anyhow::Result<String>;
}

/// Filesystem-backed import used by the CLI and tests: copies the staged
/// files into `destination/{series_uid}` and reports that directory as the
/// node identifier.
pub struct DirectoryImport {
	destination: PathBuf,
}

impl DirectoryImport {
	pub fn new(destination: impl Into<PathBuf>) -> Self {
		Self {
			destination: destination.into(),
		}
	}
}

impl ImportPipeline for DirectoryImport {
	fn import_series(&self, staged: &Path, series_uid: &str) -> anyhow::Result<String> {
		let target = self.destination.join(series_uid);
		std::fs::create_dir_all(&target)?;
		for entry in std::fs::read_dir(staged)? {
			let entry = entry?;
			std::fs::copy(entry.path(), target.join(entry.file_name()))?;
		}
		Ok(target.display().to_string())
	}
}

/// Outcome of [`Browser::connect`]. `dicomweb` is `None` when no DICOMweb
/// endpoint was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
	pub fhir: bool,
	pub dicomweb: Option<bool>,
}

impl ConnectionStatus {
	pub fn any_failed(&self) -> bool {
		!self.fhir || self.dicomweb == Some(false)
	}
}

pub struct Browser {
	reporter: Arc<dyn ProblemReporter>,
	activity: Arc<dyn ActivityListener>,
	fhir: Option<FhirClient>,
	dicom: Option<DicomWebClient>,
	patients: Vec<Patient>,
	observations: ObservationGroups,
	imaging: Vec<ImagingStudy>,
	imaging_patient: Option<String>,
	series_cache: HashMap<(UI, UI), String>,
	scratch_root: PathBuf,
}

impl Browser {
	pub fn new(reporter: Arc<dyn ProblemReporter>, activity: Arc<dyn ActivityListener>) -> Self {
		Self {
			reporter,
			activity,
			fhir: None,
			dicom: None,
			patients: Vec::new(),
			observations: ObservationGroups::new(),
			imaging: Vec::new(),
			imaging_patient: None,
			series_cache: HashMap::new(),
			scratch_root: std::env::temp_dir().join(format!("fhir-reader-{}", Uuid::new_v4())),
		}
	}

	/// A browser wired to the tracing-based reporter and no busy indicator.
	pub fn headless() -> Self {
		Self::new(Arc::new(LogReporter), Arc::new(NullActivity))
	}

	pub fn patients(&self) -> &[Patient] {
		&self.patients
	}

	pub fn observations(&self) -> &ObservationGroups {
		&self.observations
	}

	pub fn imaging(&self) -> &[ImagingStudy] {
		&self.imaging
	}

	/// (Re)connects to the configured endpoints.
	///
	/// The FHIR URL is mandatory: an empty value reports an error without
	/// issuing a request. The DICOMweb URL is optional; when present, each
	/// endpoint is probed and every failure category produces exactly one
	/// report.
	pub async fn connect(&mut self, fhir_url: &str, dicomweb_url: &str) -> ConnectionStatus {
		self.fhir = None;
		self.dicom = None;

		let fhir = if fhir_url.is_empty() {
			self.reporter.report(
				"Error",
				"Error initializing the FHIR client. Is the FHIR server URL empty?",
			);
			false
		} else {
			match FhirClient::new(
				fhir_url,
				Arc::clone(&self.reporter),
				Arc::clone(&self.activity),
			) {
				Ok(client) => match client.probe().await {
					Ok(()) => {
						info!(url = fhir_url, "connected to FHIR server");
						self.fhir = Some(client);
						true
					}
					Err(err) => {
						warn!("FHIR probe failed: {err}");
						self.reporter.report(
							"Error",
							&format!(
								"Error connecting to the FHIR server. Does a server exist at {fhir_url}?"
							),
						);
						false
					}
				},
				Err(err) => {
					warn!("FHIR client construction failed: {err}");
					self.reporter.report(
						"Error",
						&format!(
							"Error initializing the FHIR client. Does a server exist at {fhir_url}?"
						),
					);
					false
				}
			}
		};

		let dicomweb = if dicomweb_url.is_empty() {
			None
		} else {
			let connected = match DicomWebClient::new(
				dicomweb_url,
				Arc::clone(&self.reporter),
				Arc::clone(&self.activity),
			) {
				Ok(client) => match client.probe().await {
					Ok(()) => {
						info!(url = dicomweb_url, "connected to DICOMweb server");
						self.dicom = Some(client);
						true
					}
					Err(err) => {
						warn!("DICOMweb probe failed: {err}");
						false
					}
				},
				Err(err) => {
					warn!("DICOMweb client construction failed: {err}");
					false
				}
			};
			if !connected {
				self.reporter.report(
					"Error",
					&format!(
						"Error occurred while communicating with the DICOM server. Does a server exist at {dicomweb_url}?"
					),
				);
			}
			Some(connected)
		};

		ConnectionStatus { fhir, dicomweb }
	}

	/// Fetches the full patient list, replacing all previously loaded state.
	pub async fn refresh_patients(&mut self) -> &[Patient] {
		self.patients.clear();
		self.observations.clear();
		self.imaging.clear();
		self.imaging_patient = None;
		self.series_cache.clear();

		if let Some(fhir) = &self.fhir {
			self.patients = fhir.fetch_all(&SearchParams::resource("Patient")).await;
			info!("fetched {} patients", self.patients.len());
		} else {
			self.reporter
				.report("Error", "Not connected to a FHIR server.");
		}
		&self.patients
	}

	/// Fetches and classifies the observations of the patient at
	/// `patient_index` in the current patient list.
	pub async fn load_observations(&mut self, patient_index: usize) -> &ObservationGroups {
		self.observations = ObservationGroups::new();

		let Some(patient) = self.patients.get(patient_index) else {
			warn!("patient index {patient_index} is out of range");
			return &self.observations;
		};
		let Some(fhir) = &self.fhir else {
			self.reporter
				.report("Error", "Not connected to a FHIR server.");
			return &self.observations;
		};

		let params =
			SearchParams::resource("Observation").filter("subject", patient.id_or_empty());
		let observations: Vec<Observation> = fhir.fetch_all(&params).await;
		self.observations = classify(observations);
		&self.observations
	}

	/// Resolves the imaging tree for the given patient identifier.
	///
	/// The previous tree is discarded; selecting a different patient also
	/// invalidates the series cache. A `None` identifier (patient without a
	/// usable identifier) yields an empty tree.
	pub async fn load_imaging(&mut self, patient_identifier: Option<&str>) -> &[ImagingStudy] {
		self.imaging.clear();
		if self.imaging_patient.as_deref() != patient_identifier {
			self.series_cache.clear();
		}
		self.imaging_patient = patient_identifier.map(str::to_owned);

		let Some(patient_id) = patient_identifier else {
			return &self.imaging;
		};
		let Some(dicom) = &self.dicom else {
			return &self.imaging;
		};
		self.imaging = dicom.resolve_imaging(patient_id).await;
		&self.imaging
	}

	/// Retrieves a series into the host, going through the import pipeline.
	///
	/// A series already pulled during this session is answered from the
	/// cache without touching the network. Staged scratch files are deleted
	/// right after the import, on success and failure alike.
	pub async fn pull_series(
		&mut self,
		study_uid: &str,
		series_uid: &str,
		importer: &dyn ImportPipeline,
	) -> Option<String> {
		let key = (study_uid.to_owned(), series_uid.to_owned());
		if let Some(node) = self.series_cache.get(&key) {
			return Some(node.clone());
		}

		let Some(dicom) = &self.dicom else {
			self.reporter
				.report("Error", "Not connected to a DICOM server.");
			return None;
		};

		let scratch = self.scratch_root.join(series_uid);
		let node = match dicom.stage_series(study_uid, series_uid, &scratch).await {
			Ok(staged) if staged.is_empty() => {
				warn!("series {series_uid} has no instances to import");
				None
			}
			Ok(_) => match importer.import_series(&scratch, series_uid) {
				Ok(node) => Some(node),
				Err(err) => {
					warn!("series import failed: {err}");
					self.reporter.report(
						"Error",
						"Error occurred while importing the retrieved series.",
					);
					None
				}
			},
			Err(err) => {
				warn!("series retrieval failed: {err}");
				self.reporter.report(
					"Error",
					"Error occurred while communicating with the DICOM server.",
				);
				None
			}
		};

		if scratch.exists() {
			if let Err(err) = tokio::fs::remove_dir_all(&scratch).await {
				warn!("failed to remove scratch directory: {err}");
			}
		}

		if let Some(node) = &node {
			self.series_cache.insert(key, node.clone());
		}
		node
	}
}

impl Default for Browser {
	fn default() -> Self {
		Self::headless()
	}
}
