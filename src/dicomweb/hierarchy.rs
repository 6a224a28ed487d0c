use crate::activity::ActivityScope;
use crate::dicomweb::{element_str, DicomWebClient, QidoQuery, UI};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use tracing::warn;

const COMMUNICATION_ERROR: &str = "Error occurred while communicating with the DICOM server.";

/// One series of a resolved study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagingSeries {
	pub uid: UI,
	pub display_name: String,
}

/// One study of a patient's imaging footprint, with its series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagingStudy {
	pub uid: UI,
	pub display_name: String,
	pub series: Vec<ImagingSeries>,
}

/// Identity extracted from a search record: instance UID plus the optional
/// description the display name derives from.
type Identity = (UI, Option<String>);

impl DicomWebClient {
	/// Resolves a patient's study → series tree.
	///
	/// Studies and series are listed with offset pagination; some origin
	/// servers silently ignore `offset`, so a page whose first record was
	/// already collected stops the loop without being appended. A transport
	/// failure is reported once and yields the partially resolved tree.
	pub async fn resolve_imaging(&self, patient_id: &str) -> Vec<ImagingStudy> {
		let _busy = ActivityScope::begin(&*self.activity, "DICOMweb query");

		let (identities, mut aborted) = self.study_identities(patient_id).await;

		let mut resolved = Vec::with_capacity(identities.len());
		for (index, (uid, description)) in identities.into_iter().enumerate() {
			let series = if aborted {
				Vec::new()
			} else {
				let (series_identities, failed) = self.series_identities(&uid).await;
				aborted = failed;
				series_identities
					.into_iter()
					.enumerate()
					.map(|(series_index, (series_uid, series_description))| ImagingSeries {
						uid: series_uid,
						display_name: display_label(
							series_description.as_deref(),
							"Series",
							series_index,
						),
					})
					.collect()
			};

			resolved.push(ImagingStudy {
				display_name: display_label(description.as_deref(), "Study", index),
				uid,
				series,
			});
		}
		resolved
	}

	async fn study_identities(&self, patient_id: &str) -> (Vec<Identity>, bool) {
		let mut collected = Vec::new();
		let mut offset = 0;
		loop {
			let query = QidoQuery::new()
				.matching("PatientID", patient_id)
				.include("StudyDescription")
				.offset(offset);
			match self.search_studies(&query).await {
				Ok(page) => {
					if page.is_empty() {
						return (collected, false);
					}
					let records =
						page_identities(&page, tags::STUDY_INSTANCE_UID, tags::STUDY_DESCRIPTION);
					if records.is_empty() || page_repeats(&collected, &records) {
						return (collected, false);
					}
					offset += page.len();
					collected.extend(records);
				}
				Err(err) => {
					warn!("study listing for patient failed: {err}");
					self.reporter.report("Error", COMMUNICATION_ERROR);
					return (collected, true);
				}
			}
		}
	}

	async fn series_identities(&self, study_uid: &str) -> (Vec<Identity>, bool) {
		let mut collected = Vec::new();
		let mut offset = 0;
		loop {
			let query = QidoQuery::new().include("SeriesDescription").offset(offset);
			match self.search_series(study_uid, &query).await {
				Ok(page) => {
					if page.is_empty() {
						return (collected, false);
					}
					let records =
						page_identities(&page, tags::SERIES_INSTANCE_UID, tags::SERIES_DESCRIPTION);
					if records.is_empty() || page_repeats(&collected, &records) {
						return (collected, false);
					}
					offset += page.len();
					collected.extend(records);
				}
				Err(err) => {
					warn!("series listing for study {study_uid} failed: {err}");
					self.reporter.report("Error", COMMUNICATION_ERROR);
					return (collected, true);
				}
			}
		}
	}
}

/// The description when present and non-empty, else an ordinal fallback
/// (`"Study 0"`, `"Series 3"`) from the zero-based resolved position.
fn display_label(description: Option<&str>, kind: &str, index: usize) -> String {
	match description {
		Some(text) if !text.trim().is_empty() => text.trim().to_owned(),
		_ => format!("{kind} {index}"),
	}
}

fn page_identities(
	page: &[InMemDicomObject],
	uid_tag: Tag,
	description_tag: Tag,
) -> Vec<Identity> {
	page.iter()
		.filter_map(|record| {
			let Some(uid) = element_str(record, uid_tag) else {
				warn!("skipping search record without a {uid_tag} identifier");
				return None;
			};
			Some((uid, element_str(record, description_tag)))
		})
		.collect()
}

/// Duplicate-page loop guard: a fresh page repeats when its first record's
/// instance UID is already collected. Identity is compared by UID alone;
/// attribute drift between pages does not make a page "new".
fn page_repeats(collected: &[Identity], page: &[Identity]) -> bool {
	page.first()
		.is_some_and(|(uid, _)| collected.iter().any(|(seen, _)| seen == uid))
}

#[cfg(test)]
mod tests {
	use super::*;
	use dicom::core::{PrimitiveValue, VR};
	use dicom::object::mem::InMemElement;

	fn study_record(uid: &str, description: Option<&str>) -> InMemDicomObject {
		let mut object = InMemDicomObject::new_empty();
		object.put(InMemElement::new(
			tags::STUDY_INSTANCE_UID,
			VR::UI,
			PrimitiveValue::from(uid),
		));
		if let Some(description) = description {
			object.put(InMemElement::new(
				tags::STUDY_DESCRIPTION,
				VR::LO,
				PrimitiveValue::from(description),
			));
		}
		object
	}

	#[test]
	fn display_label_prefers_description() {
		assert_eq!(display_label(Some("CT ABDOMEN"), "Study", 3), "CT ABDOMEN");
		assert_eq!(display_label(Some("  "), "Study", 3), "Study 3");
		assert_eq!(display_label(None, "Series", 0), "Series 0");
	}

	#[test]
	fn page_identities_skip_records_without_uid() {
		let page = vec![
			study_record("1.2.3", Some("CT")),
			InMemDicomObject::new_empty(),
		];
		let identities =
			page_identities(&page, tags::STUDY_INSTANCE_UID, tags::STUDY_DESCRIPTION);
		assert_eq!(
			identities,
			vec![("1.2.3".to_owned(), Some("CT".to_owned()))]
		);
	}

	#[test]
	fn repeat_detection_is_uid_scoped() {
		let collected = vec![("1.2.3".to_owned(), Some("CT".to_owned()))];
		// same UID, drifted description: still a repeat
		let repeated = vec![("1.2.3".to_owned(), None)];
		assert!(page_repeats(&collected, &repeated));

		let fresh = vec![("4.5.6".to_owned(), None)];
		assert!(!page_repeats(&collected, &fresh));
		assert!(!page_repeats(&collected, &[]));
	}
}
