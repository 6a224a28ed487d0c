use crate::activity::ActivityScope;
use crate::dicomweb::{element_str, DicomWebClient, DicomWebError, QidoQuery};
use bytes::Bytes;
use dicom::dictionary_std::tags;
use reqwest::header;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

impl DicomWebClient {
	/// Retrieve transaction for a single instance.
	///
	/// The payload arrives as `multipart/related; type="application/dicom"`;
	/// the first part is the instance.
	///
	/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_10.4.html>
	pub async fn retrieve_instance(
		&self,
		study_uid: &str,
		series_uid: &str,
		sop_uid: &str,
	) -> Result<Bytes, DicomWebError> {
		let url = self.resource_url(&[
			"studies",
			study_uid,
			"series",
			series_uid,
			"instances",
			sop_uid,
		])?;
		let _busy = ActivityScope::begin(&*self.activity, "DICOMweb retrieve");
		debug!(%url, "WADO-RS retrieve");
		let response = self
			.http
			.get(url)
			.header(
				header::ACCEPT,
				"multipart/related; type=\"application/dicom\"",
			)
			.send()
			.await?
			.error_for_status()?;

		let content_type = response
			.headers()
			.get(header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.unwrap_or_default()
			.to_owned();
		let boundary = parse_related_boundary(&content_type)?;

		let mut multipart = multer::Multipart::new(response.bytes_stream(), boundary);
		let field = multipart
			.next_field()
			.await?
			.ok_or(DicomWebError::EmptyRetrieve)?;
		Ok(field.bytes().await?)
	}

	/// Stages every instance of a series into `scratch` as sequentially
	/// numbered `file_{i}.dcm` files, returning the written paths.
	///
	/// The instance listing is a single call; instance-level result paging
	/// is not handled. Records without a SOP Instance UID are skipped.
	pub async fn stage_series(
		&self,
		study_uid: &str,
		series_uid: &str,
		scratch: &Path,
	) -> Result<Vec<PathBuf>, DicomWebError> {
		let instances = self
			.search_instances(study_uid, series_uid, &QidoQuery::new())
			.await?;
		tokio::fs::create_dir_all(scratch).await?;

		let mut written = Vec::with_capacity(instances.len());
		for (index, instance) in instances.iter().enumerate() {
			let Some(sop_uid) = element_str(instance, tags::SOP_INSTANCE_UID) else {
				warn!("skipping instance record without a SOPInstanceUID");
				continue;
			};
			let payload = self
				.retrieve_instance(study_uid, series_uid, &sop_uid)
				.await?;
			let path = scratch.join(format!("file_{index}.dcm"));
			tokio::fs::write(&path, &payload).await?;
			written.push(path);
		}
		Ok(written)
	}
}

/// Extracts the multipart boundary from a `multipart/related` Content-Type.
///
/// This mirrors [`multer::parse_boundary`], which only accepts
/// `multipart/form-data`.
fn parse_related_boundary(content_type: &str) -> multer::Result<String> {
	let mime = content_type
		.parse::<mime::Mime>()
		.map_err(multer::Error::DecodeContentType)?;

	if !(mime.type_() == mime::MULTIPART && mime.subtype().as_str() == "related") {
		return Err(multer::Error::NoMultipart);
	}

	mime.get_param(mime::BOUNDARY)
		.map(|name| name.as_str().to_owned())
		.ok_or(multer::Error::NoBoundary)
}
