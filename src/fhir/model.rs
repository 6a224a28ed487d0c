//! Serde models for the consumed slice of FHIR R4.
//!
//! These are not complete representations of the FHIR resources; they cover
//! the fields the browser renders. Every field is optional and the accessor
//! helpers degrade to empty strings, so a sparse resource never aborts an
//! operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paginated search-result container.
///
/// <https://hl7.org/fhir/R4/bundle.html>
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Bundle {
	pub total: Option<u64>,
	#[serde(default)]
	pub link: Vec<BundleLink>,
	#[serde(default)]
	pub entry: Vec<BundleEntry>,
}

impl Bundle {
	/// The URL of the next result page, if the server declared one.
	///
	/// The link sequence is scanned for a `next` relation; link order is not
	/// meaningful and must not be relied upon.
	pub fn next_link(&self) -> Option<&str> {
		self.link
			.iter()
			.find(|link| link.relation == "next")
			.map(|link| link.url.as_str())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleLink {
	pub relation: String,
	pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
	pub full_url: Option<String>,
	pub resource: Option<Value>,
}

/// <https://hl7.org/fhir/R4/datatypes.html#HumanName>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HumanName {
	pub text: Option<String>,
	pub family: Option<String>,
	pub given: Option<Vec<String>>,
}

/// <https://hl7.org/fhir/R4/datatypes.html#Identifier>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identifier {
	pub system: Option<String>,
	pub value: Option<String>,
}

/// <https://hl7.org/fhir/R4/datatypes.html#CodeableConcept>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CodeableConcept {
	pub coding: Option<Vec<Coding>>,
	pub text: Option<String>,
}

/// <https://hl7.org/fhir/R4/datatypes.html#Coding>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Coding {
	pub system: Option<String>,
	pub code: Option<String>,
	pub display: Option<String>,
}

/// <https://hl7.org/fhir/R4/datatypes.html#Quantity>
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Quantity {
	pub value: Option<f64>,
	pub unit: Option<String>,
	pub system: Option<String>,
	pub code: Option<String>,
}

/// <https://hl7.org/fhir/R4/references.html>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reference {
	pub reference: Option<String>,
	pub display: Option<String>,
}

/// <https://hl7.org/fhir/R4/patient.html>
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
	pub id: Option<String>,
	pub identifier: Option<Vec<Identifier>>,
	pub name: Option<Vec<HumanName>>,
	pub gender: Option<String>,
	pub birth_date: Option<String>,
}

impl Patient {
	pub fn id_or_empty(&self) -> &str {
		self.id.as_deref().unwrap_or_default()
	}

	/// The value of the first identifier, if any.
	pub fn primary_identifier(&self) -> Option<&str> {
		self.identifier
			.as_ref()
			.and_then(|ids| ids.first())
			.and_then(|id| id.value.as_deref())
	}

	/// List label: `"{family}, {given}"`, falling back to the primary
	/// identifier and then to the resource id.
	pub fn display_name(&self) -> String {
		if let Some(name) = self.name.as_ref().and_then(|names| names.first()) {
			let family = name.family.as_deref().unwrap_or_default();
			let given = name
				.given
				.as_ref()
				.and_then(|given| given.first())
				.map(String::as_str)
				.unwrap_or_default();
			if !family.is_empty() || !given.is_empty() {
				return format!("{family}, {given}");
			}
		}
		if let Some(identifier) = self.primary_identifier() {
			return format!("Patient {identifier}");
		}
		format!("Patient {}", self.id_or_empty())
	}

	/// Flattened detail row for the patient-information table.
	pub fn details(&self) -> PatientDetails {
		let name = self.name.as_ref().and_then(|names| names.first());
		let identifier = self.identifier.as_ref().and_then(|ids| ids.first());
		PatientDetails {
			id: self.id_or_empty().to_owned(),
			gender: self.gender.clone().unwrap_or_default(),
			first_name: name
				.and_then(|name| name.given.as_ref())
				.and_then(|given| given.first())
				.cloned()
				.unwrap_or_default(),
			last_name: name
				.and_then(|name| name.family.clone())
				.unwrap_or_default(),
			birth_date: self.birth_date.clone().unwrap_or_default(),
			identifier_system: identifier
				.and_then(|id| id.system.clone())
				.unwrap_or_default(),
			identifier_value: identifier
				.and_then(|id| id.value.clone())
				.unwrap_or_default(),
		}
	}
}

/// Patient fields as rendered by the host's information table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientDetails {
	pub id: String,
	pub gender: String,
	pub first_name: String,
	pub last_name: String,
	pub birth_date: String,
	pub identifier_system: String,
	pub identifier_value: String,
}

/// <https://hl7.org/fhir/R4/observation.html>
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
	pub id: Option<String>,
	pub identifier: Option<Vec<Identifier>>,
	pub status: Option<String>,
	pub code: Option<CodeableConcept>,
	pub subject: Option<Reference>,
	pub value_quantity: Option<Quantity>,
	pub effective_date_time: Option<String>,
}

impl Observation {
	fn first_coding(&self) -> Option<&Coding> {
		self.code
			.as_ref()
			.and_then(|code| code.coding.as_ref())
			.and_then(|codings| codings.first())
	}

	/// Classification label: the first coding's display text, empty when the
	/// resource carries no displayable coding.
	pub fn type_label(&self) -> &str {
		self.first_coding()
			.and_then(|coding| coding.display.as_deref())
			.unwrap_or_default()
	}

	/// Flattened row for the observation table.
	pub fn row(&self) -> ObservationRow {
		let coding = self.first_coding();
		let quantity = self.value_quantity.as_ref();
		let identifier = self.identifier.as_ref().and_then(|ids| ids.first());
		ObservationRow {
			id: self.id.clone().unwrap_or_default(),
			value: quantity
				.and_then(|quantity| quantity.value)
				.map(|value| value.to_string())
				.unwrap_or_default(),
			unit: quantity
				.and_then(|quantity| quantity.unit.clone())
				.unwrap_or_default(),
			observation_type: self.type_label().to_owned(),
			date: self.effective_date_time.clone().unwrap_or_default(),
			ucum_code: quantity
				.and_then(|quantity| quantity.code.clone())
				.unwrap_or_default(),
			code_value: coding
				.and_then(|coding| coding.code.clone())
				.unwrap_or_default(),
			code_system: coding
				.and_then(|coding| coding.system.clone())
				.unwrap_or_default(),
			identifier_system: identifier
				.and_then(|id| id.system.clone())
				.unwrap_or_default(),
			identifier_value: identifier
				.and_then(|id| id.value.clone())
				.unwrap_or_default(),
		}
	}
}

/// Observation fields as rendered by the host's observation table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationRow {
	pub id: String,
	pub value: String,
	pub unit: String,
	pub observation_type: String,
	pub date: String,
	pub ucum_code: String,
	pub code_value: String,
	pub code_system: String,
	pub identifier_system: String,
	pub identifier_value: String,
}
