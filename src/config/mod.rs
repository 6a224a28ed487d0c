use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub endpoints: EndpointConfig,
}

impl AppConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		use config::Config;
		let s = Config::builder()
			.add_source(config::File::from_str(
				include_str!("defaults.toml"),
				config::FileFormat::Toml,
			))
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(config::Environment::with_prefix("FHIR_READER").separator("_"))
			.build()?;

		s.try_deserialize()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	// Configurable logging level. Also configurable via env vars RUST_LOG and FHIR_READER_TELEMETRY_LEVEL
	pub level: String,
	/// Sentry DSN for error tracking. An empty string disables Sentry.
	#[serde(default)]
	pub sentry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
	/// Base URL of the FHIR server. The `fhir/` API segment is appended by the client.
	pub fhir: String,
	/// Base URL of the DICOMweb server. An empty string disables DICOM retrieval.
	pub dicomweb: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_parse() {
		let config = AppConfig::new().expect("defaults should deserialize");
		assert_eq!(config.telemetry.level, "info");
		assert!(config.endpoints.fhir.is_empty());
		assert!(config.endpoints.dicomweb.is_empty());
	}
}
