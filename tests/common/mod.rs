use fhir_reader::report::ProblemReporter;
use std::sync::Mutex;

/// Reporter that records every report for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
	reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
	pub fn count(&self) -> usize {
		self.reports.lock().unwrap().len()
	}

	#[allow(dead_code)]
	pub fn messages(&self) -> Vec<String> {
		self.reports
			.lock()
			.unwrap()
			.iter()
			.map(|(_, message)| message.clone())
			.collect()
	}
}

impl ProblemReporter for RecordingReporter {
	fn report(&self, title: &str, message: &str) {
		self.reports
			.lock()
			.unwrap()
			.push((title.to_owned(), message.to_owned()));
	}
}
