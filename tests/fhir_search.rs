mod common;

use common::RecordingReporter;
use fhir_reader::activity::NullActivity;
use fhir_reader::fhir::model::Patient;
use fhir_reader::fhir::{FhirClient, SearchParams};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server_uri: &str, reporter: &Arc<RecordingReporter>) -> FhirClient {
	FhirClient::new(server_uri, reporter.clone(), Arc::new(NullActivity)).unwrap()
}

fn patient(id: &str) -> Value {
	json!({"resourceType": "Patient", "id": id})
}

fn bundle(entries: &[Value], next: Option<&str>) -> Value {
	let mut links = vec![json!({"relation": "self", "url": "http://ignored/fhir/Patient"})];
	if let Some(next) = next {
		links.push(json!({"relation": "next", "url": next}));
	}
	json!({
		"resourceType": "Bundle",
		"type": "searchset",
		"link": links,
		"entry": entries.iter().map(|resource| json!({"resource": resource})).collect::<Vec<_>>()
	})
}

fn ids(patients: &[Patient]) -> Vec<&str> {
	patients.iter().map(Patient::id_or_empty).collect()
}

#[tokio::test]
async fn aggregates_all_pages_in_order() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	let page_two_url = format!("{}/fhir?_getpages=tok&_getpagesoffset=200", server.uri());
	let page_three_url = format!("{}/fhir?_getpages=tok&_getpagesoffset=400", server.uri());

	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.and(query_param("_count", "200"))
		.respond_with(ResponseTemplate::new(200).set_body_json(bundle(
			&[patient("p1"), patient("p2")],
			Some(&page_two_url),
		)))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/fhir"))
		.and(query_param("_getpagesoffset", "200"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(bundle(&[patient("p3")], Some(&page_three_url))),
		)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/fhir"))
		.and(query_param("_getpagesoffset", "400"))
		.respond_with(ResponseTemplate::new(200).set_body_json(bundle(&[patient("p4")], None)))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert_eq!(ids(&patients), vec!["p1", "p2", "p3", "p4"]);
	assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn single_page_needs_no_further_fetch() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(bundle(&[patient("p1"), patient("p2")], None)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert_eq!(ids(&patients), vec!["p1", "p2"]);
	assert_eq!(server.received_requests().await.unwrap().len(), 1);
	assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn next_link_is_followed_regardless_of_position() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	let page_two_url = format!("{}/fhir?_getpages=tok&_getpagesoffset=200", server.uri());
	// the next link is neither the first nor the second entry
	let first_page = json!({
		"resourceType": "Bundle",
		"link": [
			{"relation": "self", "url": "http://ignored/fhir/Patient"},
			{"relation": "prev", "url": "http://ignored/fhir?_getpages=prev"},
			{"relation": "next", "url": page_two_url}
		],
		"entry": [{"resource": patient("p1")}]
	});

	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.respond_with(ResponseTemplate::new(200).set_body_json(first_page))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/fhir"))
		.and(query_param("_getpagesoffset", "200"))
		.respond_with(ResponseTemplate::new(200).set_body_json(bundle(&[patient("p2")], None)))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert_eq!(ids(&patients), vec!["p1", "p2"]);
	assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn initial_failure_reports_once_and_returns_empty() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert!(patients.is_empty());
	assert_eq!(reporter.count(), 1);
	// no pagination fetch was attempted
	assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn later_page_failure_discards_gathered_pages() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	let page_two_url = format!("{}/fhir?_getpages=tok&_getpagesoffset=200", server.uri());
	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(bundle(&[patient("p1")], Some(&page_two_url))),
		)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/fhir"))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert!(patients.is_empty());
	assert_eq!(reporter.count(), 1);
}

#[tokio::test]
async fn entries_that_do_not_deserialize_are_skipped() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	let page = json!({
		"resourceType": "Bundle",
		"link": [{"relation": "self", "url": "http://ignored/fhir/Patient"}],
		"entry": [
			{"resource": patient("p1")},
			{"resource": "not a resource"},
			{"fullUrl": "urn:uuid:no-resource"},
			{"resource": patient("p2")}
		]
	});

	Mock::given(method("GET"))
		.and(path("/fhir/Patient"))
		.respond_with(ResponseTemplate::new(200).set_body_json(page))
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let patients: Vec<Patient> = client.fetch_all(&SearchParams::resource("Patient")).await;

	assert_eq!(ids(&patients), vec!["p1", "p2"]);
	assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn search_filters_are_forwarded() {
	let server = MockServer::start().await;
	let reporter = Arc::new(RecordingReporter::default());

	Mock::given(method("GET"))
		.and(path("/fhir/Observation"))
		.and(query_param("subject", "p1"))
		.and(query_param("_count", "200"))
		.respond_with(ResponseTemplate::new(200).set_body_json(bundle(&[], None)))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server.uri(), &reporter);
	let observations: Vec<fhir_reader::fhir::model::Observation> = client
		.fetch_all(&SearchParams::resource("Observation").filter("subject", "p1"))
		.await;

	assert!(observations.is_empty());
	assert_eq!(reporter.count(), 0);
}
