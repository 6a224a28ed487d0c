use anyhow::bail;
use clap::{Parser, Subcommand};
use fhir_reader::config::AppConfig;
use fhir_reader::fhir::ALL_OBSERVATIONS;
use fhir_reader::session::{Browser, DirectoryImport};
use std::path::PathBuf;
use tracing::{error, info, level_filters::LevelFilter, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
	name = "fhir-reader",
	version,
	about = "Browse patients and observations on a FHIR server and pull DICOM series from a DICOMweb server"
)]
struct Cli {
	/// FHIR server URL, overriding the configured endpoint
	#[arg(long, global = true)]
	fhir_url: Option<String>,
	/// DICOMweb server URL, overriding the configured endpoint
	#[arg(long, global = true)]
	dicomweb_url: Option<String>,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// List the patients on the FHIR server
	Patients,
	/// List one patient's observations, grouped by observation type
	Observations {
		/// Position of the patient in the `patients` listing
		index: usize,
	},
	/// Show one patient's study/series tree on the DICOMweb server
	Imaging {
		/// Patient identifier (e.g. an MRN) as known to the DICOMweb server
		patient_id: String,
	},
	/// Retrieve all instances of a series into a local directory
	Pull {
		study_uid: String,
		series_uid: String,
		#[arg(long, default_value = "retrieved")]
		out: PathBuf,
	},
}

fn init_logger(level: Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = config
		.telemetry
		.sentry
		.as_ref()
		.filter(|dsn| !dsn.is_empty())
	{
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	}

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();
	let config = AppConfig::new()?;
	let level = config.telemetry.level.parse().unwrap_or(Level::INFO);
	init_logger(level);

	// Manually create the Tokio runtime because the Sentry client needs to be created *before* the
	// Tokio runtime, which prevents us from using the #[tokio::main] macro.
	// See https://docs.sentry.io/platforms/rust/#async-main-function
	let _sentry = init_sentry(&config);

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move {
			if let Err(error) = run(config, cli).await {
				error!("{error:#}");
				std::process::exit(1);
			}
		});
	Ok(())
}

async fn run(config: AppConfig, cli: Cli) -> anyhow::Result<()> {
	let fhir_url = cli.fhir_url.unwrap_or(config.endpoints.fhir);
	let dicomweb_url = cli.dicomweb_url.unwrap_or(config.endpoints.dicomweb);

	let mut browser = Browser::headless();
	let status = browser.connect(&fhir_url, &dicomweb_url).await;
	if !status.fhir {
		bail!("could not connect to the FHIR server");
	}

	match cli.command {
		Command::Patients => {
			let patients = browser.refresh_patients().await;
			for (index, patient) in patients.iter().enumerate() {
				println!("{index:4}  {}", patient.display_name());
			}
		}
		Command::Observations { index } => {
			browser.refresh_patients().await;
			let Some(patient) = browser.patients().get(index).cloned() else {
				bail!("no patient at index {index}");
			};
			let details = patient.details();
			println!("{}", patient.display_name());
			println!(
				"  id: {}  gender: {}  born: {}",
				details.id, details.gender, details.birth_date
			);
			let groups = browser.load_observations(index).await;
			for (label, group) in groups
				.iter()
				.filter(|(label, _)| label.as_str() != ALL_OBSERVATIONS)
			{
				println!("{label} ({} observations)", group.len());
				for observation in group {
					let row = observation.row();
					println!("  {}  {} {}  [{}]", row.date, row.value, row.unit, row.code_value);
				}
			}
		}
		Command::Imaging { patient_id } => {
			if status.dicomweb != Some(true) {
				bail!("could not connect to the DICOMweb server (is endpoints.dicomweb configured?)");
			}
			let studies = browser.load_imaging(Some(&patient_id)).await;
			for study in studies {
				println!("{}  ({})", study.display_name, study.uid);
				for series in &study.series {
					println!("  {}  ({})", series.display_name, series.uid);
				}
			}
		}
		Command::Pull {
			study_uid,
			series_uid,
			out,
		} => {
			if status.dicomweb != Some(true) {
				bail!("could not connect to the DICOMweb server (is endpoints.dicomweb configured?)");
			}
			let importer = DirectoryImport::new(out);
			match browser.pull_series(&study_uid, &series_uid, &importer).await {
				Some(node) => println!("{node}"),
				None => bail!("series retrieval failed"),
			}
		}
	}

	Ok(())
}
