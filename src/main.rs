//! ECG Report Agent CLI
//!
//! Single-lead ECG recording, screening classification and report generation.

use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use ecg_report_agent::{
    audit::create_shared_log_with_persistence,
    collector::{
        parse_hex_frame, CollectorConfig, CollectorError, FrameCollector, SampleSource,
        SimulatedCollector,
    },
    config::Config,
    core::{analyze, render_report, ReportView},
    store::{JsonFileStore, NewPatient, PatientRepository, ReportRepository, ReportStatus},
    Gender, PatientContext, RecordingSession, Sample, SessionError, SCREENING_DISCLAIMER, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ecg-report")]
#[command(version = VERSION)]
#[command(about = "Single-lead ECG screening and report generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an ECG for a new patient and store the report
    Record {
        /// Patient name
        #[arg(long)]
        name: String,

        /// Patient age in years
        #[arg(long)]
        age: u32,

        /// Patient gender (male, female or other)
        #[arg(long)]
        gender: Gender,

        /// Recording length in seconds (defaults to the configured duration)
        #[arg(long)]
        duration: Option<u64>,

        /// Read hex-encoded device notifications from FILE instead of simulating
        #[arg(long, value_name = "FILE")]
        frames: Option<PathBuf>,
    },

    /// Analyse a JSON array of samples without storing anything
    Analyze {
        /// JSON file containing the samples
        #[arg(long, short)]
        input: PathBuf,

        /// Patient age in years
        #[arg(long)]
        age: u32,

        /// Patient gender (male, female or other)
        #[arg(long)]
        gender: Gender,
    },

    /// List stored reports, newest first
    Reports,

    /// Show one stored report
    Show {
        /// Report id
        id: String,

        /// Audience of the report
        #[arg(long, value_enum, default_value_t = ReportView::Patient)]
        view: ReportView,
    },

    /// List stored patients
    Patients,

    /// Show recording statistics
    Status,

    /// Display the screening disclaimer
    Disclaimer,

    /// Export stored reports
    Export {
        /// Output directory for the export
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,

    /// Serve the analysis pipeline and stored reports over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8787")]
        port: u16,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            name,
            age,
            gender,
            duration,
            frames,
        } => {
            cmd_record(name, age, gender, duration, frames);
        }
        Commands::Analyze { input, age, gender } => {
            cmd_analyze(&input, age, gender);
        }
        Commands::Reports => {
            cmd_reports();
        }
        Commands::Show { id, view } => {
            cmd_show(&id, view);
        }
        Commands::Patients => {
            cmd_patients();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Disclaimer => {
            cmd_disclaimer();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port);
        }
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    }
}

fn open_store(config: &Config) -> JsonFileStore {
    JsonFileStore::open(config.store_path(), Some(config.user_id.clone()))
}

fn timezone(config: &Config) -> chrono_tz::Tz {
    config.tz().unwrap_or_else(|e| {
        eprintln!("Warning: {e}, showing times in UTC");
        chrono_tz::UTC
    })
}

fn cmd_record(
    name: String,
    age: u32,
    gender: Gender,
    duration: Option<u64>,
    frames: Option<PathBuf>,
) {
    println!("ECG Report Agent v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let duration_secs = duration.unwrap_or(config.recording_duration.as_secs());
    let (session_secs, timeout) = match recording_limits(duration_secs) {
        Ok(limits) => limits,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let store = open_store(&config);
    let audit = create_shared_log_with_persistence(config.audit_path());

    // Set up Ctrl+C handler
    let cancel = Arc::new(AtomicBool::new(false));
    ctrlc_handler(cancel.clone());

    let mut simulated = None;
    let receiver = match frames {
        Some(ref path) => {
            println!("Source: device frames from {path:?}");
            match spawn_frame_feed(path, config.sample_interval_ms) {
                Ok(receiver) => receiver,
                Err(e) => {
                    eprintln!("Error reading frames: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("Source: simulated waveform");
            let mut collector = SimulatedCollector::new(CollectorConfig {
                duration: Duration::from_secs(duration_secs),
                sample_interval: config.sample_interval(),
                ..CollectorConfig::default()
            });
            if let Err(e) = collector.start() {
                eprintln!("Error starting collector: {e}");
                std::process::exit(1);
            }
            let receiver = collector.receiver().clone();
            simulated = Some(collector);
            receiver
        }
    };

    println!("Recording {duration_secs}s ECG for {name}...");
    println!("Press Ctrl+C to cancel");
    println!();

    let session = RecordingSession::new(&store, audit.as_ref(), session_secs);
    let result = session.run(NewPatient { name, age, gender }, &receiver, timeout, &cancel);

    if let Some(mut collector) = simulated {
        collector.stop();
    }
    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save audit log: {e}");
    }

    match result {
        Ok(outcome) => {
            let tz = timezone(&config);
            println!(
                "{}",
                render_report(&outcome.report, ReportView::Patient, tz)
            );
            println!("Report saved: {}", outcome.report.id);
            println!(
                "Run `ecg-report show {} --view doctor` for the clinical report.",
                outcome.report.id
            );
        }
        Err(SessionError::Cancelled) => {
            println!("Recording cancelled. The report was marked as failed.");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Errors raised while preparing a frame file for recording.
#[derive(Debug, thiserror::Error)]
enum FeedError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Collector(#[from] CollectorError),
}

/// Stream hex frames from `path` through a [`FrameCollector`].
fn spawn_frame_feed(path: &Path, interval_ms: u64) -> Result<Receiver<Sample>, FeedError> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();

    let mut collector = FrameCollector::new();
    collector.start()?;
    let receiver = collector.receiver().clone();
    let start_ms = Utc::now().timestamp_millis();

    thread::spawn(move || {
        for (i, line) in lines.iter().enumerate() {
            let timestamp = start_ms + (i as i64) * interval_ms as i64;
            let pushed =
                parse_hex_frame(line).and_then(|bytes| collector.push_frame(&bytes, timestamp));
            if let Err(e) = pushed {
                tracing::warn!("Skipping frame {}: {e}", i + 1);
            }
        }
        collector.close();
    });

    Ok(receiver)
}

fn cmd_analyze(input: &Path, age: u32, gender: Gender) {
    let content = match std::fs::read_to_string(input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {input:?}: {e}");
            std::process::exit(1);
        }
    };

    let samples: Vec<Sample> = match serde_json::from_str(&content) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("Error parsing samples: {e}");
            std::process::exit(1);
        }
    };

    let analysis = analyze(&samples, PatientContext::new(age, gender));
    match serde_json::to_string_pretty(&analysis) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing analysis: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_reports() {
    let config = load_config();
    let store = open_store(&config);
    let tz = timezone(&config);

    let reports = match store.list_reports() {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error loading reports: {e}");
            std::process::exit(1);
        }
    };

    if reports.is_empty() {
        println!("No reports found.");
        println!("Run 'ecg-report record' to create one.");
        return;
    }

    println!("ECG Reports");
    println!("===========");
    println!();
    for report in &reports {
        let patient = report
            .patient
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("Unknown");
        let heart_rate = report
            .heart_rate
            .map(|hr| format!("{hr} bpm"))
            .unwrap_or_else(|| "-".to_string());
        let risk = report
            .risk_level
            .map(|r| r.badge().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:<20}  {:>8}  {:<12}  {}",
            report.id,
            report.created_at.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            patient,
            heart_rate,
            risk,
            report.status
        );
    }
}

fn cmd_show(id: &str, view: ReportView) {
    let id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Error: '{id}' is not a valid report id");
            std::process::exit(1);
        }
    };

    let config = load_config();
    let store = open_store(&config);
    match store.get_report(id) {
        Ok(report) => println!("{}", render_report(&report, view, timezone(&config))),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_patients() {
    let config = load_config();
    let store = open_store(&config);

    let patients = match store.list_patients() {
        Ok(patients) => patients,
        Err(e) => {
            eprintln!("Error loading patients: {e}");
            std::process::exit(1);
        }
    };

    if patients.is_empty() {
        println!("No patients found.");
        return;
    }

    println!("Patients");
    println!("========");
    println!();
    for patient in &patients {
        println!(
            "{}  {:<20}  {:>3}  {}",
            patient.id, patient.name, patient.age, patient.gender
        );
    }
}

fn cmd_status() {
    let config = load_config();

    println!("ECG Report Agent Status");
    println!("=======================");
    println!();

    // Show config
    println!("Configuration:");
    println!("  Operator: {}", config.user_id);
    println!(
        "  Recording duration: {}s",
        config.recording_duration.as_secs()
    );
    println!("  Sample interval: {}ms", config.sample_interval_ms);
    println!("  Store: {:?}", config.store_path());
    println!();

    let store = open_store(&config);
    match store.list_reports() {
        Ok(reports) => {
            let count =
                |status: ReportStatus| reports.iter().filter(|r| r.status == status).count();
            println!("Stored Reports:");
            println!("  Completed: {}", count(ReportStatus::Completed));
            println!("  Recording: {}", count(ReportStatus::Recording));
            println!("  Failed: {}", count(ReportStatus::Failed));
            println!();
        }
        Err(e) => {
            eprintln!("Warning: Could not read store: {e}");
        }
    }

    // Load and show audit stats if available
    if config.audit_path().exists() {
        let audit = create_shared_log_with_persistence(config.audit_path());
        println!("{}", audit.summary());
    } else {
        println!("No previous recording data found.");
    }
}

fn cmd_disclaimer() {
    println!("{SCREENING_DISCLAIMER}");
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = load_config();
    let export_dir = output.unwrap_or(config.export_path.clone());
    let store = open_store(&config);

    let reports = match store.list_reports() {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error loading reports: {e}");
            std::process::exit(1);
        }
    };

    if reports.is_empty() {
        println!("No reports found.");
        println!("Run 'ecg-report record' to create one.");
        return;
    }

    println!("Total reports: {}", reports.len());

    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating {export_dir:?}: {e}");
        std::process::exit(1);
    }

    // Export based on format
    let output_path = export_dir.join(format!(
        "reports_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = reports
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        // Pretty JSON format
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    use ecg_report_agent::server::{run, ServerConfig};

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let audit = create_shared_log_with_persistence(config.audit_path());
    let server_config =
        ServerConfig::new(port, Arc::new(open_store(&config))).with_audit(audit.clone());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };

    let result: anyhow::Result<()> = runtime.block_on(async {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok(())
    });

    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save audit log: {e}");
    }
    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(cancel: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}

/// Grace period after the nominal duration before the stream is abandoned.
const RECORDING_GRACE_SECS: u64 = 5;

/// Validate a requested duration and derive the stored seconds and drain timeout.
fn recording_limits(duration_secs: u64) -> Result<(u32, Duration), String> {
    if duration_secs == 0 {
        return Err("Recording duration must be at least one second".to_string());
    }
    let secs = u32::try_from(duration_secs)
        .map_err(|_| format!("Recording duration of {duration_secs}s is too long"))?;
    let timeout = duration_secs
        .checked_add(RECORDING_GRACE_SECS)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Recording duration of {duration_secs}s is too long"))?;
    Ok((secs, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_recording_limits() {
        assert_eq!(recording_limits(30).unwrap(), (30, Duration::from_secs(35)));
        assert!(recording_limits(0).is_err());
        assert!(recording_limits(u64::from(u32::MAX) + 1).is_err());
        assert!(recording_limits(u64::MAX).is_err());
    }

    #[test]
    fn test_show_view_argument() {
        let cli = Cli::try_parse_from(["ecg-report", "show", "abc", "--view", "doctor"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Show { view: ReportView::Doctor, .. }
        ));

        let cli = Cli::try_parse_from(["ecg-report", "show", "abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Show { view: ReportView::Patient, .. }
        ));

        assert!(Cli::try_parse_from(["ecg-report", "show", "abc", "--view", "nurse"]).is_err());
        assert_eq!(ReportView::from_str("Doctor", true), Ok(ReportView::Doctor));
    }
}
