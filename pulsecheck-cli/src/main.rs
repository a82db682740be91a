mod summary;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulsecheck_core::aggregate::Aggregator;
use pulsecheck_core::config::RegistryConfig;
use pulsecheck_core::error::ConfigError;
use pulsecheck_core::model::{HealthReport, OverallStatus};
use pulsecheck_core::report::ReportStore;

/// Exit code for fully or mostly operational runs
const EXIT_OK: u8 = 0;
/// Exit code for runs that finished but are not operational
const EXIT_UNHEALTHY: u8 = 1;
/// Exit code for runs that could not start (bad or missing registry)
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "pulsecheck")]
#[command(about = "Probe every registered service once and report overall health", long_about = None)]
struct Cli {
    /// Root directory for the registry file and relative report paths
    #[arg(long, env = "PULSECHECK_ROOT")]
    root: Option<PathBuf>,

    /// Registry file to load instead of searching the root
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also append log lines to this file (relative to the root)
    #[arg(long, env = "PULSECHECK_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Do not write report files
    #[arg(long)]
    no_save: bool,

    /// Print the report as JSON instead of the colored summary
    #[arg(long)]
    json: bool,
}

/// Plain-text log layer appending to `file`
fn file_log_layer<S>(
    file: File,
) -> tracing_subscriber::fmt::Layer<S, DefaultFields, Format, Arc<File>> {
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(file))
}

fn init_logging(log_file: Option<File>) {
    // Logs go to stderr; stdout carries the summary or JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulsecheck=info,pulsecheck_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log_file.map(file_log_layer))
        .init();
}

fn open_log_file(root: &Path, path: &Path) -> std::io::Result<File> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match cli_root {
        Some(root) => Ok(root),
        None => std::env::current_dir().map_err(|source| ConfigError::Io {
            path: PathBuf::from("."),
            source,
        }),
    }
}

fn load_registry(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<(PathBuf, RegistryConfig), ConfigError> {
    match explicit {
        Some(path) => {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            let config = RegistryConfig::load(&path)?;
            Ok((path, config))
        }
        None => RegistryConfig::discover(root),
    }
}

/// Process exit status for a finished pass
fn exit_status(status: OverallStatus) -> u8 {
    if status.is_operational() {
        EXIT_OK
    } else {
        EXIT_UNHEALTHY
    }
}

/// Save the report (when a store is given) and render the console output.
/// A failed save is logged and the output is still produced.
fn persist_and_render(report: &HealthReport, store: Option<&ReportStore>, json: bool) -> String {
    let mut saved_to = None;
    if let Some(store) = store {
        match store.save(report) {
            Ok(saved) => {
                info!(latest = %saved.latest.display(), archive = %saved.archive.display(), "report saved");
                saved_to = Some(saved.latest);
            }
            Err(e) => warn!(error = %e, "failed to save report"),
        }
    }

    if json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => return format!("{}\n", json),
            Err(e) => warn!(error = %e, "failed to encode report, falling back to summary"),
        }
    }
    summary::render(report, saved_to.as_deref())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = match resolve_root(cli.root.clone()) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let log_file = match cli.log_file.as_deref() {
        Some(path) => match open_log_file(&root, path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };
    init_logging(log_file);

    let (config_path, config) = match load_registry(&root, cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(error = %e, "failed to load service registry");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(path = %config_path.display(), services = config.services.len(), "loaded registry");

    let aggregator = match Aggregator::from_config(&config) {
        Ok(aggregator) => aggregator,
        Err(e) => {
            error!(error = %e, "failed to initialise probes");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let report = aggregator.run(&config.descriptors()).await;

    let store = (!cli.no_save).then(|| ReportStore::new(config.report_dir(&root)));
    print!("{}", persist_and_render(&report, store.as_ref(), cli.json));

    ExitCode::from(exit_status(report.overall_status))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use pulsecheck_core::model::{Classification, ProbeResult, ServiceDescriptor};
    use pulsecheck_core::report::build_report;
    use tracing_subscriber::Registry;

    use super::*;

    fn report_with(classifications: &[Classification]) -> HealthReport {
        let results = classifications
            .iter()
            .enumerate()
            .map(|(i, &classification)| ProbeResult {
                service: ServiceDescriptor::new(format!("svc-{}", i), 8000 + i as u16),
                reachable: classification != Classification::Unreachable,
                http_status: None,
                reason: None,
                latency_ms: 1,
                classification,
            })
            .collect();
        build_report(results, Duration::from_secs(1), Utc::now())
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["pulsecheck"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.no_save);
        assert!(!cli.json);
    }

    #[test]
    fn test_exit_status_per_overall_status() {
        assert_eq!(exit_status(OverallStatus::FullyOperational), 0);
        assert_eq!(exit_status(OverallStatus::MostlyOperational), 0);
        assert_eq!(exit_status(OverallStatus::PartiallyOperational), 1);
        assert_eq!(exit_status(OverallStatus::NeedsAttention), 1);
        assert_eq!(exit_status(OverallStatus::NoServices), 1);
        assert_ne!(EXIT_CONFIG, EXIT_OK);
        assert_ne!(EXIT_CONFIG, EXIT_UNHEALTHY);
    }

    #[test]
    fn test_exit_status_from_reports() {
        let healthy = report_with(&[Classification::Healthy; 3]);
        assert_eq!(exit_status(healthy.overall_status), 0);

        let mut mostly = vec![Classification::Healthy; 9];
        mostly.push(Classification::Unreachable);
        assert_eq!(exit_status(report_with(&mostly).overall_status), 0);

        let mixed = report_with(&[
            Classification::Healthy,
            Classification::Healthy,
            Classification::Unreachable,
        ]);
        assert_eq!(exit_status(mixed.overall_status), 1);

        assert_eq!(exit_status(report_with(&[]).overall_status), 1);
    }

    #[test]
    fn test_unwritable_report_dir_still_renders_summary() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("monitoring");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ReportStore::new(&blocker);
        let report = report_with(&[Classification::Healthy, Classification::Warning]);

        let output = persist_and_render(&report, Some(&store), false);
        assert!(output.contains("SERVICE HEALTH REPORT"));
        assert!(output.contains("svc-1: warning"));
        assert!(!output.contains("Report saved"));
    }

    #[test]
    fn test_persist_and_render_saves_and_prints_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let report = report_with(&[Classification::Healthy]);

        let output = persist_and_render(&report, Some(&store), true);
        let printed: HealthReport = serde_json::from_str(&output).unwrap();
        assert_eq!(printed, report);
        assert_eq!(store.load_latest().unwrap(), report);
    }

    #[test]
    fn test_file_log_layer_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = Path::new("logs/pulsecheck.log");

        for message in ["first run", "second run"] {
            let file = open_log_file(dir.path(), path).unwrap();
            let subscriber = Registry::default().with(file_log_layer(file));
            tracing::subscriber::with_default(subscriber, || info!("{}", message));
        }

        let content = std::fs::read_to_string(dir.path().join(path)).unwrap();
        assert!(content.contains("first run"));
        assert!(content.contains("second run"));
        assert!(!content.contains("\x1b["));
    }

    #[test]
    fn test_load_registry_relative_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("services.yaml"),
            "services:\n  - { name: api, port: 8080, health: /health }\n",
        )
        .unwrap();

        let (path, config) = load_registry(dir.path(), Some(Path::new("services.yaml"))).unwrap();
        assert_eq!(path, dir.path().join("services.yaml"));
        assert_eq!(config.descriptors()[0].name, "api");
    }

    #[test]
    fn test_load_registry_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_registry(dir.path(), None);
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }
}
