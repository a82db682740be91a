//! Report rollup and persistence
//!
//! The rollup turns per-service results into totals, a percentage and an
//! overall status. `ReportStore` keeps a "latest" file that is overwritten on
//! every run plus one append-only JSON Lines archive per day.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ReportError;
use crate::model::{
    Classification, HealthReport, OverallStatus, Priority, ProbeResult, Recommendation,
    RecommendationKind, Totals,
};

pub const LATEST_FILE_NAME: &str = "health-report.json";

pub fn totals(results: &[ProbeResult]) -> Totals {
    let mut totals = Totals {
        count: results.len(),
        ..Totals::default()
    };
    for result in results {
        match result.classification {
            Classification::Healthy => totals.healthy += 1,
            Classification::Warning => totals.warning += 1,
            Classification::Unreachable | Classification::Unknown => totals.unhealthy += 1,
        }
    }
    totals
}

/// `round(100 * healthy / count)` with halves rounded up; 0 for an empty registry
pub fn health_percentage(totals: &Totals) -> u8 {
    if totals.count == 0 {
        return 0;
    }
    let healthy = totals.healthy.min(totals.count);
    let pct = (200 * healthy + totals.count) / (2 * totals.count);
    pct.min(100) as u8
}

pub fn overall_status(totals: &Totals, percentage: u8) -> OverallStatus {
    if totals.count == 0 {
        return OverallStatus::NoServices;
    }
    // Rounding can reach 100 with one unhealthy service in a large registry
    if totals.healthy == totals.count {
        return OverallStatus::FullyOperational;
    }
    match percentage {
        90.. => OverallStatus::MostlyOperational,
        70..=89 => OverallStatus::PartiallyOperational,
        _ => OverallStatus::NeedsAttention,
    }
}

/// Advisory pass over the results. Pure and infallible.
pub fn recommendations(results: &[ProbeResult], slow_threshold: Duration) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let unreachable: Vec<&ProbeResult> = results
        .iter()
        .filter(|r| {
            matches!(
                r.classification,
                Classification::Unreachable | Classification::Unknown
            )
        })
        .collect();

    for result in unreachable.iter().filter(|r| r.service.install_hint.is_some()) {
        out.push(Recommendation {
            kind: RecommendationKind::Dependencies,
            priority: Priority::High,
            message: format!(
                "{} is not reachable on port {}; its dependencies may not be installed",
                result.service.name, result.service.port
            ),
            command: result.service.install_hint.clone(),
            services: vec![result.service.name.clone()],
        });
    }

    let down: Vec<String> = unreachable
        .iter()
        .filter(|r| r.service.install_hint.is_none())
        .map(|r| r.service.name.clone())
        .collect();
    if !down.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::Connectivity,
            priority: Priority::Critical,
            message: format!("Start or reconnect {} unreachable service(s)", down.len()),
            command: None,
            services: down,
        });
    }

    let degraded: Vec<String> = results
        .iter()
        .filter(|r| r.classification == Classification::Warning)
        .map(|r| r.service.name.clone())
        .collect();
    if !degraded.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::Degraded,
            priority: Priority::Medium,
            message: format!(
                "Inspect {} service(s) whose health endpoint is failing",
                degraded.len()
            ),
            command: None,
            services: degraded,
        });
    }

    let threshold_ms = slow_threshold.as_millis() as u64;
    let slow: Vec<String> = results
        .iter()
        .filter(|r| r.reachable && r.latency_ms > threshold_ms)
        .map(|r| r.service.name.clone())
        .collect();
    if !slow.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::Performance,
            priority: Priority::Medium,
            message: format!("Optimize {} slow-responding service(s)", slow.len()),
            command: None,
            services: slow,
        });
    }

    out.sort_by_key(|r| r.priority);
    out
}

/// Assemble a report from results already in registry order
pub fn build_report(
    results: Vec<ProbeResult>,
    slow_threshold: Duration,
    timestamp: DateTime<Utc>,
) -> HealthReport {
    let totals = totals(&results);
    let health_percentage = health_percentage(&totals);
    let overall_status = overall_status(&totals, health_percentage);
    let recommendations = recommendations(&results, slow_threshold);

    HealthReport {
        timestamp,
        results,
        totals,
        health_percentage,
        overall_status,
        recommendations,
    }
}

/// Paths written by one `ReportStore::save`
#[derive(Clone, Debug)]
pub struct SavedReport {
    pub latest: PathBuf,
    pub archive: PathBuf,
}

/// Directory-backed report history
#[derive(Clone, Debug)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE_NAME)
    }

    pub fn archive_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("health-report-{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Overwrite the latest report and append it to the day's archive
    pub fn save(&self, report: &HealthReport) -> Result<SavedReport, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReportError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let latest = self.latest_path();
        let pretty = serde_json::to_string_pretty(report)?;
        fs::write(&latest, pretty).map_err(|source| ReportError::Io {
            path: latest.clone(),
            source,
        })?;

        let archive = self.archive_path(report.timestamp.date_naive());
        let mut line = serde_json::to_string(report)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&archive)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| ReportError::Io {
                path: archive.clone(),
                source,
            })?;

        Ok(SavedReport { latest, archive })
    }

    pub fn load_latest(&self) -> Result<HealthReport, ReportError> {
        let path = self.latest_path();
        let content = fs::read_to_string(&path).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpOutcome, ServiceDescriptor};

    fn result(name: &str, classification: Classification) -> ProbeResult {
        ProbeResult {
            service: ServiceDescriptor::new(name, 8080),
            reachable: classification != Classification::Unreachable,
            http_status: None,
            reason: None,
            latency_ms: 5,
            classification,
        }
    }

    fn counts(count: usize, healthy: usize) -> Totals {
        Totals {
            count,
            healthy,
            warning: 0,
            unhealthy: count - healthy,
        }
    }

    #[test]
    fn test_health_percentage_rounding() {
        assert_eq!(health_percentage(&counts(3, 2)), 67);
        assert_eq!(health_percentage(&counts(3, 1)), 33);
        assert_eq!(health_percentage(&counts(8, 1)), 13);
        assert_eq!(health_percentage(&counts(4, 4)), 100);
        assert_eq!(health_percentage(&counts(4, 0)), 0);
        assert_eq!(health_percentage(&counts(0, 0)), 0);
    }

    #[test]
    fn test_health_percentage_bounds() {
        for count in 1..=40 {
            for healthy in 0..=count {
                let pct = health_percentage(&counts(count, healthy));
                let expected = (100.0 * healthy as f64 / count as f64).round() as u8;
                assert_eq!(pct, expected, "{}/{}", healthy, count);
                assert!(pct <= 100);
            }
        }
    }

    #[test]
    fn test_overall_status_thresholds() {
        let status = |count, healthy| {
            let t = counts(count, healthy);
            overall_status(&t, health_percentage(&t))
        };
        assert_eq!(status(0, 0), OverallStatus::NoServices);
        assert_eq!(status(5, 5), OverallStatus::FullyOperational);
        assert_eq!(status(10, 9), OverallStatus::MostlyOperational);
        assert_eq!(status(200, 199), OverallStatus::MostlyOperational);
        assert_eq!(status(10, 7), OverallStatus::PartiallyOperational);
        assert_eq!(status(3, 2), OverallStatus::NeedsAttention);
        assert_eq!(status(10, 6), OverallStatus::NeedsAttention);
    }

    #[test]
    fn test_totals_buckets() {
        let results = vec![
            result("a", Classification::Healthy),
            result("b", Classification::Warning),
            result("c", Classification::Unreachable),
            result("d", Classification::Unknown),
        ];
        let t = totals(&results);
        assert_eq!(t.count, 4);
        assert_eq!(t.healthy, 1);
        assert_eq!(t.warning, 1);
        assert_eq!(t.unhealthy, 2);
    }

    #[test]
    fn test_recommendations() {
        let mut db = result("postgres", Classification::Unreachable);
        db.service = db.service.with_install_hint("brew install postgresql");
        let mut slow = result("search", Classification::Healthy);
        slow.latency_ms = 1500;
        let results = vec![
            db,
            result("api", Classification::Unreachable),
            result("worker", Classification::Warning),
            slow,
            result("cache", Classification::Healthy),
        ];

        let recs = recommendations(&results, Duration::from_millis(1000));
        let kinds: Vec<_> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::Connectivity,
                RecommendationKind::Dependencies,
                RecommendationKind::Degraded,
                RecommendationKind::Performance,
            ]
        );
        assert_eq!(recs[0].services, vec!["api"]);
        assert_eq!(recs[1].command.as_deref(), Some("brew install postgresql"));
        assert_eq!(recs[3].services, vec!["search"]);
    }

    #[test]
    fn test_recommendations_empty_when_all_healthy() {
        let results = vec![result("a", Classification::Healthy)];
        assert!(recommendations(&results, Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_store_latest_matches_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("monitoring"));

        let mut warn = result("api", Classification::Warning);
        warn.http_status = Some(HttpOutcome::Code(500));
        warn.reason = Some("500".into());
        let report = build_report(
            vec![result("db", Classification::Healthy), warn],
            Duration::from_secs(1),
            Utc::now(),
        );

        let saved = store.save(&report).unwrap();
        assert_eq!(saved.latest, store.latest_path());
        assert_eq!(store.load_latest().unwrap(), report);
    }

    #[test]
    fn test_store_latest_keeps_float_metadata_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());

        let mut weighted = result("search", Classification::Healthy);
        for (key, value) in [
            ("weight", 1.0715660391465826e-75),
            ("budget", -1.603964615428183e143),
            ("ratio", 0.1 + 0.2),
        ] {
            weighted
                .service
                .metadata
                .insert(key.into(), serde_json::json!(value));
        }
        let report = build_report(vec![weighted], Duration::from_secs(1), Utc::now());

        store.save(&report).unwrap();
        assert_eq!(store.load_latest().unwrap(), report);
    }

    #[test]
    fn test_store_archive_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let report = build_report(Vec::new(), Duration::from_secs(1), Utc::now());

        let first = store.save(&report).unwrap();
        let second = store.save(&report).unwrap();
        assert_eq!(first.archive, second.archive);

        let archive = fs::read_to_string(&second.archive).unwrap();
        let lines: Vec<&str> = archive.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: HealthReport = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_store_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let store = ReportStore::new(&blocker);
        let report = build_report(Vec::new(), Duration::from_secs(1), Utc::now());
        assert!(matches!(store.save(&report), Err(ReportError::Io { .. })));
    }
}
