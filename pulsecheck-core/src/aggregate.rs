//! Health aggregation pass
//!
//! Every service gets its own task in a `JoinSet`, bounded by a semaphore.
//! Tasks return their result and the collector slots it by registry index,
//! so no list is shared between writers. When the pass deadline expires the
//! remaining tasks are aborted and recorded as timed out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{ProbeSettings, RegistryConfig};
use crate::error::ProbeError;
use crate::model::{Classification, HealthReport, HttpOutcome, ProbeResult, ServiceDescriptor};
use crate::probe::{NetProber, Prober};
use crate::report;

/// Probe a single service: port first, HTTP only when the port is open
pub async fn probe_service(
    prober: &dyn Prober,
    host: &str,
    service: &ServiceDescriptor,
) -> ProbeResult {
    let started = Instant::now();

    let (reachable, http_status, reason, classification) =
        match prober.check_port(host, service.port).await {
            Err(e) => (false, None, Some(e.reason()), Classification::Unreachable),
            Ok(()) => match service.health.as_deref() {
                None => (true, None, None, Classification::Healthy),
                Some(path) => match prober.check_http(host, service.port, path).await {
                    Ok(code) => (true, Some(HttpOutcome::Code(code)), None, Classification::Healthy),
                    Err(e) => {
                        let outcome = match &e {
                            ProbeError::HttpStatus(code) => HttpOutcome::Code(*code),
                            other => HttpOutcome::Error(other.reason()),
                        };
                        (true, Some(outcome), Some(e.reason()), Classification::Warning)
                    }
                },
            },
        };

    ProbeResult {
        service: service.clone(),
        reachable,
        http_status,
        reason,
        latency_ms: started.elapsed().as_millis() as u64,
        classification,
    }
}

/// Runs aggregation passes over a registry. Holds no state between passes.
pub struct Aggregator {
    host: String,
    settings: ProbeSettings,
    prober: Arc<dyn Prober>,
}

impl Aggregator {
    pub fn new(host: impl Into<String>, settings: ProbeSettings, prober: Arc<dyn Prober>) -> Self {
        Self {
            host: host.into(),
            settings,
            prober,
        }
    }

    /// Aggregator backed by real sockets, configured from the registry file
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ProbeError> {
        let prober = NetProber::from_settings(&config.probe)?;
        Ok(Self::new(
            config.host.clone(),
            config.probe.clone(),
            Arc::new(prober),
        ))
    }

    /// Probe every service and build the report. Never fails.
    pub async fn run(&self, services: &[ServiceDescriptor]) -> HealthReport {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.deadline();
        info!(services = services.len(), host = %self.host, "starting health pass");

        let limiter = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();

        for (index, service) in services.iter().cloned().enumerate() {
            let prober = Arc::clone(&self.prober);
            let limiter = Arc::clone(&limiter);
            let host = self.host.clone();
            let handle = tasks.spawn(async move {
                let _permit = limiter.acquire().await;
                (index, probe_service(prober.as_ref(), &host, &service).await)
            });
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; services.len()];

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => {
                    debug!(
                        service = %result.service.name,
                        classification = %result.classification,
                        latency_ms = result.latency_ms,
                        "probe finished"
                    );
                    slots[index] = Some(result);
                }
                Ok(Some(Err(e))) => {
                    if let Some(&index) = task_index.get(&e.id()) {
                        warn!(service = %services[index].name, error = %e, "probe task failed");
                        slots[index] = Some(ProbeResult::crashed(
                            services[index].clone(),
                            format!("probe task failed: {}", e),
                        ));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(outstanding = tasks.len(), "pass deadline expired");
                    tasks.abort_all();
                    break;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(services)
            .map(|(slot, service)| {
                slot.unwrap_or_else(|| ProbeResult::timed_out(service.clone(), elapsed_ms))
            })
            .collect();

        let report = report::build_report(results, self.settings.slow_threshold(), Utc::now());
        info!(
            healthy = report.totals.healthy,
            total = report.totals.count,
            status = %report.overall_status,
            elapsed_ms,
            "health pass complete"
        );
        report
    }
}
