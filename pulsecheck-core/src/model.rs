//! Data model shared by the prober, aggregator and report store

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ServiceName = String;

/// Static description of one service and how to probe it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    pub group: String,
    pub port: u16,
    /// HTTP health path; `None` means a reachable port is enough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    /// Command that installs whatever the service depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_hint: Option<String>,
    /// Opaque weight/tag data, carried through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            group: "default".into(),
            port,
            health: None,
            install_hint: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_health(mut self, path: impl Into<String>) -> Self {
        self.health = Some(path.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_install_hint(mut self, hint: impl Into<String>) -> Self {
        self.install_hint = Some(hint.into());
        self
    }
}

/// Per-service outcome label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Healthy,
    /// Port is open but the HTTP health check failed
    Warning,
    Unreachable,
    /// The probe itself crashed
    Unknown,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Healthy => "healthy",
            Classification::Warning => "warning",
            Classification::Unreachable => "unreachable",
            Classification::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the HTTP health probe saw: a status code or an error message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HttpOutcome {
    Code(u16),
    Error(String),
}

/// Result of probing one service during one pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub service: ServiceDescriptor,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<HttpOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub latency_ms: u64,
    pub classification: Classification,
}

impl ProbeResult {
    /// Result for a probe that never finished before the pass deadline
    pub fn timed_out(service: ServiceDescriptor, latency_ms: u64) -> Self {
        Self {
            service,
            reachable: false,
            http_status: None,
            reason: Some("timeout".into()),
            latency_ms,
            classification: Classification::Unreachable,
        }
    }

    /// Result for a probe task that panicked
    pub fn crashed(service: ServiceDescriptor, message: impl Into<String>) -> Self {
        Self {
            service,
            reachable: false,
            http_status: None,
            reason: Some(message.into()),
            latency_ms: 0,
            classification: Classification::Unknown,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.classification == Classification::Healthy
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub count: usize,
    pub healthy: usize,
    pub warning: usize,
    /// Unreachable and unknown services
    pub unhealthy: usize,
}

/// Rollup label for the whole registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    FullyOperational,
    MostlyOperational,
    PartiallyOperational,
    NeedsAttention,
    NoServices,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::FullyOperational => "fully_operational",
            OverallStatus::MostlyOperational => "mostly_operational",
            OverallStatus::PartiallyOperational => "partially_operational",
            OverallStatus::NeedsAttention => "needs_attention",
            OverallStatus::NoServices => "no_services",
        }
    }

    /// Whether automation should treat this run as passing
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            OverallStatus::FullyOperational | OverallStatus::MostlyOperational
        )
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Dependencies,
    Connectivity,
    Degraded,
    Performance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// Advisory entry attached to a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub services: Vec<ServiceName>,
}

/// Output of one aggregation pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
    pub totals: Totals,
    pub health_percentage: u8,
    pub overall_status: OverallStatus,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}
