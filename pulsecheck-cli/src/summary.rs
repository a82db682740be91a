use std::fmt::Write;
use std::path::Path;

use pulsecheck_core::model::{
    Classification, HealthReport, HttpOutcome, OverallStatus, Priority, ProbeResult,
};

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";

fn rule() -> String {
    "=".repeat(60)
}

fn classification_style(classification: Classification) -> (&'static str, &'static str) {
    match classification {
        Classification::Healthy => ("✓", GREEN),
        Classification::Warning => ("!", YELLOW),
        Classification::Unreachable => ("✗", RED),
        Classification::Unknown => ("?", MAGENTA),
    }
}

fn status_line(status: OverallStatus) -> (&'static str, &'static str) {
    match status {
        OverallStatus::FullyOperational => ("All services healthy", GREEN),
        OverallStatus::MostlyOperational => ("Most services healthy", YELLOW),
        OverallStatus::PartiallyOperational => ("Some services need attention", YELLOW),
        OverallStatus::NeedsAttention => ("Multiple services need attention", RED),
        OverallStatus::NoServices => ("No services registered", RED),
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "critical",
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

fn result_detail(result: &ProbeResult) -> String {
    let mut detail = format!(":{}", result.service.port);
    match &result.http_status {
        Some(HttpOutcome::Code(code)) => {
            let _ = write!(detail, " HTTP {}", code);
        }
        Some(HttpOutcome::Error(_)) | None => {}
    }
    if let Some(reason) = &result.reason {
        if !matches!(&result.http_status, Some(HttpOutcome::Code(code)) if code.to_string() == *reason)
        {
            let _ = write!(detail, " ({})", reason);
        }
    }
    let _ = write!(detail, " {}ms", result.latency_ms);
    detail
}

/// Human-readable, colorized summary of one report
pub fn render(report: &HealthReport, saved_to: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}SERVICE HEALTH REPORT{}", MAGENTA, RESET);
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}Timestamp:{} {}", CYAN, RESET, report.timestamp.to_rfc3339());

    // Groups in order of first appearance in the registry
    let mut groups: Vec<&str> = Vec::new();
    for result in &report.results {
        if !groups.contains(&result.service.group.as_str()) {
            groups.push(&result.service.group);
        }
    }

    for group in groups {
        let _ = writeln!(out, "\n{}:", group);
        for result in report.results.iter().filter(|r| r.service.group == group) {
            let (icon, color) = classification_style(result.classification);
            let _ = writeln!(
                out,
                "  {}{}{} {}: {} {}",
                color,
                icon,
                RESET,
                result.service.name,
                result.classification,
                result_detail(result)
            );
        }
    }

    let totals = &report.totals;
    let _ = writeln!(out);
    let _ = writeln!(out, "{}Total:{} {}", CYAN, RESET, totals.count);
    let _ = writeln!(out, "{}Healthy:{} {}", CYAN, RESET, totals.healthy);
    let _ = writeln!(out, "{}Warning:{} {}", CYAN, RESET, totals.warning);
    let _ = writeln!(out, "{}Unhealthy:{} {}", CYAN, RESET, totals.unhealthy);
    let _ = writeln!(out, "{}Health:{} {}%", CYAN, RESET, report.health_percentage);
    let _ = writeln!(out, "{}Status:{} {}", CYAN, RESET, report.overall_status);

    let (message, color) = status_line(report.overall_status);
    let _ = writeln!(out, "\n{}{}{}", color, message, RESET);

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for rec in &report.recommendations {
            let _ = writeln!(out, "  [{}] {}", priority_label(rec.priority), rec.message);
            if !rec.services.is_empty() {
                let _ = writeln!(out, "    └─ {}", rec.services.join(", "));
            }
            if let Some(command) = &rec.command {
                let _ = writeln!(out, "    └─ run: {}", command);
            }
        }
    }

    let _ = writeln!(out, "\n{}", rule());
    if let Some(path) = saved_to {
        let _ = writeln!(out, "Report saved: {}", path.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use pulsecheck_core::model::ServiceDescriptor;
    use pulsecheck_core::report::build_report;

    use super::*;

    fn result(
        service: ServiceDescriptor,
        classification: Classification,
        http_status: Option<HttpOutcome>,
        reason: Option<&str>,
    ) -> ProbeResult {
        ProbeResult {
            service,
            reachable: classification != Classification::Unreachable,
            http_status,
            reason: reason.map(String::from),
            latency_ms: 3,
            classification,
        }
    }

    #[test]
    fn test_render_groups_and_totals() {
        let results = vec![
            result(
                ServiceDescriptor::new("api-gateway", 8080)
                    .with_group("infrastructure")
                    .with_health("/health"),
                Classification::Warning,
                Some(HttpOutcome::Code(500)),
                Some("500"),
            ),
            result(
                ServiceDescriptor::new("mcp-server", 8000).with_group("integration"),
                Classification::Unreachable,
                None,
                Some("connection refused"),
            ),
            result(
                ServiceDescriptor::new("postgres", 5432).with_group("infrastructure"),
                Classification::Healthy,
                None,
                None,
            ),
        ];
        let report = build_report(results, Duration::from_secs(1), Utc::now());
        let text = render(&report, Some(Path::new("/tmp/health-report.json")));

        let infra = text.find("infrastructure:").unwrap();
        let integration = text.find("integration:").unwrap();
        let postgres = text.find("postgres").unwrap();
        assert!(infra < postgres && postgres < integration);

        assert!(text.contains("api-gateway: warning :8080 HTTP 500 3ms"));
        assert!(text.contains("mcp-server: unreachable :8000 (connection refused) 3ms"));
        assert!(text.contains("Health:\x1b[0m 33%"));
        assert!(text.contains("needs_attention"));
        assert!(text.contains("Recommendations:"));
        assert!(text.contains("Report saved: /tmp/health-report.json"));
    }

    #[test]
    fn test_render_empty_registry() {
        let report = build_report(Vec::new(), Duration::from_secs(1), Utc::now());
        let text = render(&report, None);
        assert!(text.contains("No services registered"));
        assert!(!text.contains("Report saved"));
    }
}
