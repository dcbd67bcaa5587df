//! # Health reporting.

use std::fmt;

use async_trait::async_trait;

/// Result of a health check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        HealthStatus::Unhealthy {
            reason: reason.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Unhealthy { reason } => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// Anything that can report its health, e.g. to a readiness endpoint.
///
/// Implemented by [`SubscriptionEngine`](crate::SubscriptionEngine) so several
/// engines can be polled through one list.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Component name used in aggregated reports.
    fn component(&self) -> &str;

    async fn check_health(&self) -> HealthStatus;
}

/// Checks every component and returns the unhealthy ones.
pub async fn unhealthy_components(checks: &[&dyn HealthCheck]) -> Vec<(String, HealthStatus)> {
    let mut failing = Vec::new();
    for check in checks {
        let status = check.check_health().await;
        if !status.is_healthy() {
            failing.push((check.component().to_string(), status));
        }
    }
    failing
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, HealthStatus);

    #[async_trait]
    impl HealthCheck for Fixed {
        fn component(&self) -> &str {
            self.0
        }

        async fn check_health(&self) -> HealthStatus {
            self.1.clone()
        }
    }

    #[test]
    fn display_includes_reason() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::unhealthy("dropped").to_string(),
            "unhealthy: dropped"
        );
    }

    #[tokio::test]
    async fn aggregation_reports_only_failing_components() {
        let ok = Fixed("orders", HealthStatus::Healthy);
        let bad = Fixed("billing", HealthStatus::unhealthy("dropped"));
        let failing = unhealthy_components(&[&ok, &bad]).await;
        assert_eq!(
            failing,
            vec![("billing".to_string(), HealthStatus::unhealthy("dropped"))]
        );
    }
}
