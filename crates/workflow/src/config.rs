//! Workflow settings.

use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::WorkflowError;

/// What happens to the other pending offers on a listing when one of them
/// is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SiblingOfferPolicy {
    /// Siblings stay pending. New offers are already blocked by the listing
    /// status, so they go stale; the count is logged and exported.
    #[default]
    LeavePending,
    /// Siblings are rejected in the same write as the acceptance.
    RejectSiblings,
}

impl FromStr for SiblingOfferPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leave_pending" => Ok(Self::LeavePending),
            "reject" | "reject_siblings" => Ok(Self::RejectSiblings),
            other => Err(format!("unknown sibling offer policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub sibling_policy: SiblingOfferPolicy,
    /// Upper bound on a single workflow call, store round-trips included.
    pub operation_timeout: Duration,
    /// Retries after a sibling offer changed under an acceptance.
    pub max_conflict_retries: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            sibling_policy: SiblingOfferPolicy::default(),
            operation_timeout: Duration::from_secs(5),
            max_conflict_retries: 3,
        }
    }
}

impl WorkflowConfig {
    pub fn with_sibling_policy(mut self, policy: SiblingOfferPolicy) -> Self {
        self.sibling_policy = policy;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Runs one workflow operation under the configured timeout and records
    /// its duration.
    ///
    /// A store commit either lands completely or not at all, so abandoning
    /// the future on timeout never leaves a partial transition behind.
    pub(crate) async fn bounded<T, F>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, WorkflowError>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.operation_timeout, "workflow operation timed out");
                metrics::counter!("workflow_timeouts_total", "operation" => operation).increment(1);
                Err(WorkflowError::Timeout(self.operation_timeout))
            }
        };
        metrics::histogram!("workflow_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sibling_policy() {
        assert_eq!(
            "leave_pending".parse::<SiblingOfferPolicy>().unwrap(),
            SiblingOfferPolicy::LeavePending
        );
        assert_eq!(
            "REJECT".parse::<SiblingOfferPolicy>().unwrap(),
            SiblingOfferPolicy::RejectSiblings
        );
        assert!("sometimes".parse::<SiblingOfferPolicy>().is_err());
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let config = WorkflowConfig::default().with_operation_timeout(Duration::from_millis(10));
        let result: Result<(), _> = config
            .bounded("test", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(WorkflowError::Timeout(_))));
    }

    #[tokio::test]
    async fn bounded_passes_result_through() {
        let config = WorkflowConfig::default();
        let value = config.bounded("test", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
