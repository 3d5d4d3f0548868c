//! Approval coordinator — decides when human sign-off is needed and waits
//! for it under a dedicated deadline.
//!
//! The approval wait has its own timeout, independent of the execution
//! timeout: a slow reviewer must not eat into the command's running time,
//! and an expired wait is indistinguishable from an explicit denial.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use execgate_core::{ApprovalHandler, ApprovalRequest, RiskLevel};

/// Coordinates the injected approval capability.
pub struct ApprovalCoordinator {
    handler: Arc<dyn ApprovalHandler>,
    timeout: Duration,
    threshold: RiskLevel,
}

impl ApprovalCoordinator {
    pub fn new(handler: Arc<dyn ApprovalHandler>, timeout: Duration) -> Self {
        Self {
            handler,
            timeout,
            threshold: RiskLevel::High,
        }
    }

    /// Approval is required at or above the threshold, or when forced.
    pub fn requires_approval(&self, risk: RiskLevel, force: bool) -> bool {
        force || risk >= self.threshold
    }

    /// Ask the handler for a verdict, bounded by the approval deadline.
    ///
    /// Fail-closed throughout: handler absence is modeled as `DenyAll` at
    /// construction, and deadline expiry returns `false` like any denial.
    pub async fn request(&self, request: ApprovalRequest) -> bool {
        let command = request.command.clone();
        match tokio::time::timeout(self.timeout, self.handler.handle(request)).await {
            Ok(approved) => {
                info!(command = %command, approved, "Approval verdict received");
                approved
            }
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "Approval request timed out; treating as denial"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use execgate_core::{DenyAll, StaticApproval};

    fn request() -> ApprovalRequest {
        ApprovalRequest::new(
            "rm file.txt",
            RiskLevel::High,
            vec!["High-risk command: rm".into()],
        )
    }

    #[test]
    fn threshold_is_high_or_above() {
        let c = ApprovalCoordinator::new(Arc::new(DenyAll), Duration::from_secs(1));
        assert!(!c.requires_approval(RiskLevel::Safe, false));
        assert!(!c.requires_approval(RiskLevel::Moderate, false));
        assert!(c.requires_approval(RiskLevel::High, false));
        assert!(c.requires_approval(RiskLevel::Critical, false));
    }

    #[test]
    fn force_overrides_low_risk() {
        let c = ApprovalCoordinator::new(Arc::new(DenyAll), Duration::from_secs(1));
        assert!(c.requires_approval(RiskLevel::Safe, true));
    }

    #[tokio::test]
    async fn deny_all_fails_closed() {
        let c = ApprovalCoordinator::new(Arc::new(DenyAll), Duration::from_secs(1));
        assert!(!c.request(request()).await);
    }

    #[tokio::test]
    async fn granted_approval_passes_through() {
        let c = ApprovalCoordinator::new(Arc::new(StaticApproval(true)), Duration::from_secs(1));
        assert!(c.request(request()).await);
    }

    struct NeverAnswers;

    #[async_trait]
    impl ApprovalHandler for NeverAnswers {
        async fn handle(&self, _request: ApprovalRequest) -> bool {
            futures_never().await
        }
    }

    async fn futures_never() -> bool {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    #[tokio::test]
    async fn expired_wait_is_denial() {
        let c = ApprovalCoordinator::new(Arc::new(NeverAnswers), Duration::from_millis(50));
        assert!(!c.request(request()).await);
    }
}
