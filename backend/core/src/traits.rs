use async_trait::async_trait;

use crate::types::ApprovalRequest;

/// The injected human-approval capability.
///
/// The gatekeeper treats this purely as a dependency and assumes no
/// particular transport — a TUI prompt, a message queue, a socket client.
/// Implementations return `true` to approve, `false` to deny.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn handle(&self, request: ApprovalRequest) -> bool;
}

/// Fail-closed default: every request is denied.
///
/// Absence of a reviewer is never implicit consent, so this is the handler
/// a `Gatekeeper` gets unless the caller installs a real one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ApprovalHandler for DenyAll {
    async fn handle(&self, _request: ApprovalRequest) -> bool {
        false
    }
}

/// Handler with a fixed verdict. Used by the CLI `--yes`/`--no` flags and
/// by tests that need a deterministic reviewer.
#[derive(Debug, Clone, Copy)]
pub struct StaticApproval(pub bool);

#[async_trait]
impl ApprovalHandler for StaticApproval {
    async fn handle(&self, _request: ApprovalRequest) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;

    #[tokio::test]
    async fn deny_all_denies() {
        let handler = DenyAll;
        let req = ApprovalRequest::new("rm file.txt", RiskLevel::High, vec![]);
        assert!(!handler.handle(req).await);
    }

    #[tokio::test]
    async fn static_approval_returns_verdict() {
        let req = ApprovalRequest::new("rm file.txt", RiskLevel::High, vec![]);
        assert!(StaticApproval(true).handle(req.clone()).await);
        assert!(!StaticApproval(false).handle(req).await);
    }
}
