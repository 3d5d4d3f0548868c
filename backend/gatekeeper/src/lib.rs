//! Risk-tiered command execution gatekeeper.
//!
//! One invocation flows classify → approve → (sandbox) → run → audit.
//! Every expected failure mode — forbidden pattern, denied approval,
//! deadline expiry, subprocess fault — comes back as an [`ExecutionOutcome`]
//! value; the only propagating errors are configuration faults at startup.

pub mod approval;
pub mod classifier;
pub mod config;
pub mod exec;
pub mod history;
pub mod policy;
pub mod sandbox;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use execgate_core::{
    ApprovalHandler, ApprovalRequest, AuditRecord, Classification, DenyAll, ExecStatus,
    ExecutionOutcome, GateError, RiskLevel, SecurityContext,
};

pub use approval::ApprovalCoordinator;
pub use classifier::classify;
pub use config::GatekeeperConfig;
pub use exec::{Invocation, RawExec, FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
pub use history::AuditHistory;
pub use policy::{Policy, PolicyFile};
pub use sandbox::{SandboxConfig, SandboxExecutor};

/// The gatekeeper: owns the policy, the approval coordinator, the sandbox
/// rewriter, and the audit ring. Invocations are independent tasks; the
/// audit ring is the only shared mutable state.
pub struct Gatekeeper {
    config: GatekeeperConfig,
    policy: Arc<Policy>,
    approvals: ApprovalCoordinator,
    sandbox: SandboxExecutor,
    history: AuditHistory,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    /// Gatekeeper with the built-in policy and the fail-closed `DenyAll`
    /// reviewer. High-risk commands will be denied until a real handler is
    /// installed — that is the point.
    pub fn new(config: GatekeeperConfig) -> Self {
        Self::with_handler(config, Arc::new(DenyAll))
    }

    /// Gatekeeper with an injected approval capability.
    pub fn with_handler(config: GatekeeperConfig, handler: Arc<dyn ApprovalHandler>) -> Self {
        let approvals = ApprovalCoordinator::new(
            handler,
            Duration::from_secs(config.approval_timeout_secs),
        );
        let sandbox = SandboxExecutor::new(config.sandbox.clone());
        let history = AuditHistory::new(config.history_capacity);
        Self {
            policy: Arc::new(Policy::builtin()),
            config,
            approvals,
            sandbox,
            history,
        }
    }

    /// Full startup path: applies the policy overlay named in the config and
    /// probes the sandbox runtime when sandboxing is on. Both failures are
    /// deployment defects and propagate as [`GateError`].
    pub async fn from_config(
        config: GatekeeperConfig,
        handler: Arc<dyn ApprovalHandler>,
    ) -> Result<Self, GateError> {
        let policy = match &config.policy_file {
            Some(path) => Policy::load(path).await?,
            None => Policy::builtin(),
        };
        let gatekeeper = Self::with_handler(config, handler).with_policy(policy);
        if gatekeeper.config.sandbox_enabled {
            gatekeeper.sandbox.probe_runtime().await?;
        }
        Ok(gatekeeper)
    }

    /// Replace the policy (builder style, pre-flight only — the policy is
    /// immutable once invocations start).
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Classify without executing.
    pub fn classify_only(&self, command: &str) -> Classification {
        classifier::classify(command, &self.policy)
    }

    /// The top-level operation: classify, gate, optionally sandbox, run,
    /// audit. Exactly one outcome and one audit record per call.
    pub async fn execute(&self, command: &str, force_approval: bool) -> ExecutionOutcome {
        let classification = self.classify_only(command);
        info!(
            command = %command,
            risk = %classification.risk,
            "Command classified"
        );
        let mut security = SecurityContext::from_classification(&classification);

        // BLOCKED: forbidden tier is terminal, nothing is ever spawned.
        if classification.risk == RiskLevel::Forbidden {
            warn!(command = %command, reasons = ?classification.reasons, "Command blocked by policy");
            return self.finish(command, ExecutionOutcome::blocked(security)).await;
        }

        // APPROVAL_PENDING → DENIED | APPROVED.
        if self
            .approvals
            .requires_approval(classification.risk, force_approval)
        {
            let request = ApprovalRequest::new(
                command,
                classification.risk,
                classification.reasons.clone(),
            );
            if !self.approvals.request(request).await {
                return self
                    .finish(command, ExecutionOutcome::denied(security, "Approval denied"))
                    .await;
            }
            security.approved = true;
        }

        // DIRECT | SANDBOXED.
        let invocation = if self.config.sandbox_enabled
            && classification.risk >= self.config.sandbox_threshold
        {
            security.sandboxed = true;
            Invocation::Argv(self.sandbox.wrap(command))
        } else {
            Invocation::Shell(command.to_string())
        };

        // RUNNING → SUCCESS | TIMEOUT | ERROR.
        let raw = exec::run(
            &invocation,
            Duration::from_secs(self.config.exec_timeout_secs),
            self.config.max_output_bytes,
        )
        .await;

        let status = if raw.timed_out {
            security.timed_out = true;
            ExecStatus::Timeout
        } else if raw.errored {
            ExecStatus::Error
        } else {
            ExecStatus::Success
        };

        let outcome = ExecutionOutcome {
            status,
            stdout: raw.stdout,
            stderr: raw.stderr,
            return_code: raw.exit_code,
            security,
        };
        self.finish(command, outcome).await
    }

    /// Audit history, newest first.
    pub async fn history(&self, limit: usize) -> Vec<AuditRecord> {
        self.history.recent(limit).await
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    /// Startup probe for callers that enable sandboxing after construction.
    pub async fn check_sandbox(&self) -> Result<(), GateError> {
        self.sandbox.probe_runtime().await
    }

    async fn finish(&self, command: &str, outcome: ExecutionOutcome) -> ExecutionOutcome {
        let record = self.history.append(command, outcome).await;
        info!(
            seq = record.seq,
            status = %record.outcome.status,
            return_code = record.outcome.return_code,
            "Invocation recorded"
        );
        record.outcome
    }
}
