use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered severity classification of a command.
///
/// The ordering is load-bearing: escalation rules compute `max()` over
/// levels, so a level can only ever move up, never down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Moderate,
    High,
    Critical,
    Forbidden,
}

impl RiskLevel {
    /// Serialized name, as carried in approval requests and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a single command string.
///
/// Reasons are accumulated in rule-evaluation order and never reordered;
/// they double as the audit trail explaining why a level was assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub risk: RiskLevel,
    pub reasons: Vec<String>,
}

impl Classification {
    pub fn new(risk: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            risk,
            reasons: vec![reason.into()],
        }
    }

    /// Monotonic upgrade: raises the level if `risk` is higher and appends
    /// the reason either way.
    pub fn escalate(&mut self, risk: RiskLevel, reason: impl Into<String>) {
        self.risk = self.risk.max(risk);
        self.reasons.push(reason.into());
    }
}

/// Request passed by value to the injected approval capability.
///
/// The capability gets a snapshot only — no write access to gatekeeper state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// The full command string awaiting approval.
    pub command: String,
    /// Serialized risk level name.
    pub risk: String,
    /// Human-readable reasons from the classifier, in evaluation order.
    pub reasons: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(command: impl Into<String>, risk: RiskLevel, reasons: Vec<String>) -> Self {
        Self {
            command: command.into(),
            risk: risk.as_str().to_string(),
            reasons,
            requested_at: Utc::now(),
        }
    }
}

/// Terminal status of one gatekeeper invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Command ran and exited (any exit code).
    Success,
    /// Refused by policy before any process was spawned.
    Blocked,
    /// Approval was denied, timed out, or no reviewer was configured.
    Denied,
    /// Process exceeded its deadline and was killed.
    Timeout,
    /// The process could not be launched or failed at the runtime level.
    Error,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStatus::Success => "success",
            ExecStatus::Blocked => "blocked",
            ExecStatus::Denied => "denied",
            ExecStatus::Timeout => "timeout",
            ExecStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Security decision trail attached to every outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    pub risk: RiskLevel,
    pub reasons: Vec<String>,
    pub approved: bool,
    pub sandboxed: bool,
    pub blocked: bool,
    pub timed_out: bool,
}

impl SecurityContext {
    pub fn from_classification(c: &Classification) -> Self {
        Self {
            risk: c.risk,
            reasons: c.reasons.clone(),
            approved: false,
            sandboxed: false,
            blocked: false,
            timed_out: false,
        }
    }
}

/// The sole return type of `execute`.
///
/// Expected policy/timeout outcomes are values here, never raised errors —
/// callers branch on `status` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub security: SecurityContext,
}

impl ExecutionOutcome {
    /// Outcome for a command refused by policy. No process was spawned.
    pub fn blocked(security: SecurityContext) -> Self {
        Self {
            status: ExecStatus::Blocked,
            stdout: String::new(),
            stderr: security.reasons.join("; "),
            return_code: 1,
            security: SecurityContext {
                blocked: true,
                ..security
            },
        }
    }

    /// Outcome for a denied (or timed-out) approval. No process was spawned.
    pub fn denied(security: SecurityContext, detail: impl Into<String>) -> Self {
        Self {
            status: ExecStatus::Denied,
            stdout: String::new(),
            stderr: detail.into(),
            return_code: 1,
            security: SecurityContext {
                blocked: true,
                ..security
            },
        }
    }
}

/// One immutable entry in the audit history.
///
/// `seq` is assigned monotonically at append time and survives both ring
/// eviction and explicit clears, so gaps in the sequence expose truncation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub seq: u64,
    pub command: String,
    pub recorded_at: DateTime<Utc>,
    pub outcome: ExecutionOutcome,
}
