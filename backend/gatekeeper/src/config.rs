//! Runtime configuration for the gatekeeper.

use std::path::PathBuf;

use serde::Deserialize;

use execgate_core::RiskLevel;

use crate::history::DEFAULT_CAPACITY;
use crate::sandbox::SandboxConfig;

/// Gatekeeper settings. Two deadlines on purpose: the approval wait and the
/// execution run are bounded independently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Subprocess deadline in seconds.
    pub exec_timeout_secs: u64,
    /// How long to wait for a reviewer before treating silence as denial.
    pub approval_timeout_secs: u64,
    /// Whether eligible commands are rewritten into sandbox invocations.
    pub sandbox_enabled: bool,
    /// Minimum final risk at which the sandbox rewrite applies.
    pub sandbox_threshold: RiskLevel,
    /// Audit ring capacity.
    pub history_capacity: usize,
    /// Per-stream output capture cap in bytes.
    pub max_output_bytes: usize,
    /// Container sandbox settings.
    pub sandbox: SandboxConfig,
    /// Optional TOML policy overlay.
    pub policy_file: Option<PathBuf>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            exec_timeout_secs: 60,
            approval_timeout_secs: 120,
            sandbox_enabled: false,
            sandbox_threshold: RiskLevel::High,
            history_capacity: DEFAULT_CAPACITY,
            max_output_bytes: 200_000,
            sandbox: SandboxConfig::default(),
            policy_file: None,
        }
    }
}

impl GatekeeperConfig {
    /// Defaults overridden from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let sandbox = SandboxConfig {
            runtime: std::env::var("EXECGATE_SANDBOX_RUNTIME")
                .unwrap_or_else(|_| defaults.sandbox.runtime.clone()),
            image: std::env::var("EXECGATE_SANDBOX_IMAGE")
                .unwrap_or_else(|_| defaults.sandbox.image.clone()),
            ..defaults.sandbox.clone()
        };
        Self {
            exec_timeout_secs: env_parse("EXECGATE_TIMEOUT_SECS", defaults.exec_timeout_secs),
            approval_timeout_secs: env_parse(
                "EXECGATE_APPROVAL_TIMEOUT_SECS",
                defaults.approval_timeout_secs,
            ),
            sandbox_enabled: env_parse("EXECGATE_SANDBOX", defaults.sandbox_enabled),
            sandbox_threshold: defaults.sandbox_threshold,
            history_capacity: env_parse("EXECGATE_HISTORY_CAPACITY", defaults.history_capacity),
            max_output_bytes: env_parse("EXECGATE_MAX_OUTPUT_BYTES", defaults.max_output_bytes),
            sandbox,
            policy_file: std::env::var("EXECGATE_POLICY_FILE").ok().map(PathBuf::from),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
