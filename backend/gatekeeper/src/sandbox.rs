//! Sandbox rewrite — turns a shell command into an isolated container
//! invocation.
//!
//! The argv is built field by field, never by string concatenation: the
//! isolation boundary must not reintroduce the injection risk it exists to
//! contain. The image is pinned from configuration, never derived from the
//! command being wrapped.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use execgate_core::GateError;

/// Configuration for the container-based sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Container runtime binary (docker or a drop-in like podman).
    pub runtime: String,
    /// Pinned base image commands run inside.
    pub image: String,
    /// Memory ceiling (e.g. "256m").
    pub memory_limit: String,
    /// CPU quota as a fraction of one core (0.0–1.0).
    pub cpu_quota: f64,
    /// Unprivileged uid:gid to drop to.
    pub user: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "alpine:3.20".to_string(),
            memory_limit: "256m".to_string(),
            cpu_quota: 0.5,
            user: "65534:65534".to_string(),
        }
    }
}

/// Builds isolated invocations and probes runtime availability.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Rewrite `command` into a container-runtime argv.
    ///
    /// The invocation is ephemeral (`--rm`), mounts the root filesystem
    /// read-only with a small writable tmpfs, has no network, bounded
    /// memory and CPU, runs as an unprivileged user, and cannot gain new
    /// privileges. The command itself rides as the single trailing `sh -lc`
    /// argument.
    pub fn wrap(&self, command: &str) -> Vec<String> {
        // Fraction-of-core to docker's period/quota pair.
        let quota = (self.config.cpu_quota * 100_000.0) as i64;

        let argv = vec![
            self.config.runtime.clone(),
            "run".to_string(),
            "--rm".to_string(),
            "--network".to_string(),
            "none".to_string(),
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            "/tmp:rw,size=64m".to_string(),
            "--memory".to_string(),
            self.config.memory_limit.clone(),
            "--cpu-period=100000".to_string(),
            format!("--cpu-quota={quota}"),
            "--user".to_string(),
            self.config.user.clone(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            self.config.image.clone(),
            "sh".to_string(),
            "-lc".to_string(),
            command.to_string(),
        ];
        debug!(runtime = %self.config.runtime, image = %self.config.image, "Built sandbox invocation");
        argv
    }

    /// Verify the container runtime is reachable.
    ///
    /// A missing runtime is a deployment defect, not an expected outcome,
    /// so this is the one place a gatekeeper error may propagate.
    pub async fn probe_runtime(&self) -> Result<(), GateError> {
        let output = tokio::process::Command::new(&self.config.runtime)
            .arg("version")
            .output()
            .await
            .with_context(|| format!("failed to invoke {}", self.config.runtime))
            .map_err(|e| GateError::Sandbox(e.to_string()))?;
        if !output.status.success() {
            return Err(GateError::Sandbox(format!(
                "{} version exited with {}",
                self.config.runtime,
                output.status.code().unwrap_or(-1)
            )));
        }
        info!(runtime = %self.config.runtime, "Sandbox runtime available");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_invocation_carries_isolation_flags() {
        let executor = SandboxExecutor::new(SandboxConfig::default());
        let argv = executor.wrap("rm -r ./scratch");

        assert_eq!(argv[0], "docker");
        assert!(argv.contains(&"--rm".to_string()));
        assert!(argv.contains(&"--read-only".to_string()));
        assert!(argv.contains(&"--memory".to_string()));
        assert!(argv.iter().any(|a| a.starts_with("--cpu-quota=")));
        assert!(argv.contains(&"--user".to_string()));
        assert!(argv.contains(&"no-new-privileges".to_string()));

        let net = argv.iter().position(|a| a == "--network").unwrap();
        assert_eq!(argv[net + 1], "none");
    }

    #[test]
    fn command_is_a_single_trailing_argument() {
        let executor = SandboxExecutor::new(SandboxConfig::default());
        let argv = executor.wrap("echo 'a b' && ls");
        assert_eq!(argv.last().unwrap(), "echo 'a b' && ls");
        assert_eq!(argv[argv.len() - 2], "-lc");
        assert_eq!(argv[argv.len() - 3], "sh");
    }

    #[test]
    fn image_is_pinned_from_config_not_input() {
        let config = SandboxConfig {
            image: "internal/sandbox:v7".to_string(),
            ..Default::default()
        };
        let argv = SandboxExecutor::new(config).wrap("ubuntu:latest");
        let image_pos = argv.iter().position(|a| a == "internal/sandbox:v7");
        assert!(image_pos.is_some());
        // The input string only ever appears after the shell marker.
        let sh_pos = argv.iter().position(|a| a == "sh").unwrap();
        assert!(image_pos.unwrap() < sh_pos);
    }

    #[test]
    fn cpu_fraction_converts_to_quota() {
        let config = SandboxConfig {
            cpu_quota: 0.25,
            ..Default::default()
        };
        let argv = SandboxExecutor::new(config).wrap("true");
        assert!(argv.contains(&"--cpu-quota=25000".to_string()));
    }
}
