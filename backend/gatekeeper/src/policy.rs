//! Policy rule tables — command tiers, dangerous patterns, allowed roots.
//!
//! A `Policy` is immutable after construction and owned by one gatekeeper;
//! classification reads it without locking. Built-in tables can be extended
//! from a TOML overlay file so operators can tune rules without a rebuild.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use execgate_core::GateError;

/// Commands that only read or transform data.
const SAFE_COMMANDS: &[&str] = &[
    "echo", "printf", "ls", "pwd", "cat", "head", "tail", "less", "wc",
    "grep", "find", "date", "whoami", "which", "uname", "env", "stat",
    "du", "df", "sort", "uniq", "cut", "tr", "basename", "dirname",
    "file", "hostname", "id", "uptime", "ps", "true", "false",
];

/// Read-write but routine: file shuffling, archives, build tools.
const MODERATE_COMMANDS: &[&str] = &[
    "cp", "mv", "mkdir", "rmdir", "touch", "ln", "tar", "gzip", "gunzip",
    "zip", "unzip", "sed", "awk", "tee", "xargs", "git", "make", "cargo",
    "npm", "pnpm", "yarn", "pip", "pip3", "python", "python3", "node",
    "go", "rustc",
];

/// Destructive, privileged, system-management, or network-capable.
const HIGH_RISK_COMMANDS: &[&str] = &[
    "rm", "chmod", "chown", "chgrp", "kill", "pkill", "killall",
    "mount", "umount", "systemctl", "service", "launchctl", "crontab",
    "at", "useradd", "userdel", "usermod", "groupadd", "passwd",
    "iptables", "ufw", "firewall-cmd", "sysctl", "modprobe", "insmod",
    "rmmod", "dd", "curl", "wget", "ssh", "scp", "sftp", "rsync", "nc",
    "ncat", "telnet", "ftp", "nmap", "sudo", "su", "doas", "pkexec",
];

/// Never executed regardless of approval.
const FORBIDDEN_COMMANDS: &[&str] = &[
    "shutdown", "reboot", "halt", "poweroff", "init", "telinit",
    "mkfs", "fdisk", "parted", "shred", "wipefs",
];

/// Privilege-elevation prefixes. Presence anywhere in a command escalates
/// the classification to at least high.
pub const ELEVATION_TOKENS: &[&str] = &["sudo", "su", "doas", "pkexec"];

/// Conventional system directories; writes or operations under these
/// escalate risk when the path is not under an allowed root.
const SYSTEM_DIRS: &[&str] = &[
    "/etc", "/usr", "/sys", "/proc", "/boot", "/lib", "/lib64", "/sbin",
    "/bin", "/var", "/root", "/opt", "/dev", "/srv",
];

/// Ordered dangerous-pattern table: (label, regex). Any match forbids the
/// command outright, before any tier lookup — including the safe set.
const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    (
        "Recursive deletion of filesystem root",
        r"\brm\s+(?:--?[A-Za-z-]+\s+)*-[A-Za-z]*[rR][A-Za-z]*\s+(?:--?[A-Za-z-]+\s+)*/+(?:\s|\*|$)",
    ),
    (
        "Access to system credential files",
        r"/etc/(?:shadow|gshadow|passwd|sudoers)\b",
    ),
    (
        "Access to private key material",
        r"\bid_(?:rsa|dsa|ecdsa|ed25519)\b",
    ),
    ("Fork bomb", r":\(\)\s*\{"),
    ("Command substitution", r"\$\("),
    ("Backtick subshell", r"`"),
    (
        "Output redirection to block device",
        r">\s*/dev/(?:sd[a-z]|hd[a-z]|nvme\S*|disk\S*)",
    ),
    ("Raw write to block device", r"\bdd\b[^|]*\bof=/dev/"),
    ("Filesystem format", r"\bmkfs(?:\.[a-z0-9]+)?\b"),
    (
        "Remote script piped to shell",
        r"\b(?:curl|wget)\b[^|;&]*\|\s*(?:ba|z|da|fi)?sh\b",
    ),
];

/// A single compiled dangerous-pattern rule.
#[derive(Debug, Clone)]
pub struct DangerousPattern {
    pub label: String,
    pub regex: Regex,
}

impl DangerousPattern {
    fn compile(label: &str, pattern: &str) -> Result<Self, GateError> {
        let regex = Regex::new(pattern)
            .map_err(|e| GateError::Policy(format!("bad pattern '{label}': {e}")))?;
        Ok(Self {
            label: label.to_string(),
            regex,
        })
    }
}

/// Immutable rule tables driving classification.
#[derive(Debug, Clone)]
pub struct Policy {
    safe_commands: HashSet<String>,
    moderate_commands: HashSet<String>,
    high_risk_commands: HashSet<String>,
    forbidden_commands: HashSet<String>,
    dangerous_patterns: Vec<DangerousPattern>,
    allowed_paths: Vec<PathBuf>,
}

static BUILTIN: Lazy<Policy> = Lazy::new(|| {
    let dangerous_patterns = DANGEROUS_PATTERNS
        .iter()
        .map(|(label, pattern)| DangerousPattern::compile(label, pattern))
        .collect::<Result<Vec<_>, _>>()
        .expect("built-in patterns compile");

    Policy {
        safe_commands: to_set(SAFE_COMMANDS),
        moderate_commands: to_set(MODERATE_COMMANDS),
        high_risk_commands: to_set(HIGH_RISK_COMMANDS),
        forbidden_commands: to_set(FORBIDDEN_COMMANDS),
        dangerous_patterns,
        allowed_paths: default_allowed_paths(),
    }
});

impl Policy {
    /// Policy from the built-in tables alone. Compiled once, then cloned.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Built-in tables extended with an overlay loaded from a TOML file.
    pub async fn load(path: &Path) -> Result<Self, GateError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read policy file: {}", path.display()))
            .map_err(|e| GateError::Policy(e.to_string()))?;
        let file: PolicyFile = toml::from_str(&raw)
            .map_err(|e| GateError::Policy(format!("{}: {e}", path.display())))?;
        let policy = Self::with_overlay(file)?;
        info!(path = %path.display(), "Loaded policy overlay");
        Ok(policy)
    }

    /// Apply a parsed overlay on top of the built-in tables.
    ///
    /// Overlay entries extend the defaults; overlay patterns are evaluated
    /// after the built-in ones, preserving rule order.
    pub fn with_overlay(file: PolicyFile) -> Result<Self, GateError> {
        let mut policy = Self::builtin();
        policy.safe_commands.extend(file.commands.safe);
        policy.moderate_commands.extend(file.commands.moderate);
        policy.high_risk_commands.extend(file.commands.high_risk);
        policy.forbidden_commands.extend(file.commands.forbidden);
        for entry in &file.patterns {
            policy
                .dangerous_patterns
                .push(DangerousPattern::compile(&entry.label, &entry.pattern)?);
        }
        policy
            .allowed_paths
            .extend(file.paths.allowed.iter().map(PathBuf::from));
        Ok(policy)
    }

    pub fn is_safe(&self, command: &str) -> bool {
        self.safe_commands.contains(command)
    }

    pub fn is_moderate(&self, command: &str) -> bool {
        self.moderate_commands.contains(command)
    }

    pub fn is_high_risk(&self, command: &str) -> bool {
        self.high_risk_commands.contains(command)
    }

    pub fn is_forbidden(&self, command: &str) -> bool {
        self.forbidden_commands.contains(command)
    }

    pub fn dangerous_patterns(&self) -> &[DangerousPattern] {
        &self.dangerous_patterns
    }

    /// True if `path` sits under one of the allowed roots.
    pub fn path_allowed(&self, path: &Path) -> bool {
        self.allowed_paths.iter().any(|root| path.starts_with(root))
    }

    /// True if `path` resolves under a conventional system directory.
    pub fn is_system_path(&self, path: &Path) -> bool {
        SYSTEM_DIRS.iter().any(|dir| path.starts_with(dir))
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::builtin()
    }
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_allowed_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home);
    }
    paths.push(std::env::temp_dir());
    paths
}

// ---------------------------------------------------------------------------
// Overlay file schema
// ---------------------------------------------------------------------------

/// On-disk policy overlay (TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub commands: CommandTiers,
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
    #[serde(default)]
    pub paths: PathRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandTiers {
    #[serde(default)]
    pub safe: Vec<String>,
    #[serde(default)]
    pub moderate: Vec<String>,
    #[serde(default)]
    pub high_risk: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub label: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathRules {
    #[serde(default)]
    pub allowed: Vec<String>,
}
