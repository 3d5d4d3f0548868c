//! Risk classifier — pure function over (command string, policy).
//!
//! Evaluation is a data-driven pipeline: dangerous patterns first (terminal,
//! first-match-wins into the forbidden tier), then tier membership for the
//! baseline, then monotonic escalation rules. Reasons accumulate in rule
//! order and are never reordered.

use std::path::Path;

use execgate_core::{Classification, RiskLevel};

use crate::policy::{Policy, ELEVATION_TOKENS};

/// Classify a command string against the policy.
///
/// Never fails on malformed input: an empty or unparsable command comes back
/// `Forbidden` with a single explanatory reason.
pub fn classify(command: &str, policy: &Policy) -> Classification {
    let tokens = tokenize(command);
    let Some(base) = tokens.first().map(|t| base_name(t)) else {
        return Classification::new(RiskLevel::Forbidden, "Empty or malformed command");
    };
    if base.is_empty() {
        return Classification::new(RiskLevel::Forbidden, "Empty or malformed command");
    }

    // Dangerous patterns scan the raw, untokenized string so quoting tricks
    // cannot split a match. Any hit is terminal and dominates every other
    // rule, including membership in the safe set.
    let pattern_reasons: Vec<String> = policy
        .dangerous_patterns()
        .iter()
        .filter(|p| p.regex.is_match(command))
        .map(|p| format!("Dangerous pattern: {}", p.label))
        .collect();
    if !pattern_reasons.is_empty() {
        return Classification {
            risk: RiskLevel::Forbidden,
            reasons: pattern_reasons,
        };
    }

    if policy.is_forbidden(&base) {
        return Classification::new(
            RiskLevel::Forbidden,
            format!("Forbidden command: {base}"),
        );
    }

    // Baseline from tier membership. Unknown commands are moderate, never
    // safe: absence from the tables is not evidence of safety.
    let mut result = if policy.is_high_risk(&base) {
        Classification::new(RiskLevel::High, format!("High-risk command: {base}"))
    } else if policy.is_moderate(&base) {
        Classification::new(RiskLevel::Moderate, format!("Moderate-risk command: {base}"))
    } else if policy.is_safe(&base) {
        Classification::new(RiskLevel::Safe, "Safe command")
    } else {
        Classification::new(RiskLevel::Moderate, format!("Unknown command: {base}"))
    };

    // Escalation: operates on system paths outside the allowed roots. The
    // first token is the executable itself, not a path being operated on.
    if tokens.iter().skip(1).any(|t| is_system_path_token(t, policy)) {
        result.escalate(RiskLevel::High, "Operates on system paths");
    }

    // Escalation: privilege elevation anywhere in the command.
    for token in &tokens {
        let name = base_name(token);
        if ELEVATION_TOKENS.contains(&name.as_str()) {
            let reason = format!("High-risk command: {name}");
            if !result.reasons.contains(&reason) {
                result.escalate(RiskLevel::High, reason);
            } else {
                result.risk = result.risk.max(RiskLevel::High);
            }
            break;
        }
    }

    result
}

/// Quote-aware tokenization with a whitespace fallback.
///
/// Respects one layer of single/double quoting and backslash escapes. If
/// quoting is unbalanced the raw string is split on whitespace instead —
/// a best-effort token beats refusing to classify, and the pattern scan
/// above already saw the raw string.
pub(crate) fn tokenize(input: &str) -> Vec<String> {
    quoted_tokens(input).unwrap_or_else(|| {
        input.split_whitespace().map(str::to_string).collect()
    })
}

/// Returns `None` when a quote is left open.
fn quoted_tokens(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    let mut in_single = false;
    let mut in_double = false;
    // Tracks "saw an explicit empty quoted token" so `'' foo` keeps its shape.
    let mut quoted = false;

    while let Some(c) = chars.next() {
        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                current.push(c);
            }
        } else if in_double {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if c == '"' {
                in_double = false;
            } else {
                current.push(c);
            }
        } else if c == '\\' {
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == '\'' {
            in_single = true;
            quoted = true;
        } else if c == '"' {
            in_double = true;
            quoted = true;
        } else if c.is_whitespace() {
            if !current.is_empty() || quoted {
                tokens.push(std::mem::take(&mut current));
            }
            quoted = false;
        } else {
            current.push(c);
        }
    }

    if in_single || in_double {
        return None;
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    Some(tokens)
}

/// Strip any leading path from a token, leaving the executable name.
fn base_name(token: &str) -> String {
    Path::new(token)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A token counts as a system-path reference when it is an absolute path
/// outside every allowed root that resolves under a system directory.
/// Redirection prefixes (`>`, `2>`, `<`) are peeled off first.
fn is_system_path_token(token: &str, policy: &Policy) -> bool {
    let stripped = token.trim_start_matches(|c: char| c.is_ascii_digit() || c == '>' || c == '<' || c == '&');
    if !stripped.starts_with('/') {
        return false;
    }
    let path = Path::new(stripped);
    !policy.path_allowed(path) && policy.is_system_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::builtin()
    }

    #[test]
    fn empty_command_is_forbidden() {
        let c = classify("", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
        assert_eq!(c.reasons, vec!["Empty or malformed command"]);

        let c = classify("   ", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
    }

    #[test]
    fn safe_command_classifies_safe() {
        let c = classify("echo hello", &policy());
        assert_eq!(c.risk, RiskLevel::Safe);
        assert_eq!(c.reasons, vec!["Safe command"]);
    }

    #[test]
    fn root_deletion_is_forbidden_with_pattern_reason() {
        let c = classify("rm -rf /", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
        assert!(c.reasons[0].starts_with("Dangerous pattern:"));
    }

    #[test]
    fn pattern_match_dominates_safe_listing() {
        // `cat` is in the safe set, but the credential pattern wins.
        let c = classify("cat /etc/shadow", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
        assert!(c
            .reasons
            .iter()
            .any(|r| r.contains("credential")));
    }

    #[test]
    fn one_reason_per_matched_pattern() {
        // Substitution plus backtick: two pattern rules, two reasons.
        let c = classify("echo $(whoami) `id`", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
        assert_eq!(c.reasons.len(), 2);
    }

    #[test]
    fn forbidden_command_name() {
        let c = classify("shutdown -h now", &policy());
        assert_eq!(c.risk, RiskLevel::Forbidden);
        assert_eq!(c.reasons, vec!["Forbidden command: shutdown"]);
    }

    #[test]
    fn high_risk_baseline() {
        let c = classify("rm file.txt", &policy());
        assert_eq!(c.risk, RiskLevel::High);
        assert_eq!(c.reasons, vec!["High-risk command: rm"]);
    }

    #[test]
    fn moderate_baseline() {
        let c = classify("cp a.txt b.txt", &policy());
        assert_eq!(c.risk, RiskLevel::Moderate);
        assert_eq!(c.reasons, vec!["Moderate-risk command: cp"]);
    }

    #[test]
    fn unknown_command_is_moderate_never_safe() {
        let c = classify("frobnicate --all", &policy());
        assert_eq!(c.risk, RiskLevel::Moderate);
        assert_eq!(c.reasons, vec!["Unknown command: frobnicate"]);
    }

    #[test]
    fn absolute_path_to_safe_binary_still_safe() {
        let c = classify("/bin/echo hi", &policy());
        assert_eq!(c.risk, RiskLevel::Safe);
    }

    #[test]
    fn system_path_escalates() {
        let c = classify("cp config /etc/myapp.conf", &policy());
        assert_eq!(c.risk, RiskLevel::High);
        assert_eq!(
            c.reasons,
            vec![
                "Moderate-risk command: cp".to_string(),
                "Operates on system paths".to_string()
            ]
        );
    }

    #[test]
    fn temp_paths_do_not_escalate() {
        let cmd = format!("cp a.txt {}", std::env::temp_dir().join("b.txt").display());
        let c = classify(&cmd, &policy());
        assert_eq!(c.risk, RiskLevel::Moderate);
    }

    #[test]
    fn sudo_prefix_escalates_safe_command() {
        let c = classify("sudo echo hi", &policy());
        assert_eq!(c.risk, RiskLevel::High);
        assert!(c.reasons.contains(&"High-risk command: sudo".to_string()));
    }

    #[test]
    fn sudo_never_decreases_risk() {
        let p = policy();
        for cmd in ["echo hi", "cp a b", "rm x", "unknowncmd"] {
            let base = classify(cmd, &p).risk;
            let elevated = classify(&format!("sudo {cmd}"), &p).risk;
            assert!(elevated >= base, "sudo lowered risk for {cmd}");
        }
    }

    #[test]
    fn elevation_reason_not_duplicated_for_sudo_itself() {
        // Base token `sudo` already yields the high-risk reason; the
        // elevation scan must not add it twice.
        let c = classify("sudo rm -r subdir", &policy());
        let sudo_reasons = c
            .reasons
            .iter()
            .filter(|r| r.as_str() == "High-risk command: sudo")
            .count();
        assert_eq!(sudo_reasons, 1);
        assert_eq!(c.risk, RiskLevel::High);
    }

    #[test]
    fn classification_is_deterministic() {
        let p = policy();
        let a = classify("sudo cp x /etc/x", &p);
        let b = classify("sudo cp x /etc/x", &p);
        assert_eq!(a.risk, b.risk);
        assert_eq!(a.reasons, b.reasons);
    }

    #[test]
    fn quoted_arguments_stay_single_tokens() {
        let tokens = tokenize(r#"echo "hello world" 'a b'"#);
        assert_eq!(tokens, vec!["echo", "hello world", "a b"]);
    }

    #[test]
    fn unbalanced_quote_falls_back_to_whitespace_split() {
        let tokens = tokenize("echo 'unterminated");
        assert_eq!(tokens, vec!["echo", "'unterminated"]);
        // And classification still works rather than erroring.
        let c = classify("echo 'unterminated", &policy());
        assert_eq!(c.risk, RiskLevel::Safe);
    }

    #[test]
    fn quoted_executable_resolves_to_base_name() {
        let c = classify(r#""rm" file.txt"#, &policy());
        assert_eq!(c.risk, RiskLevel::High);
    }

    #[test]
    fn redirection_into_system_path_escalates() {
        let c = classify("echo x >/etc/motd", &policy());
        assert_eq!(c.risk, RiskLevel::High);
        assert!(c.reasons.contains(&"Operates on system paths".to_string()));
    }
}
