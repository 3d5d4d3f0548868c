//! Terminal rendering for outcomes, classifications, and the audit trail.

use anyhow::Result;

use execgate_core::{AuditRecord, Classification, ExecutionOutcome};

pub fn outcome(outcome: &ExecutionOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!(
        "status: {} (exit {})",
        outcome.status, outcome.return_code
    );
    println!("risk:   {}", outcome.security.risk);
    for reason in &outcome.security.reasons {
        println!("  - {reason}");
    }
    println!(
        "approved: {}  sandboxed: {}  blocked: {}",
        yn(outcome.security.approved),
        yn(outcome.security.sandboxed),
        yn(outcome.security.blocked),
    );
    if !outcome.stdout.is_empty() {
        print!("{}", outcome.stdout);
        if !outcome.stdout.ends_with('\n') {
            println!();
        }
    }
    if !outcome.stderr.is_empty() {
        eprint!("{}", outcome.stderr);
        if !outcome.stderr.ends_with('\n') {
            eprintln!();
        }
    }
    Ok(())
}

pub fn classification(command: &str, c: &Classification, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(c)?);
        return Ok(());
    }
    println!("{command}");
    println!("  risk: {}", c.risk);
    for reason in &c.reasons {
        println!("  - {reason}");
    }
    Ok(())
}

pub fn batch_line(command: &str, outcome: &ExecutionOutcome) {
    println!(
        "[{}] exit={} risk={} {}",
        outcome.status, outcome.return_code, outcome.security.risk, command
    );
}

pub fn audit_trail(records: &[AuditRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    println!("--- audit trail ({} records, newest first) ---", records.len());
    for record in records {
        println!(
            "#{:<4} {} [{}] {}",
            record.seq,
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.outcome.status,
            record.command
        );
    }
    Ok(())
}

fn yn(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}
