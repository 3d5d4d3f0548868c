mod render;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use execgate_core::{ApprovalHandler, DenyAll, StaticApproval};
use execgate_gatekeeper::{Gatekeeper, GatekeeperConfig};

#[derive(Parser)]
#[command(name = "execgate")]
#[command(about = "Risk-tiered command execution gatekeeper")]
#[command(version)]
struct Cli {
    /// Emit outcomes as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, gate, and execute a single command
    Run {
        /// Approve every request without prompting (use with care)
        #[arg(long, conflicts_with = "no")]
        yes: bool,
        /// Deny every request (the default when neither flag is given)
        #[arg(long)]
        no: bool,
        /// Require approval even for low-risk commands
        #[arg(long)]
        force_approval: bool,
        /// Rewrite eligible commands into the container sandbox
        #[arg(long)]
        sandbox: bool,
        /// Execution deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// The command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Classify a command without executing it
    Check {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Read commands from stdin (one per line), execute each, then print
    /// the audit trail
    Batch {
        /// Approve every request instead of denying
        #[arg(long)]
        yes: bool,
        /// Audit records to display at the end
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GatekeeperConfig::from_env();

    match cli.command {
        Commands::Run {
            yes,
            no,
            force_approval,
            sandbox,
            timeout_secs,
            command,
        } => {
            let config = GatekeeperConfig {
                sandbox_enabled: sandbox || config.sandbox_enabled,
                exec_timeout_secs: timeout_secs.unwrap_or(config.exec_timeout_secs),
                ..config
            };
            let gate = Gatekeeper::from_config(config, verdict_handler(yes, no)).await?;
            let command = command.join(" ");
            let outcome = gate.execute(&command, force_approval).await;
            render::outcome(&outcome, cli.json)?;
            let code = if outcome.return_code < 0 {
                1
            } else {
                outcome.return_code.min(125)
            };
            std::process::exit(code);
        }
        Commands::Check { command } => {
            let gate = Gatekeeper::from_config(config, Arc::new(DenyAll)).await?;
            let command = command.join(" ");
            let classification = gate.classify_only(&command);
            render::classification(&command, &classification, cli.json)?;
        }
        Commands::Batch { yes, limit } => {
            let gate = Gatekeeper::from_config(config, verdict_handler(yes, false)).await?;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let command = line.trim();
                if command.is_empty() {
                    continue;
                }
                let outcome = gate.execute(command, false).await;
                render::batch_line(command, &outcome);
            }
            info!("Batch complete, printing audit trail");
            render::audit_trail(&gate.history(limit).await, cli.json)?;
        }
    }

    Ok(())
}

fn verdict_handler(yes: bool, no: bool) -> Arc<dyn ApprovalHandler> {
    if yes {
        Arc::new(StaticApproval(true))
    } else if no {
        Arc::new(StaticApproval(false))
    } else {
        Arc::new(DenyAll)
    }
}
