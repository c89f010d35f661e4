use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "bko")]
#[command(about = "BackOrderDesk CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an attempt feed against an order book and print the result
    Replay {
        /// Order book file (JSON)
        #[arg(long)]
        orders: String,

        /// Attempt feed file (JSON)
        #[arg(long)]
        feed: String,

        /// Write desk audit events to this JSONL path (hash-chained)
        #[arg(long)]
        audit: Option<String>,

        /// Layered desk config paths in merge order; supplies the audit
        /// sink when --audit is not given
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Emit the full report as JSON instead of the text summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Replay a feed and print per-order aggregate statuses only
    Status {
        /// Order book file (JSON)
        #[arg(long)]
        orders: String,

        /// Attempt feed file (JSON)
        #[arg(long)]
        feed: String,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a desk audit log
    Verify {
        /// Audit log path (JSONL)
        #[arg(long)]
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Replay {
            orders,
            feed,
            audit,
            config_paths,
            json,
        } => commands::replay::run(&orders, &feed, audit.as_deref(), &config_paths, json),
        Commands::Status { orders, feed } => commands::replay::run_status_only(&orders, &feed),
        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit::verify(&path),
        },
        Commands::ConfigHash { paths } => commands::config_hash::run(&paths),
    }
}
