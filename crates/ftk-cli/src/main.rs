mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ftk_confirm::SessionContext;
use ftk_order::ActionKind;

use commands::{confirm, inspect, order};

#[derive(Parser)]
#[command(name = "ftk")]
#[command(about = "Food-truck order lifecycle controller CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a transition payload without sending it
    Validate {
        /// Payload JSON string
        #[arg(conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Path to a payload JSON file
        #[arg(long = "payload-file", conflicts_with = "payload")]
        payload_file: Option<String>,
    },

    /// Print the transition table
    Table,

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create an order in RECEIVED
    Create {
        #[arg(long = "order")]
        order_id: String,

        #[command(flatten)]
        conn: Conn,
    },

    /// Print the store's current record
    Show {
        #[arg(long = "order")]
        order_id: String,

        #[command(flatten)]
        conn: Conn,
    },

    /// Apply the payment webhook to an order (sets paidAt once)
    Pay {
        #[arg(long = "order")]
        order_id: String,

        #[command(flatten)]
        conn: Conn,
    },

    /// Dispatch one transition
    Transition {
        #[arg(long = "order")]
        order_id: String,

        /// ACCEPT | START | READY | HANDOFF | DONE | CANCEL
        #[arg(long)]
        action: String,

        /// Optimistic-concurrency stamp (the record's updatedAtMs)
        #[arg(long)]
        expected: Option<i64>,

        /// Manager override: bypass the stamp check (audited)
        #[arg(long = "override", default_value_t = false)]
        manager_override: bool,

        /// On CONCURRENCY_CONFLICT, re-fetch once and retry with the fresh stamp
        #[arg(long, default_value_t = false)]
        refetch_on_conflict: bool,

        #[command(flatten)]
        conn: Conn,
    },

    /// Run a checkout confirmation session and print UI states
    Confirm {
        #[arg(long = "order")]
        order_id: String,

        /// Authenticated user id, carried into logs only
        #[arg(long)]
        user: Option<String>,

        #[command(flatten)]
        conn: Conn,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit JSONL file
    Verify { path: String },
}

#[derive(clap::Args)]
struct Conn {
    /// Layered config paths in merge order (defaults to FTK_CONFIG)
    #[arg(long = "config")]
    config_paths: Vec<String>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Validate {
            payload,
            payload_file,
        } => {
            let v = commands::load_payload(payload, payload_file)?;
            inspect::validate_payload(&v)?;
        }

        Commands::Table => inspect::print_table(),

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ftk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Create { order_id, conn } => {
            let cfg = commands::load_client_config(&conn.config_paths)?;
            order::create(&commands::store_client(&cfg)?, &order_id).await?;
        }

        Commands::Show { order_id, conn } => {
            let cfg = commands::load_client_config(&conn.config_paths)?;
            order::show(&commands::store_client(&cfg)?, &order_id).await?;
        }

        Commands::Pay { order_id, conn } => {
            let cfg = commands::load_client_config(&conn.config_paths)?;
            order::pay(&commands::store_client(&cfg)?, &order_id).await?;
        }

        Commands::Transition {
            order_id,
            action,
            expected,
            manager_override,
            refetch_on_conflict,
            conn,
        } => {
            let action = ActionKind::parse(&action).with_context(|| {
                format!(
                    "invalid --action '{}'. expected one of: ACCEPT | START | READY | HANDOFF | DONE | CANCEL",
                    action
                )
            })?;
            let cfg = commands::load_client_config(&conn.config_paths)?;
            order::transition(
                &commands::store_client(&cfg)?,
                order::TransitionArgs {
                    order_id,
                    action,
                    expected,
                    manager_override,
                    refetch_on_conflict,
                },
            )
            .await?;
        }

        Commands::Confirm {
            order_id,
            user,
            conn,
        } => {
            let cfg = commands::load_client_config(&conn.config_paths)?;
            let mut ctx = SessionContext::new(order_id);
            if let Some(uid) = user {
                ctx = ctx.with_user(uid);
            }
            let store = Arc::new(commands::store_client(&cfg)?);
            confirm::run(store, ctx, commands::timings(&cfg)).await?;
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => inspect::audit_verify(&path)?,
        },
    }

    Ok(())
}
