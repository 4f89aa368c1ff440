//! ebs-snapshot-dr: cross-region EBS snapshot replication and retention
//!
//! Invoked periodically by an external scheduler (hourly recommended; the
//! cadence must not exceed the 24-hour eligibility window). Each invocation
//! replicates fresh snapshots of backup-tagged instances to the target
//! region, then prunes replicas past their retention window.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ebs_snapshot_dr::config::{PolicyConfig, ReplicationConfig};
use ebs_snapshot_dr::engine::ReplicationEngine;
use ebs_snapshot_dr::retention::{RetentionOptions, RetentionReport};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ebs-snapshot-dr")]
#[command(about = "Cross-region EBS snapshot replication for disaster recovery")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Region, tag, and retention configuration shared by all subcommands
#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Region holding the instances and snapshots to replicate
    #[arg(long, env = "SOURCE_REGION")]
    source_region: String,

    /// Region receiving the replicas
    #[arg(long, env = "TARGET_REGION")]
    target_region: String,

    /// Instance tag key marking test-class backup eligibility
    #[arg(long, env = "TEST_ENV_TAG_TO_REPLICATE")]
    test_tag: String,

    /// Instance tag key marking production-class backup eligibility
    #[arg(long, env = "PROD_ENV_TAG_TO_REPLICATE")]
    prod_tag: String,

    /// Days to keep test-class replicas (0 = delete on next pass)
    #[arg(long, env = "TEST_ENV_RETENTION_DAYS")]
    test_retention_days: u32,

    /// Days to keep production-class replicas (0 = delete on next pass)
    #[arg(long, env = "PROD_ENV_RETENTION_DAYS")]
    prod_retention_days: u32,
}

impl EngineArgs {
    fn into_config(self) -> Result<ReplicationConfig> {
        let config = ReplicationConfig::new(
            self.source_region,
            self.target_region,
            PolicyConfig {
                tag_key: self.test_tag,
                retention_days: self.test_retention_days,
            },
            PolicyConfig {
                tag_key: self.prod_tag,
                retention_days: self.prod_retention_days,
            },
        )?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replicate fresh snapshots, then prune expired replicas
    Run {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Replicate fresh snapshots only (no pruning)
    Replicate {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Prune expired replicas in the target region
    Prune {
        #[command(flatten)]
        engine: EngineArgs,

        /// Actually delete replicas (default is dry-run)
        #[arg(long)]
        execute: bool,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run { engine } => {
            let config = engine.into_config()?;
            info!(
                source_region = %config.source_region,
                target_region = %config.target_region,
                test_tag = %config.test.tag_key,
                prod_tag = %config.production.tag_key,
                "Starting replication run"
            );

            let engine = ReplicationEngine::connect(config).await?;
            let report = engine.run().await?;

            print_replication_summary(&report.replication);
            print_retention_summary(&report.retention, false);
        }

        Command::Replicate { engine } => {
            let config = engine.into_config()?;
            let engine = ReplicationEngine::connect(config).await?;
            let report = engine.replicate().await?;
            print_replication_summary(&report);
        }

        Command::Prune {
            engine,
            execute,
            format,
        } => {
            let config = engine.into_config()?;
            let engine = ReplicationEngine::connect(config).await?;
            let report = engine
                .prune(RetentionOptions { dry_run: !execute })
                .await?;

            if format == "json" {
                print_retention_json(&report)?;
            } else {
                print_retention_summary(&report, !execute);
            }
        }
    }

    Ok(())
}

fn print_replication_summary(report: &ebs_snapshot_dr::replicate::ReplicationReport) {
    println!("\n=== Replication Report ===");
    println!("Snapshots examined:  {}", report.examined);
    println!("Copies initiated:    {}", report.replicated.len());
    println!("Replicas existing:   {}", report.skipped_existing);
    println!("Copies rejected:     {}", report.failed.len());

    if !report.replicated.is_empty() {
        println!();
        println!(
            "{:<20} {:<20} {:<15} {:<22} {:<22} {:<10}",
            "INSTANCE", "INSTANCE_ID", "VOLUME", "VOLUME_ID", "SNAPSHOT_ID", "STATE"
        );
        println!("{}", "-".repeat(112));
        for r in &report.replicated {
            println!(
                "{:<20} {:<20} {:<15} {:<22} {:<22} {:<10}",
                r.instance_name, r.instance_id, r.volume_name, r.volume_id, r.snapshot_id,
                r.snapshot_state
            );
        }
    }

    for failure in &report.failed {
        println!(
            "Rejected: {} ({}) - {}",
            failure.snapshot_id, failure.identity, failure.error
        );
    }
}

fn print_retention_summary(report: &RetentionReport, dry_run: bool) {
    println!("\n=== Retention Report ===");
    println!("Replicas examined: {}", report.examined);
    println!("Retained:          {}", report.retained);
    if dry_run {
        println!("Would delete:      {}", report.skipped.len());
        for s in &report.skipped {
            println!("  {} ({}, created {})", s.snapshot_id, s.policy, s.start_time);
        }
        println!("\nRun with --execute to actually delete replicas.");
    } else {
        println!("Deleted:           {}", report.deleted.len());
        println!("Failed:            {}", report.failed.len());
    }
}

fn print_retention_json(report: &RetentionReport) -> Result<()> {
    let expired: Vec<_> = report
        .deleted
        .iter()
        .chain(report.skipped.iter())
        .map(|s| {
            serde_json::json!({
                "snapshot_id": s.snapshot_id,
                "policy": s.policy.as_str(),
                "created_at": s.start_time.to_rfc3339(),
            })
        })
        .collect();

    let out = serde_json::json!({
        "examined": report.examined,
        "retained": report.retained,
        "deleted": report.deleted.len(),
        "failed": report.failed.len(),
        "expired": expired,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
