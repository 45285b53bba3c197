use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pxb_core::{JobId, ResourceKind, RunOutcome};
use pxb_providers::ResourceProvider;
use pxb_runner::{Config, Runner, ABANDONED_MESSAGE, DEFAULT_CONFIG_FILE};
use pxb_storage::JobStore;

#[derive(Parser)]
#[command(name = "pxb", version, about = "Batch analysis of Proxmox VMs and containers")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config (if missing) and create the database and output dir
    Init,

    /// Analyze the whole inventory and write the output tree
    Run,

    /// List batch jobs, newest first
    Jobs,

    /// Show status and progress of one job
    Status { job: JobId },

    /// Dump a job with its analyses and reports as JSON
    Show { job: JobId },

    /// List the resources the hypervisor reports
    Resources,

    /// Print cluster context as JSON
    Cluster,

    /// Mark jobs left RUNNING by an interrupted process as FAILED
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    if let Command::Init = cli.cmd {
        let cfg = Runner::init(&cli.config)?;
        println!("Initialized {} (database {})", cli.config.display(), cfg.database_path().display());
        return Ok(());
    }

    let cfg = Config::load_or_default(&cli.config)?;
    let r = Runner::open(cfg)?;

    match cli.cmd {
        Command::Init => {}
        Command::Run => {
            let orchestrator = r.orchestrator()?;
            match orchestrator.run_full_analysis().await? {
                RunOutcome::Completed(job_id) => {
                    let job = r.store.get_job(job_id).await?.context("job vanished after run")?;
                    println!(
                        "Job {} completed: {}/{} resources analyzed, output in {}",
                        job_id,
                        job.processed_resources,
                        job.total_resources,
                        r.cfg.output_dir().join(format!("job_{job_id}")).display()
                    );
                    if job.processed_resources < job.total_resources {
                        warn!(job_id = %job_id, "some analysis tasks were dropped, see log");
                    }
                }
                RunOutcome::NoWork => println!("No resources found, nothing to do"),
            }
        }
        Command::Jobs => {
            let jobs = r.store.list_jobs().await?;
            println!("Jobs: {}", jobs.len());
            for j in jobs {
                println!(
                    "- {} [{}] {}/{} started {}",
                    j.job_id,
                    j.status.as_str(),
                    j.processed_resources,
                    j.total_resources,
                    j.started_at.to_rfc3339()
                );
            }
        }
        Command::Status { job } => {
            let Some(j) = r.store.get_job(job).await? else {
                bail!("job {job} not found");
            };
            println!("Job {} [{}]", j.job_id, j.status.as_str());
            println!("Progress: {}/{} ({:.2}%)", j.processed_resources, j.total_resources, j.progress_percent());
            if let Some(done) = j.completed_at {
                println!("Finished: {}", done.to_rfc3339());
            }
            if let Some(msg) = j.error_message {
                println!("Error: {msg}");
            }
        }
        Command::Show { job } => {
            let Some(j) = r.store.get_job(job).await? else {
                bail!("job {job} not found");
            };
            let out = json!({
                "job": j,
                "analyses": r.store.list_analyses(job).await?,
                "reports": r.store.list_reports(job).await?,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Resources => {
            let provider = r.resource_provider()?;
            let resources = provider.list_resources().await?;
            let vms = resources.iter().filter(|x| x.kind == ResourceKind::Vm).count();
            println!("Resources: {} ({} VMs, {} containers)", resources.len(), vms, resources.len() - vms);
            for x in resources {
                println!("- {} {} [{}] on {} ({})", x.kind.as_str(), x.id, x.status, x.location, x.name);
            }
        }
        Command::Cluster => {
            let provider = r.resource_provider()?;
            let ctx = provider.cluster_context().await?;
            println!("{}", serde_json::to_string_pretty(&ctx)?);
        }
        Command::Reconcile => {
            let ids = r.store.abandon_running(ABANDONED_MESSAGE).await?;
            if ids.is_empty() {
                println!("No running jobs");
            }
            for id in ids {
                println!("Marked job {id} failed");
            }
        }
    }

    Ok(())
}
