//! `pm`: command line client for the puppet-master job API.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use pm_client::{CancellationToken, ExecuteOptions, JobApi, ListJobs, PuppetMasterClient};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = PuppetMasterClient::from_config(cli.client_config())?;

    match cli.command {
        Commands::List {
            status,
            page,
            per_page,
        } => {
            let query = ListJobs {
                status,
                page,
                per_page,
            };
            let jobs = client.list_jobs(&query).await?;
            tracing::info!(
                current_page = jobs.meta.current_page,
                last_page = jobs.meta.last_page,
                total = jobs.meta.total,
                "listed jobs"
            );
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Commands::Get { uuid } => {
            let job = client.get_job(&uuid).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Delete { uuid } => {
            client.delete_job(&uuid).await?;
            tracing::info!(uuid = %uuid, "job deleted");
        }
        Commands::Create(args) => {
            let job = client.create_job(&args.to_request().await?).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Run(args) => {
            let req = args.job.to_request().await?;
            let opts = match args.timeout {
                Some(secs) => ExecuteOptions::with_timeout(Duration::from_secs(secs)),
                None => ExecuteOptions::default(),
            };
            let token = CancellationToken::new();
            let on_interrupt = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            let opts = opts.with_cancellation(token);
            let client = client.with_transient_retry(args.transient_retry());
            let job = client.execute_sync_with(&req, &opts).await?;
            if let Some(ref err) = job.error {
                tracing::warn!(uuid = %job.uuid, error = %err, "job finished with an error");
            }
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
    }
    Ok(())
}
