use clap::{Args, Parser, Subcommand};
use pm_client::{ClientConfig, JobRequest, JobStatus, TransientRetry, DEFAULT_POLL_INTERVAL};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pm", version, about = "Submit and inspect puppet-master jobs")]
pub struct Cli {
    /// Base URL of the API
    #[arg(long, env = "PUPPET_MASTER_ENDPOINT")]
    pub endpoint: String,

    #[arg(long, env = "PUPPET_MASTER_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Team slug to scope requests under
    #[arg(long, env = "PUPPET_MASTER_TEAM")]
    pub team: Option<String>,

    /// Dump requests and responses
    #[arg(long, env = "PUPPET_MASTER_DEBUG")]
    pub debug: bool,

    #[arg(long, env = "PUPPET_MASTER_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List jobs, one page at a time
    List {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        per_page: u32,
    },
    /// Show one job
    Get { uuid: String },
    /// Delete one job
    Delete { uuid: String },
    /// Submit a job and return immediately
    Create(JobArgs),
    /// Submit a job and wait until it is done
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// File holding the job code
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Variable passed to the job, as NAME=VALUE
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Module made importable by the job, as NAME=PATH
    #[arg(long = "module", value_parser = parse_key_value)]
    pub modules: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Consecutive transient poll failures tolerated before giving up
    #[arg(long, conflicts_with = "retry_forever")]
    pub max_transient: Option<u32>,

    /// Retry transient poll failures without limit
    #[arg(long)]
    pub retry_forever: bool,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.endpoint, &self.token);
        config.team = self.team.clone().filter(|t| !t.trim().is_empty());
        config.debug = self.debug;
        config.poll_interval = Duration::from_millis(self.poll_interval_ms);
        config
    }
}

impl RunArgs {
    pub fn transient_retry(&self) -> TransientRetry {
        if self.retry_forever {
            TransientRetry::Unbounded
        } else {
            self.max_transient
                .map(TransientRetry::limited)
                .unwrap_or_default()
        }
    }
}

impl JobArgs {
    /// Read the code file and every module file into a request.
    pub async fn to_request(&self) -> std::io::Result<JobRequest> {
        let code = tokio::fs::read_to_string(&self.file).await?;
        let mut req = JobRequest::new(code);
        for (name, value) in &self.vars {
            req = req.with_var(name, value);
        }
        for (name, path) in &self.modules {
            let source = tokio::fs::read_to_string(path).await?;
            req = req.with_module(name, source);
        }
        Ok(req)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pm", "--endpoint", "http://localhost:8000", "--token", "t"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_value("page=http://a=b").unwrap(),
            ("page".to_string(), "http://a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn list_defaults_to_server_pagination() {
        match parse(&["list"]).command {
            Commands::List {
                status,
                page,
                per_page,
            } => {
                assert_eq!(status, None);
                assert_eq!(page, 0);
                assert_eq!(per_page, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse(&["list", "--status", "queued", "--per-page", "50"]).command {
            Commands::List { status, per_page, .. } => {
                assert_eq!(status, Some(JobStatus::Queued));
                assert_eq!(per_page, 50);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn run_retry_flags() {
        let Commands::Run(run) = parse(&["run", "job.js", "--max-transient", "3"]).command else {
            panic!("expected run");
        };
        assert_eq!(run.transient_retry(), TransientRetry::limited(3));

        let Commands::Run(run) = parse(&["run", "job.js", "--retry-forever", "--timeout", "30"]).command
        else {
            panic!("expected run");
        };
        assert_eq!(run.transient_retry(), TransientRetry::Unbounded);
        assert_eq!(run.timeout, Some(30));

        let Commands::Run(run) = parse(&["run", "job.js", "--var", "page=x"]).command else {
            panic!("expected run");
        };
        assert_eq!(run.transient_retry(), TransientRetry::default());
        assert_eq!(run.job.vars, vec![("page".to_string(), "x".to_string())]);

        assert!(Cli::try_parse_from([
            "pm", "--endpoint", "http://x", "--token", "t", "run", "a.js", "--retry-forever",
            "--max-transient", "2",
        ])
        .is_err());
    }

    #[test]
    fn global_options_map_to_config() {
        let cli = parse(&["--team", "ops", "--debug", "--poll-interval-ms", "100", "get", "abc"]);
        let config = cli.client_config();
        assert_eq!(config.team.as_deref(), Some("ops"));
        assert!(config.debug);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }
}
