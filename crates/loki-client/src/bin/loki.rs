//! Loki CLI - query and push logs against a Loki host.

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use loki_client::logs::format_entries;
use loki_client::{
    Credentials, Direction, InstantQuery, Labels, LokiClient, LokiConfig, QueryResponse,
    QueryResult, RangeQuery, Stream, TimeRange,
};

/// Loki CLI - query and push logs against a Loki host.
#[derive(Parser)]
#[command(name = "loki")]
#[command(about = "Query and push logs against a Grafana Loki host")]
#[command(version)]
struct Cli {
    /// Loki base URL.
    #[arg(long, env = "LOKI_URL", default_value = loki_client::config::DEFAULT_LOKI_URL)]
    url: String,

    /// Basic auth username.
    #[arg(long, env = "LOKI_USERNAME")]
    username: Option<String>,

    /// Basic auth password.
    #[arg(long, env = "LOKI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Bearer token (takes precedence over basic auth).
    #[arg(long, env = "LOKI_BEARER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Tenant id sent as `X-Scope-OrgID`.
    #[arg(long, env = "LOKI_ORG_ID")]
    org_id: Option<String>,

    /// Request timeout in seconds (0 disables it).
    #[arg(long, env = "LOKI_TIMEOUT_SECS", default_value_t = loki_client::config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Skip TLS certificate verification.
    #[arg(long, default_value = "false")]
    insecure: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether Loki is ready to accept traffic.
    Ready,

    /// Run an instant query.
    Query {
        /// LogQL query.
        query: String,

        /// Maximum number of entries.
        #[arg(long)]
        limit: Option<u32>,

        /// Evaluation time (RFC 3339). Defaults to now.
        #[arg(long)]
        time: Option<DateTime<Utc>>,

        /// forward or backward.
        #[arg(long, default_value = "backward")]
        direction: Direction,

        /// Print the raw JSON response.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a range query.
    QueryRange {
        /// LogQL query.
        query: String,

        #[command(flatten)]
        window: Window,

        /// Maximum number of entries.
        #[arg(long)]
        limit: Option<u32>,

        /// forward or backward.
        #[arg(long, default_value = "backward")]
        direction: Direction,

        /// Resolution for metric queries (e.g. `30s`).
        #[arg(long)]
        step: Option<String>,

        /// Print the raw JSON response.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List label names.
    Labels {
        #[command(flatten)]
        window: Window,
    },

    /// List values for a label.
    LabelValues {
        /// Label name.
        name: String,

        #[command(flatten)]
        window: Window,
    },

    /// List streams matching selectors.
    Series {
        /// Stream selector (repeatable).
        #[arg(long = "match", required = true)]
        matchers: Vec<String>,

        #[command(flatten)]
        window: Window,
    },

    /// Push log lines. Reads lines from stdin when none are given.
    Push {
        /// Stream labels as key=value (comma-separated).
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,

        /// Log lines.
        lines: Vec<String>,
    },
}

/// Time window flags shared by subcommands.
#[derive(clap::Args)]
struct Window {
    /// Look back this many minutes from now.
    #[arg(long, default_value = "60", conflicts_with_all = ["start", "end"])]
    since: i64,

    /// Window start (RFC 3339).
    #[arg(long, requires = "end")]
    start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339).
    #[arg(long, requires = "start")]
    end: Option<DateTime<Utc>>,
}

impl Window {
    fn range(&self) -> Result<TimeRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(TimeRange::new(start, end)?),
            _ => {
                let span = chrono::Duration::try_minutes(self.since)
                    .with_context(|| format!("--since {} is out of range", self.since))?;
                Ok(TimeRange::last(span)?)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = LokiClient::new(build_config(&cli)).context("Failed to create Loki client")?;

    match cli.command {
        Commands::Ready => {
            if client.ready().await? {
                println!("{} {} is ready", "✔".green(), client.base_url());
            } else {
                println!("{} {} is not ready", "✘".red(), client.base_url());
                std::process::exit(1);
            }
        }

        Commands::Query {
            query,
            limit,
            time,
            direction,
            json,
        } => {
            let mut request = InstantQuery::new(query).direction(direction);
            request.limit = limit;
            request.time = time;

            let response = client.query(&request).await?;
            print_response(&response, json)?;
        }

        Commands::QueryRange {
            query,
            window,
            limit,
            direction,
            step,
            json,
        } => {
            let mut request = RangeQuery::new(query, window.range()?).direction(direction);
            request.limit = limit;
            request.step = step;

            let response = client.query_range(&request).await?;
            print_response(&response, json)?;
        }

        Commands::Labels { window } => {
            for label in client.labels(Some(window.range()?)).await? {
                println!("{label}");
            }
        }

        Commands::LabelValues { name, window } => {
            for value in client.label_values(&name, Some(window.range()?)).await? {
                println!("{value}");
            }
        }

        Commands::Series { matchers, window } => {
            let matchers: Vec<&str> = matchers.iter().map(String::as_str).collect();
            for series in client.series(&matchers, Some(window.range()?)).await? {
                println!("{}", serde_json::to_string(&series)?);
            }
        }

        Commands::Push { labels, lines } => {
            let labels = parse_labels(&labels)?;
            let lines = if lines.is_empty() {
                std::io::stdin()
                    .lock()
                    .lines()
                    .collect::<std::io::Result<Vec<_>>>()
                    .context("Failed to read log lines from stdin")?
            } else {
                lines
            };

            let count = lines.len();
            let stream = lines
                .into_iter()
                .fold(Stream::new(labels), |s, line| s.entry(Utc::now(), line));
            client.push(vec![stream]).await?;
            info!(lines = count, "Pushed log lines");
            println!("{} pushed {count} line(s)", "✔".green());
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> LokiConfig {
    let mut config = LokiConfig::new(&cli.url).disable_tls_verification(cli.insecure);

    config = if cli.timeout_secs == 0 {
        config.without_timeout()
    } else {
        config.with_timeout(Duration::from_secs(cli.timeout_secs))
    };

    if let Some(token) = &cli.token {
        config = config.with_credentials(Credentials::bearer(token));
    } else if let Some(username) = &cli.username {
        config = config.with_credentials(Credentials::Basic {
            username: username.clone(),
            password: cli.password.clone(),
        });
    }

    if let Some(org_id) = &cli.org_id {
        config = config.with_org_id(org_id);
    }

    config
}

fn parse_labels(raw: &[String]) -> Result<Labels> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("label {pair:?} is not key=value"))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn print_response(response: &QueryResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    match response.data.as_ref().map(|d| &d.result) {
        Some(QueryResult::Streams(_)) => print!("{}", format_entries(&response.entries(), 0)),
        Some(_) => println!("{}", serde_json::to_string_pretty(&response.data)?),
        None => println!("{}", serde_json::to_string_pretty(response)?),
    }
    Ok(())
}
