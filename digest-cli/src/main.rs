//! Digest CLI - inspect gate decisions and query the digest backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use digest_core::{DigestConfig, Gate, GateConfig, GateDecision, GateRequest, GateRequestBuilder};
use digest_server::backend::models::ReportQuery;
use digest_server::BackendClient;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

#[derive(Parser)]
#[command(name = "digest")]
#[command(about = "Digest - edge gate and backend tooling for Cognition Digest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the gate decision for a request
    Check {
        /// Request path
        #[arg(short, long)]
        path: String,

        /// Authorization header value
        #[arg(short, long)]
        authorization: Option<String>,

        /// Cookie header value
        #[arg(long)]
        cookie: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a gateway configuration file
    Validate {
        /// Configuration file path
        file: PathBuf,
    },

    /// Measure gate throughput
    Benchmark {
        /// Number of requests to generate
        #[arg(short, long, default_value = "10000")]
        requests: usize,

        /// Number of parallel threads
        #[arg(short, long, default_value = "8")]
        threads: usize,
    },

    /// Call the backend API
    Backend {
        /// Backend base URL (defaults to configuration / BACKEND_URL)
        #[arg(long)]
        url: Option<String>,

        /// Bearer token sent with every call
        #[arg(long)]
        token: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serve canned data instead of calling the backend
        #[arg(long)]
        fixtures: bool,

        #[command(subcommand)]
        call: BackendCall,
    },
}

#[derive(Subcommand)]
enum BackendCall {
    /// Backend health
    Health,
    /// Fetch one report
    Report {
        /// Report id
        id: String,
    },
    /// List reports
    Reports {
        /// Only reports for this source
        #[arg(long)]
        source_id: Option<String>,

        /// Full-text filter
        #[arg(short, long)]
        q: Option<String>,
    },
    /// List subscriptions
    Subscriptions,
    /// List sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("digest=debug")
            .init();
    }

    match cli.command {
        Commands::Check {
            path,
            authorization,
            cookie,
            config,
            format,
        } => {
            check_command(path, authorization, cookie, config, format)?;
        }
        Commands::Validate { file } => {
            validate_command(file)?;
        }
        Commands::Benchmark { requests, threads } => {
            benchmark_command(requests, threads)?;
        }
        Commands::Backend {
            url,
            token,
            config,
            fixtures,
            call,
        } => {
            backend_command(url, token, config, fixtures, call).await?;
        }
    }

    Ok(())
}

fn check_command(
    path: String,
    authorization: Option<String>,
    cookie: Option<String>,
    config: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let config = DigestConfig::load(config.as_deref()).context("Failed to load configuration")?;
    let gate = Gate::new(&config.gate)?;

    let mut builder = GateRequestBuilder::new(path.clone());
    if let Some(value) = authorization {
        builder = builder.authorization(value);
    }
    if let Some(value) = cookie {
        builder = builder.cookie(value);
    }
    let request = builder.build();

    let start = Instant::now();
    let decision = gate.evaluate(&request);
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        OutputFormat::Text => {
            let credentials = gate.credentials(&request);

            println!("\n{} Gate Decision", "═".blue().bold());
            let status = if decision.is_allowed() {
                "ALLOWED".green()
            } else {
                "DENIED".red()
            };
            println!("{} Status: {}", "▸".blue(), status);
            println!("{} Path: {}", "▸".blue(), path);
            println!("{} Route: {}", "▸".blue(), gate.classify(&path).as_str());
            println!("{} Reason: {}", "▸".blue(), decision.label());
            if let GateDecision::Deny {
                denial: digest_core::Denial::Redirect { location },
            } = &decision
            {
                println!("{} Redirect: {}", "▸".blue(), location);
            }
            match &credentials.source {
                Some(source) => println!("{} Token source: {:?}", "▸".blue(), source),
                None => println!("{} Token source: none", "▸".blue()),
            }
            if gate.is_fail_open() {
                println!("{} Allow-list is empty (fail-open)", "!".yellow());
            }
            println!(
                "{} Evaluation time: {:.3}ms",
                "▸".blue(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    Ok(())
}

fn validate_command(file: PathBuf) -> Result<()> {
    println!("{} Validating {}...", "→".blue(), file.display());

    match DigestConfig::from_file(&file) {
        Ok(config) => {
            println!("{} Configuration is valid!", "✓".green());
            println!("  Public paths: {}", config.gate.public_paths.len());
            println!("  Protected prefixes: {}", config.gate.protected_prefixes.len());
            println!("  Static tokens: {}", config.gate.tokens.len());
            println!("  Backend: {}", config.backend.base_url());
        }
        Err(e) => {
            println!("{} Configuration is invalid:", "✗".red());
            println!("  {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn benchmark_command(requests: usize, threads: usize) -> Result<()> {
    use rayon::prelude::*;

    println!("{} Running benchmark...", "→".blue());
    println!("  Requests: {}", requests);
    println!("  Threads: {}", threads);

    let gate = Gate::new(&GateConfig {
        tokens: vec!["bench-token".to_string()],
        token_env: None,
        ..GateConfig::default()
    })?;

    let paths = ["/", "/dashboard", "/api/report/1", "/report/2/outline", "/health"];
    let test_requests: Vec<GateRequest> = (0..requests)
        .map(|i| {
            let builder = GateRequestBuilder::new(paths[i % paths.len()]);
            let builder = match i % 3 {
                0 => builder.bearer("bench-token"),
                1 => builder.cookie("theme=dark; digest-token=wrong"),
                _ => builder,
            };
            builder.build()
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to build thread pool")?;

    println!("{} Warming up...", "→".blue());
    for request in test_requests.iter().take(100) {
        let _ = gate.evaluate(request);
    }

    let start = Instant::now();
    let allowed = pool.install(|| {
        test_requests
            .par_iter()
            .filter(|request| gate.evaluate(request).is_allowed())
            .count()
    });
    let duration = start.elapsed();

    let denied = requests - allowed;
    let throughput = requests as f64 / duration.as_secs_f64();

    println!("\n{} Benchmark Results", "═".blue().bold());
    println!("{} Total requests: {}", "▸".blue(), requests);
    println!("{} Allowed: {}", "▸".blue(), allowed);
    println!("{} Denied: {}", "▸".blue(), denied);
    println!("{} Duration: {:.3}s", "▸".blue(), duration.as_secs_f64());
    println!("{} Throughput: {:.0} req/sec", "▸".blue(), throughput);
    if requests > 0 {
        println!(
            "{} Avg latency: {:.3}µs",
            "▸".blue(),
            duration.as_secs_f64() * 1_000_000.0 / requests as f64
        );
    }

    Ok(())
}

async fn backend_command(
    url: Option<String>,
    token: Option<String>,
    config: Option<PathBuf>,
    fixtures: bool,
    call: BackendCall,
) -> Result<()> {
    let config = DigestConfig::load(config.as_deref()).context("Failed to load configuration")?;
    let base_url = url.unwrap_or_else(|| config.backend.base_url().to_string());

    let mut client = BackendClient::new(&base_url)?
        .with_fixtures(fixtures || config.backend.fixtures)
        .with_service_tokens(config.gate.allow_list_source());
    if let Some(token) = token {
        client = client.with_bearer(token);
    }
    debug!(url = %client.base_url(), fixtures = client.fixtures_enabled(), "Backend client ready");

    let output: Value = match call {
        BackendCall::Health => serde_json::to_value(client.check_health().await?)?,
        BackendCall::Report { id } => serde_json::to_value(client.get_report(&id).await?)?,
        BackendCall::Reports { source_id, q } => {
            let query = ReportQuery {
                source_id,
                q,
                ..Default::default()
            };
            serde_json::to_value(client.list_reports(&query).await?)?
        }
        BackendCall::Subscriptions => serde_json::to_value(client.list_subscriptions().await?)?,
        BackendCall::Sources => serde_json::to_value(client.list_sources().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
