use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use boutique_insights::config::InsightsConfig;
use boutique_insights::scoring::Scorer;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "boutique-insights",
    about = "Two-tier health checks and failure prediction for LLM-powered storefront services",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (overrides INSIGHTS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides logging.level; RUST_LOG wins)
    #[arg(long, global = true, env = "INSIGHTS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + scheduler)
    Serve {
        /// Bind address (overrides server.bind and HTTP_PORT)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the threshold-only health check (no model call)
    QuickCheck {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Run error prediction once
    Predict {
        /// Run deep analysis even when every metric is within threshold
        #[arg(long)]
        force: bool,
    },

    /// Score a prompt and, optionally, the response it received
    Score {
        /// User prompt
        #[arg(long)]
        prompt: String,

        /// Chatbot response
        #[arg(long)]
        response: Option<String>,

        /// Number of products the response was built from
        #[arg(long, default_value = "0")]
        products: usize,

        /// Comma-separated catalog product ids
        #[arg(long, value_delimiter = ',')]
        catalog: Option<Vec<String>>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}

type BoxedSubscriber = Box<dyn tracing::Subscriber + Send + Sync>;

/// RUST_LOG beats `--log-level`, which beats `fallback`.
fn subscriber(cli_level: Option<&str>, fallback: &str, json: bool) -> BoxedSubscriber {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or(fallback)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.finish())
    }
}

fn print_score(label: &str, value: Option<f64>) {
    match value {
        Some(v) => println!("{:<22} : {:.2}", label, v),
        None => println!("{:<22} : n/a", label),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = cli.log_level.as_deref();

    // Config loading logs through a bootstrap subscriber until the
    // configured one can be built.
    let bootstrap = tracing::subscriber::set_default(subscriber(level, "info", cli.log_json));
    let mut config = InsightsConfig::resolve(cli.config.as_deref())?;
    drop(bootstrap);
    tracing::subscriber::set_global_default(subscriber(
        level,
        &config.logging.level,
        cli.log_json || config.logging.json,
    ))
    .context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting insights daemon");
            boutique_insights::serve(config).await?;
        }
        Commands::QuickCheck { json } => {
            tracing::info!("Running quick check");
            let service = boutique_insights::build_service(&config)?;
            let result = service.quick_check().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("\n=== Quick Health Check ===");
                for (metric, value) in &result.metrics {
                    println!("{:<22} : {:.4}", metric, value);
                }
                if result.concerns.is_empty() {
                    println!("\nNo concerns.");
                } else {
                    println!("\nConcerns:");
                    for concern in &result.concerns {
                        println!(" - {}", concern);
                    }
                }
                println!("Deep analysis needed: {}", result.needs_deep_analysis);
                println!();
            }
        }
        Commands::Predict { force } => {
            tracing::info!(force, "Running error prediction");
            let service = boutique_insights::build_service(&config)?;
            let prediction = service.predict_errors(force).await;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::Score {
            prompt,
            response,
            products,
            catalog,
            json,
        } => {
            let scorer = Scorer::new(&config.scoring).context("failed to build scorer")?;
            let catalog: Option<HashSet<String>> = catalog.map(|ids| {
                ids.into_iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            });
            let report = scorer.score(&prompt, response.as_deref(), products, catalog.as_ref());

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_score("Quality score", report.quality_score);
                print_score("Injection score", Some(report.injection_score));
                print_score("Invalid product rate", report.invalid_product_rate);
                if scorer.injection().is_attempt(&prompt) {
                    println!("Prompt flagged as a likely injection attempt.");
                }
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}
