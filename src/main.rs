use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};

use testdeck::config::Config;
use testdeck::run::bundle::{Asset, RunBundle};
use testdeck::run::executor::{ExecutionClient, ExecutorConfig};
use testdeck::run::recorder::{ResultRecorder, RunContext};
use testdeck::run::{report, RunScope};
use testdeck::storage;

#[derive(Parser)]
#[command(
    name = "testdeck",
    about = "Organize test scenarios into services and run them against an executor",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (falls back to TESTDECK_CONFIG, then ./testdeck.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + run pipeline)
    Serve {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run local feature/step files through the executor once
    Run {
        /// Feature file(s) to execute
        #[arg(long = "feature", required = true)]
        features: Vec<PathBuf>,

        /// Step definition file(s) to send along
        #[arg(long = "steps")]
        steps: Vec<PathBuf>,

        /// Executor base URL override
        #[arg(long)]
        url: Option<String>,

        /// Timeout in seconds override
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show recent run results
    Results {
        /// Maximum number of records to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default()),
    }
}

fn open_db(config: &Config) -> Result<storage::Pool> {
    if let Some(parent) = std::path::Path::new(&config.storage.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    storage::open_pool(&config.storage.db_path)
}

fn read_assets(paths: &[PathBuf]) -> Result<Vec<Asset>> {
    let mut assets = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        assets.push(Asset {
            name,
            content,
        });
    }
    Ok(assets)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting testdeck daemon");
            testdeck::serve(config).await?;
        }
        Commands::Run {
            features,
            steps,
            url,
            timeout,
        } => {
            let bundle = RunBundle {
                features: read_assets(&features)?,
                steps: read_assets(&steps)?,
            };
            bundle.validate()?;

            let mut executor_config = config.executor_config();
            if let Some(url) = url {
                executor_config.base_url = url;
            }
            if let Some(secs) = timeout {
                executor_config = ExecutorConfig::new(executor_config.base_url, Duration::from_secs(secs));
            }
            let client = ExecutionClient::new(executor_config);

            tracing::info!(features = bundle.features.len(), steps = bundle.steps.len(), "Running bundle");
            let started = Instant::now();
            let envelope = match client.execute(&bundle).await {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(error = %err, "Executor invocation failed");
                    testdeck::run::executor::ExecutionEnvelope::transport_failure(err.to_string())
                }
            };
            let duration = started.elapsed();
            let status = report::resolve_status(Some(&envelope));

            let pool = open_db(&config)?;
            let recorder = ResultRecorder::new(pool);
            let scenario_title = bundle.features.first().and_then(|f| f.name.clone());
            match recorder.record(
                RunContext {
                    scope: Some(RunScope::Scenario),
                    scenario_title,
                    ..Default::default()
                },
                &envelope,
                status,
                duration,
            ) {
                Ok(saved) => println!("Run {} recorded.", saved.run_id),
                Err(err) => tracing::warn!(error = %err, "Failed to persist run result"),
            }

            println!("\n=== Testdeck Run ===");
            println!("Status:   {}", status);
            println!("Duration: {} ms", duration.as_millis());
            if let Some(error) = &envelope.error {
                println!("Error:    {}", error);
            }
            if let Some(stdout) = &envelope.stdout {
                println!("\n{}", stdout);
            }
            println!("====================\n");
        }
        Commands::Results { limit } => {
            let pool = open_db(&config)?;
            let records = storage::results::list(&pool, Some(limit))?;
            if records.is_empty() {
                println!("No run results found.");
            } else {
                println!(
                    "{:<36} | {:<8} | {:<9} | {:<8} | Created",
                    "Run", "Scope", "Status", "ms"
                );
                println!("{:-<36}-|-{:-<8}-|-{:-<9}-|-{:-<8}-|-{:-<20}", "", "", "", "", "");
                for rec in records {
                    println!(
                        "{:<36} | {:<8} | {:<9} | {:<8} | {}",
                        rec.run_id,
                        rec.scope.as_str(),
                        rec.status,
                        rec.duration_ms,
                        rec.created_at.to_rfc3339()
                    );
                }
            }
        }
    }

    Ok(())
}
