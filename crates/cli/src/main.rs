use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use history::FileHistoryStore;
use server::{
    ConfigOverrides, RecommendRequest, RecommendService, Recommendation, ServerConfig, TaskStatus,
};
use tracing::{debug, info};

/// Scene based recommendation engine
#[derive(Parser)]
#[command(name = "recommend-engine")]
#[command(about = "Runs config-driven recommendation pipelines", long_about = None)]
struct Cli {
    /// Path to server.yaml
    #[arg(short, long, default_value = "configs/server.yaml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to users.yaml
    #[arg(long)]
    users: Option<PathBuf>,

    /// Path to pipelines.json
    #[arg(long)]
    pipelines: Option<PathBuf>,

    /// Path to llm.yaml
    #[arg(long)]
    llm: Option<PathBuf>,

    /// Path to history.jsonl
    #[arg(long)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene's pipeline for a user
    Recommend {
        /// The user's bearer token
        #[arg(long)]
        token: String,

        /// Scene to run, e.g. "music"
        #[arg(long)]
        scene: String,

        /// Favorites for this request, comma separated
        #[arg(long, value_delimiter = ',')]
        favorites: Option<Vec<String>>,

        /// Submit as a background task and poll until it finishes
        #[arg(long = "async")]
        run_async: bool,

        /// Print the run's trace log
        #[arg(long)]
        trace: bool,
    },

    /// List the configured scenes
    Scenes,

    /// Drop history records older than the retention window
    CleanupHistory {
        /// Days of history to keep
        #[arg(long, default_value = "30")]
        retain_days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config)
        .context("Failed to load server config")?
        .with_overrides(ConfigOverrides {
            debug: cli.debug,
            users: cli.users,
            pipelines: cli.pipelines,
            llm: cli.llm,
            history: cli.history,
        });

    // Initialize tracing; RUST_LOG wins over the debug flag
    let default_level = if config.server.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
    debug!("Effective config: {:?}", config);

    match cli.command {
        Commands::Recommend {
            token,
            scene,
            favorites,
            run_async,
            trace,
        } => {
            let service = load_service(&config)?;
            let mut request = RecommendRequest::new(token, scene);
            request.favorites = favorites;
            let outcome = if run_async {
                handle_recommend_async(&service, request).await
            } else {
                handle_recommend(&service, request, trace).await
            };
            // The runtime stops when main returns; history writes must land first.
            service.flush_history().await;
            outcome?
        }
        Commands::Scenes => handle_scenes(&load_service(&config)?),
        Commands::CleanupHistory { retain_days } => handle_cleanup(&config, retain_days)?,
    }

    Ok(())
}

fn load_service(config: &ServerConfig) -> Result<RecommendService> {
    let start = Instant::now();
    let service = RecommendService::from_config(config).context("Failed to initialize service")?;
    println!("{} Loaded pipelines in {:?}", "✓".green(), start.elapsed());
    Ok(service)
}

/// Handle the 'recommend' command
async fn handle_recommend(
    service: &RecommendService,
    request: RecommendRequest,
    show_trace: bool,
) -> Result<()> {
    let start = Instant::now();
    match service.recommend(request).await {
        Ok(recommendation) => {
            print_recommendation(&recommendation);
            if show_trace {
                print_trace(&recommendation.trace);
            }
            info!("Request served in {:?}", start.elapsed());
            Ok(())
        }
        Err(server::ServiceError::RecommendationFailed { message, trace }) => {
            // The trace is the only way to tell which node failed.
            print_trace(&trace);
            bail!("recommendation failed: {}", message)
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle the 'recommend --async' command
async fn handle_recommend_async(service: &RecommendService, request: RecommendRequest) -> Result<()> {
    let task = service.submit(request)?;
    println!("{} Submitted task {}", "→".cyan(), task.id.bold());

    let mut last_status = task.status;
    loop {
        let task = service.task(&task.id)?;
        if task.status != last_status {
            println!("  status: {}", task.status.to_string().yellow());
            last_status = task.status;
        }

        match task.status {
            TaskStatus::Completed => {
                let items = task.result.unwrap_or_default();
                println!("{}", format!("Task {} returned {} items:", task.id, items.len()).bold().blue());
                for (rank, item) in items.iter().enumerate() {
                    println!("{}. {} [{}]", (rank + 1).to_string().green(), item.name, item.source);
                }
                return Ok(());
            }
            TaskStatus::Failed => {
                bail!(
                    "task {} failed: {}",
                    task.id,
                    task.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    }
}

/// Handle the 'scenes' command
fn handle_scenes(service: &RecommendService) {
    println!("{}", "Configured scenes:".bold().blue());
    let engine = service.engine();
    for scene in engine.scenes() {
        let Some(pipeline) = engine.pipeline(scene) else {
            continue;
        };
        let timeout = pipeline
            .timeout_hint()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|| "default".to_string());
        println!(
            "{}{} - {} ({} nodes, timeout {})",
            "• ".green(),
            scene.bold(),
            pipeline.description(),
            pipeline.nodes().len(),
            timeout
        );
    }
}

/// Handle the 'cleanup-history' command
fn handle_cleanup(config: &ServerConfig, retain_days: u32) -> Result<()> {
    let store = FileHistoryStore::open(&config.paths.history)
        .with_context(|| format!("Failed to open history {}", config.paths.history.display()))?;
    let before = store.len();
    let removed = store.cleanup(retain_days).context("History cleanup failed")?;
    println!(
        "{} Removed {} of {} records older than {} days from {}",
        "✓".green(),
        removed,
        before,
        retain_days,
        config.paths.history.display()
    );
    Ok(())
}

fn print_recommendation(recommendation: &Recommendation) {
    println!(
        "{}",
        format!("Recommendations for '{}':", recommendation.scene).bold().blue()
    );
    if recommendation.items.is_empty() {
        println!("  (no items)");
    }
    for (rank, item) in recommendation.items.iter().enumerate() {
        let marker = if item.metadata.contains_key("is_mix_in") {
            " ★".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{}. {}{} - Score: {:.2} [{}]",
            (rank + 1).to_string().green(),
            item.name,
            marker,
            item.score,
            item.source
        );
    }
}

fn print_trace(trace: &[String]) {
    println!("{}", "Trace:".bold());
    for line in trace {
        println!("  {}", line.dimmed());
    }
}
