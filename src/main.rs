use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alpha_loop_lib::apps::{compass, hyper};
use alpha_loop_lib::core::{orchestrator, scheduler};
use alpha_loop_lib::{db, Config, DashboardId};

#[derive(Parser)]
#[command(
    name = "alpha-loop",
    about = "Daily market, crypto and research dashboard generator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip every AI call and use data-only fallbacks
    #[arg(long, global = true)]
    no_ai: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all sources once and rebuild the dashboards
    Run {
        /// Build a single dashboard (shield, coin, map, frontier, library, strategy, commander)
        #[arg(short, long)]
        app: Option<DashboardId>,
    },

    /// Build the economic compass static page
    Compass,

    /// Build the hyper-analytical crypto risk report
    Hyper,

    /// Run the unified pipeline on a cron schedule until Ctrl-C
    Schedule {
        /// Six-field cron expression (sec min hour dom mon dow)
        #[arg(long, default_value = scheduler::DEFAULT_CRON)]
        cron: String,
    },

    /// List recent AI reports from the local history
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if cli.no_ai {
        config.ai_disabled = true;
    }

    match cli.command {
        Commands::Run { app } => {
            let summary = orchestrator::run_unified(&config, app).await?;
            if let Some(model) = &summary.ai_model {
                tracing::info!("AI model used: {}", model);
            }
            if !summary.failures.is_empty() {
                anyhow::bail!("{} dashboard(s) failed: {}", summary.failures.len(), summary.failures.join("; "));
            }
        }
        Commands::Compass => {
            compass::build_site(&config).await?;
        }
        Commands::Hyper => {
            hyper::run(&config).await?;
        }
        Commands::Schedule { cron } => {
            scheduler::run_forever(config, &cron).await?;
        }
        Commands::History { limit } => {
            let pool = db::init(&config.data_dir).await?;
            let reports = db::recent_ai_reports(&pool, limit).await?;
            if reports.is_empty() {
                println!("No AI reports recorded yet.");
            }
            for r in reports {
                println!("#{:<4} {}  {:<10} {}", r.id, r.created_at, r.provider, r.model);
                println!("      {}", r.preview);
            }
        }
    }

    Ok(())
}
