mod analyze;
mod inspect;
mod schedule;
mod store;
mod trend;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use geolens_scoring::Metric;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "geolens")]
#[command(about = "Brand visibility analysis across AI answer engines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full prompt battery for a project and print the report
    Analyze {
        /// Project definition (YAML)
        #[arg(long)]
        project: PathBuf,
        /// Comma-separated providers, overriding the project's list
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// Whole-batch deadline, overriding GEOLENS_BATCH_TIMEOUT_SECS
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Compare a metric between two periods of stored reports
    Trend {
        #[arg(long)]
        project_id: String,
        /// First day of the current period (YYYY-MM-DD)
        #[arg(long)]
        current_start: NaiveDate,
        /// Last day of the current period, inclusive
        #[arg(long)]
        current_end: NaiveDate,
        #[arg(long)]
        prior_start: NaiveDate,
        /// Last day of the prior period, inclusive
        #[arg(long)]
        prior_end: NaiveDate,
        /// mention_rate, global_score or sentiment_score
        #[arg(long, default_value = "mention_rate")]
        metric: Metric,
    },
    /// List providers with availability and capabilities
    Providers,
    /// Validate a scoring rules file
    Rules {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Run the analysis on a cron schedule until interrupted
    Schedule {
        #[arg(long)]
        project: PathBuf,
        /// Six-field cron expression, e.g. "0 0 6 * * MON"
        #[arg(long)]
        cron: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = geolens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            project,
            models,
            timeout_secs,
        } => analyze::run_analyze(&config, &project, models, timeout_secs).await,
        Commands::Trend {
            project_id,
            current_start,
            current_end,
            prior_start,
            prior_end,
            metric,
        } => {
            let periods =
                trend::Periods::from_days(current_start, current_end, prior_start, prior_end)?;
            trend::run_trend(&config, &project_id, &periods, metric).await
        }
        Commands::Providers => inspect::run_providers(&config),
        Commands::Rules { path } => {
            inspect::run_rules(path.as_deref().unwrap_or(&config.rules_path))
        }
        Commands::Schedule { project, cron } => {
            schedule::run_schedule(&config, &project, &cron).await
        }
    }
}

#[cfg(test)]
mod tests;
