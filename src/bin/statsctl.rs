use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use traffic_stats::client::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use traffic_stats::ui::{render_table, render_text_chart};
use traffic_stats::{
    ClientConfig, Granularity, HttpStatsApi, NewStat, StatChanges, StatsError, StatsStore,
};

const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// Manage daily visit counts stored by the traffic stats service.
#[derive(Debug, Parser)]
#[command(name = "statsctl", version)]
struct Cli {
    /// Base URL of the traffic stats service
    #[arg(long, env = "STATS_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "STATS_API_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List entries, newest first
    List,
    /// Show the aggregated chart
    Chart(ChartArgs),
    /// Add an entry for a date
    Add {
        /// Date as YYYY-MM-DD
        date: String,
        #[arg(allow_negative_numbers = true)]
        visits: i64,
    },
    /// Change the date or visits of an entry
    Edit(EditArgs),
    /// Delete an entry
    Delete { id: String },
    /// Create entries from a JSON array of {"date", "visits"} objects
    Import { file: PathBuf },
    /// Delete several entries at once
    Purge {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct ChartArgs {
    #[arg(long, short, default_value = "daily")]
    granularity: Granularity,
}

#[derive(Debug, Args)]
struct EditArgs {
    id: String,
    #[arg(long)]
    date: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    visits: Option<i64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` when set, `info` otherwise. Logs go to stderr so stdout only
/// carries the chart or table.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let api = HttpStatsApi::new(ClientConfig {
        base_url: cli.api_url,
        timeout: Duration::from_secs(cli.timeout_secs),
    })?;
    let store = StatsStore::new(api);
    store.load().await?;

    match cli.command {
        Command::List => print!("{}", render_table(&store.records())),
        Command::Chart(args) => print_chart(&store, args.granularity)?,
        Command::Add { date, visits } => {
            let record = store.add(&NewStat::new(date, visits)).await?;
            println!("added {} ({} visits) as {}", record.date, record.visits, record.id);
            print_chart(&store, Granularity::Daily)?;
        }
        Command::Edit(args) => {
            let changes = StatChanges {
                date: args.date,
                visits: args.visits,
            };
            let record = store.edit(&args.id, &changes).await?;
            println!("updated {}: {} ({} visits)", record.id, record.date, record.visits);
            print!("{}", render_table(&store.records()));
        }
        Command::Delete { id } => {
            store.delete(&id).await?;
            println!("deleted {id}");
            print!("{}", render_table(&store.records()));
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file).await?;
            let candidates: Vec<NewStat> = serde_json::from_slice(&bytes)?;
            let created = store.import(&candidates).await?;
            println!("imported {} entries", created.len());
            print_chart(&store, Granularity::Weekly)?;
        }
        Command::Purge { ids } => {
            let deleted = store.delete_many(&ids).await?;
            println!("deleted {deleted} entries");
            print!("{}", render_table(&store.records()));
        }
    }
    Ok(())
}

fn print_chart(store: &StatsStore<HttpStatsApi>, granularity: Granularity) -> Result<(), StatsError> {
    let buckets = store.chart(granularity)?;
    print!("{}", render_text_chart(granularity, &buckets));
    Ok(())
}
