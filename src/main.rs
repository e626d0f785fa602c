use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use news_shorts::app::App;
use news_shorts::config::Config;
use news_shorts::error::Result;

#[derive(Parser, Debug)]
#[command(name = "news-shorts", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch all active sources (and NewsAPI when configured).
    Fetch,
    /// Classify unfiltered articles.
    Filter,
    /// Write 60-word summaries for approved articles.
    Summarize,
    /// Enforce retention and record a storage snapshot.
    Purge,
    /// Report estimated storage usage.
    Monitor,
    /// Fetch, filter, summarize, then purge.
    Run,
    /// Register sources from an OPML file.
    ImportOpml { path: PathBuf },
    /// Register a single feed source.
    AddSource {
        url: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List registered sources.
    Sources,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return ExitCode::from(1);
        }
    };

    match execute(&app, cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(1)
        }
    }
}

async fn execute(app: &App, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Fetch => {
            app.fetch().await?;
        }
        Commands::Filter => {
            app.filter().await?;
        }
        Commands::Summarize => {
            app.summarize().await?;
        }
        Commands::Purge => {
            let (_, storage) = app.purge().await?;
            println!("{storage}");
            return Ok(exit_code(storage.exit_code()));
        }
        Commands::Monitor => {
            let storage = app.monitor().await?;
            println!("{storage}");
            return Ok(exit_code(storage.exit_code()));
        }
        Commands::Run => {
            let report = app.run_all().await?;
            return Ok(exit_code(report.storage.exit_code()));
        }
        Commands::ImportOpml { path } => {
            let report = app.import_opml(&path).await?;
            println!(
                "Imported {} sources from {} ({} already present)",
                report.added,
                path.display(),
                report.existing
            );
        }
        Commands::AddSource { url, name } => match app.add_source(&name, &url).await? {
            Some(id) => println!("Added source {id}: {url}"),
            None => println!("Source already registered: {url}"),
        },
        Commands::Sources => {
            for source in app.sources().await? {
                let last = source
                    .last_fetched_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                let state = if source.is_active { "active" } else { "inactive" };
                println!("{:>4}  {:<8}  {}  {}  (last fetched: {})", source.id, state, source.name, source.url, last);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
