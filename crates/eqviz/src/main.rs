use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use eqviz::{router, AppState};
use eqviz_core::config::Settings;
use eqviz_core::repository::{MemoryRepository, PostgresRepository, Repository};
use eqviz_core::{analytics, db, report, users};
use eqviz_parser::CsvIngestor;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chemical equipment CSV analytics API and tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Run database migrations
    Migrate,
    /// Create a user and print its API token
    CreateUser {
        username: String,
    },
    /// Parse and analyze a local CSV file without storing it
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Keep everything in process memory instead of Postgres
    #[arg(long)]
    in_memory: bool,
    /// Create this user at startup and print its token (in-memory mode)
    #[arg(long, requires = "in_memory")]
    bootstrap_user: Option<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    path: PathBuf,
    /// Print summary and chart data as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Migrate => {
            let settings = Settings::from_env()?;
            let pool = connect_pool(&settings).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::CreateUser { username } => {
            let settings = Settings::from_env()?;
            let pool = connect_pool(&settings).await?;
            let repo = PostgresRepository::new(pool);
            let (user, token) = users::create_user(&repo, &username)
                .await
                .with_context(|| format!("failed to create user '{username}'"))?;
            println!("created user {} (id {})", user.username, user.id);
            println!("token: {token}");
            Ok(())
        }
        Command::Analyze(args) => analyze(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let settings = Settings::from_env()?;

    let repository: Arc<dyn Repository> = if args.in_memory {
        warn!("Using in-memory storage; data is lost on shutdown");
        let repo = MemoryRepository::new();
        if let Some(username) = args.bootstrap_user.as_deref() {
            let (user, token) = users::create_user(&repo, username).await?;
            println!("bootstrap user {} token: {token}", user.username);
        }
        Arc::new(repo)
    } else {
        let pool = connect_pool(&settings).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PostgresRepository::new(pool))
    };

    let bind_addr = settings.bind_addr;
    let app = router(AppState::new(repository, settings));

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let contents = std::fs::read(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(&contents);
    for warning in ingestor.warnings() {
        eprintln!("warning: {warning}");
    }
    if !success {
        for error in ingestor.errors() {
            eprintln!("error: {error}");
        }
        bail!("{} could not be ingested", args.path.display());
    }

    let snapshot = analytics::compute(&records);
    if args.json {
        let body = json!({
            "summary": analytics::summary_view(&snapshot),
            "chart_data": analytics::chart_view(&snapshot),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let name = args
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.path.display().to_string());
        let now = Utc::now();
        print!(
            "{}",
            report::render_report(&name, now, now, &snapshot, &records)
        );
    }

    Ok(())
}

async fn connect_pool(settings: &Settings) -> Result<db::DbPool> {
    let database_url = settings.require_database_url()?;
    db::connect(database_url, settings.db_max_connections)
        .await
        .context("failed to connect to Postgres")
}
