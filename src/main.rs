use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use shelf::api::{create_router, AppState};
use shelf::batch::{spawn_scheduler, BatchRunner, JobQueue};
use shelf::config::Config;
use shelf::storage::{Database, DatabaseError};
use shelf::util::validate_feed_url;

#[derive(Parser, Debug)]
#[command(name = "shelf", about = "RSS ingestion batch for a bookmark shelf")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "shelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP trigger and run scheduled batches
    Serve,
    /// Run one batch now and exit
    RunOnce {
        /// Only process these feed ids (repeatable)
        #[arg(long = "feed", value_name = "ID")]
        feeds: Vec<i64>,
    },
    /// Register a feed (or reactivate it if already known)
    AddFeed { url: String, name: String },
    /// List registered feeds
    ListFeeds,
    /// Stop including a feed in batch runs
    PauseFeed { id: i64 },
    /// Include a paused feed in batch runs again
    ResumeFeed { id: i64 },
    /// Show the most recent bookmarks
    Bookmarks {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the state of a submitted batch job
    Job { id: String },
    /// Show recent batch log entries
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shelf=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: database '{}' is locked by another process. Please try again later.",
                config.database_path
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let result = match args.command {
        Command::Serve => serve(db.clone(), &config).await,
        Command::RunOnce { feeds } => run_once(db.clone(), &config, feeds).await,
        Command::AddFeed { url, name } => add_feed(&db, &url, &name).await,
        Command::ListFeeds => list_feeds(&db).await,
        Command::PauseFeed { id } => set_active(&db, id, false).await,
        Command::ResumeFeed { id } => set_active(&db, id, true).await,
        Command::Bookmarks { limit } => list_bookmarks(&db, limit).await,
        Command::Job { id } => show_job(&db, &id).await,
        Command::Logs { limit } => show_logs(&db, limit).await,
    };

    db.close().await;
    result
}

async fn serve(db: Database, config: &Config) -> Result<()> {
    let runner =
        BatchRunner::from_config(db.clone(), config).context("Failed to create HTTP client")?;
    let queue = JobQueue::spawn(runner);

    let resumed = queue
        .resume_unfinished()
        .await
        .context("Failed to resume unfinished jobs")?;
    if resumed > 0 {
        tracing::info!(jobs = resumed, "Resumed unfinished batch jobs");
    }

    let scheduler = spawn_scheduler(
        queue.clone(),
        Duration::from_secs(config.schedule_interval_minutes.saturating_mul(60)),
    );

    let app = create_router(AppState::new(db, queue));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    Ok(())
}

/// One-shot batch, the cron entry point. Batch failures are logged, not
/// turned into a non-zero exit.
async fn run_once(db: Database, config: &Config, feeds: Vec<i64>) -> Result<()> {
    let runner = BatchRunner::from_config(db, config).context("Failed to create HTTP client")?;
    let feed_ids = (!feeds.is_empty()).then_some(feeds);

    match runner.run(None, feed_ids.as_deref()).await {
        Ok(summary) => println!(
            "{}: {} feeds ({} ok, {} failed), {} items fetched, {} created",
            summary.status,
            summary.feeds_total,
            summary.feeds_succeeded,
            summary.feeds_failed,
            summary.items_fetched,
            summary.items_created
        ),
        Err(e) => tracing::error!(error = %e, "Batch failed"),
    }
    Ok(())
}

async fn add_feed(db: &Database, url: &str, name: &str) -> Result<()> {
    let url = validate_feed_url(url).context("Rejected feed URL")?;
    let id = db
        .insert_feed(url.as_str(), name)
        .await
        .context("Failed to save feed")?;
    println!("Feed {id}: {name} <{url}>");
    Ok(())
}

async fn list_feeds(db: &Database) -> Result<()> {
    let feeds = db.list_feeds().await.context("Failed to list feeds")?;
    if feeds.is_empty() {
        println!("No feeds registered. Add one with: shelf add-feed <URL> <NAME>");
        return Ok(());
    }
    for feed in feeds {
        let last = feed
            .last_fetched_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        let state = if feed.is_active { "active" } else { "inactive" };
        println!(
            "{:>4}  {:<8}  {}  <{}>  last fetched: {}",
            feed.id, state, feed.display_name, feed.url, last
        );
    }
    Ok(())
}

async fn set_active(db: &Database, id: i64, active: bool) -> Result<()> {
    let found = db
        .set_feed_active(id, active)
        .await
        .context("Failed to update feed")?;
    if !found {
        anyhow::bail!("No feed with id {id}");
    }
    println!("Feed {id} {}", if active { "resumed" } else { "paused" });
    Ok(())
}

async fn list_bookmarks(db: &Database, limit: i64) -> Result<()> {
    let bookmarks = db
        .list_bookmarks(limit)
        .await
        .context("Failed to list bookmarks")?;
    for bookmark in bookmarks {
        println!(
            "{}  {}  {}  <{}>",
            bookmark.created_at.to_rfc3339(),
            if bookmark.is_read { "read  " } else { "unread" },
            bookmark.title,
            bookmark.url
        );
    }
    Ok(())
}

async fn show_job(db: &Database, id: &str) -> Result<()> {
    let job = db
        .get_job(id)
        .await
        .context("Failed to read job")?
        .with_context(|| format!("No job with id {id}"))?;
    let targets = match &job.feed_ids {
        Some(ids) => format!("{ids:?}"),
        None => "all".to_string(),
    };
    let stamp = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
    };
    println!(
        "{}  {}  feeds={}  created={}  started={}  finished={}",
        job.id,
        job.status.as_str(),
        targets,
        job.created_at.to_rfc3339(),
        stamp(job.started_at),
        stamp(job.finished_at)
    );
    Ok(())
}

async fn show_logs(db: &Database, limit: i64) -> Result<()> {
    let logs = db
        .recent_batch_logs(limit)
        .await
        .context("Failed to read batch logs")?;
    for entry in logs {
        let scope = if entry.is_batch() {
            "batch".to_string()
        } else {
            format!("feed {}", entry.feed_id)
        };
        println!(
            "{}  {:<10}  {:<15}  fetched={} created={}{}",
            entry.started_at.to_rfc3339(),
            scope,
            entry.status.as_str(),
            entry.items_fetched,
            entry.items_created,
            entry
                .error_message
                .map(|m| format!("  error: {m}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
