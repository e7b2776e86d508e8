//! Folio - status-driven publishing pipeline.
//!
//! Watches a folder tree of Markdown articles, routes them by status,
//! collects editor approval, and publishes the site.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use folio::approval::server;
use folio::{
    slugify, ApprovalCoordinator, Config, FolderWatcher, Mailbox, MaildirMailbox, PendingStore, Pipeline,
    ReplyOutcome, Status, StatusRouter, WatcherSettings,
};

/// Status-driven publishing pipeline
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./folio.toml, then the user config dir)
    #[arg(short, long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch folders, serve approvals, and deploy
    Run,

    /// Process every article once and exit
    Scan,

    /// List articles waiting for approval
    Pending {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate the configuration and show the folder layout
    CheckConfig,

    /// Print the URL slug for a title
    Slug {
        /// Title to slugify
        title: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Run => cmd_run(cli.config).await?,
        Commands::Scan => cmd_scan(cli.config).await?,
        Commands::Pending { format } => cmd_pending(cli.config, &format)?,
        Commands::CheckConfig => cmd_check_config(cli.config)?,
        Commands::Slug { title } => println!("{}", slugify(&title)),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "folio", &mut io::stdout());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("Failed to load configuration")
}

/// Run the full pipeline until interrupted.
async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config).context("Failed to set up pipeline")?;

    let mut watcher = FolderWatcher::start(Arc::clone(&pipeline.processor), WatcherSettings::from_config(&config))
        .context("Failed to start folder watcher")?;

    let mut background = Vec::new();

    if config.email.enabled {
        if let Some(ref maildir) = config.email.maildir {
            let mailbox = MaildirMailbox::new(maildir);
            mailbox.ensure_layout().context("Failed to prepare maildir")?;
            let every = Duration::from_secs(config.email.poll_secs.max(1));
            background.push(tokio::spawn(poll_mailbox(mailbox, Arc::clone(&pipeline.coordinator), every)));
        }
    }

    if config.deploy.interval_mins > 0 {
        let every = Duration::from_secs(config.deploy.interval_mins * 60);
        background.push(tokio::spawn(periodic_deploy(Arc::clone(&pipeline.coordinator), every)));
    }

    let preview_dir = config.preview_dir();
    let serving = server::serve(
        Arc::clone(&pipeline.coordinator),
        config.approval.token.clone(),
        &preview_dir,
        &config.approval.host,
        config.approval.port,
    );

    tokio::select! {
        result = serving => result.context("Approval server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    watcher.stop();
    for task in background {
        task.abort();
    }
    Ok(())
}

/// Apply decisions from email replies.
async fn poll_mailbox(mailbox: MaildirMailbox, coordinator: Arc<ApprovalCoordinator>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let replies = match mailbox.fetch_replies().await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read mailbox");
                continue;
            }
        };

        for reply in replies {
            match coordinator.handle_reply(&reply).await {
                Ok(ReplyOutcome::Approved(article)) => {
                    tracing::info!(id = %article.id(), "Approved by email");
                }
                Ok(ReplyOutcome::Rejected(article)) => {
                    tracing::info!(id = %article.id(), "Rejected by email");
                }
                Ok(ReplyOutcome::Ignored) => {}
                Err(e) if e.is_not_found() => {
                    tracing::warn!(subject = %reply.subject, error = %e, "Reply does not match a pending article");
                }
                Err(e) => tracing::error!(subject = %reply.subject, error = %e, "Failed to apply reply"),
            }
        }
    }
}

/// Rebuild and deploy on a fixed interval.
async fn periodic_deploy(coordinator: Arc<ApprovalCoordinator>, every: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        match coordinator.build_and_deploy().await {
            Ok(()) => tracing::info!("Periodic deploy finished"),
            Err(e) => tracing::error!(error = %e, "Periodic deploy failed"),
        }
    }
}

/// Process every article once.
async fn cmd_scan(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config).context("Failed to set up pipeline")?;
    pipeline.processor.router().ensure_folders().context("Failed to create status folders")?;

    let summary = pipeline.processor.scan_all().await;
    println!("Processed: {}  Skipped: {}  Failed: {}", summary.processed, summary.skipped, summary.failed);

    if summary.failed > 0 {
        anyhow::bail!("{} article(s) failed to process", summary.failed);
    }
    Ok(())
}

/// List pending approvals.
fn cmd_pending(config_path: Option<PathBuf>, format: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = PendingStore::load(config.pending_file()).context("Failed to read pending approvals")?;
    let pending = store.list();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&pending)?),
        "text" => {
            if pending.is_empty() {
                println!("No articles waiting for approval");
            }
            for p in &pending {
                println!(
                    "{}  {}  {} ({})  {}",
                    p.id,
                    p.requested_at.format("%Y-%m-%d %H:%M"),
                    p.article.title(),
                    p.article.author(),
                    p.article.file_path.display()
                );
            }
        }
        other => anyhow::bail!("Unknown format '{other}' (expected text or json)"),
    }
    Ok(())
}

/// Validate configuration and print the layout.
fn cmd_check_config(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let router = StatusRouter::from_config(&config)?;

    println!("Configuration OK");
    println!("Base path: {}", config.storage.base_path.display());
    println!("Language:  {}", config.storage.language);
    for status in Status::ALL {
        println!("  {:<10} -> {}", status.name(), router.folder_for(status)?.display());
    }
    println!("Approval:  {}", config.public_url());
    println!("ntfy:      {}", if config.ntfy.enabled { "enabled" } else { "disabled" });
    println!("email:     {}", if config.email.enabled { "enabled" } else { "disabled" });
    println!("git:       {}", if config.git.auto_commit { "enabled" } else { "disabled" });
    println!("rsync:     {}", if config.rsync.enabled { "enabled" } else { "disabled" });
    Ok(())
}
