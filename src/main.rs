use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use feedsift::config::Config;
use feedsift::keywords::highlight;
use feedsift::pipeline::{Pipeline, PipelineOptions};
use feedsift::settings::SettingsHandle;
use feedsift::store::{Article, Snapshot};
use feedsift::util::strip_control_chars;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Get the config file path (~/.config/feedsift/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedsift")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedsift",
    about = "Fetch RSS feeds and rank articles by keyword matches"
)]
struct Args {
    /// Configuration file (default: ~/.config/feedsift/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single fetch cycle, print the result and exit
    #[arg(long)]
    once: bool,

    /// Print snapshots as JSON
    #[arg(long)]
    json: bool,

    /// Override the refresh interval in seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays parseable with --json
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(secs) = args.interval {
        config.refresh_interval_secs = secs;
    }

    if config.feeds.is_empty() {
        eprintln!("Warning: no feeds configured in {}", config_path.display());
        eprintln!("Add [[feeds]] entries with `url` and `name` to get started.");
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedsift/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let settings = SettingsHandle::new(config.to_settings());
    let options = PipelineOptions {
        fetch: config.fetch_options(),
        scheduled: !args.once,
    };
    let handle = Pipeline::new(client, settings, options).start();

    if args.once {
        let report = handle
            .refresh_and_wait()
            .await
            .context("Pipeline stopped before the fetch cycle completed")?;
        tracing::info!(
            feeds = report.feeds,
            failed = report.failed,
            inserted = report.inserted,
            "Fetch cycle finished"
        );
        let snapshot = handle.snapshot();
        if args.json {
            print_json(&snapshot)?;
        } else {
            let mut stdout = std::io::stdout().lock();
            for article in &snapshot.matched_articles {
                print_article(&mut stdout, article)?;
            }
        }
        handle.shutdown().await?;
        return Ok(());
    }

    println!(
        "Watching {} feeds every {}s (Ctrl-C to quit)",
        config.feeds.iter().filter(|f| f.enabled).count(),
        config.refresh_interval().as_secs()
    );

    let mut snapshots = handle.subscribe();
    let mut printed: HashSet<Uuid> = HashSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if args.json {
                    print_json(&snapshot)?;
                    continue;
                }
                let mut stdout = std::io::stdout().lock();
                for article in &snapshot.matched_articles {
                    if printed.insert(article.id) {
                        print_article(&mut stdout, article)?;
                    }
                }
                // Forget articles that left the ranking so they print again if they return
                let visible: HashSet<Uuid> = snapshot.matched_articles.iter().map(|a| a.id).collect();
                printed.retain(|id| visible.contains(id));
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

fn print_json(snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    println!("{json}");
    Ok(())
}

fn print_article(out: &mut impl Write, article: &Article) -> Result<()> {
    let title = strip_control_chars(&article.title);
    let snippet = strip_control_chars(&article.snippet);

    write!(out, "[{}] ", article.priority())?;
    write_highlighted(out, &title, &article.matched_keywords)?;
    writeln!(out, "  ({})", strip_control_chars(&article.source))?;
    if !snippet.is_empty() {
        write!(out, "    ")?;
        write_highlighted(out, &snippet, &article.matched_keywords)?;
        writeln!(out)?;
    }
    if let Some(url) = &article.url {
        writeln!(out, "    {}", strip_control_chars(url))?;
    }
    Ok(())
}

fn write_highlighted(out: &mut impl Write, text: &str, keywords: &[String]) -> Result<()> {
    for segment in highlight(text, keywords) {
        if segment.is_keyword {
            write!(out, "{BOLD}{}{RESET}", segment.text)?;
        } else {
            write!(out, "{}", segment.text)?;
        }
    }
    Ok(())
}
