use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod highlight;
mod pages;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::{AppFactory, AppPaths};
use cli::Command;
use config::Config;
use highlight::{HtmlPage, MatchPolicy};
use pages::{CapturedPage, CategoryFilter};

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_file(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose, args.quiet);

    let paths = AppFactory::get_paths()?;
    let mut config = AppFactory::create_config(&paths.base_path)?;
    if args.local {
        config.backend.local_only = true;
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(args.command, paths, config))
}

async fn run(command: Command, paths: AppPaths, config: Config) -> anyhow::Result<()> {
    let orchestrator = || AppFactory::create_orchestrator(&paths, &config);

    match command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.server.listen.clone());
            let state = web::SharedState {
                orchestrator: orchestrator()?,
                tabs: highlight::tabs::Tabs::new(),
                capture: config.capture.clone(),
                highlight: config.highlight.clone(),
            };
            web::start_daemon(state, &listen).await?;
        }

        Command::Capture {
            url,
            html,
            content,
            title,
            favicon,
        } => {
            let max_chars = config.capture.max_content_chars;
            let (extracted_title, content) = match (html, content) {
                (Some(html), _) => {
                    let page = semantic::extract_page(&read_file(&html)?, max_chars);
                    (page.title, page.content)
                }
                (None, Some(content)) => (
                    String::new(),
                    semantic::normalize_text(&read_file(&content)?, max_chars),
                ),
                (None, None) => anyhow::bail!("either --html or --content is required"),
            };

            let report = orchestrator()?
                .capture(CapturedPage {
                    url,
                    title: title.unwrap_or(extracted_title),
                    content,
                    favicon,
                })
                .await?;
            print_json(&report)?;
        }

        Command::Search { query, category } => {
            let filter = CategoryFilter::parse(category.as_deref())?;
            let served = orchestrator()?.search(&query, filter).await?;
            log::info!("served by {}", served.source.label());
            print_json(&served.value)?;
        }

        Command::Compare { query } => {
            let served = orchestrator()?.compare(&query).await?;
            log::info!("served by {}", served.source.label());
            print_json(&served.value)?;
        }

        Command::Stats => {
            let served = orchestrator()?.stats().await?;
            print_json(&served.value)?;
        }

        Command::Health => {
            let served = orchestrator()?.health().await;
            print_json(&served.value)?;
        }

        // works on a file, no backend or store involved
        Command::Highlight {
            file,
            query,
            policy,
        } => {
            let mut page = HtmlPage::parse(&read_file(&file)?);
            if page.is_empty() {
                log::warn!("{file} has no text to highlight");
            }
            let policy = MatchPolicy::from_kind(policy.into(), &config.highlight.stoplist);
            let selection = highlight::apply_highlight(&mut page, &query, &policy)?;

            print_json(&serde_json::json!({
                "selection": selection,
                "marked": page.marked_texts(),
            }))?;
        }
    }

    Ok(())
}
