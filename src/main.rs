use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yxd::cli::DownloadArgs;
use yxd::download::VideoOutcome;
use yxd::proxy::{self, TerminalPrompt};
use yxd::{
    Cli, Commands, Config, DownloadOutcome, DownloadPipeline, RunConfig, RunError, RunSummary,
    Session, SummaryFormat,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "yxd=debug" } else { "yxd=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Download(args) => {
            let config = Config::load()?;
            download(args, config, cli.quiet).await?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    anyhow::bail!("Config file already exists: {}", path.display());
                }
                Config::default().save_to(&path)?;
                println!("Configuration written to: {}", path.display());
            }

            if show || !init {
                let config = Config::load()?;
                config.display();
                println!("  Config File: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

async fn download(args: DownloadArgs, config: Config, quiet: bool) -> Result<()> {
    let flags = config.proxy_flags(&args);
    let mut prompt = TerminalPrompt::new();
    let proxy = proxy::resolve(&flags, TerminalPrompt::is_interactive(), &mut prompt)
        .map_err(RunError::from)?;

    match proxy.masked() {
        Some(masked) => tracing::info!("Using proxy {}", masked),
        None => tracing::info!("No proxy configured; connecting directly"),
    }

    let run_config = RunConfig::from_args(&args, &config, proxy.clone())?;
    let session = Arc::new(Session::new(proxy)?);
    let pipeline = DownloadPipeline::new(run_config, session, config.tools.yt_dlp.clone());

    tracing::info!("Starting download for channel: {}", args.channel);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} videos {msg}")?,
        );
        progress.enable_steady_tick(Duration::from_millis(120));
        progress.set_message("Listing videos...");
        progress
    };

    let result = pipeline
        .run(|outcome| {
            progress.inc(1);
            progress.set_message(progress_line(outcome));
        })
        .await;

    let summary = match result {
        Ok(summary) => {
            progress.finish_and_clear();
            summary
        }
        Err(e) => {
            progress.abandon_with_message("Run aborted");
            return Err(e.into());
        }
    };

    report(&summary, args.summary, args.summary_file.as_deref())
}

fn progress_line(outcome: &VideoOutcome) -> String {
    let status = match &outcome.outcome {
        DownloadOutcome::Saved(_) => style("saved").green(),
        DownloadOutcome::Skipped(_) => style("skipped").yellow(),
        DownloadOutcome::Failed(_) => style("failed").red(),
    };

    format!("{} {}", status, outcome.video.title)
}

fn report(summary: &RunSummary, format: SummaryFormat, summary_file: Option<&Path>) -> Result<()> {
    let rendered = match format {
        SummaryFormat::Text => summary.to_text(),
        SummaryFormat::Json => summary.to_json().context("Failed to serialize run summary")?,
    };

    println!("{}", rendered.trim_end());

    if let Some(path) = summary_file {
        fs_err::write(path, &rendered).context("Failed to write summary file")?;
        println!("Summary saved to: {}", path.display());
    }

    Ok(())
}
