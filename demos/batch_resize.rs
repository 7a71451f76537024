//! Scale a directory of images with a live progress bar
//!
//! Usage: batch_resize <source> <dest> <scale> [config.toml|config.yaml]

use std::path::PathBuf;

use anyhow::{bail, Context};
use batchscale::{init_with_config, CancellationToken, Config, ProgressUpdate, Resizer};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: batch_resize <source> <dest> <scale> [config]");
    }

    let source = PathBuf::from(&args[0]);
    let dest = PathBuf::from(&args[1]);
    let scale: f64 = args[2]
        .parse()
        .with_context(|| format!("scale must be a number, got {:?}", args[2]))?;

    let config = match args.get(3) {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };
    init_with_config(&config)?;

    let resizer = Resizer::from_config(config)?;
    let mut updates = resizer.subscribe();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let bar = pb.clone();
    let reporter = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(ProgressUpdate::Started { total }) => bar.set_length(total as u64),
                Ok(ProgressUpdate::FileCompleted { source, success, state, .. }) => {
                    if !success {
                        bar.println(format!("{} {}", style("failed").red(), source.display()));
                    }
                    bar.set_message(format!("{}, eta {}", state.status_text(), state.eta_text()));
                    bar.inc(1);
                }
                Ok(ProgressUpdate::BatchCompleted { state }) => {
                    bar.println(format!(
                        "{} ({})",
                        state.status_text(),
                        state.speed_text()
                    ));
                    break;
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => bar.inc(skipped),
            }
        }
        bar.finish_and_clear();
    });

    let report = resizer
        .run_async(source, dest, scale, CancellationToken::new())
        .await;
    // The reporter stops on BatchCompleted, which a batch-level error never sends
    if report.is_err() {
        reporter.abort();
        pb.finish_and_clear();
    } else {
        let _ = reporter.await;
    }

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", style("Error").red().bold(), e.user_message());
            std::process::exit(2);
        }
    };

    println!("{}", style("Processing Summary:").bold());
    println!("  {}: {}", style("Processed").green(), report.succeeded());
    if report.failed() > 0 {
        println!("  {}: {}", style("Failed").red(), report.failed());
        for (path, failure) in report.failures() {
            println!("    {} [{}] {}", path.display(), failure.kind, failure.message);
        }
    }
    println!("  {}: {:.2}s", style("Duration").blue(), report.elapsed.as_secs_f64());
    println!(
        "  {}: {:.2}MB written",
        style("Size").cyan(),
        report.bytes_written() as f64 / 1024.0 / 1024.0
    );

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
