// src/main.rs

use canvas_transcriber::{
    cli::Cli,
    error::AppError,
    logging::init_logger,
    run_from_cli, symbols,
};
use clap::{CommandFactory, FromArgMatches};
use colored::*;
use log::{error, info, warn};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }
    let after_help = format!(
        "Examples:\n  # Collect video links from every module item\n  {bin} crawl-course \"https://canvas.school.edu/courses/123/modules\"\n\n  # Links from a single page\n  {bin} extract-page \"https://canvas.school.edu/courses/123/pages/week-1\"\n\n  # Download transcripts, then retry only the failures\n  {bin} extract-video --output-dir transcripts\n  {bin} extract-video --retry-failed\n\n  # Inspect why the first video has no transcript\n  {bin} extract-video --debug --log-level debug",
        bin = clap::crate_name!()
    );
    let cmd = Cli::command().after_help(after_help);
    let matches = cmd.get_matches();
    let args = match Cli::from_arg_matches(&matches) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };
    init_logger(args.log_level);
    let cancellation_token = Arc::new(AtomicBool::new(false));
    let handler_token = cancellation_token.clone();

    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                return;
            }
            if handler_token.load(Ordering::Relaxed) {
                println!("\nSecond interrupt, exiting now...");
                warn!("Second Ctrl+C, forcing exit.");
                std::process::exit(130);
            }
            println!(
                "\n{} Stopping after the current video... Press {} again to force quit.",
                *symbols::WARN,
                *symbols::CTRL_C
            );
            warn!("Interrupt requested with Ctrl+C.");
            handler_token.store(true, Ordering::Relaxed);
        }
    });

    if let Err(e) = run_from_cli(args, cancellation_token).await {
        match e {
            AppError::UserInterrupt => {
                warn!("Interrupted by user.");
                eprintln!("\n{} {}", *symbols::WARN, "Interrupted. Progress so far is saved.".yellow());
                std::process::exit(130);
            }
            AppError::AuthInvalid => {
                error!("Exiting on invalid session: {}", e);
                eprintln!("\n{} {}", *symbols::FAIL, format!("{}", e).red());
                eprintln!(
                    "{} Run again without --headless to log in, or delete the session file to start fresh.",
                    *symbols::INFO
                );
                std::process::exit(1);
            }
            _ => {
                error!("Run failed: {}", e);
                eprintln!("\n{} {}", *symbols::FAIL, format!("Error: {}", e).red());
                std::process::exit(1);
            }
        }
    }
    info!("Exited normally.");
}
