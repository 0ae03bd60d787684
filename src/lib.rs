// src/lib.rs

pub mod browser;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod symbols;
pub mod ui;
pub mod utils;
mod workflows;

use crate::{
    browser::BrowserDriver,
    cli::{Cli, Command},
    client::RobustClient,
    config::AppConfig,
    error::AppResult,
};
use log::debug;
use std::sync::{Arc, atomic::AtomicBool};

/// Everything one extraction run needs, shared by reference-counting.
#[derive(Clone)]
pub struct ExtractionContext {
    pub config: Arc<AppConfig>,
    pub driver: Arc<dyn BrowserDriver>,
    pub http_client: Arc<RobustClient>,
    pub cancellation_token: Arc<AtomicBool>,
}

/// Library entry point, called by `main.rs`.
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<()> {
    debug!("CLI args: {:?}", args);
    let config = Arc::new(AppConfig::new(&args)?);
    debug!("Loaded config: {:?}", config);

    match &args.command {
        Command::ExtractPage(link_args) => workflows::run_extract_links(config, link_args, false).await,
        Command::CrawlCourse(link_args) => workflows::run_extract_links(config, link_args, true).await,
        Command::ExtractVideo(video_args) => {
            let http_client = Arc::new(RobustClient::new(config.clone())?);
            workflows::run_extract_video(config, http_client, cancellation_token, video_args).await
        }
    }
}
