// src/workflows.rs

use crate::{
    ExtractionContext,
    browser::{BrowserDriver, chrome::ChromeDriver},
    cli::{LinkArgs, VideoArgs},
    client::RobustClient,
    config::{AppConfig, session::SessionStore},
    crawler::{CourseCrawler, PageVisit},
    error::{AppError, AppResult},
    ledger::Ledger,
    models::{LinkReport, VideoProvider, VideoTask},
    pipeline::{self, ExtractionPipeline, auth, debug::DebugInspector},
    symbols, ui, utils,
};
use colored::*;
use itertools::Itertools;
use log::{info, warn};
use std::sync::{Arc, atomic::AtomicBool};

/// Launches Chromium, runs `work` against it and always shuts it down.
async fn with_browser<F, Fut, T>(config: &AppConfig, work: F) -> AppResult<T>
where
    F: FnOnce(Arc<dyn BrowserDriver>) -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let chrome = Arc::new(ChromeDriver::launch(config).await?);
    let driver: Arc<dyn BrowserDriver> = chrome.clone();
    let result = work(driver).await;
    match Arc::try_unwrap(chrome) {
        Ok(chrome) => chrome.shutdown().await,
        Err(_) => warn!("Browser still referenced at shutdown, leaving it to drop"),
    }
    result
}

/// `extract-page` and `crawl-course`: authenticate, crawl, save the links file.
pub(crate) async fn run_extract_links(config: Arc<AppConfig>, args: &LinkArgs, course_crawl: bool) -> AppResult<()> {
    if course_crawl && !utils::is_modules_index(&args.url) {
        return Err(AppError::UserInputError(format!(
            "crawl-course expects a Canvas modules URL (…/courses/<id>/modules), got '{}'",
            args.url
        )));
    }
    let store = SessionStore::new(&args.session.session_file);

    let report = with_browser(&config, |driver| {
        let config = config.clone();
        async move {
            auth::ensure_authenticated(driver.as_ref(), &store, &config, &args.url).await?;

            ui::print_header(if course_crawl { "Crawling course modules" } else { "Extracting page links" });
            let crawler = CourseCrawler::new(driver, config);
            crawler
                .crawl_with(&args.url, |visit, remaining| match visit {
                    PageVisit::Visited { url, module_name, links } => {
                        let module = if module_name.is_empty() { "-" } else { module_name.as_str() };
                        println!(
                            "  {} {} {} ({} link(s), {} left)",
                            *symbols::OK,
                            utils::truncate_text(module, 40).cyan(),
                            utils::truncate_text(url, 60).dimmed(),
                            links.len(),
                            remaining
                        );
                    }
                    PageVisit::Skipped(page) => {
                        println!(
                            "  {} skipped {}: {}",
                            *symbols::WARN,
                            utils::truncate_text(&page.label, 50),
                            page.reason.yellow()
                        );
                    }
                })
                .await
        }
    })
    .await?;

    report.save(&args.output)?;
    info!(
        "Links report saved to {:?}: {} links, {} video",
        args.output, report.total_links, report.video_links_count
    );
    print_link_summary(&report, args);
    Ok(())
}

fn print_link_summary(report: &LinkReport, args: &LinkArgs) {
    ui::print_sub_header("Links");
    println!("  Page:        {}", report.page_title);
    println!("  Total links: {}", report.total_links);
    println!("  Video links: {}", report.video_links_count);
    let by_provider = report
        .links
        .iter()
        .filter(|l| l.video_provider.is_video())
        .counts_by(|l| l.video_provider);
    for (provider, count) in by_provider.into_iter().sorted_by_key(|(p, _)| p.as_str()) {
        println!("    {:<13} {}", provider.as_str(), count);
    }
    if !report.skipped_pages.is_empty() {
        println!("  {} {} page(s) could not be loaded", *symbols::WARN, report.skipped_pages.len());
    }
    ui::success(&format!("Saved to {}", args.output.display()));

    let kaltura = report.count_provider(VideoProvider::Kaltura);
    if kaltura > 0 {
        println!(
            "\n{} {} Kaltura video(s) found. Run: {} extract-video --links-file {}",
            *symbols::INFO,
            kaltura,
            clap::crate_name!(),
            args.output.display()
        );
    }
}

/// `extract-video`: one ledger-tracked pass over the Kaltura links, or a
/// single debug inspection with `--debug`.
pub(crate) async fn run_extract_video(
    config: Arc<AppConfig>,
    http_client: Arc<RobustClient>,
    cancellation_token: Arc<AtomicBool>,
    args: &VideoArgs,
) -> AppResult<()> {
    let report = LinkReport::load(&args.links_file)?;
    let tasks: Vec<VideoTask> = report
        .links
        .iter()
        .filter_map(VideoTask::from_link)
        .unique_by(|t| t.source_url.clone())
        .collect();
    if tasks.is_empty() {
        ui::warn(&format!(
            "No Kaltura videos in '{}' ({} link(s) total).",
            args.links_file.display(),
            report.total_links
        ));
        return Ok(());
    }
    std::fs::create_dir_all(&args.output_dir)?;
    ui::info(&format!("{} Kaltura video(s) in {}", tasks.len(), args.links_file.display()));

    let store = SessionStore::new(&args.session.session_file);
    let probe_url = report.page_url.clone();

    with_browser(&config, |driver| {
        let config = config.clone();
        async move {
            auth::ensure_authenticated(driver.as_ref(), &store, &config, &probe_url).await?;

            if args.debug {
                let inspector = DebugInspector::new(driver, config);
                let debug_report = inspector.inspect(&tasks[0]).await?;
                let path = pipeline::debug::save_report(&debug_report, &args.output_dir)?;
                println!("\n{} Debug info saved to: {}", *symbols::INFO, path.display());
                pipeline::debug::print_summary(&debug_report);
                return Ok(());
            }

            let mut ledger = Ledger::open(pipeline::metadata_path(&args.output_dir))?;
            let reconciled = ledger.reconcile(tasks)?;
            if reconciled.recovered > 0 {
                ui::warn(&format!(
                    "{} video(s) were interrupted in a previous run and will be retried.",
                    reconciled.recovered
                ));
            }
            let selected = ledger.select_for_run(args.retry_failed)?;
            if selected.is_empty() {
                let msg = if args.retry_failed {
                    "No failed videos to retry.".to_string()
                } else {
                    format!("All {} video(s) already have transcripts.", ledger.total_videos())
                };
                ui::success(&msg);
                return Ok(());
            }

            ui::print_header(&format!(
                "Extracting {} transcript(s) (press {} to stop after the current video)",
                selected.len(),
                *symbols::CTRL_C
            ));
            let context = ExtractionContext {
                config,
                driver,
                http_client,
                cancellation_token,
            };
            let run = ExtractionPipeline::new(context, &args.output_dir)
                .run(&mut ledger, selected)
                .await?;
            run.print_report(&args.output_dir, ledger.path());
            println!(
                "\n{} Ledger: {}/{} video(s) have transcripts.",
                *symbols::INFO,
                ledger.transcripts_found(),
                ledger.total_videos()
            );
            Ok(())
        }
    })
    .await
}
