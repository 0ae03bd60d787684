// src/crawler/mod.rs

//! Course crawling: one page, or a modules index plus every module item it
//! links to (one level of fan-out, never recursive).

pub mod provider;

pub use provider::classify_provider;

use crate::{
    browser::{BrowserDriver, PageSession, evaluate_into, scripts},
    config::AppConfig,
    constants,
    error::*,
    models::{DiscoveredLink, LinkReport, LinkType, SkippedPage},
    utils,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawLink {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    href: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPageLinks {
    heading: Option<String>,
    breadcrumb: Option<String>,
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawModuleItem {
    module_name: String,
    text: String,
    href: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawModuleItems {
    items: Vec<RawModuleItem>,
}

#[derive(Debug, Clone)]
struct PendingVisit {
    url: String,
    label: String,
    module_name: Option<String>,
    item_text: Option<String>,
    is_entry: bool,
}

/// Result of one step of a crawl.
#[derive(Debug, Clone)]
pub enum PageVisit {
    Visited {
        url: String,
        module_name: String,
        links: Vec<DiscoveredLink>,
    },
    Skipped(SkippedPage),
}

#[derive(Clone)]
pub struct CourseCrawler {
    driver: Arc<dyn BrowserDriver>,
    config: Arc<AppConfig>,
}

impl CourseCrawler {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: Arc<AppConfig>) -> Self {
        Self { driver, config }
    }

    /// A fresh cursor over `entry_url`. Nothing is loaded until the first
    /// call to [`CrawlCursor::next`]; starting a new cursor from the same URL
    /// crawls again from scratch.
    pub fn cursor(&self, entry_url: &str) -> CrawlCursor {
        let modules_mode = utils::is_modules_index(entry_url);
        let mut queue = VecDeque::new();
        queue.push_back(PendingVisit {
            url: entry_url.to_string(),
            label: entry_url.to_string(),
            module_name: None,
            item_text: None,
            is_entry: true,
        });
        CrawlCursor {
            crawler: self.clone(),
            entry_url: entry_url.to_string(),
            modules_mode,
            queue,
            seen_hrefs: HashSet::new(),
            entry_title: None,
            finished: false,
        }
    }

    /// Runs a cursor to completion and assembles the links report.
    pub async fn crawl(&self, entry_url: &str) -> AppResult<LinkReport> {
        self.crawl_with(entry_url, |_, _| {}).await
    }

    /// Like [`crawl`](Self::crawl), reporting each step and the number of
    /// pages still queued as it goes.
    pub async fn crawl_with<F>(&self, entry_url: &str, mut on_visit: F) -> AppResult<LinkReport>
    where
        F: FnMut(&PageVisit, usize),
    {
        let mut cursor = self.cursor(entry_url);
        let mut links = Vec::new();
        let mut skipped = Vec::new();
        while let Some(step) = cursor.next().await {
            let visit = step?;
            on_visit(&visit, cursor.remaining());
            match visit {
                PageVisit::Visited { links: found, .. } => links.extend(found),
                PageVisit::Skipped(page) => skipped.push(page),
            }
        }
        Ok(LinkReport::new(
            entry_url.to_string(),
            cursor.entry_title().unwrap_or_default().to_string(),
            links,
            skipped,
        ))
    }

    /// Opens `url`, retrying transient load failures with a doubling delay.
    async fn open_with_retries(&self, url: &str) -> AppResult<Box<dyn PageSession>> {
        let attempts = self.config.page_load_retries + 1;
        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1u64 << (attempt - 1).min(5)));
                debug!("Retrying '{}' in {:?} (attempt {}/{})", url, delay, attempt + 1, attempts);
                tokio::time::sleep(delay).await;
            }
            match self.driver.open(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Loading '{}' failed: {}", url, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::PageLoad {
            url: url.to_string(),
            reason: "no attempts made".to_string(),
        }))
    }
}

pub struct CrawlCursor {
    crawler: CourseCrawler,
    entry_url: String,
    modules_mode: bool,
    queue: VecDeque<PendingVisit>,
    seen_hrefs: HashSet<String>,
    entry_title: Option<String>,
    finished: bool,
}

impl CrawlCursor {
    pub fn entry_title(&self) -> Option<&str> {
        self.entry_title.as_deref()
    }

    /// Module items still waiting to be visited.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Visits the next page. A fatal error ends the cursor.
    pub async fn next(&mut self) -> Option<AppResult<PageVisit>> {
        if self.finished {
            return None;
        }
        let visit = self.queue.pop_front()?;
        let result = self.visit(visit).await;
        if matches!(&result, Err(e) if e.is_fatal()) {
            self.finished = true;
            self.queue.clear();
        }
        Some(result)
    }

    async fn visit(&mut self, visit: PendingVisit) -> AppResult<PageVisit> {
        let page = match self.crawler.open_with_retries(&visit.url).await {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if visit.is_entry => return Err(e),
            Err(e) => return Ok(self.skip(&visit, e.to_string())),
        };
        let outcome = self.read_page(page.as_ref(), &visit).await;
        if let Err(e) = page.close().await {
            debug!("Closing '{}' failed: {}", visit.url, e);
        }
        match outcome {
            Ok(v) => Ok(v),
            Err(e) if e.is_fatal() || visit.is_entry => Err(e),
            Err(e) => Ok(self.skip(&visit, e.to_string())),
        }
    }

    async fn read_page(&mut self, page: &dyn PageSession, visit: &PendingVisit) -> AppResult<PageVisit> {
        let final_url = page.current_url().await?;
        if utils::is_login_url(&final_url) {
            return Err(AppError::AuthInvalid);
        }

        if visit.is_entry {
            self.entry_title = Some(page.title().await.unwrap_or_default());
            if self.modules_mode {
                let items: RawModuleItems =
                    evaluate_into(page, "module item scan", scripts::MODULE_ITEMS).await?;
                info!("Modules index '{}' lists {} item(s)", self.entry_url, items.items.len());
                let mut seen = HashSet::new();
                for item in items.items {
                    if item.href.is_empty() || !seen.insert(item.href.clone()) {
                        continue;
                    }
                    let text = utils::truncate_chars(item.text.trim(), constants::LINK_TEXT_MAX_CHARS);
                    self.queue.push_back(PendingVisit {
                        url: item.href,
                        label: text.clone(),
                        module_name: Some(item.module_name.trim().to_string()),
                        item_text: Some(text),
                        is_entry: false,
                    });
                }
            }
        }

        let raw: RawPageLinks = evaluate_into(page, "link scan", scripts::PAGE_LINKS).await?;
        let module_name = visit
            .module_name
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| raw.breadcrumb.clone().filter(|b| !b.trim().is_empty()))
            .or_else(|| raw.heading.clone().filter(|h| !h.trim().is_empty()))
            .map(|m| m.trim().to_string())
            .unwrap_or_default();

        let links = build_links(raw.links, &module_name, visit.item_text.as_deref(), self.modules_mode)
            .into_iter()
            .filter(|l| self.seen_hrefs.insert(l.href.clone()))
            .collect::<Vec<_>>();
        debug!("'{}': {} new link(s) under module '{}'", visit.url, links.len(), module_name);

        Ok(PageVisit::Visited {
            url: visit.url.clone(),
            module_name,
            links,
        })
    }

    fn skip(&self, visit: &PendingVisit, reason: String) -> PageVisit {
        warn!("Skipping '{}' ({}): {}", visit.label, visit.url, reason);
        PageVisit::Skipped(SkippedPage {
            url: visit.url.clone(),
            label: visit.label.clone(),
            reason,
        })
    }
}

/// Filters and classifies the raw links of one page. `videos_only` keeps
/// only links with a recognised provider.
fn build_links(
    raw: Vec<RawLink>,
    module_name: &str,
    item_text: Option<&str>,
    videos_only: bool,
) -> Vec<DiscoveredLink> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|l| {
            let href = l.href.trim().to_string();
            let lower = href.to_lowercase();
            if href.is_empty()
                || href.starts_with('#')
                || lower.starts_with("javascript:")
                || lower.starts_with("about:")
            {
                return None;
            }
            if !seen.insert(href.clone()) {
                return None;
            }
            let video_provider = classify_provider(&href);
            if videos_only && !video_provider.is_video() {
                return None;
            }
            Some(DiscoveredLink {
                text: utils::truncate_chars(l.text.trim(), constants::LINK_TEXT_MAX_CHARS),
                href,
                containing_module: module_name.to_string(),
                canvas_item_text: item_text.map(str::to_string),
                link_type: if l.kind == "iframe" { LinkType::Iframe } else { LinkType::Anchor },
                video_provider,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoProvider;

    fn raw(kind: &str, text: &str, href: &str) -> RawLink {
        RawLink {
            kind: kind.into(),
            text: text.into(),
            href: href.into(),
        }
    }

    #[test]
    fn test_build_links_filters_and_classifies() {
        let links = build_links(
            vec![
                raw("anchor", "Syllabus", "https://canvas.x.edu/courses/1/pages/syllabus"),
                raw("anchor", "", "javascript:void(0)"),
                raw("anchor", "top", "#top"),
                raw("iframe", "Lecture 1", "https://kaf.x.edu/browseandembed/1_abc"),
                raw("iframe", "Lecture 1 again", "https://kaf.x.edu/browseandembed/1_abc"),
                raw("iframe", "blank", "about:blank"),
            ],
            "Week 1",
            None,
            false,
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].video_provider, VideoProvider::None);
        assert_eq!(links[1].video_provider, VideoProvider::Kaltura);
        assert_eq!(links[1].link_type, LinkType::Iframe);
        assert_eq!(links[1].containing_module, "Week 1");
    }

    #[test]
    fn test_videos_only_and_text_truncation() {
        let long = "x".repeat(500);
        let links = build_links(
            vec![
                raw("anchor", "Syllabus", "https://canvas.x.edu/courses/1/pages/syllabus"),
                raw("anchor", &long, "https://youtu.be/abc"),
            ],
            "Week 2",
            Some("Intro video"),
            true,
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text.chars().count(), constants::LINK_TEXT_MAX_CHARS);
        assert_eq!(links[0].canvas_item_text.as_deref(), Some("Intro video"));
    }
}
