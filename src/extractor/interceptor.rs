// src/extractor/interceptor.rs

//! Caption recovery from the player's own `caption_captionasset/getUrl` call.

use super::{captions::parse_captions, validate::validate_transcript};
use crate::{
    browser::PageSession,
    client::RobustClient,
    constants,
    models::{Transcript, TranscriptSourceType},
    symbols, utils,
};
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;
use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"'\\<>]+"#).unwrap());

/// Signed caption URLs in a getUrl response body. The API answers with a bare
/// JSON string, a list of strings, or (multirequest) nested objects; anything
/// unparseable is scanned for URLs.
pub fn parse_signed_urls(body: &str) -> Vec<String> {
    let mut urls = Vec::new();
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(value) => collect_urls(&value, &mut urls),
        Err(_) => urls.extend(URL_RE.find_iter(body).map(|m| m.as_str().to_string())),
    }
    let mut seen = std::collections::HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    urls
}

fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if s.starts_with("http://") || s.starts_with("https://") => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_urls(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_urls(v, out)),
        _ => {}
    }
}

#[derive(Clone)]
pub struct CaptionInterceptor {
    client: RobustClient,
    wait: Duration,
}

impl CaptionInterceptor {
    pub fn new(client: RobustClient, wait: Duration) -> Self {
        Self { client, wait }
    }

    /// `page` must have been opened with a caption-resolution observer.
    /// Waits at most the configured window for a usable getUrl response;
    /// returns `None` (noting why in `errors`) when nothing usable arrived.
    pub async fn extract(&self, page: &dyn PageSession, errors: &mut Vec<String>) -> Option<Transcript> {
        let started = Instant::now();
        let urls = self.await_signed_urls(page, self.wait).await;
        if urls.is_empty() {
            debug!("No caption URL after {:?}", started.elapsed());
            errors.push(constants::kaltura::NO_CAPTION_INTERCEPTED.to_string());
            return None;
        }
        println!(
            "    {} Caption URL arrived after {:.1}s",
            *symbols::NET,
            started.elapsed().as_secs_f32()
        );
        self.fetch_first_valid(&urls, "API", errors).await
    }

    /// Drains whatever the observer caught after the main window closed.
    pub async fn second_chance(&self, page: &dyn PageSession, errors: &mut Vec<String>) -> Option<Transcript> {
        let urls = self.await_signed_urls(page, Duration::ZERO).await;
        if urls.is_empty() {
            return None;
        }
        info!("Caption URL arrived late, retrying the caption API");
        self.fetch_first_valid(&urls, "late API", errors).await
    }

    async fn await_signed_urls(&self, page: &dyn PageSession, window: Duration) -> Vec<String> {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(response) = page.next_response(remaining).await else {
                return Vec::new();
            };
            debug!("Observed {} ({})", utils::redact_url(&response.url), response.status);
            if response.status != 200 {
                continue;
            }
            let urls = response.body.as_deref().map(parse_signed_urls).unwrap_or_default();
            if !urls.is_empty() {
                return urls;
            }
        }
    }

    /// Tries each URL in order; the first caption file that parses and
    /// validates wins.
    pub async fn fetch_first_valid(
        &self,
        urls: &[String],
        label: &str,
        errors: &mut Vec<String>,
    ) -> Option<Transcript> {
        for url in urls {
            let body = match self.client.fetch_text(url.as_str()).await {
                Ok(body) if !body.trim().is_empty() => body,
                Ok(_) => {
                    errors.push(format!("{} caption file was empty", label));
                    continue;
                }
                Err(e) => {
                    let e = e.without_url();
                    let origin = utils::redact_url(url);
                    warn!("{} caption fetch from {} failed: {}", label, origin, e);
                    errors.push(format!("{} fetch error ({}): {}", label, origin, e));
                    continue;
                }
            };
            let text = parse_captions(&body);
            match validate_transcript(&text) {
                Ok(()) => {
                    info!("Transcript via {} ({} chars)", label, text.len());
                    return Some(Transcript {
                        text,
                        source_type: TranscriptSourceType::NetworkIntercept,
                        origin: utils::redact_url(url),
                    });
                }
                Err(reason) => errors.push(format!("{} caption rejected: {}", label, reason)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signed_urls_shapes() {
        assert_eq!(
            parse_signed_urls(r#""https://cdn.kaltura.com/api_v3/caption/serve/ks/abc""#),
            vec!["https://cdn.kaltura.com/api_v3/caption/serve/ks/abc"]
        );
        assert_eq!(
            parse_signed_urls(r#"["https://a/x.vtt", 3, "short", "https://a/x.vtt", "https://b/y.srt"]"#),
            vec!["https://a/x.vtt", "https://b/y.srt"]
        );
        assert_eq!(
            parse_signed_urls(r#"{"result":[{"url":"https:\/\/a\/x.vtt"}],"code":null}"#),
            vec!["https://a/x.vtt"]
        );
        assert_eq!(
            parse_signed_urls("<xml><result>https://a/x.vtt?ks=1</result></xml>"),
            vec!["https://a/x.vtt?ks=1"]
        );
        assert!(parse_signed_urls(r#"{"objectType":"KalturaAPIException"}"#).is_empty());
    }
}
