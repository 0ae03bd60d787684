// src/browser/mod.rs

//! Browser seam. The crawl and extraction code only talks to
//! [`BrowserDriver`] / [`PageSession`]; `chrome` provides the real
//! implementation on top of chromiumoxide.

pub mod chrome;
pub mod scripts;

use crate::{constants, error::*};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, time::Duration};

/// A network response seen by a page observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    pub status: i64,
    pub mime_type: String,
    /// Only populated when the observer was asked to capture bodies.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFilter {
    /// Every fragment must appear in the lowercased URL.
    AllOf(Vec<String>),
    /// At least one fragment must appear in the lowercased URL.
    AnyOf(Vec<String>),
}

impl ResponseFilter {
    /// Kaltura's `caption_captionasset/getUrl` call.
    pub fn caption_resolution() -> Self {
        Self::AllOf(
            constants::kaltura::CAPTION_RESOLUTION_PATTERN
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn debug_capture() -> Self {
        Self::AnyOf(
            constants::kaltura::DEBUG_NETWORK_KEYS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        match self {
            Self::AllOf(parts) => parts.iter().all(|p| url.contains(p.as_str())),
            Self::AnyOf(parts) => parts.iter().any(|p| url.contains(p.as_str())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObserveOptions {
    pub filter: ResponseFilter,
    pub capture_body: bool,
}

impl ObserveOptions {
    pub fn caption_resolution() -> Self {
        Self {
            filter: ResponseFilter::caption_resolution(),
            capture_body: true,
        }
    }

    pub fn debug_capture() -> Self {
        Self {
            filter: ResponseFilter::debug_capture(),
            capture_body: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub url: String,
    pub name: Option<String>,
}

/// Browser cookie as persisted in the session file.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Seconds since the epoch; `None` for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish()
    }
}

/// One open browser tab.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigates and waits for the load to finish.
    async fn goto(&self, url: &str) -> AppResult<()>;
    async fn current_url(&self) -> AppResult<String>;
    async fn title(&self) -> AppResult<String>;
    /// Evaluates a self-invoking script and returns its JSON result.
    async fn evaluate(&self, script: &str) -> AppResult<Value>;
    async fn frames(&self) -> AppResult<Vec<FrameInfo>>;
    /// Next observed response, waiting at most `timeout`. Pages opened
    /// without an observer always return `None`.
    async fn next_response(&self, timeout: Duration) -> Option<ObservedResponse>;
    async fn close(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self) -> AppResult<Box<dyn PageSession>>;

    /// Opens `url` with a response observer that is attached before the
    /// first navigation request, so nothing the player fires during start-up
    /// can be missed.
    async fn open_observed(
        &self,
        url: &str,
        options: ObserveOptions,
    ) -> AppResult<Box<dyn PageSession>>;

    async fn cookies(&self) -> AppResult<Vec<StoredCookie>>;
    async fn set_cookies(&self, cookies: &[StoredCookie]) -> AppResult<()>;

    async fn open(&self, url: &str) -> AppResult<Box<dyn PageSession>> {
        let page = self.new_page().await?;
        page.goto(url).await?;
        Ok(page)
    }
}

/// Runs a script and deserializes its result, turning a shape mismatch into
/// [`AppError::UnexpectedShape`].
pub async fn evaluate_into<T: DeserializeOwned>(
    page: &dyn PageSession,
    script_name: &str,
    script: &str,
) -> AppResult<T> {
    let value = page.evaluate(script).await?;
    serde_json::from_value(value)
        .map_err(|e| AppError::UnexpectedShape(format!("{} returned unexpected data: {}", script_name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_resolution_filter() {
        let filter = ResponseFilter::caption_resolution();
        assert!(filter.matches(
            "https://cdnapisec.kaltura.com/api_v3/service/caption_captionasset/action/getUrl?id=1_abc"
        ));
        assert!(filter.matches("https://x/API_V3/Caption_CaptionAsset/GETURL"));
        assert!(!filter.matches("https://cdnapisec.kaltura.com/api_v3/service/caption_captionasset/action/list"));
        assert!(!filter.matches("https://example.com/getUrl"));
    }

    #[test]
    fn test_debug_filter_matches_any_key() {
        let filter = ResponseFilter::debug_capture();
        assert!(filter.matches("https://cdn/x.vtt"));
        assert!(filter.matches("https://kaltura.com/p/1"));
        assert!(!filter.matches("https://canvas.example/app.js"));
    }

    #[test]
    fn test_cookie_debug_redacts_value() {
        let cookie = StoredCookie {
            name: "canvas_session".into(),
            value: "super-secret".into(),
            domain: ".instructure.com".into(),
            path: "/".into(),
            expires: None,
            secure: true,
            http_only: true,
        };
        let shown = format!("{:?}", cookie);
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("canvas_session"));
    }
}
