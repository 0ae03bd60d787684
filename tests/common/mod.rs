// tests/common/mod.rs

//! Scripted stand-in for Chromium: each known URL has a canned page whose
//! script results and observed responses are fixed up front.

#![allow(dead_code)]

use async_trait::async_trait;
use canvas_transcriber::{
    browser::{BrowserDriver, FrameInfo, ObserveOptions, ObservedResponse, PageSession, StoredCookie},
    error::{AppError, AppResult},
};
use serde_json::{Value, json};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Debug, Clone, Default)]
pub struct FakePageSpec {
    /// Where the page ends up; defaults to the requested URL.
    pub final_url: Option<String>,
    pub title: String,
    /// Script source -> JSON result. Unlisted scripts return `{}`.
    pub scripts: HashMap<&'static str, Value>,
    /// Delivered while the observer is polled.
    pub responses: Vec<ObservedResponse>,
    /// Only delivered once the first batch has been drained.
    pub late_responses: Vec<ObservedResponse>,
    /// Number of loads that fail before the page comes up.
    pub failures_before_load: usize,
}

impl FakePageSpec {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn script(mut self, script: &'static str, result: Value) -> Self {
        self.scripts.insert(script, result);
        self
    }

    pub fn response(mut self, response: ObservedResponse) -> Self {
        self.responses.push(response);
        self
    }

    pub fn late_response(mut self, response: ObservedResponse) -> Self {
        self.late_responses.push(response);
        self
    }

    pub fn redirect_to(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    pub fn failing(mut self, times: usize) -> Self {
        self.failures_before_load = times;
        self
    }
}

/// A Kaltura getUrl answer pointing at `caption_url`.
pub fn caption_api_response(caption_url: &str) -> ObservedResponse {
    ObservedResponse {
        url: "https://cdnapisec.kaltura.com/api_v3/service/caption_captionasset/action/getUrl?id=1_cap".to_string(),
        status: 200,
        mime_type: "application/json".to_string(),
        body: Some(json!(caption_url).to_string()),
    }
}

#[derive(Default)]
struct BrowserState {
    pages: HashMap<String, FakePageSpec>,
    load_attempts: HashMap<String, usize>,
    opened: Vec<String>,
    evaluated: Vec<(String, String)>,
    cookies: Vec<StoredCookie>,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, spec: FakePageSpec) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), spec);
        self
    }

    /// Every URL navigated to, in order (including failed loads).
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn open_count(&self, url: &str) -> usize {
        self.opened().iter().filter(|u| u.as_str() == url).count()
    }

    /// How many times `script` ran on the page loaded from `url`.
    pub fn eval_count(&self, url: &str, script: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .evaluated
            .iter()
            .filter(|(u, s)| u == url && *s == script)
            .count()
    }

    fn load(&self, url: &str, options: Option<&ObserveOptions>) -> AppResult<LoadedPage> {
        let mut state = self.state.lock().unwrap();
        state.opened.push(url.to_string());
        let attempts = {
            let n = state.load_attempts.entry(url.to_string()).or_default();
            *n += 1;
            *n
        };
        let spec = state.pages.get(url).cloned().ok_or_else(|| AppError::PageLoad {
            url: url.to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;
        if attempts <= spec.failures_before_load {
            return Err(AppError::PageLoad {
                url: url.to_string(),
                reason: "net::ERR_TIMED_OUT".to_string(),
            });
        }
        let observe = |list: &[ObservedResponse]| -> VecDeque<ObservedResponse> {
            match options {
                Some(opts) => list
                    .iter()
                    .filter(|r| opts.filter.matches(&r.url))
                    .cloned()
                    .map(|mut r| {
                        if !opts.capture_body {
                            r.body = None;
                        }
                        r
                    })
                    .collect(),
                None => VecDeque::new(),
            }
        };
        Ok(LoadedPage {
            requested_url: url.to_string(),
            final_url: spec.final_url.clone().unwrap_or_else(|| url.to_string()),
            responses: observe(&spec.responses),
            late_responses: observe(&spec.late_responses),
            late_released: false,
            spec,
        })
    }
}

struct LoadedPage {
    requested_url: String,
    final_url: String,
    spec: FakePageSpec,
    responses: VecDeque<ObservedResponse>,
    late_responses: VecDeque<ObservedResponse>,
    late_released: bool,
}

pub struct FakePage {
    browser: FakeBrowser,
    loaded: Mutex<Option<LoadedPage>>,
}

#[async_trait]
impl PageSession for FakePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let page = self.browser.load(url, None)?;
        *self.loaded.lock().unwrap() = Some(page);
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self
            .loaded
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.final_url.clone())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> AppResult<String> {
        Ok(self
            .loaded
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.spec.title.clone())
            .unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> AppResult<Value> {
        let guard = self.loaded.lock().unwrap();
        let Some(page) = guard.as_ref() else {
            return Ok(json!({}));
        };
        self.browser
            .state
            .lock()
            .unwrap()
            .evaluated
            .push((page.requested_url.clone(), script.to_string()));
        Ok(page.spec.scripts.get(script).cloned().unwrap_or_else(|| json!({})))
    }

    async fn frames(&self) -> AppResult<Vec<FrameInfo>> {
        let url = self.current_url().await?;
        Ok(vec![FrameInfo { url, name: None }])
    }

    async fn next_response(&self, _timeout: Duration) -> Option<ObservedResponse> {
        let mut guard = self.loaded.lock().unwrap();
        let page = guard.as_mut()?;
        if let Some(r) = page.responses.pop_front() {
            return Some(r);
        }
        if !page.late_released {
            // the first drain ends here; late arrivals show up on the next one
            page.late_released = true;
            return None;
        }
        page.late_responses.pop_front()
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_page(&self) -> AppResult<Box<dyn PageSession>> {
        Ok(Box::new(FakePage {
            browser: self.clone(),
            loaded: Mutex::new(None),
        }))
    }

    async fn open_observed(&self, url: &str, options: ObserveOptions) -> AppResult<Box<dyn PageSession>> {
        let page = self.load(url, Some(&options))?;
        Ok(Box::new(FakePage {
            browser: self.clone(),
            loaded: Mutex::new(Some(page)),
        }))
    }

    async fn cookies(&self) -> AppResult<Vec<StoredCookie>> {
        Ok(self.state.lock().unwrap().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> AppResult<()> {
        self.state.lock().unwrap().cookies = cookies.to_vec();
        Ok(())
    }
}
