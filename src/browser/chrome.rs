// src/browser/chrome.rs

use super::{BrowserDriver, FrameInfo, ObserveOptions, ObservedResponse, PageSession, StoredCookie};
use crate::{config::AppConfig, error::*};
use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::browser_protocol::{
        network::{
            CookieParam, EnableParams, EventLoadingFinished, EventResponseReceived,
            GetResponseBodyParams, RequestId, TimeSinceEpoch,
        },
        page::{FrameTree, GetFrameTreeParams},
    },
    cdp::js_protocol::runtime::EvaluateParams,
};
use futures::StreamExt;
use log::{debug, trace, warn};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use tokio::{
    sync::{Mutex as TokioMutex, mpsc},
    task::JoinHandle,
};

/// Single Chromium instance driven over CDP. One per run.
pub struct ChromeDriver {
    browser: Browser,
    handler: JoinHandle<()>,
    nav_timeout: Duration,
}

impl ChromeDriver {
    pub async fn launch(config: &AppConfig) -> AppResult<Self> {
        let mut builder = BrowserConfig::builder().request_timeout(config.page_load_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(AppError::BrowserLaunch)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("CDP handler event error: {}", e);
                }
            }
            debug!("CDP handler loop finished");
        });

        debug!("Browser launched (headless: {})", config.headless);
        Ok(Self {
            browser,
            handler,
            nav_timeout: config.page_load_timeout,
        })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn new_page(&self) -> AppResult<Box<dyn PageSession>> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromePage::new(page, None, None, self.nav_timeout)))
    }

    async fn open_observed(
        &self,
        url: &str,
        options: ObserveOptions,
    ) -> AppResult<Box<dyn PageSession>> {
        let page = self.browser.new_page("about:blank").await?;

        // Subscribe before navigating: the player fires getUrl during its
        // first seconds of life.
        page.execute(EnableParams::default()).await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let observer_page = page.clone();
        let ObserveOptions { filter, capture_body } = options;

        let observer = tokio::spawn(async move {
            let mut awaiting_body: HashMap<RequestId, ObservedResponse> = HashMap::new();
            loop {
                tokio::select! {
                    Some(event) = responses.next() => {
                        if !filter.matches(&event.response.url) {
                            continue;
                        }
                        let hit = ObservedResponse {
                            url: event.response.url.clone(),
                            status: event.response.status,
                            mime_type: event.response.mime_type.clone(),
                            body: None,
                        };
                        if capture_body {
                            awaiting_body.insert(event.request_id.clone(), hit);
                        } else if tx.send(hit).is_err() {
                            break;
                        }
                    }
                    Some(event) = finished.next() => {
                        if let Some(mut hit) = awaiting_body.remove(&event.request_id) {
                            hit.body = fetch_body(&observer_page, event.request_id.clone()).await;
                            if tx.send(hit).is_err() {
                                break;
                            }
                        }
                    }
                    else => break,
                }
            }
        });

        let session = ChromePage::new(page, Some(rx), Some(observer), self.nav_timeout);
        session.goto(url).await?;
        Ok(Box::new(session))
    }

    async fn cookies(&self) -> AppResult<Vec<StoredCookie>> {
        let cookies = self.browser.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: (!c.session && c.expires > 0.0).then_some(c.expires),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> AppResult<()> {
        let params = cookies
            .iter()
            .map(|c| {
                let mut builder = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only);
                if let Some(expires) = c.expires {
                    builder = builder.expires(TimeSinceEpoch::new(expires));
                }
                builder.build().map_err(|e| AppError::Other(anyhow!(e)))
            })
            .collect::<AppResult<Vec<_>>>()?;
        self.browser.set_cookies(params).await?;
        Ok(())
    }
}

async fn fetch_body(page: &Page, request_id: RequestId) -> Option<String> {
    match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(resp) => {
            let body = resp.result;
            if body.base64_encoded {
                BASE64
                    .decode(body.body.as_bytes())
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            } else {
                Some(body.body)
            }
        }
        Err(e) => {
            debug!("Could not read response body: {}", e);
            None
        }
    }
}

fn flatten_frames(tree: FrameTree, out: &mut Vec<FrameInfo>) {
    out.push(FrameInfo {
        url: tree.frame.url,
        name: tree.frame.name,
    });
    for child in tree.child_frames.unwrap_or_default() {
        flatten_frames(child, out);
    }
}

/// Owns one tab. Closing is async in chromiumoxide, so `Drop` falls back to
/// a spawned close when `close()` was never awaited.
pub struct ChromePage {
    page: Option<Page>,
    responses: Option<TokioMutex<mpsc::UnboundedReceiver<ObservedResponse>>>,
    observer: Option<JoinHandle<()>>,
    nav_timeout: Duration,
    runtime: tokio::runtime::Handle,
}

impl ChromePage {
    fn new(
        page: Page,
        responses: Option<mpsc::UnboundedReceiver<ObservedResponse>>,
        observer: Option<JoinHandle<()>>,
        nav_timeout: Duration,
    ) -> Self {
        Self {
            page: Some(page),
            responses: responses.map(TokioMutex::new),
            observer,
            nav_timeout,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn page(&self) -> AppResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Other(anyhow!("page already closed")))
    }
}

#[async_trait]
impl PageSession for ChromePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let page = self.page()?;
        match tokio::time::timeout(self.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::PageLoad {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AppError::PageLoad {
                url: url.to_string(),
                reason: format!("no load event within {:?}", self.nav_timeout),
            }),
        }
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.page()?.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> AppResult<String> {
        Ok(self.page()?.get_title().await?.unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> AppResult<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| AppError::Other(anyhow!(e)))?;
        let result = self.page()?.evaluate_expression(params).await?;
        Ok(result.into_value::<Value>()?)
    }

    async fn frames(&self) -> AppResult<Vec<FrameInfo>> {
        let tree = self.page()?.execute(GetFrameTreeParams::default()).await?;
        let mut frames = Vec::new();
        flatten_frames(tree.result.frame_tree, &mut frames);
        Ok(frames)
    }

    async fn next_response(&self, timeout: Duration) -> Option<ObservedResponse> {
        let rx = self.responses.as_ref()?;
        let mut rx = rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    async fn close(mut self: Box<Self>) -> AppResult<()> {
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
        if let Some(page) = self.page.take() {
            page.close().await?;
        }
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
        if let Some(page) = self.page.take() {
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!("Deferred page close failed: {}", e);
                }
            });
        }
    }
}
