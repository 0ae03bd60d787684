// src/pipeline/auth.rs

use crate::{
    browser::{BrowserDriver, PageSession, evaluate_into, scripts},
    config::{
        AppConfig,
        session::{AuthenticatedContext, SessionStore},
    },
    constants,
    error::*,
    symbols, ui, utils,
};
use colored::Colorize;
use log::{debug, info, warn};
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};

const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct LoginState {
    has_canvas_dom: bool,
}

/// An authenticated course page: inside `/courses/`, off every SSO host, and
/// either not titled "login" or visibly rendering the Canvas shell.
pub fn looks_authenticated(url: &str, title: &str, has_canvas_dom: bool) -> bool {
    url.contains(constants::canvas::COURSES_PATH)
        && !utils::is_login_url(url)
        && (!title.to_lowercase().contains("login") || has_canvas_dom)
}

async fn page_is_authenticated(page: &dyn PageSession) -> AppResult<bool> {
    let url = page.current_url().await?;
    let title = page.title().await.unwrap_or_default();
    if !url.contains(constants::canvas::COURSES_PATH) || utils::is_login_url(&url) {
        return Ok(false);
    }
    let state: LoginState = evaluate_into(page, "login state", scripts::LOGIN_STATE)
        .await
        .unwrap_or_default();
    Ok(looks_authenticated(&url, &title, state.has_canvas_dom))
}

/// Returns a validated session, running the interactive login when the saved
/// one is missing, stale or rejected. A fresh login is saved before returning.
pub async fn ensure_authenticated(
    driver: &dyn BrowserDriver,
    store: &SessionStore,
    config: &AppConfig,
    probe_url: &str,
) -> AppResult<AuthenticatedContext> {
    match store.load()? {
        Some(ctx) if ctx.is_expired(config.session_max_age) => {
            info!("Saved session from {} is older than {:?}", ctx.saved_at, config.session_max_age);
            println!("{} Saved session has expired, please log in again.", *symbols::WARN);
        }
        Some(ctx) => {
            if store.is_valid(&ctx, driver, probe_url).await? {
                println!("{} Loaded session from {}", *symbols::OK, store.path().display());
                return Ok(ctx);
            }
            println!("{} Saved session is invalid, please log in again.", *symbols::WARN);
        }
        None => debug!("No saved session"),
    }

    if config.headless {
        warn!("Login required but the browser is headless");
        return Err(AppError::AuthInvalid);
    }

    wait_for_login(driver, probe_url, config.login_timeout).await?;
    let ctx = AuthenticatedContext::new(driver.cookies().await?);
    store.save(&ctx)?;
    println!("{} Session saved to {}", *symbols::OK, store.path().display());
    Ok(ctx)
}

/// Opens `url` in the visible browser and waits for the operator to finish
/// SSO/MFA. Checks every two seconds and whenever Enter is pressed; `q`
/// gives up.
pub async fn wait_for_login(driver: &dyn BrowserDriver, url: &str, timeout: Duration) -> AppResult<()> {
    let mut input = stdin_lines();
    wait_for_login_with(driver, url, timeout, &mut input).await
}

/// [`wait_for_login`] reading operator input from `input`. A closed channel
/// counts as the operator quitting.
pub async fn wait_for_login_with(
    driver: &dyn BrowserDriver,
    url: &str,
    timeout: Duration,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> AppResult<()> {
    let page = driver.new_page().await?;
    if let Err(e) = page.goto(url).await {
        // SSO pages often never fire a clean load event
        debug!("Login page navigation: {}", e);
    }

    ui::box_message(
        "Login required",
        &[
            "Log in to Canvas in the browser window (SSO / MFA).",
            &format!("Press Enter once the course page is showing, or 'q' to quit. Waiting up to {}s.", timeout.as_secs()),
        ],
        |s| s.cyan(),
    );

    let deadline = Instant::now() + timeout;
    let mut ticker = tokio::time::interval(LOGIN_POLL_INTERVAL);

    let result = loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                break Err(AppError::Timeout(format!("login was not completed within {}s", timeout.as_secs())));
            }
            _ = ticker.tick() => {
                if page_is_authenticated(page.as_ref()).await.unwrap_or(false) {
                    break Ok(());
                }
            }
            line = input.recv() => {
                match line {
                    Some(l) if l.trim().eq_ignore_ascii_case("q") => break Err(AppError::UserInterrupt),
                    None => break Err(AppError::UserInterrupt),
                    Some(_) => {
                        if page_is_authenticated(page.as_ref()).await.unwrap_or(false) {
                            break Ok(());
                        }
                        println!("{} {}", *symbols::WARN, "Not on a Canvas course page yet, keep going.".yellow());
                    }
                }
            }
        }
    };

    if let Err(e) = page.close().await {
        debug!("Closing login page failed: {}", e);
    }
    if result.is_ok() {
        println!("{} Login detected.", *symbols::OK);
        info!("Interactive login completed");
    }
    result
}

/// Stdin lines from a detached thread. The runtime does not wait for plain
/// threads on shutdown, so a pending read never holds the process open.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}
