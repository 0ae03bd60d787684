// src/config/session.rs

use crate::{
    browser::{BrowserDriver, StoredCookie},
    constants,
    error::{AppError, AppResult},
    utils,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

/// Saved browser login. Passed explicitly to whoever needs it and checked for
/// age at the start of every run.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedContext {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub cookies: Vec<StoredCookie>,
}

impl AuthenticatedContext {
    pub fn new(cookies: Vec<StoredCookie>) -> Self {
        Self {
            version: constants::SESSION_VERSION,
            saved_at: Utc::now(),
            cookies,
        }
    }

    pub fn is_expired(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.saved_at);
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => age > max_age,
            Err(_) => false,
        }
    }
}

impl fmt::Debug for AuthenticatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedContext")
            .field("version", &self.version)
            .field("saved_at", &self.saved_at)
            .field("cookies", &format_args!("<{} redacted>", self.cookies.len()))
            .finish()
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when there is no usable session on disk. A corrupt or
    /// outdated file is treated the same as a missing one.
    pub fn load(&self) -> AppResult<Option<AuthenticatedContext>> {
        if !self.path.is_file() {
            debug!("No session file at {:?}", self.path);
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file '{}'", self.path.display()))?;
        match serde_json::from_str::<AuthenticatedContext>(&content) {
            Ok(ctx) if ctx.version == constants::SESSION_VERSION => {
                debug!("Loaded session: {:?}", ctx);
                Ok(Some(ctx))
            }
            Ok(ctx) => {
                warn!(
                    "Session file version {} is not supported (expected {}), ignoring it",
                    ctx.version,
                    constants::SESSION_VERSION
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Session file {:?} is unreadable, ignoring it: {}", self.path, e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, ctx: &AuthenticatedContext) -> AppResult<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.to_path_buf()
            }
            None => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(ctx)?.as_bytes())?;
        tmp.flush()?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path)?;
        info!("Session saved to {:?} ({} cookies)", self.path, ctx.cookies.len());
        Ok(())
    }

    /// Installs the cookies and navigates to `probe_url`; the session is good
    /// if the browser is not bounced to a login form.
    pub async fn is_valid(
        &self,
        ctx: &AuthenticatedContext,
        driver: &dyn BrowserDriver,
        probe_url: &str,
    ) -> AppResult<bool> {
        driver.set_cookies(&ctx.cookies).await?;
        let page = match driver.open(probe_url).await {
            Ok(page) => page,
            Err(AppError::PageLoad { reason, .. }) => {
                warn!("Session probe failed to load: {}", reason);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let final_url = page.current_url().await?;
        page.close().await?;
        let valid = !utils::is_login_url(&final_url);
        debug!("Session probe landed on {} (valid: {})", final_url, valid);
        Ok(valid)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AppResult<()> {
    Ok(())
}
