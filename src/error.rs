// src/error.rs

use chromiumoxide::error::CdpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Canvas session is invalid or expired. Log in again (delete the session file to force a fresh login)")]
    AuthInvalid,
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),
    #[error("Browser protocol error: {0}")]
    Cdp(#[from] CdpError),
    #[error("Page '{url}' failed to load: {reason}")]
    PageLoad { url: String, reason: String },
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Unexpected page structure: {0}")]
    UnexpectedShape(String),
    #[error("Ledger state error: {0}")]
    LedgerState(String),
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Network middleware error: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to persist temporary file: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Security error: {0}")]
    Security(String),
    #[error("Interrupted by user")]
    UserInterrupt,
    #[error("{0}")]
    UserInputError(String),
    #[error("Unexpected error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that stop the whole run. Everything else is recorded against
    /// the current video and the run moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::AuthInvalid
                | AppError::BrowserLaunch(_)
                | AppError::UserInterrupt
                | AppError::LedgerState(_)
                // the connection to Chromium is gone
                | AppError::Cdp(CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse)
        )
    }

    /// Strips the request URL from HTTP errors. Caption URLs are signed, so
    /// their errors must not end up in the ledger as-is.
    pub fn without_url(self) -> Self {
        match self {
            AppError::Network(e) => AppError::Network(e.without_url()),
            AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(e)) => {
                AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(e.without_url()))
            }
            other => other,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_browser_connection_is_fatal() {
        assert!(AppError::Cdp(CdpError::NoResponse).is_fatal());
        assert!(AppError::AuthInvalid.is_fatal());
        assert!(!AppError::Cdp(CdpError::Timeout).is_fatal());
        assert!(
            !AppError::PageLoad {
                url: "https://canvas.school.edu/courses/1".into(),
                reason: "net::ERR_TIMED_OUT".into(),
            }
            .is_fatal()
        );
    }
}
