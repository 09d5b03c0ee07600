//! Crate-wide error type.
//!
//! Every fallible operation in the scrapers returns [`Result`]. Transport and
//! status failures keep enough detail for the retry layer to decide whether a
//! request is worth repeating (see [`Error::is_transient`]).

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Browser Error: {0}")]
    Browser(String),

    /// The local browser could not be started; says nothing about the page.
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("No article text could be extracted from {0}")]
    NoContent(String),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(value: chromiumoxide::error::CdpError) -> Self {
        Error::Browser(value.to_string())
    }
}

impl Error {
    /// HTTP status carried by this error, if it came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Failures of this machine rather than of the site being fetched.
    pub fn is_local(&self) -> bool {
        matches!(self, Error::BrowserUnavailable(_) | Error::Task(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Server-side hiccups and connection problems that a retry may fix.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Status { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Error::Reqwest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .map(|s| matches!(s.as_u16(), 500 | 502 | 503 | 504))
                        .unwrap_or(false)
            }
            Error::Timeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> Error {
        Error::Status {
            status: code,
            url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_server_errors_are_transient() {
        for code in [500, 502, 503, 504] {
            assert!(status(code).is_transient(), "{code} should be transient");
        }
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        assert!(!status(404).is_transient());
        assert!(!status(403).is_transient());
        assert!(!Error::NoContent("x".into()).is_transient());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(status(404).is_not_found());
        assert!(!status(502).is_not_found());
        assert_eq!(status(418).status(), Some(418));
        assert_eq!(Error::Browser("gone".into()).status(), None);
    }

    #[test]
    fn test_browser_launch_failures_are_local() {
        assert!(Error::BrowserUnavailable("no chrome".into()).is_local());
        assert!(!Error::Browser("page crashed".into()).is_local());
        assert!(!status(500).is_local());
        assert!(!Error::BrowserUnavailable("no chrome".into()).is_transient());
    }

    #[test]
    fn test_display_includes_url() {
        let msg = status(503).to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("https://example.com"));
    }
}
