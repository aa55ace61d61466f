//! Where the application sheet comes from.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracker_core::{Result, TrackerError};

/// A local CSV export or a remote CSV export URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Http(String),
}

impl DataSource {
    /// `http://` and `https://` locations are remote; anything else is a path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Http(trimmed.to_string())
        } else {
            DataSource::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Http(url) => f.write_str(url),
        }
    }
}

/// GET `url` once and return the body.
///
/// Timeouts map to [`TrackerError::FetchTimeout`], non-success statuses to
/// [`TrackerError::HttpStatus`] and anything else to [`TrackerError::Fetch`].
pub async fn fetch_csv(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let mut request = client.get(url).timeout(timeout);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| request_error(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TrackerError::HttpStatus {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    resp.text().await.map_err(|e| request_error(e, timeout))
}

fn request_error(e: reqwest::Error, timeout: Duration) -> TrackerError {
    if e.is_timeout() {
        TrackerError::FetchTimeout(timeout)
    } else {
        TrackerError::Fetch(e.to_string())
    }
}
