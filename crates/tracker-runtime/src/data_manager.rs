//! Loads the application sheet from its configured source.
//!
//! Local files are read directly. Remote sources require credentials and are
//! fetched with a timeout; a transient failure (timeout, connection error,
//! throttling or a server error) gets exactly one more attempt.

use std::path::PathBuf;
use std::time::Duration;

use tracker_core::settings::DashboardConfig;
use tracker_core::{Result, TrackerError};
use tracker_data::reader::{load_csv_file, read_records, LoadReport, ReaderOptions};

use crate::credentials::{resolve_credentials, EnvSecretStore, SecretStore};
use crate::source::{fetch_csv, DataSource};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Total fetch attempts for a remote source: the first plus one retry.
const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Pause before the retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

// ── DataManager ───────────────────────────────────────────────────────────────

/// Fetches and parses the sheet for one run.
///
/// # Example
/// ```no_run
/// use tracker_core::settings::DashboardConfig;
/// use tracker_runtime::data_manager::DataManager;
/// use tracker_runtime::source::DataSource;
///
/// # async fn run() -> tracker_core::Result<()> {
/// let config = DashboardConfig::default();
/// let manager = DataManager::new(DataSource::parse("applications.csv"), &config)?;
/// let report = manager.load().await?;
/// println!("{} records", report.records.len());
/// # Ok(())
/// # }
/// ```
pub struct DataManager {
    source: DataSource,
    options: ReaderOptions,
    /// Per-attempt timeout for remote fetches.
    timeout: Duration,
    credentials_path: PathBuf,
    store: Box<dyn SecretStore>,
    client: reqwest::Client,
}

impl DataManager {
    pub fn new(source: DataSource, config: &DashboardConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("job-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Fetch(e.to_string()))?;

        Ok(Self {
            source,
            options: ReaderOptions::from(config),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            credentials_path: config.credentials_path.clone(),
            store: Box::new(EnvSecretStore::default()),
            client,
        })
    }

    /// Replace the secret store consulted after the local credentials file.
    pub fn with_secret_store(mut self, store: Box<dyn SecretStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Load the sheet into typed records.
    pub async fn load(&self) -> Result<LoadReport> {
        match &self.source {
            DataSource::File(path) => {
                tracing::debug!("reading local export {}", path.display());
                load_csv_file(path, self.options)
            }
            DataSource::Http(url) => {
                let credentials = resolve_credentials(&self.credentials_path, self.store.as_ref())?;
                let body = self.fetch_with_retry(url, credentials.bearer_token()).await?;
                tracing::debug!(bytes = body.len(), "fetched remote export");
                read_records(body.as_bytes(), self.options)
            }
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Up to [`MAX_FETCH_ATTEMPTS`] fetches; only transient errors retry.
    async fn fetch_with_retry(&self, url: &str, bearer: Option<&str>) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fetch_csv(&self.client, url, bearer, self.timeout).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < MAX_FETCH_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "fetch attempt failed; retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "fetch failed");
                    return Err(e);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    const SHEET: &str = "\
No,Job,Date,Inbound,Dialogue,Declined,Accepted,Date_US,Platform,Notes
1,Backend,25/06/2024,Yes,,,,06/25/2024,LinkedIn,
2,Frontend,20/06/2024,,Yes,,,06/20/2024,Indeed,
";

    struct FakeStore(Option<&'static str>);

    impl SecretStore for FakeStore {
        fn name(&self) -> &str {
            "FAKE_SECRET"
        }

        fn fetch(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    /// Config whose local credentials file does not exist.
    fn config(dir: &TempDir) -> DashboardConfig {
        DashboardConfig {
            credentials_path: dir.path().join("credentials.json"),
            ..DashboardConfig::default()
        }
    }

    fn remote(url: String, dir: &TempDir, secret: Option<&'static str>) -> DataManager {
        DataManager::new(DataSource::Http(url), &config(dir))
            .unwrap()
            .with_secret_store(Box::new(FakeStore(secret)))
    }

    const TOKEN_KEY: Option<&str> = Some(r#"{"access_token":"sekrit"}"#);

    // ── Local files ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_local_file_needs_no_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applications.csv");
        std::fs::write(&path, SHEET).unwrap();

        let manager = DataManager::new(DataSource::File(path), &config(&dir))
            .unwrap()
            .with_secret_store(Box::new(FakeStore(None)));
        let report = manager.load().await.unwrap();
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_local_file() {
        let dir = TempDir::new().unwrap();
        let manager =
            DataManager::new(DataSource::File(dir.path().join("nope.csv")), &config(&dir)).unwrap();
        assert!(matches!(
            manager.load().await,
            Err(TrackerError::FileRead { .. })
        ));
    }

    // ── Remote sources ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_remote_fetch_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/export")
                    .header("authorization", "Bearer sekrit");
                then.status(200)
                    .header("content-type", "text/csv")
                    .body(SHEET);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let report = remote(server.url("/export"), &dir, TOKEN_KEY)
            .load()
            .await
            .unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].platform, "LinkedIn");
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_remote_requires_credentials() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/export");
                then.status(200).body(SHEET);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = remote(server.url("/export"), &dir, None).load().await;
        assert!(matches!(result, Err(TrackerError::CredentialsNotFound { .. })));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_server_error_retried_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/export");
                then.status(503).body("unavailable");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = remote(server.url("/export"), &dir, TOKEN_KEY).load().await;
        match result {
            Err(TrackerError::HttpStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/export");
                then.status(404);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = remote(server.url("/export"), &dir, TOKEN_KEY).load().await;
        assert!(matches!(
            result,
            Err(TrackerError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_retried_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/export");
                then.status(200)
                    .body(SHEET)
                    .delay(Duration::from_millis(500));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = remote(server.url("/export"), &dir, TOKEN_KEY)
            .with_timeout(Duration::from_millis(50))
            .load()
            .await;
        assert!(matches!(result, Err(TrackerError::FetchTimeout(_))));
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_remote_body_without_rows() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/export");
                then.status(200)
                    .body("No,Job,Date,Inbound,Dialogue,Declined,Accepted,Date_US,Platform,Notes\n");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = remote(server.url("/export"), &dir, TOKEN_KEY).load().await;
        assert!(matches!(result, Err(TrackerError::NoRows)));
    }
}
