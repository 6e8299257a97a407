//! Single-resource fetch: resume check, permit, GET, atomic persist.

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::store;
use crate::types::FetchOutcome;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// What came back from the remote store
enum Response {
    Body(bytes::Bytes),
    Status(reqwest::StatusCode),
}

/// Fetches one remote resource into one local file
///
/// Cloning is cheap; clones share the HTTP connection pool, the permit pool and the
/// cancellation token.
#[derive(Clone, Debug)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    limiter: ConcurrencyLimiter,
    cancel_token: CancellationToken,
}

impl ResourceFetcher {
    /// Build a fetcher with an HTTP client configured from `config`
    ///
    /// The client's timeout covers the whole request, from connecting until the body has
    /// been read.
    pub fn new(
        config: &FetchConfig,
        limiter: ConcurrencyLimiter,
        cancel_token: CancellationToken,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(limiter.capacity())
            .build()?;
        Ok(Self::with_client(client, limiter, cancel_token))
    }

    /// Build a fetcher around an existing client
    pub fn with_client(
        client: reqwest::Client,
        limiter: ConcurrencyLimiter,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            limiter,
            cancel_token,
        }
    }

    /// The permit pool this fetcher draws from
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Fetch `url` into `destination` unless it is already there
    ///
    /// A non-2xx answer is logged and reported as [`FetchOutcome::RemoteStatus`]; it is a
    /// skip, not an error. The permit is held only for the network exchange and is released
    /// on every path.
    ///
    /// # Errors
    ///
    /// [`FetchError::Transfer`] for timeouts and connection failures, [`FetchError::Write`]
    /// when the body cannot be persisted. `destination` never holds partial content.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchOutcome> {
        if store::has_content(destination).await {
            tracing::trace!(path = %destination.display(), "Already present, skipping");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let response = {
            let _permit = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Ok(FetchOutcome::Cancelled),
                permit = self.limiter.acquire() => permit?,
            };

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Ok(FetchOutcome::Cancelled),
                response = self.download(url) => response?,
            }
        };

        let body = match response {
            Response::Body(body) => body,
            Response::Status(status) => {
                tracing::warn!(
                    path = %destination.display(),
                    url,
                    status = status.as_u16(),
                    "Remote store returned an error status, skipping"
                );
                return Ok(FetchOutcome::RemoteStatus(status.as_u16()));
            }
        };

        store::write_atomic(destination, &body)
            .await
            .map_err(|source| FetchError::Write {
                path: destination.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %destination.display(), bytes = body.len(), "Saved");
        Ok(FetchOutcome::Written {
            bytes: body.len() as u64,
        })
    }

    async fn download(&self, url: &str) -> Result<Response> {
        let transfer = |source: reqwest::Error| {
            Error::Fetch(FetchError::Transfer {
                url: url.to_string(),
                source,
            })
        };

        let response = self.client.get(url).send().await.map_err(transfer)?;
        let status = response.status();
        if !status.is_success() {
            return Ok(Response::Status(status));
        }
        let body = response.bytes().await.map_err(transfer)?;
        Ok(Response::Body(body))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(capacity: usize, timeout: Duration) -> ResourceFetcher {
        let config = FetchConfig {
            request_timeout: timeout,
            ..Default::default()
        };
        ResourceFetcher::new(
            &config,
            ConcurrencyLimiter::new(capacity).unwrap(),
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn writes_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"Pepe #1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1");
        let fetcher = fetcher(1, Duration::from_secs(5));

        let outcome = fetcher
            .fetch(&format!("{}/metadata/1", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Written { bytes: 18 });
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), r#"{"name":"Pepe #1"}"#);
        assert_eq!(fetcher.limiter().available(), 1);
    }

    #[tokio::test]
    async fn existing_file_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("new"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1.png");
        std::fs::write(&dest, b"old").unwrap();

        let outcome = fetcher(1, Duration::from_secs(5))
            .fetch(&format!("{}/pepes/1.png", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
    }

    #[tokio::test]
    async fn error_status_is_a_skip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("3");
        let fetcher = fetcher(1, Duration::from_secs(5));

        let outcome = fetcher
            .fetch(&format!("{}/metadata/3", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::RemoteStatus(404));
        assert!(!dest.exists());
        assert_eq!(fetcher.limiter().available(), 1);
    }

    #[tokio::test]
    async fn timeout_is_a_transfer_error_and_releases_permit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("9");
        let fetcher = fetcher(1, Duration::from_millis(100));

        let result = fetcher
            .fetch(&format!("{}/metadata/9", server.uri()), &dest)
            .await;

        match result {
            Err(err @ Error::Fetch(FetchError::Transfer { .. })) => assert!(err.is_transient()),
            other => panic!("expected transfer error, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!store::temporary_path(&dest).exists());
        assert_eq!(fetcher.limiter().available(), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_a_transfer_error() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1");
        // Port 9 (discard) on localhost is closed in test environments.
        let result = fetcher(1, Duration::from_secs(2))
            .fetch("http://127.0.0.1:9/metadata/1", &dest)
            .await;
        assert!(matches!(
            result,
            Err(Error::Fetch(FetchError::Transfer { .. }))
        ));
    }

    #[tokio::test]
    async fn cancelled_before_permit_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let fetcher = ResourceFetcher::new(&FetchConfig::default(), limiter.clone(), token.clone())
            .unwrap();
        let held = limiter.acquire().await.unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1");
        let url = format!("{}/metadata/1", server.uri());
        let task = {
            let dest = dest.clone();
            tokio::spawn(async move { fetcher.fetch(&url, &dest).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let outcome = task.await.unwrap().unwrap();
        drop(held);

        assert_eq!(outcome, FetchOutcome::Cancelled);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn cancelled_mid_request_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let fetcher =
            ResourceFetcher::new(&FetchConfig::default(), limiter.clone(), token.clone()).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1.png");
        let url = format!("{}/pepes/1.png", server.uri());
        let task = {
            let dest = dest.clone();
            tokio::spawn(async move { fetcher.fetch(&url, &dest).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancellation should be prompt")
            .unwrap()
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Cancelled);
        assert!(!dest.exists());
        assert_eq!(limiter.available(), 1);
    }
}
