//! Stream fetching
//!
//! Retrieves the raw audio bytes for a track from the stream endpoint.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_library::models::TrackId;
use core_runtime::config::Endpoints;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Source of raw track audio.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Fetch the complete audio payload for `track_id`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NetworkFailure`] when the service cannot be reached,
    /// answers with a non-success status or returns no data.
    async fn fetch(&self, track_id: &TrackId) -> Result<Bytes>;
}

/// Fetches `GET <base>/stream/<id>` over HTTP.
pub struct HttpTrackFetcher {
    http_client: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    timeout: Duration,
}

impl HttpTrackFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoints: Endpoints) -> Self {
        Self {
            http_client,
            endpoints,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TrackFetcher for HttpTrackFetcher {
    #[instrument(skip(self), fields(track_id = %track_id))]
    async fn fetch(&self, track_id: &TrackId) -> Result<Bytes> {
        let request =
            HttpRequest::get(self.endpoints.stream_url(track_id.as_str())).timeout(self.timeout);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| PlaybackError::NetworkFailure(e.to_string()))?;

        if !response.is_success() {
            return Err(PlaybackError::NetworkFailure(match response.error_message() {
                Some(detail) => format!("HTTP {}: {}", response.status, detail),
                None => format!("HTTP {}", response.status),
            }));
        }

        if response.body.is_empty() {
            return Err(PlaybackError::NetworkFailure(
                "stream returned no data".to_string(),
            ));
        }

        debug!(bytes = response.body.len(), "Fetched track audio");
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bridge_traits::BridgeError;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn fetcher(mock: MockHttpClient) -> HttpTrackFetcher {
        HttpTrackFetcher::new(Arc::new(mock), Endpoints::new("http://test.local"))
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url == "http://test.local/stream/abc")
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, Bytes::from_static(b"fLaC...."))));

        let data = fetcher(mock_http).fetch(&TrackId::from("abc")).await.unwrap();
        assert_eq!(&data[..4], b"fLaC");
    }

    #[tokio::test]
    async fn test_not_found_is_network_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| {
            Ok(HttpResponse::new(
                404,
                r#"{"error":"Failed to access file"}"#,
            ))
        });

        let err = fetcher(mock_http)
            .fetch(&TrackId::from("abc"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, PlaybackError::NetworkFailure(ref msg) if msg == "HTTP 404: Failed to access file")
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_network_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, Bytes::new())));

        let err = fetcher(mock_http)
            .fetch(&TrackId::from("abc"))
            .await
            .unwrap_err();
        assert!(err.is_network_error());
    }

    #[tokio::test]
    async fn test_transport_error_is_network_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("timed out".into())));

        let err = fetcher(mock_http)
            .fetch(&TrackId::from("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::NetworkFailure(_)));
    }
}
