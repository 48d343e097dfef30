//! `HttpClient` backed by reqwest.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("flacstore-player/", env!("CARGO_PKG_VERSION"));

/// Pooled reqwest client over rustls.
///
/// Connection errors, timeouts, 429 and 5xx responses are retried according
/// to its [`RetryPolicy`]. When the last attempt still gets a 5xx, that
/// response is returned so the caller can read the server's error body.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client ({})", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(error: reqwest::Error, timeout: Option<Duration>) -> BridgeError {
    if error.is_timeout() {
        BridgeError::TimedOut(timeout.unwrap_or_default())
    } else {
        BridgeError::Network(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = &self.retry_policy;
        let mut attempt = 1;

        loop {
            debug!(attempt, url = %request.url, "GET");
            let last = attempt >= policy.max_attempts;

            match self.send_once(&request).await {
                Ok(response) if last || !policy.should_retry_status(response.status) => {
                    return Ok(response)
                }
                Ok(response) => {
                    warn!(status = response.status, attempt, "Retryable status");
                }
                Err(e) if last || !e.is_transport() => return Err(e),
                Err(e) => {
                    warn!(error = %e, attempt, "Request failed");
                }
            }

            let delay = policy.backoff(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "Backing off");
            sleep(delay).await;
            attempt += 1;
        }
    }
}
