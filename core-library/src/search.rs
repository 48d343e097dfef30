//! Search client for the remote track index.
//!
//! The service answers `GET /api/search?q=<query>` with a JSON array of track
//! records. Failures come back as an object carrying an `error` field, either
//! with a non-success status or, on some deployments, with `200`.

use crate::error::{LibraryError, Result};
use crate::models::TrackSummary;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::Endpoints;
use core_runtime::events::{CoreEvent, EventBus, FailureCategory, SearchEvent};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Queries the remote search endpoint and decodes track summaries.
pub struct SearchService {
    http_client: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    timeout: Duration,
    event_bus: Option<EventBus>,
}

impl SearchService {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoints: Endpoints) -> Self {
        Self {
            http_client,
            endpoints,
            timeout: DEFAULT_TIMEOUT,
            event_bus: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Search tracks by title or artist.
    ///
    /// The query is trimmed first; a blank query returns no results without
    /// contacting the service. Responses of an unexpected shape are logged and
    /// treated as an empty result.
    #[instrument(skip(self), fields(query = %query.trim()))]
    pub async fn search(&self, query: &str) -> Result<Vec<TrackSummary>> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Blank query, skipping request");
            return Ok(Vec::new());
        }

        self.emit(SearchEvent::Started {
            query: query.to_string(),
        });

        match self.fetch(query).await {
            Ok(tracks) => {
                info!(result_count = tracks.len(), "Search completed");
                self.emit(SearchEvent::Completed {
                    query: query.to_string(),
                    result_count: tracks.len(),
                });
                Ok(tracks)
            }
            Err(e) => {
                warn!(error = %e, category = %e.category(), "Search failed");
                self.emit(SearchEvent::Failed {
                    query: query.to_string(),
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    /// Ping the service health endpoint.
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> Result<()> {
        let request = HttpRequest::get(self.endpoints.health_url()).timeout(self.timeout);
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(error_from_body(&response).unwrap_or(LibraryError::Network {
                status: response.status,
            }))
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<TrackSummary>> {
        let url = self.endpoints.search_url(query);
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(self.timeout);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(error_from_body(&response).unwrap_or(LibraryError::Network {
                status: response.status,
            }));
        }

        let body: Value = match serde_json::from_slice(&response.body) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    category = %FailureCategory::MalformedResponse,
                    error = %e,
                    "Search response is not JSON"
                );
                return Ok(Vec::new());
            }
        };

        match body {
            Value::Array(rows) => Ok(decode_rows(rows)),
            Value::Object(ref map) if map.contains_key("error") => {
                Err(LibraryError::Server(error_message(&body)))
            }
            other => {
                warn!(
                    category = %FailureCategory::MalformedResponse,
                    kind = json_kind(&other),
                    "Unexpected search response shape"
                );
                Ok(Vec::new())
            }
        }
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Search(event)).ok();
        }
    }
}

/// Rows without an id or title are dropped.
fn decode_rows(rows: Vec<Value>) -> Vec<TrackSummary> {
    let total = rows.len();
    let tracks: Vec<TrackSummary> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<TrackSummary>(row) {
            Ok(track) if !track.id.as_str().is_empty() => Some(track),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Skipping malformed search row");
                None
            }
        })
        .collect();

    if tracks.len() < total {
        warn!(
            category = %FailureCategory::MalformedResponse,
            dropped = total - tracks.len(),
            "Dropped search rows without id or title"
        );
    }
    tracks
}

fn error_from_body(response: &HttpResponse) -> Option<LibraryError> {
    let body: Value = serde_json::from_slice(&response.body).ok()?;
    body.get("error")?;
    Some(LibraryError::Server(error_message(&body)))
}

fn error_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
