//! Saving tracks to disk from the download endpoint.

use crate::error::{CoreError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::AudioCodec;
use core_library::models::TrackId;
use core_runtime::config::Endpoints;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Downloads full tracks from `GET <base>/api/download/<id>`.
pub struct DownloadService {
    http_client: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    timeout: Duration,
    event_bus: Option<EventBus>,
}

impl DownloadService {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoints: Endpoints) -> Self {
        Self {
            http_client,
            endpoints,
            timeout: Duration::from_secs(300),
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

    /// URL a host can hand to a browser or external downloader.
    pub fn download_url(&self, track_id: &TrackId) -> String {
        self.endpoints.download_url(track_id.as_str())
    }

    /// Download a track into `dest_dir` and return the written path.
    ///
    /// The file name comes from the `Content-Disposition` header when the
    /// server sends one, otherwise it is `<id>.<ext>` with the extension
    /// guessed from the audio payload. An existing file with the same name
    /// is replaced.
    #[instrument(skip(self, dest_dir), fields(track_id = %track_id))]
    pub async fn download(&self, track_id: &TrackId, dest_dir: &Path) -> Result<PathBuf> {
        self.emit(DownloadEvent::Started {
            track_id: track_id.to_string(),
        });

        match self.fetch_and_write(track_id, dest_dir).await {
            Ok((path, file_name, bytes)) => {
                info!(%file_name, bytes, "Download complete");
                self.emit(DownloadEvent::Completed {
                    track_id: track_id.to_string(),
                    file_name,
                    bytes,
                });
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.emit(DownloadEvent::Failed {
                    track_id: track_id.to_string(),
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_and_write(
        &self,
        track_id: &TrackId,
        dest_dir: &Path,
    ) -> Result<(PathBuf, String, u64)> {
        let request = HttpRequest::get(self.download_url(track_id)).timeout(self.timeout);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| CoreError::NetworkFailure(e.to_string()))?;

        if !response.is_success() {
            return Err(CoreError::NetworkFailure(failure_detail(&response)));
        }
        if response.body.is_empty() {
            return Err(CoreError::NetworkFailure(
                "download returned no data".to_string(),
            ));
        }

        let file_name = response
            .header("content-disposition")
            .and_then(filename_from_disposition)
            .and_then(|name| sanitize_file_name(&name))
            .unwrap_or_else(|| fallback_file_name(track_id, &response.body));

        fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&file_name);
        let partial = dest_dir.join(format!(".{}.part", file_name));

        fs::write(&partial, &response.body).await?;
        if let Err(e) = fs::rename(&partial, &path).await {
            fs::remove_file(&partial).await.ok();
            return Err(CoreError::Io(e));
        }

        debug!(path = %path.display(), "Wrote download");
        Ok((path, file_name, response.body.len() as u64))
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }
}

fn failure_detail(response: &HttpResponse) -> String {
    match response.error_message() {
        Some(detail) => format!("HTTP {}: {}", response.status, detail),
        None => format!("HTTP {}", response.status),
    }
}

fn fallback_file_name(track_id: &TrackId, data: &[u8]) -> String {
    let stem = sanitize_file_name(track_id.as_str()).unwrap_or_else(|| "track".to_string());
    format!("{}.{}", stem, AudioCodec::sniff(data).extension())
}

/// Extract the file name from a `Content-Disposition` value.
///
/// `filename*` (RFC 5987) wins over `filename`.
pub(crate) fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key.eq_ignore_ascii_case("filename*") {
            let encoded = match value.find("''") {
                Some(idx) => &value[idx + 2..],
                None => value,
            };
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                return Some(decoded.into_owned());
            }
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(value.trim_matches('"').to_string());
        }
    }
    plain.filter(|name| !name.is_empty())
}

/// Reduce a server-supplied name to a single safe path component.
pub(crate) fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
