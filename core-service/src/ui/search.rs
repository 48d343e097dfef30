use core_library::models::TrackSummary;
use core_library::LibraryError;
use core_runtime::config::Endpoints;
use serde::Serialize;
use tracing::debug;

pub const SEARCHING_TEXT: &str = "Searching...";
pub const NO_RESULTS_TEXT: &str = "No tracks found";

/// An action offered on a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowAction {
    Play,
    Download,
}

/// One rendered search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub track: TrackSummary,
    /// Direct link for hosts that hand downloads to a browser.
    pub download_url: String,
}

impl ResultRow {
    pub fn actions(&self) -> [RowAction; 2] {
        [RowAction::Play, RowAction::Download]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SearchState {
    Idle,
    Searching { query: String },
    Empty,
    Results(Vec<ResultRow>),
    Failed { message: String },
}

/// Identifies one search so late answers to older ones can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Search box and result list state.
#[derive(Debug, Clone)]
pub struct SearchView {
    endpoints: Endpoints,
    state: SearchState,
    latest: u64,
}

impl SearchView {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            state: SearchState::Idle,
            latest: 0,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Start a search. A blank query resets the view instead.
    pub fn begin(&mut self, query: &str) -> SearchTicket {
        self.latest += 1;
        let query = query.trim();
        self.state = if query.is_empty() {
            SearchState::Idle
        } else {
            SearchState::Searching {
                query: query.to_string(),
            }
        };
        SearchTicket(self.latest)
    }

    /// Apply the outcome of the search started with `ticket`.
    ///
    /// Returns `false` and leaves the view alone when a newer search has
    /// started since.
    pub fn finish(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<TrackSummary>, LibraryError>,
    ) -> bool {
        if ticket.0 != self.latest {
            debug!("Dropping results of a superseded search");
            return false;
        }
        if self.state == SearchState::Idle {
            return true;
        }

        self.state = match result {
            Ok(tracks) if tracks.is_empty() => SearchState::Empty,
            Ok(tracks) => SearchState::Results(
                tracks
                    .into_iter()
                    .map(|track| ResultRow {
                        download_url: self.endpoints.download_url(track.id.as_str()),
                        track,
                    })
                    .collect(),
            ),
            Err(e) => SearchState::Failed {
                message: e.user_message(),
            },
        };
        true
    }

    pub fn rows(&self) -> &[ResultRow] {
        match &self.state {
            SearchState::Results(rows) => rows,
            _ => &[],
        }
    }

    /// Text to show in place of the result list, if any.
    pub fn status_text(&self) -> Option<&str> {
        match &self.state {
            SearchState::Searching { .. } => Some(SEARCHING_TEXT),
            SearchState::Empty => Some(NO_RESULTS_TEXT),
            SearchState::Failed { message } => Some(message),
            SearchState::Idle | SearchState::Results(_) => None,
        }
    }
}
