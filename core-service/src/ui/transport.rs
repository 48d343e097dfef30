use core_playback::{PlaybackStatus, TransportSnapshot};
use serde::Serialize;

/// Main transport button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportIcon {
    Play,
    Pause,
    Spinner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeIcon {
    Muted,
    Low,
    High,
}

impl VolumeIcon {
    pub fn for_level(level: f32, muted: bool) -> Self {
        if muted || level <= 0.0 {
            VolumeIcon::Muted
        } else if level < 0.5 {
            VolumeIcon::Low
        } else {
            VolumeIcon::High
        }
    }
}

/// Player bar derived from a [`TransportSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportView {
    pub visible: bool,
    pub title: Option<String>,
    pub icon: TransportIcon,
    pub position_label: String,
    pub duration_label: String,
    /// Slider value in whole seconds.
    pub seek_value: u64,
    /// Slider maximum in whole seconds; zero until the duration is known.
    pub seek_max: u64,
    pub seek_enabled: bool,
    pub volume_icon: VolumeIcon,
    pub volume_percent: u8,
    pub error: Option<String>,
}

impl From<&TransportSnapshot> for TransportView {
    fn from(snapshot: &TransportSnapshot) -> Self {
        let icon = match snapshot.status {
            PlaybackStatus::Loading => TransportIcon::Spinner,
            PlaybackStatus::Playing if snapshot.buffering => TransportIcon::Spinner,
            PlaybackStatus::Playing => TransportIcon::Pause,
            _ => TransportIcon::Play,
        };
        let position = snapshot.position.as_secs_f64();
        let duration = snapshot.duration.map(|d| d.as_secs_f64());

        Self {
            visible: snapshot.track.is_some(),
            title: snapshot.track.as_ref().map(|t| t.title.clone()),
            icon,
            position_label: format_time(position),
            duration_label: format_time(duration.unwrap_or(0.0)),
            seek_value: snapshot.position.as_secs(),
            seek_max: snapshot.duration.map_or(0, |d| d.as_secs()),
            seek_enabled: duration.is_some() && snapshot.status.has_session(),
            volume_icon: VolumeIcon::for_level(snapshot.volume, snapshot.muted),
            volume_percent: (snapshot.effective_volume() * 100.0).round() as u8,
            error: snapshot.failure.as_ref().map(|f| f.message.clone()),
        }
    }
}

/// Format seconds as `m:ss`. Minutes are not wrapped into hours.
///
/// Negative, NaN and infinite values render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::TrackId;
    use core_playback::{NowPlaying, PlaybackFailure};
    use core_runtime::events::FailureCategory;
    use std::time::Duration;

    fn snapshot(status: PlaybackStatus) -> TransportSnapshot {
        TransportSnapshot {
            status,
            track: Some(NowPlaying {
                track_id: TrackId::from("f1"),
                title: "Moonlight Sonata".to_string(),
            }),
            position: Duration::from_millis(65_900),
            duration: Some(Duration::from_secs(754)),
            volume: 0.8,
            muted: false,
            buffering: false,
            failure: None,
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(5.4), "0:05");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn test_icon_follows_status() {
        assert_eq!(
            TransportView::from(&snapshot(PlaybackStatus::Playing)).icon,
            TransportIcon::Pause
        );
        assert_eq!(
            TransportView::from(&snapshot(PlaybackStatus::Paused)).icon,
            TransportIcon::Play
        );
        assert_eq!(
            TransportView::from(&snapshot(PlaybackStatus::Ended)).icon,
            TransportIcon::Play
        );
        assert_eq!(
            TransportView::from(&snapshot(PlaybackStatus::Loading)).icon,
            TransportIcon::Spinner
        );

        let mut buffering = snapshot(PlaybackStatus::Playing);
        buffering.buffering = true;
        assert_eq!(TransportView::from(&buffering).icon, TransportIcon::Spinner);

        // Buffering while paused does not spin.
        buffering.status = PlaybackStatus::Paused;
        assert_eq!(TransportView::from(&buffering).icon, TransportIcon::Play);
    }

    #[test]
    fn test_labels_and_slider() {
        let view = TransportView::from(&snapshot(PlaybackStatus::Playing));
        assert!(view.visible);
        assert_eq!(view.title.as_deref(), Some("Moonlight Sonata"));
        assert_eq!(view.position_label, "1:05");
        assert_eq!(view.duration_label, "12:34");
        assert_eq!(view.seek_value, 65);
        assert_eq!(view.seek_max, 754);
        assert!(view.seek_enabled);
    }

    #[test]
    fn test_unknown_duration_disables_seek() {
        let mut snap = snapshot(PlaybackStatus::Playing);
        snap.duration = None;
        let view = TransportView::from(&snap);
        assert_eq!(view.duration_label, "0:00");
        assert_eq!(view.seek_max, 0);
        assert!(!view.seek_enabled);
    }

    #[test]
    fn test_volume_icon() {
        assert_eq!(VolumeIcon::for_level(0.8, false), VolumeIcon::High);
        assert_eq!(VolumeIcon::for_level(0.3, false), VolumeIcon::Low);
        assert_eq!(VolumeIcon::for_level(0.0, false), VolumeIcon::Muted);
        assert_eq!(VolumeIcon::for_level(0.8, true), VolumeIcon::Muted);

        let mut snap = snapshot(PlaybackStatus::Playing);
        snap.muted = true;
        let view = TransportView::from(&snap);
        assert_eq!(view.volume_icon, VolumeIcon::Muted);
        assert_eq!(view.volume_percent, 0);
    }

    #[test]
    fn test_failure_message_is_exposed() {
        let mut snap = snapshot(PlaybackStatus::Error);
        snap.failure = Some(PlaybackFailure {
            category: FailureCategory::Network,
            message: "Couldn't load this track.".to_string(),
        });
        let view = TransportView::from(&snap);
        assert_eq!(view.icon, TransportIcon::Play);
        assert!(!view.seek_enabled);
        assert_eq!(view.error.as_deref(), Some("Couldn't load this track."));
    }

    #[test]
    fn test_hidden_without_track() {
        let mut snap = snapshot(PlaybackStatus::Idle);
        snap.track = None;
        assert!(!TransportView::from(&snap).visible);
    }
}
