//! Keyboard shortcuts for the transport.
//!
//! | Key | Action |
//! |-----|--------|
//! | Space | play / pause |
//! | `m` | mute / unmute |
//! | Left / Right | seek -5 s / +5 s |
//! | Down / Up | volume -0.1 / +0.1 |
//!
//! Shortcuts are ignored while focus is in a text input so typing a query
//! never controls playback.

use core_playback::{PlaybackController, PlaybackError, Result};
use std::time::Duration;
use tracing::debug;

pub const SEEK_STEP: Duration = Duration::from_secs(5);
pub const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Char(char),
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Other,
}

/// Where keyboard focus is when the key arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    TextInput,
    #[default]
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub focus: Focus,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            focus: Focus::Elsewhere,
        }
    }

    pub fn in_text_input(key: Key) -> Self {
        Self {
            key,
            focus: Focus::TextInput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    TogglePlay,
    ToggleMute,
    /// Relative seek in seconds.
    SeekBy(f64),
    /// Relative volume change.
    VolumeBy(f32),
}

pub fn command_for(input: KeyInput) -> Option<TransportCommand> {
    if input.focus == Focus::TextInput {
        return None;
    }
    let step = SEEK_STEP.as_secs_f64();
    match input.key {
        Key::Space => Some(TransportCommand::TogglePlay),
        Key::Char('m') | Key::Char('M') => Some(TransportCommand::ToggleMute),
        Key::ArrowLeft => Some(TransportCommand::SeekBy(-step)),
        Key::ArrowRight => Some(TransportCommand::SeekBy(step)),
        Key::ArrowUp => Some(TransportCommand::VolumeBy(VOLUME_STEP)),
        Key::ArrowDown => Some(TransportCommand::VolumeBy(-VOLUME_STEP)),
        Key::Char(_) | Key::Other => None,
    }
}

/// Run `command` against the controller.
///
/// Seeking with nothing loaded or before the duration is known is ignored.
pub async fn apply(controller: &PlaybackController, command: TransportCommand) -> Result<()> {
    match command {
        TransportCommand::TogglePlay => match controller.toggle().await {
            Err(PlaybackError::NoTrackLoaded) => Ok(()),
            other => other,
        },
        TransportCommand::ToggleMute => {
            controller.toggle_mute();
            Ok(())
        }
        TransportCommand::SeekBy(delta) => {
            let position = controller.snapshot().position.as_secs_f64();
            match controller.seek(position + delta) {
                Ok(_) => Ok(()),
                Err(e @ (PlaybackError::NoTrackLoaded | PlaybackError::DurationUnknown)) => {
                    debug!(error = %e, "Ignoring seek shortcut");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        TransportCommand::VolumeBy(delta) => {
            let volume = controller.snapshot().volume;
            // Snap to the 0.1 grid.
            let target = ((volume + delta) * 10.0).round() / 10.0;
            controller.set_volume(target);
            Ok(())
        }
    }
}
