//! Audio output using rodio
//!
//! rodio's `OutputStream` is not `Send`, so the device and every `Sink` live on
//! a dedicated thread. The adapter talks to it over a command channel; commands
//! are handled strictly in order, so a `Stop` sent before a `Play` silences the
//! old sink before the new one produces sound.
//!
//! Positions are published into a shared map by the audio thread, so reading
//! one never waits on the thread.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{
        AudioCodec, MediaErrorKind, MediaEvent, PlaybackAdapter, PlaybackRequest,
        PlaybackSessionId, PreparedSession, SessionEvent,
    },
};
use bytes::Bytes;
use parking_lot::Mutex;
use rodio::decoder::DecoderError;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const EVENT_CAPACITY: usize = 256;

enum Command {
    Prepare {
        data: Bytes,
        volume: f32,
        reply: oneshot::Sender<Result<PreparedSession>>,
    },
    Play {
        session: PlaybackSessionId,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause(PlaybackSessionId),
    Stop(PlaybackSessionId),
    Seek(PlaybackSessionId, Duration),
    SetVolume(PlaybackSessionId, f32),
    /// Duration counted off the audio thread for a source without a header length.
    Measured(PlaybackSessionId, Duration),
    Unload(PlaybackSessionId),
    Shutdown,
}

struct ActiveSink {
    sink: Sink,
    data: Bytes,
    playing: bool,
    ended: bool,
    /// Measured duration not yet repeated after the first `Play`.
    unannounced: Option<Duration>,
}

impl ActiveSink {
    /// A finished sink has consumed its source; queue a fresh decoder.
    fn rearm(&mut self) -> Result<()> {
        if self.ended || self.sink.empty() {
            self.sink.append(decode(self.data.clone())?);
            self.ended = false;
        }
        Ok(())
    }
}

fn decode(data: Bytes) -> Result<Decoder<Cursor<Bytes>>> {
    let codec = AudioCodec::sniff(&data);
    Decoder::new(Cursor::new(data)).map_err(|e| rejected_source(codec, e))
}

/// A payload no decoder recognizes is an unsupported format; a known
/// container that fails to decode is corrupt.
fn rejected_source(codec: AudioCodec, error: DecoderError) -> BridgeError {
    let kind = match error {
        DecoderError::UnrecognizedFormat => MediaErrorKind::SourceNotSupported,
        _ if codec == AudioCodec::Unknown => MediaErrorKind::SourceNotSupported,
        _ => MediaErrorKind::Decode,
    };
    BridgeError::Media {
        kind,
        message: error.to_string(),
    }
}

/// Decode the whole source once and count frames.
fn measure(data: Bytes) -> Option<Duration> {
    let decoder = decode(data).ok()?;
    let per_second = u64::from(decoder.channels()) * u64::from(decoder.sample_rate());
    if per_second == 0 {
        return None;
    }
    let samples = decoder.count() as u64;
    Some(Duration::from_secs_f64(samples as f64 / per_second as f64))
}

/// Latest known position per session, shared with the audio thread.
#[derive(Clone, Default)]
struct PositionBoard(Arc<Mutex<HashMap<PlaybackSessionId, Duration>>>);

impl PositionBoard {
    fn set(&self, session: PlaybackSessionId, position: Duration) {
        self.0.lock().insert(session, position);
    }

    fn get(&self, session: PlaybackSessionId) -> Option<Duration> {
        self.0.lock().get(&session).copied()
    }

    fn forget(&self, session: PlaybackSessionId) {
        self.0.lock().remove(&session);
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

/// [`PlaybackAdapter`] backed by the default output device.
pub struct RodioPlaybackAdapter {
    commands: Mutex<mpsc::Sender<Command>>,
    events: broadcast::Sender<SessionEvent>,
    positions: PositionBoard,
}

impl RodioPlaybackAdapter {
    /// Open the default output device on a dedicated audio thread.
    pub fn new() -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let positions = PositionBoard::default();
        let thread_events = events.clone();
        let thread_positions = positions.clone();
        let thread_commands = command_tx.clone();

        thread::Builder::new()
            .name("flacstore-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(BridgeError::NotAvailable(format!(
                            "no audio output device: {}",
                            e
                        ))));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                AudioThread {
                    handle,
                    sinks: HashMap::new(),
                    events: thread_events,
                    positions: thread_positions,
                    commands: thread_commands,
                }
                .run(command_rx);
            })?;

        ready_rx.recv().map_err(|_| {
            BridgeError::NotAvailable("audio thread exited during startup".to_string())
        })??;

        info!("Audio output ready");
        Ok(Self {
            commands: Mutex::new(command_tx),
            events,
            positions,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .lock()
            .send(command)
            .map_err(|_| BridgeError::NotAvailable("audio thread has stopped".to_string()))
    }
}

impl Drop for RodioPlaybackAdapter {
    fn drop(&mut self) {
        let _ = self.send(Command::Shutdown);
    }
}

#[async_trait]
impl PlaybackAdapter for RodioPlaybackAdapter {
    async fn prepare(&self, request: PlaybackRequest) -> Result<PreparedSession> {
        debug!(
            track_id = %request.track_id,
            bytes = request.data.len(),
            codec = request.codec.mime_type(),
            "Preparing audio session"
        );

        let (reply, response) = oneshot::channel();
        self.send(Command::Prepare {
            data: request.data,
            volume: request.volume,
            reply,
        })?;
        response.await.map_err(|_| {
            BridgeError::OperationFailed("audio thread dropped prepare request".to_string())
        })?
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Play { session, reply })?;
        response.await.map_err(|_| {
            BridgeError::OperationFailed("audio thread dropped play request".to_string())
        })?
    }

    fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.send(Command::Pause(session))
    }

    fn stop(&self, session: PlaybackSessionId) -> Result<()> {
        self.send(Command::Stop(session))
    }

    fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.send(Command::Seek(session, position))
    }

    fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()> {
        self.send(Command::SetVolume(session, volume.clamp(0.0, 1.0)))
    }

    /// Last position published by the audio thread, at most one tick old.
    fn position(&self, session: PlaybackSessionId) -> Result<Duration> {
        self.positions
            .get(session)
            .ok_or_else(|| BridgeError::OperationFailed(format!("unknown session {}", session)))
    }

    fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        self.send(Command::Unload(session))
    }

    fn media_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

struct AudioThread {
    handle: rodio::OutputStreamHandle,
    sinks: HashMap<PlaybackSessionId, ActiveSink>,
    events: broadcast::Sender<SessionEvent>,
    positions: PositionBoard,
    /// Lets measuring threads report back in command order.
    commands: mpsc::Sender<Command>,
}

impl AudioThread {
    fn run(mut self, commands: mpsc::Receiver<Command>) {
        loop {
            match commands.recv_timeout(TICK_INTERVAL) {
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.tick();
        }

        for (_, active) in self.sinks.drain() {
            active.sink.stop();
        }
        self.positions.clear();
        debug!("Audio thread stopped");
    }

    fn emit(&self, session: PlaybackSessionId, event: MediaEvent) {
        self.events.send(SessionEvent::new(session, event)).ok();
    }

    fn publish(&self, session: PlaybackSessionId, position: Duration) {
        self.positions.set(session, position);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Prepare {
                data,
                volume,
                reply,
            } => {
                let _ = reply.send(self.prepare(data, volume));
            }
            Command::Play { session, reply } => {
                let mut announce = None;
                let result = match self.sinks.get_mut(&session) {
                    Some(active) => active.rearm().map(|()| {
                        active.sink.play();
                        active.playing = true;
                        announce = active.unannounced.take();
                    }),
                    None => Err(BridgeError::OperationFailed(format!(
                        "unknown session {}",
                        session
                    ))),
                };
                let _ = reply.send(result);
                // The first report may have raced the controller adopting the session.
                if let Some(duration) = announce {
                    self.emit(session, MediaEvent::MetadataLoaded { duration });
                }
            }
            Command::Pause(session) => {
                let paused_at = self.sinks.get_mut(&session).map(|active| {
                    active.sink.pause();
                    active.playing = false;
                    active.sink.get_pos()
                });
                if let Some(position) = paused_at {
                    self.publish(session, position);
                }
            }
            Command::Stop(session) => {
                if let Some(active) = self.sinks.get_mut(&session) {
                    active.sink.pause();
                    active.playing = false;
                    if let Err(e) = active.sink.try_seek(Duration::ZERO) {
                        debug!(%session, error = %e, "Rewind after stop failed");
                    }
                    self.publish(session, Duration::ZERO);
                }
            }
            Command::Seek(session, position) => {
                if let Some(active) = self.sinks.get_mut(&session) {
                    if let Err(e) = active.rearm() {
                        warn!(%session, error = %e, "Cannot reload finished session");
                    } else if let Err(e) = active.sink.try_seek(position) {
                        warn!(%session, error = %e, "Seek failed");
                    } else {
                        self.publish(session, position);
                    }
                }
            }
            Command::SetVolume(session, volume) => {
                if let Some(active) = self.sinks.get(&session) {
                    active.sink.set_volume(volume);
                }
            }
            Command::Measured(session, duration) => {
                if let Some(active) = self.sinks.get_mut(&session) {
                    if !active.playing {
                        active.unannounced = Some(duration);
                    }
                    debug!(%session, ?duration, "Measured source duration");
                    self.emit(session, MediaEvent::MetadataLoaded { duration });
                }
            }
            Command::Unload(session) => {
                if let Some(active) = self.sinks.remove(&session) {
                    active.sink.stop();
                    debug!(%session, "Unloaded audio session");
                }
                self.positions.forget(session);
            }
            Command::Shutdown => {}
        }
    }

    fn prepare(&mut self, data: Bytes, volume: f32) -> Result<PreparedSession> {
        let source = decode(data.clone())?;
        let duration = source.total_duration();

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| BridgeError::OperationFailed(format!("cannot open sink: {}", e)))?;
        sink.pause();
        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source);

        let id = PlaybackSessionId::new();
        if duration.is_none() {
            self.spawn_measure(id, data.clone());
        }
        self.sinks.insert(
            id,
            ActiveSink {
                sink,
                data,
                playing: false,
                ended: false,
                unannounced: None,
            },
        );
        self.publish(id, Duration::ZERO);
        // The whole file is in memory, so the output never waits for data.
        self.emit(id, MediaEvent::CanPlay);

        let prepared = PreparedSession::new(id);
        Ok(match duration {
            Some(duration) => prepared.with_duration(duration),
            None => prepared,
        })
    }

    fn spawn_measure(&self, session: PlaybackSessionId, data: Bytes) {
        let commands = self.commands.clone();
        let spawned = thread::Builder::new()
            .name("flacstore-measure".to_string())
            .spawn(move || match measure(data) {
                Some(duration) => {
                    commands.send(Command::Measured(session, duration)).ok();
                }
                None => debug!(%session, "Source duration could not be measured"),
            });
        if let Err(e) = spawned {
            warn!(%session, error = %e, "Cannot start duration measurement");
        }
    }

    fn tick(&mut self) {
        let mut updates = Vec::new();
        for (session, active) in self.sinks.iter_mut() {
            if !active.playing || active.ended {
                continue;
            }
            if active.sink.empty() {
                active.ended = true;
                active.playing = false;
                updates.push((*session, MediaEvent::Ended));
            } else {
                updates.push((
                    *session,
                    MediaEvent::TimeUpdate {
                        position: active.sink.get_pos(),
                    },
                ));
            }
        }

        for (session, event) in updates {
            match &event {
                MediaEvent::TimeUpdate { position } => self.publish(session, *position),
                MediaEvent::Ended => self.publish(session, Duration::ZERO),
                _ => {}
            }
            self.emit(session, event);
        }
    }
}
