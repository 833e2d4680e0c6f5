use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::LiveSessionConfig;
use super::control::LiveControl;
use super::state::{SessionId, SessionState};
use super::stats::SessionStats;
use crate::audio::pcm::decode_base64_pcm;
use crate::audio::{AudioBackendConfig, CaptureBackend, PlaybackBuffer, PlaybackScheduler, PlaybackSink};
use crate::devices::{MediaDevices, MediaRequest};
use crate::error::{LiveError, Result};
use crate::transport::{LiveSetup, MediaChunk, OutboundFrame, TransportConnector, TransportEvent, TransportHandle};
use crate::video::{encode_jpeg, CameraBackend};

/// A transport event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

/// Counters shared with the outbound tasks
#[derive(Debug, Default)]
struct OutboundCounters {
    audio_chunks: AtomicU64,
    video_frames: AtomicU64,
}

/// Everything one live conversation owns
struct Session {
    id: SessionId,
    camera_enabled: bool,
    started_at: DateTime<Utc>,
    microphone: Option<Box<dyn CaptureBackend>>,
    camera: Option<Arc<dyn CameraBackend>>,
    output: Option<Box<dyn PlaybackSink>>,
    transport: Option<TransportHandle>,
    capture_task: Option<JoinHandle<()>>,
    frame_timer: Option<JoinHandle<()>>,
    inbound_task: Option<JoinHandle<()>>,
    scheduler: PlaybackScheduler,
    counters: Arc<OutboundCounters>,
    buffers_scheduled: u64,
    buffers_skipped: u64,
}

impl Session {
    fn new(id: SessionId, camera_enabled: bool) -> Self {
        Self {
            id,
            camera_enabled,
            started_at: Utc::now(),
            microphone: None,
            camera: None,
            output: None,
            transport: None,
            capture_task: None,
            frame_timer: None,
            inbound_task: None,
            scheduler: PlaybackScheduler::new(),
            counters: Arc::new(OutboundCounters::default()),
            buffers_scheduled: 0,
            buffers_skipped: 0,
        }
    }

    fn open_device_streams(&self) -> usize {
        self.microphone.is_some() as usize
            + self.camera.is_some() as usize
            + self.output.is_some() as usize
    }

    /// Release every resource. Each step is independent and never fails.
    async fn release(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }

        if let Some(timer) = self.frame_timer.take() {
            timer.abort();
        }

        if let Some(task) = self.capture_task.take() {
            task.abort();
        }

        if let Some(task) = self.inbound_task.take() {
            task.abort();
        }

        if let Some(mut microphone) = self.microphone.take() {
            if let Err(e) = microphone.stop().await {
                warn!("Failed to stop microphone {}: {}", microphone.name(), e);
            }
        }

        if let Some(camera) = self.camera.take() {
            if let Err(e) = camera.release() {
                warn!("Failed to release camera {}: {}", camera.name(), e);
            }
        }

        match self.output.take() {
            Some(mut output) => {
                let stopped = self.scheduler.interrupt(output.as_mut());
                if stopped > 0 {
                    debug!("Stopped {} pending playback sources", stopped);
                }
                if let Err(e) = output.close() {
                    warn!("Failed to close playback output {}: {}", output.name(), e);
                }
            }
            None => self.scheduler.reset(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in [
            self.capture_task.take(),
            self.frame_timer.take(),
            self.inbound_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

/// Owns the lifecycle of a real-time audio(+video) conversation
///
/// All session state is mutated through `&mut self`: `start`, `stop` and
/// `handle_event`. Background tasks (capture pump, frame timer, inbound
/// forwarder) never touch it; inbound traffic comes back as `SessionEvent`s
/// on the channel returned by `new`, and events from a session that is no
/// longer the open one are dropped. A pending `start` can be called off
/// from outside through the `LiveControl` handle.
pub struct LiveSessionController {
    config: LiveSessionConfig,
    devices: Arc<dyn MediaDevices>,
    connector: Arc<dyn TransportConnector>,
    state: SessionState,
    session: Option<Session>,
    next_session: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Token of the most recent start
    start_token: watch::Sender<CancellationToken>,
    state_tx: watch::Sender<SessionState>,
}

impl LiveSessionController {
    pub fn new(
        config: LiveSessionConfig,
        devices: Arc<dyn MediaDevices>,
        connector: Arc<dyn TransportConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (start_token, _) = watch::channel(CancellationToken::new());
        let (state_tx, _) = watch::channel(SessionState::Idle);

        let controller = Self {
            config,
            devices,
            connector,
            state: SessionState::Idle,
            session: None,
            next_session: 1,
            events_tx,
            start_token,
            state_tx,
        };

        (controller, events_rx)
    }

    /// Lock-free handle for cancelling a pending start and reading the state
    pub fn control(&self) -> LiveControl {
        LiveControl::new(self.start_token.subscribe(), self.state_tx.subscribe())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &LiveSessionConfig {
        &self.config
    }

    /// The open session, if any
    pub fn active_session(&self) -> Option<SessionId> {
        match self.state {
            SessionState::Open => self.session.as_ref().map(|s| s.id),
            _ => None,
        }
    }

    /// Start a live session.
    ///
    /// Rejected with `AlreadyActive` while another session is starting or
    /// open. On failure every partially acquired resource is released and
    /// the controller returns to `Idle`. A start cancelled through
    /// `LiveControl::cancel_start` releases the same way, ends `Closed` and
    /// fails with `Cancelled`.
    pub async fn start(&mut self, use_camera: bool) -> Result<SessionId> {
        if self.state.is_active() {
            warn!("Live session already {}; start rejected", self.state);
            return Err(LiveError::AlreadyActive);
        }

        let id = SessionId(self.next_session);
        self.next_session += 1;

        info!("Starting live session {} (camera: {})", id, use_camera);

        let cancel = CancellationToken::new();
        self.start_token.send_replace(cancel.clone());

        self.session = Some(Session::new(id, use_camera));
        self.transition(SessionState::Starting);

        let opened = tokio::select! {
            result = self.open_session(use_camera) => result,
            _ = cancel.cancelled() => Err(LiveError::Cancelled),
        };

        match opened {
            Ok(()) => {
                self.transition(SessionState::Open);
                info!("Live session {} open", id);
                Ok(id)
            }
            Err(LiveError::Cancelled) => {
                info!("Start of live session {} cancelled", id);
                self.stop().await;
                Err(LiveError::Cancelled)
            }
            Err(e) => {
                error!("Failed to start live session {}: {}", id, e);
                if let Some(session) = self.session.as_mut() {
                    session.release().await;
                }
                self.transition(SessionState::Idle);
                Err(e)
            }
        }
    }

    async fn open_session(&mut self, use_camera: bool) -> Result<()> {
        self.config.validate()?;

        if !self.config.has_credentials() {
            return Err(LiveError::ConfigurationError(
                "API key is missing for live mode".to_string(),
            ));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| LiveError::Device("session vanished during start".to_string()))?;
        let id = session.id;

        // Devices (microphone, camera)
        let request = MediaRequest {
            audio: AudioBackendConfig {
                sample_rate: self.config.input_sample_rate,
                block_size: self.config.capture_block_size,
            },
            video: use_camera,
        };
        let stream = self.devices.request(&request).await?;
        session.microphone = Some(stream.microphone);
        session.camera = stream.camera;

        // Playback pipeline
        session.output = Some(self.devices.open_output(self.config.output_sample_rate)?);

        // Transport
        let setup = LiveSetup {
            model: self.config.model.clone(),
            response_modality: "AUDIO".to_string(),
            system_instruction: self.config.system_instruction.clone(),
        };
        let mut transport = self.connector.connect(&setup).await?;
        let outbound = transport.sender();
        let mut inbound = transport
            .take_inbound()
            .ok_or_else(|| LiveError::TransportError("inbound stream unavailable".to_string()))?;
        session.transport = Some(transport);

        // Capture loop: blocks go out in production order
        let mut blocks = match session.microphone.as_mut() {
            Some(microphone) => microphone.start().await?,
            None => return Err(LiveError::Device("microphone not acquired".to_string())),
        };
        let audio_tx = outbound.clone();
        let counters = Arc::clone(&session.counters);
        session.capture_task = Some(tokio::spawn(async move {
            while let Some(block) = blocks.recv().await {
                let chunk = MediaChunk::audio(&block.samples, block.sample_rate);
                if audio_tx.send(OutboundFrame::Media(chunk)).is_err() {
                    break;
                }
                counters.audio_chunks.fetch_add(1, Ordering::Relaxed);
            }
            debug!("Capture pump for {} finished", id);
        }));

        // Frame timer, only with a camera
        if let Some(camera) = session.camera.as_ref() {
            session.frame_timer = Some(spawn_frame_timer(
                id,
                Arc::clone(camera),
                outbound,
                Arc::clone(&session.counters),
                self.config.frame_interval,
                self.config.jpeg_quality,
            ));
        }

        // Inbound forwarder
        let events = self.events_tx.clone();
        session.inbound_task = Some(tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                if events.send(SessionEvent { session: id, event }).is_err() {
                    return;
                }
            }
            // Stream ended without an explicit close
            let _ = events.send(SessionEvent {
                session: id,
                event: TransportEvent::Closed,
            });
        }));

        Ok(())
    }

    /// Stop the session and release everything. Safe in any state, repeatable.
    pub async fn stop(&mut self) {
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closing);
        }

        if let Some(session) = self.session.as_mut() {
            info!("Stopping live session {}", session.id);
            session.release().await;
        }

        self.transition(SessionState::Closed);
    }

    /// Apply one event from the transport
    pub async fn handle_event(&mut self, event: SessionEvent) {
        let is_current = self.state == SessionState::Open
            && self.session.as_ref().map(|s| s.id) == Some(event.session);

        if !is_current {
            debug!(
                "Dropping stale event from {} ({:?}) in state {}",
                event.session, event.event, self.state
            );
            return;
        }

        match event.event {
            TransportEvent::SetupComplete => info!("Live session {} setup complete", event.session),
            TransportEvent::TurnComplete => debug!("Assistant turn complete"),
            TransportEvent::Audio(data) => self.play_inbound(&data),
            TransportEvent::Interrupted => self.interrupt(),
            TransportEvent::Closed => {
                info!("Live session {} closed by remote", event.session);
                self.stop().await;
            }
            TransportEvent::Error(e) => {
                warn!("Live session {} transport error: {}", event.session, e);
                self.stop().await;
            }
        }
    }

    fn play_inbound(&mut self, data: &str) {
        let output_rate = self.config.output_sample_rate;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let samples = match decode_base64_pcm(data) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Skipping malformed inbound audio: {}", e);
                session.buffers_skipped += 1;
                return;
            }
        };

        let Some(output) = session.output.as_mut() else {
            session.buffers_skipped += 1;
            return;
        };

        let buffer = PlaybackBuffer {
            samples,
            sample_rate: output_rate,
        };

        match session.scheduler.schedule(output.as_mut(), buffer) {
            Ok(_) => session.buffers_scheduled += 1,
            Err(e) => {
                warn!("Skipping inbound audio that failed to schedule: {}", e);
                session.buffers_skipped += 1;
            }
        }
    }

    fn interrupt(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let stopped = match session.output.as_mut() {
            Some(output) => session.scheduler.interrupt(output.as_mut()),
            None => {
                session.scheduler.reset();
                0
            }
        };

        info!("Assistant interrupted; discarded {} playback sources", stopped);
    }

    pub fn stats(&self) -> SessionStats {
        let Some(session) = self.session.as_ref() else {
            return SessionStats {
                state: self.state,
                session_id: None,
                camera_enabled: false,
                started_at: None,
                open_device_streams: 0,
                active_timers: 0,
                pending_audio_sources: 0,
                next_playback_time: 0.0,
                audio_chunks_sent: 0,
                video_frames_sent: 0,
                buffers_scheduled: 0,
                buffers_skipped: 0,
            };
        };

        SessionStats {
            state: self.state,
            session_id: Some(session.id),
            camera_enabled: session.camera_enabled,
            started_at: Some(session.started_at),
            open_device_streams: session.open_device_streams(),
            active_timers: session.frame_timer.is_some() as usize,
            pending_audio_sources: session.scheduler.pending_count(),
            next_playback_time: session.scheduler.next_start_time(),
            audio_chunks_sent: session.counters.audio_chunks.load(Ordering::Relaxed),
            video_frames_sent: session.counters.video_frames.load(Ordering::Relaxed),
            buffers_scheduled: session.buffers_scheduled,
            buffers_skipped: session.buffers_skipped,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!("Unexpected session transition {} -> {}", self.state, next);
        }
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
    }
}

/// Grab, encode and send one camera frame per interval; ticks with no frame are dropped
fn spawn_frame_timer(
    id: SessionId,
    camera: Arc<dyn CameraBackend>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    counters: Arc<OutboundCounters>,
    period: std::time::Duration,
    quality: u8,
) -> JoinHandle<()> {
    info!("Frame capture every {:?} for {}", period, id);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(frame) = camera.grab_frame() else {
                continue;
            };
            if !frame.has_pixels() {
                continue;
            }

            match encode_jpeg(&frame, quality) {
                Ok(jpeg) => {
                    if outbound
                        .send(OutboundFrame::Media(MediaChunk::jpeg(&jpeg)))
                        .is_err()
                    {
                        break;
                    }
                    counters.video_frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("Dropping camera frame: {}", e),
            }
        }
    })
}

/// Feed transport events into a shared controller until the channel closes
pub fn spawn_event_loop(
    controller: Arc<Mutex<LiveSessionController>>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            controller.lock().await.handle_event(event).await;
        }
        debug!("Live session event loop stopped");
    })
}
