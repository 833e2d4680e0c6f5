// Test doubles for the live session: scripted devices, a manual-clock
// playback output and an in-memory transport.

#![allow(dead_code)]

use agriflow_live::audio::{CaptureBackend, PlaybackBuffer, PlaybackSink, SampleBlock, SourceId};
use agriflow_live::devices::{MediaDevices, MediaRequest, MediaStream};
use agriflow_live::error::{LiveError, Result};
use agriflow_live::session::{LiveSessionConfig, LiveSessionController, SessionEvent};
use agriflow_live::transport::{
    LiveSetup, OutboundFrame, TransportConnector, TransportEvent, TransportHandle,
};
use agriflow_live::video::{CameraBackend, VideoFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Live resource counts, updated by the fakes as they are acquired and dropped
#[derive(Default)]
pub struct ResourceCounts {
    pub requests: AtomicUsize,
    pub microphones: AtomicUsize,
    pub cameras: AtomicUsize,
    pub outputs: AtomicUsize,
    pub outputs_closed: AtomicUsize,
}

impl ResourceCounts {
    pub fn open_resources(&self) -> usize {
        self.microphones.load(Ordering::SeqCst)
            + self.cameras.load(Ordering::SeqCst)
            + self.outputs.load(Ordering::SeqCst)
    }
}

pub struct FakeMicrophone {
    blocks: Vec<Vec<f32>>,
    sample_rate: u32,
    capturing: bool,
    counts: Arc<ResourceCounts>,
}

impl Drop for FakeMicrophone {
    fn drop(&mut self) {
        self.counts.microphones.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FakeMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<SampleBlock>> {
        let (tx, rx) = mpsc::channel(self.blocks.len().max(1));
        for (sequence, samples) in self.blocks.iter().enumerate() {
            tx.try_send(SampleBlock {
                samples: samples.clone(),
                sample_rate: self.sample_rate,
                sequence: sequence as u64,
            })
            .map_err(|e| LiveError::Device(e.to_string()))?;
        }
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake-mic"
    }
}

/// Camera that plays back a scripted sequence of grabs, then a steady picture
pub struct FakeCamera {
    active: AtomicBool,
    script: Mutex<VecDeque<Option<VideoFrame>>>,
    counts: Arc<ResourceCounts>,
}

pub fn solid_frame(width: u32, height: u32) -> VideoFrame {
    VideoFrame {
        width,
        height,
        rgb: vec![96; (width * height * 3) as usize],
    }
}

impl CameraBackend for FakeCamera {
    fn grab_frame(&self) -> Option<VideoFrame> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(scripted) => scripted,
            None => Some(solid_frame(4, 4)),
        }
    }

    fn release(&self) -> Result<()> {
        if self.active.swap(false, Ordering::SeqCst) {
            self.counts.cameras.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "fake-camera"
    }
}

/// What the output has been asked to do
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    /// (source, start_at, duration)
    pub plays: Vec<(SourceId, f64, f64)>,
    pub stopped: Vec<SourceId>,
}

pub struct ManualClockOutput {
    clock: Arc<Mutex<f64>>,
    log: Arc<Mutex<OutputLog>>,
    counts: Arc<ResourceCounts>,
    closed: bool,
}

impl Drop for ManualClockOutput {
    fn drop(&mut self) {
        self.counts.outputs.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PlaybackSink for ManualClockOutput {
    fn current_time(&self) -> f64 {
        *self.clock.lock().unwrap()
    }

    fn play(&mut self, id: SourceId, buffer: PlaybackBuffer, start_at: f64) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .plays
            .push((id, start_at, buffer.duration_secs()));
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) -> Result<()> {
        self.log.lock().unwrap().stopped.push(id);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.counts.outputs_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "manual-clock"
    }
}

/// Devices whose grants can be refused per kind
pub struct FakeDevices {
    pub counts: Arc<ResourceCounts>,
    pub clock: Arc<Mutex<f64>>,
    pub log: Arc<Mutex<OutputLog>>,
    pub deny_microphone: bool,
    pub deny_camera: bool,
    pub blocks: Vec<Vec<f32>>,
    /// Grabs the camera returns before settling on a 4x4 picture
    pub camera_script: Vec<Option<VideoFrame>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            counts: Arc::new(ResourceCounts::default()),
            clock: Arc::new(Mutex::new(0.0)),
            log: Arc::new(Mutex::new(OutputLog::default())),
            deny_microphone: false,
            deny_camera: false,
            blocks: vec![vec![0.25; 4], vec![-0.5; 4], vec![1.0; 4]],
            camera_script: Vec::new(),
        }
    }

    pub fn set_clock(&self, now: f64) {
        *self.clock.lock().unwrap() = now;
    }

    pub fn output_log(&self) -> OutputLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MediaDevices for FakeDevices {
    async fn request(&self, request: &MediaRequest) -> Result<MediaStream> {
        self.counts.requests.fetch_add(1, Ordering::SeqCst);

        if self.deny_microphone {
            return Err(LiveError::PermissionDenied("microphone refused".to_string()));
        }

        self.counts.microphones.fetch_add(1, Ordering::SeqCst);
        let microphone = FakeMicrophone {
            blocks: self.blocks.clone(),
            sample_rate: request.audio.sample_rate,
            capturing: false,
            counts: Arc::clone(&self.counts),
        };

        let camera: Option<Arc<dyn CameraBackend>> = if request.video {
            if self.deny_camera {
                // microphone drops here, as a real partial grant would be released
                return Err(LiveError::PermissionDenied("camera refused".to_string()));
            }
            self.counts.cameras.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(FakeCamera {
                active: AtomicBool::new(true),
                script: Mutex::new(self.camera_script.iter().cloned().collect()),
                counts: Arc::clone(&self.counts),
            }))
        } else {
            None
        };

        Ok(MediaStream {
            microphone: Box::new(microphone),
            camera,
        })
    }

    fn open_output(&self, _sample_rate: u32) -> Result<Box<dyn PlaybackSink>> {
        self.counts.outputs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManualClockOutput {
            clock: Arc::clone(&self.clock),
            log: Arc::clone(&self.log),
            counts: Arc::clone(&self.counts),
            closed: false,
        }))
    }
}

/// The far side of one fake connection
pub struct RemoteEnd {
    pub setup: LiveSetup,
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    pub inbound: mpsc::Sender<TransportEvent>,
}

impl RemoteEnd {
    /// Everything the client has sent so far
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectMode {
    Accept,
    Fail,
    /// Never resolves
    Hang,
}

pub struct FakeConnector {
    pub mode: ConnectMode,
    remotes: Mutex<Vec<RemoteEnd>>,
}

impl FakeConnector {
    pub fn new(mode: ConnectMode) -> Self {
        Self {
            mode,
            remotes: Mutex::new(Vec::new()),
        }
    }

    /// The most recent connection's remote end
    pub fn take_remote(&self) -> RemoteEnd {
        self.remotes
            .lock()
            .unwrap()
            .pop()
            .expect("no connection was opened")
    }

    pub fn connections(&self) -> usize {
        self.remotes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self, setup: &LiveSetup) -> Result<TransportHandle> {
        match self.mode {
            ConnectMode::Fail => {
                Err(LiveError::TransportError("connection refused".to_string()))
            }
            ConnectMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            ConnectMode::Accept => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::channel(32);
                self.remotes.lock().unwrap().push(RemoteEnd {
                    setup: setup.clone(),
                    outbound: out_rx,
                    inbound: in_tx,
                });
                Ok(TransportHandle::new(out_tx, in_rx))
            }
        }
    }
}

pub fn live_config() -> LiveSessionConfig {
    LiveSessionConfig {
        api_key: "test-key".to_string(),
        frame_interval: Duration::from_secs(1),
        ..LiveSessionConfig::default()
    }
}

pub struct Harness {
    pub controller: LiveSessionController,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub devices: Arc<FakeDevices>,
    pub connector: Arc<FakeConnector>,
}

pub fn harness_with(
    config: LiveSessionConfig,
    devices: FakeDevices,
    mode: ConnectMode,
) -> Harness {
    let devices = Arc::new(devices);
    let connector = Arc::new(FakeConnector::new(mode));
    let (controller, events) = LiveSessionController::new(
        config,
        Arc::clone(&devices) as Arc<dyn MediaDevices>,
        Arc::clone(&connector) as Arc<dyn TransportConnector>,
    );

    Harness {
        controller,
        events,
        devices,
        connector,
    }
}

pub fn harness() -> Harness {
    harness_with(live_config(), FakeDevices::new(), ConnectMode::Accept)
}

/// Base64 PCM payload lasting `secs` at `sample_rate`
pub fn audio_payload(secs: f64, sample_rate: u32) -> String {
    let samples = vec![0.1_f32; (secs * sample_rate as f64).round() as usize];
    agriflow_live::audio::pcm::encode_float_block(&samples)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}
