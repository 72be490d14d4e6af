//! Bucle de eventos de una sesión de guiado.
//!
//! Todo ocurre en una sola tarea: mensajes del detector, ticks periódicos
//! (render, captura y vídeo), fin de locuciones y plazos del planificador. Cada manejador se
//! ejecuta completo antes del siguiente.

use base64::{prelude::BASE64_STANDARD, Engine};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::announcer::{AnnouncementScheduler, SpeechEffect, SpeechOutcome, Timings};
use crate::application::mapper::{CoordinateMapper, Extent};
use crate::application::navigation::NavigationEngine;
use crate::application::overlay::{OverlayRenderer, RecordingSurface};
use crate::application::ports::{CapturedFrame, FrameSource, HapticPort, SpeechPort};
use crate::application::store::DetectionStore;
use crate::domain::config::EngineConfig;
use crate::domain::detection::DetectionResult;
use crate::domain::guidance::{GuidanceState, Severity};
use crate::domain::stream::{
    summarize_detections, DetectorInbound, DetectorOutbound, DisplayEvent, DisplayInbound, GuidanceUpdate,
    VideoFrame,
};

pub const MSG_CONNECTION_LOST: &str = "server connection lost";
pub const MSG_CAMERA_UNAVAILABLE: &str = "camera unavailable";
pub const MSG_START_CAMERA: &str = "start the camera";

#[derive(Debug)]
pub enum SessionCommand {
    Detector(DetectorInbound),
    /// Llegó un `result` ilegible: la petición en vuelo queda contestada.
    ResultDropped,
    AttachDetector {
        id: u64,
        outbound: mpsc::Sender<DetectorOutbound>,
    },
    DetachDetector {
        id: u64,
    },
    Display(DisplayInbound),
    Stop,
}

/// Última guía publicada, compartida con la capa HTTP.
pub type GuidanceSlot = Arc<RwLock<Option<GuidanceState>>>;

pub struct SessionOutputs {
    pub speech: Arc<dyn SpeechPort>,
    pub haptics: Arc<dyn HapticPort>,
    pub display: broadcast::Sender<DisplayEvent>,
    pub latest: GuidanceSlot,
}

/// Publica una guía en la pantalla sin pasar por la voz.
pub fn publish_display_only(outputs: &SessionOutputs, guidance: GuidanceState) {
    *outputs.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(guidance.clone());
    if outputs.display.receiver_count() > 0 {
        let _ = outputs.display.send(DisplayEvent::Guidance(GuidanceUpdate::from(guidance)));
    }
}

pub struct GuidanceSession {
    config: EngineConfig,
    store: DetectionStore,
    engine: NavigationEngine,
    renderer: OverlayRenderer,
    mapper: CoordinateMapper,
    scheduler: AnnouncementScheduler,
    camera: Option<Box<dyn FrameSource>>,
    detector: Option<(u64, mpsc::Sender<DetectorOutbound>)>,
    /// Como mucho una petición de detección en vuelo.
    pending_request: bool,
    grayscale: bool,
    last_guidance: Option<GuidanceState>,
    utterance: Option<JoinHandle<()>>,
    speech_done: mpsc::UnboundedSender<(u64, SpeechOutcome)>,
    outputs: SessionOutputs,
}

fn data_url(frame: &CapturedFrame) -> String {
    format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(&frame.jpeg))
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

impl GuidanceSession {
    /// Devuelve la sesión y el receptor de finalizaciones de voz, que consume `run`.
    pub fn new(
        config: EngineConfig,
        camera: Option<Box<dyn FrameSource>>,
        outputs: SessionOutputs,
    ) -> (Self, mpsc::UnboundedReceiver<(u64, SpeechOutcome)>) {
        let (speech_done, speech_rx) = mpsc::unbounded_channel();
        let mapper = CoordinateMapper::new(Extent::new(
            config.display.width as f64,
            config.display.height as f64,
        ));
        if let Some((w, h)) = camera.as_ref().map(|c| c.extent()) {
            mapper.set_source(Extent::new(w as f64, h as f64));
        }

        let session = Self {
            store: DetectionStore::new(),
            engine: NavigationEngine::new(config.guidance.clone()),
            renderer: OverlayRenderer::new(config.guidance.clone()),
            scheduler: AnnouncementScheduler::new(Timings::from(&config.speech)),
            mapper,
            camera,
            detector: None,
            pending_request: false,
            grayscale: false,
            last_guidance: None,
            utterance: None,
            speech_done,
            outputs,
            config,
        };
        (session, speech_rx)
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut speech_rx: mpsc::UnboundedReceiver<(u64, SpeechOutcome)>,
    ) {
        let mut render = interval(Duration::from_millis(self.config.display.render_interval_ms));
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture = interval(Duration::from_millis(self.config.camera.capture_interval_ms));
        capture.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut video = interval(Duration::from_millis(self.config.display.video_interval_ms));
        video.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Sesión de guiado iniciada.");

        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Stop) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                Some((id, outcome)) = speech_rx.recv() => {
                    self.scheduler.speech_finished(id, outcome, Instant::now());
                }
                _ = sleep_until_opt(deadline) => {
                    let effects = self.scheduler.fire_due(Instant::now());
                    self.apply(effects);
                }
                extent = self.mapper.ready(), if !self.mapper.is_ready() => {
                    if let Some(e) = extent {
                        info!("Resolución nativa disponible: {}x{}", e.width, e.height);
                    }
                }
                _ = render.tick() => self.render_tick(),
                _ = capture.tick() => self.capture_tick().await,
                _ = video.tick() => self.video_tick().await,
            }
        }

        self.shutdown();
    }

    pub fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Detector(DetectorInbound::Result(result)) => self.ingest(*result),
            SessionCommand::Detector(DetectorInbound::GrayscaleModeSync(on)) => self.set_grayscale(on),
            SessionCommand::ResultDropped => {
                warn!("Resultado descartado; se libera la petición en vuelo.");
                self.pending_request = false;
            }
            SessionCommand::AttachDetector { id, outbound } => {
                info!("Detector #{} conectado.", id);
                self.detector = Some((id, outbound));
                self.pending_request = false;
            }
            SessionCommand::DetachDetector { id } => {
                if self.detector.as_ref().is_some_and(|(current, _)| *current == id) {
                    warn!("Detector #{} desconectado.", id);
                    self.detector = None;
                    self.pending_request = false;
                    self.publish(GuidanceState::new(MSG_CONNECTION_LOST, Severity::Danger));
                }
            }
            SessionCommand::Display(DisplayInbound::DisplayResize(size)) => {
                debug!("Superficie de visualización: {}x{}", size.width, size.height);
                self.mapper.set_target(Extent::new(size.width as f64, size.height as f64));
            }
            SessionCommand::Display(DisplayInbound::ToggleGrayscale(on)) => {
                self.set_grayscale(on);
                self.send_to_detector(DetectorOutbound::ToggleGrayscale(on));
            }
            SessionCommand::Stop => {}
        }
    }

    fn ingest(&mut self, result: DetectionResult) {
        self.pending_request = false;
        if let Some(on) = result.grayscale_mode {
            self.set_grayscale(on);
        }
        debug!("Resultado recibido: [{}]", summarize_detections(result.boxes()));

        let result = self.store.ingest(result);
        let guidance = self.engine.decide(&result);
        self.publish(guidance);
    }

    fn publish(&mut self, guidance: GuidanceState) {
        let changed = self.last_guidance.as_ref().map(|g| &g.message) != Some(&guidance.message);
        if changed {
            info!("🧭 Guía: {} ({:?})", guidance.message, guidance.severity);
            if let Some(pattern) = guidance.severity.haptic_pattern() {
                self.outputs.haptics.vibrate(pattern);
            }
        }
        self.scheduler.notify(&guidance.message, Instant::now());
        publish_display_only(&self.outputs, guidance.clone());
        self.last_guidance = Some(guidance);
    }

    fn set_grayscale(&mut self, on: bool) {
        if self.grayscale != on {
            info!("Modo escala de grises: {}", if on { "activado" } else { "desactivado" });
            self.grayscale = on;
            if self.outputs.display.receiver_count() > 0 {
                let _ = self.outputs.display.send(DisplayEvent::GrayscaleMode(on));
            }
        }
    }

    fn send_to_detector(&self, msg: DetectorOutbound) -> bool {
        let Some((id, tx)) = self.detector.as_ref() else {
            return false;
        };
        match tx.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!("No se pudo enviar al detector #{}: {}", id, e);
                false
            }
        }
    }

    fn apply(&mut self, effects: Vec<SpeechEffect>) {
        for effect in effects {
            match effect {
                SpeechEffect::Speak { id, text } => {
                    if let Some(previous) = self.utterance.take() {
                        previous.abort();
                    }
                    info!("🎙️ Narrando: {}", text);
                    let speech = self.outputs.speech.clone();
                    let done = self.speech_done.clone();
                    self.utterance = Some(tokio::spawn(async move {
                        let outcome = match speech.speak(&text).await {
                            Ok(()) => SpeechOutcome::Finished,
                            Err(e) => SpeechOutcome::Failed(e.to_string()),
                        };
                        let _ = done.send((id, outcome));
                    }));
                }
                SpeechEffect::CancelSpeech => {
                    if let Some(utterance) = self.utterance.take() {
                        utterance.abort();
                    }
                }
            }
        }
    }

    fn render_tick(&mut self) {
        if !self.mapper.is_ready() || self.outputs.display.receiver_count() == 0 {
            return;
        }
        let current = self.store.current();
        let mut surface = RecordingSurface::new();
        self.renderer.render(current.as_deref(), &self.mapper, &mut surface);
        let target = self.mapper.target();
        let frame = surface.into_frame(target.width as u32, target.height as u32, self.grayscale);
        let _ = self.outputs.display.send(DisplayEvent::Overlay(frame));
    }

    /// Captura un frame y mantiene al día la resolución nativa del mapeador.
    async fn grab(&mut self) -> Option<CapturedFrame> {
        let camera = self.camera.as_mut()?;
        match camera.capture_jpeg().await {
            Ok(frame) => {
                let extent = Extent::new(frame.width as f64, frame.height as f64);
                if self.mapper.source() != Some(extent) {
                    self.mapper.set_source(extent);
                }
                Some(frame)
            }
            Err(e) => {
                error!("❌ Error capturando frame: {}", e);
                None
            }
        }
    }

    async fn capture_tick(&mut self) {
        if self.pending_request || self.detector.is_none() {
            return;
        }
        let Some(frame) = self.grab().await else {
            return;
        };
        if self.send_to_detector(DetectorOutbound::Image(data_url(&frame))) {
            self.pending_request = true;
        }
    }

    /// Vídeo en directo para las pantallas conectadas.
    async fn video_tick(&mut self) {
        if self.outputs.display.receiver_count() == 0 {
            return;
        }
        let Some(frame) = self.grab().await else {
            return;
        };
        let _ = self.outputs.display.send(DisplayEvent::Frame(VideoFrame {
            width: frame.width,
            height: frame.height,
            image: data_url(&frame),
        }));
    }

    /// Cancela voz y plazos, suelta la cámara y deja todo en estado inicial.
    fn shutdown(&mut self) {
        let effect = self.scheduler.cancel();
        self.apply(vec![effect]);
        self.store.clear();
        self.camera = None;
        self.detector = None;
        self.pending_request = false;
        self.mapper.reset_source();
        self.last_guidance = None;
        publish_display_only(&self.outputs, GuidanceState::new(MSG_START_CAMERA, Severity::Neutral));
        info!("Sesión de guiado detenida.");
    }
}
