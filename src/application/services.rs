use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    application::{
        dto::SessionStatus,
        ports::{CameraPort, HapticPort, SpeechPort},
        session::{
            publish_display_only, GuidanceSession, GuidanceSlot, SessionCommand, SessionOutputs,
            MSG_CAMERA_UNAVAILABLE, MSG_START_CAMERA,
        },
    },
    domain::{
        config::EngineConfig,
        errors::{DomainError, DomainResult},
        guidance::{GuidanceState, Severity},
        stream::{
            decode_detector, DetectorInbound, DetectorOutbound, DisplayEvent, DisplayInbound, DisplaySize,
        },
    },
};

const COMMAND_QUEUE: usize = 64;
/// Frames pendientes hacia el detector. Con la compuerta de petición única
/// basta con muy poco margen.
const DETECTOR_QUEUE: usize = 4;
/// Vídeo, overlay y guía comparten cola; una pantalla lenta pierde los más viejos.
const DISPLAY_QUEUE: usize = 64;

struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Enlace de un puente de detección con la sesión activa.
pub struct DetectorLink {
    id: u64,
    commands: mpsc::Sender<SessionCommand>,
    outbound: mpsc::Receiver<DetectorOutbound>,
}

impl DetectorLink {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Entrega un mensaje del detector a la sesión.
    pub async fn deliver(&self, msg: DetectorInbound) -> DomainResult<()> {
        self.commands
            .send(SessionCommand::Detector(msg))
            .await
            .map_err(|_| DomainError::NotRunning)
    }

    /// Decodifica y entrega un mensaje de texto del detector. Un `result`
    /// ilegible se descarta pero libera la petición en vuelo.
    pub async fn deliver_text(&self, text: &str) -> DomainResult<()> {
        match decode_detector(text) {
            Ok(msg) => self.deliver(msg).await,
            Err(bad) => {
                if bad.is_result() {
                    self.commands
                        .send(SessionCommand::ResultDropped)
                        .await
                        .map_err(|_| DomainError::NotRunning)?;
                }
                Err(DomainError::MalformedResult(bad.reason))
            }
        }
    }

    /// Siguiente mensaje hacia el detector. `None` cuando la sesión termina.
    pub async fn next_outbound(&mut self) -> Option<DetectorOutbound> {
        self.outbound.recv().await
    }

    /// Avisa a la sesión de que el transporte se ha caído.
    pub async fn detach(self) {
        let _ = self.commands.send(SessionCommand::DetachDetector { id: self.id }).await;
    }
}

/// Orquestador de la única sesión de guiado.
pub struct GuidanceService {
    config: EngineConfig,
    camera: Arc<dyn CameraPort>,
    speech: Arc<dyn SpeechPort>,
    haptics: Arc<dyn HapticPort>,
    display: broadcast::Sender<DisplayEvent>,
    latest: GuidanceSlot,
    session: Mutex<Option<SessionHandle>>,
    /// Último tamaño anunciado por una pantalla; sobrevive entre sesiones.
    display_size: RwLock<Option<DisplaySize>>,
    next_link: AtomicU64,
}

impl GuidanceService {
    pub fn new(
        config: EngineConfig,
        camera: Arc<dyn CameraPort>,
        speech: Arc<dyn SpeechPort>,
        haptics: Arc<dyn HapticPort>,
    ) -> Self {
        let (display, _) = broadcast::channel(DISPLAY_QUEUE);
        let idle = GuidanceState::new(MSG_START_CAMERA, Severity::Neutral);
        Self {
            config,
            camera,
            speech,
            haptics,
            display,
            latest: Arc::new(RwLock::new(Some(idle))),
            session: Mutex::new(None),
            display_size: RwLock::new(None),
            next_link: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn outputs(&self) -> SessionOutputs {
        SessionOutputs {
            speech: self.speech.clone(),
            haptics: self.haptics.clone(),
            display: self.display.clone(),
            latest: self.latest.clone(),
        }
    }

    /// Abre la cámara y arranca el bucle de la sesión.
    pub async fn start(&self) -> DomainResult<()> {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(DomainError::AlreadyRunning);
        }

        let camera = match self
            .camera
            .open(&self.config.camera.source, self.config.camera.jpeg_quality)
            .await
        {
            Ok(camera) => camera,
            Err(e) => {
                error!("❌ No se pudo abrir la cámara: {}", e);
                publish_display_only(
                    &self.outputs(),
                    GuidanceState::new(MSG_CAMERA_UNAVAILABLE, Severity::Danger),
                );
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        if let Some(size) = *self.display_size.read().unwrap_or_else(|e| e.into_inner()) {
            let _ = tx.try_send(SessionCommand::Display(DisplayInbound::DisplayResize(size)));
        }
        let (session, speech_rx) = GuidanceSession::new(self.config.clone(), Some(camera), self.outputs());
        let task = tokio::spawn(session.run(rx, speech_rx));
        *slot = Some(SessionHandle { commands: tx, task });
        info!("🚀 Sesión arrancada.");
        Ok(())
    }

    /// Detiene la sesión y espera a que libere todos sus recursos.
    pub async fn stop(&self) -> DomainResult<()> {
        let handle = self.session.lock().await.take().ok_or(DomainError::NotRunning)?;
        let _ = handle.commands.send(SessionCommand::Stop).await;
        if let Err(e) = handle.task.await {
            warn!("La tarea de la sesión terminó con error: {}", e);
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    async fn commands(&self) -> DomainResult<mpsc::Sender<SessionCommand>> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|h| !h.task.is_finished())
            .map(|h| h.commands.clone())
            .ok_or(DomainError::NotRunning)
    }

    /// Registra un puente de detección. El último conectado sustituye al anterior.
    pub async fn attach_detector(&self) -> DomainResult<DetectorLink> {
        let commands = self.commands().await?;
        let id = self.next_link.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound) = mpsc::channel(DETECTOR_QUEUE);
        commands
            .send(SessionCommand::AttachDetector { id, outbound: outbound_tx })
            .await
            .map_err(|_| DomainError::NotRunning)?;
        Ok(DetectorLink { id, commands, outbound })
    }

    pub async fn display_command(&self, msg: DisplayInbound) -> DomainResult<()> {
        if let DisplayInbound::DisplayResize(size) = msg {
            *self.display_size.write().unwrap_or_else(|e| e.into_inner()) = Some(size);
        }
        self.commands()
            .await?
            .send(SessionCommand::Display(msg))
            .await
            .map_err(|_| DomainError::NotRunning)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.display.subscribe()
    }

    pub fn latest_guidance(&self) -> Option<GuidanceState> {
        self.latest.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            running: self.is_running().await,
            guidance: self.latest_guidance(),
        }
    }
}
