use async_trait::async_trait;

use crate::domain::{config::CameraSource, errors::DomainResult};

/// Frame capturado listo para enviar al detector.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait FrameSource: Send {
    /// Resolución nativa real (la que haya aceptado el driver).
    fn extent(&self) -> (u32, u32);
    async fn capture_jpeg(&mut self) -> DomainResult<CapturedFrame>;
}

#[async_trait]
pub trait CameraPort: Send + Sync {
    /// Abre el dispositivo. Un fallo aquí impide arrancar la sesión.
    async fn open(&self, source: &CameraSource, jpeg_quality: u8) -> DomainResult<Box<dyn FrameSource>>;
}

#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Pronuncia `text` y vuelve cuando termina. Cancelar es abortar el futuro.
    async fn speak(&self, text: &str) -> DomainResult<()>;
}

pub trait HapticPort: Send + Sync {
    fn vibrate(&self, pattern: &[u32]);
}
