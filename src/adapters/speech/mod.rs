pub mod piper;

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::SpeechPort;
use crate::domain::errors::DomainResult;

/// Salida de voz sin audio: sólo deja constancia en el log.
/// Se usa cuando no hay binario de Piper ni modelo de voz.
pub struct LogSpeech;

#[async_trait]
impl SpeechPort for LogSpeech {
    async fn speak(&self, text: &str) -> DomainResult<()> {
        info!("🔈 (sin voz) {}", text);
        Ok(())
    }
}
