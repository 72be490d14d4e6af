use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Fallo de transporte: {0}")]
    TransportFailure(String),
    #[error("Cámara no disponible: {0}")]
    CaptureDeviceFailure(String),
    #[error("Resultado malformado: {0}")]
    MalformedResult(String),
    #[error("Fallo de síntesis de voz: {0}")]
    SpeechOutputFailure(String),
    #[error("Configuración inválida: {0}")]
    InvalidConfig(String),
    #[error("No hay ninguna sesión activa")]
    NotRunning,
    #[error("Ya existe una sesión activa")]
    AlreadyRunning,
}

pub type DomainResult<T> = Result<T, DomainError>;
