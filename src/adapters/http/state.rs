use std::sync::Arc;
use crate::application::services::GuidanceService;

/// Estado compartido para los manejadores HTTP de Axum.
#[derive(Clone)]
pub struct HttpState {
    /// Orquestador de la sesión de guiado.
    pub guidance: Arc<GuidanceService>,
}
