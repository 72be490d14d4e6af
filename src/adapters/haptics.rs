use tracing::info;

use crate::application::ports::HapticPort;

/// El proceso no tiene motor de vibración propio: el patrón viaja a los
/// clientes de visualización dentro del evento `guidance` y aquí sólo se
/// registra.
pub struct LogHaptics;

impl HapticPort for LogHaptics {
    fn vibrate(&self, pattern: &[u32]) {
        info!("📳 Vibración {:?}", pattern);
    }
}
