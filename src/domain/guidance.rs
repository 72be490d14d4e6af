use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Neutral,
    Success,
    Warning,
    Danger,
    Info,
}

impl Severity {
    /// Patrón de vibración (ms encendido/apagado) asociado a cada severidad.
    pub fn haptic_pattern(self) -> Option<&'static [u32]> {
        match self {
            Severity::Danger => Some(&[200, 100, 200]),
            Severity::Warning => Some(&[150, 100, 150]),
            Severity::Info => Some(&[100, 50, 100, 50, 100]),
            Severity::Success | Severity::Neutral => None,
        }
    }
}

/// Instrucción derivada de un `DetectionResult`. No se persiste: se recalcula
/// en cada ingesta y se consume inmediatamente.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceState {
    pub message: String,
    pub severity: Severity,
    pub directions: Vec<String>,
}

impl GuidanceState {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            directions: Vec::new(),
        }
    }

    pub fn with_directions(mut self, directions: Vec<String>) -> Self {
        self.directions = directions;
        self
    }
}
