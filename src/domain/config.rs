use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{DomainError, DomainResult};
use super::geometry::DEFAULT_CLUSTER_ANGLE_DEG;

pub const CONFIG_ENV: &str = "GUIDANCE_CONFIG";

/// Qué hacer con `navigation.warnings`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningsPolicy {
    /// Un aviso no vacío anula todas las reglas salvo "sin navegación".
    Precedence,
    /// Los avisos sólo se consultan cuando ninguna otra regla aplica.
    #[default]
    Fallback,
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8090".into(),
            static_dir: "static".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    V4l2 {
        path: String,
        fourcc: String,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// Repite una imagen JPEG/PNG del disco. Útil en banco de pruebas.
    Still { path: String },
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::V4l2 {
            path: "/dev/video0".into(),
            fourcc: "MJPG".into(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    pub capture_interval_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::default(),
            capture_interval_ms: 500,
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub render_interval_ms: u64, // 20 Hz
    /// Periodo de envío del vídeo a las pantallas.
    pub video_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            render_interval_ms: 50,
            video_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidancePolicy {
    pub warnings_policy: WarningsPolicy,
    /// Sintetizar flechas a partir de `block_details` cuando no vienen precalculadas.
    pub synthesize_arrows: bool,
    pub obstacle_class: String,
    pub cluster_angle_deg: f64,
    /// Radio de búsqueda de bloques "go" en múltiplos del ancho del bloque stop.
    pub proximity_factor: f64,
}

impl Default for GuidancePolicy {
    fn default() -> Self {
        Self {
            warnings_policy: WarningsPolicy::default(),
            synthesize_arrows: true,
            obstacle_class: "Scooter".into(),
            cluster_angle_deg: DEFAULT_CLUSTER_ANGLE_DEG,
            proximity_factor: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub debounce_ms: u64,
    pub settle_ms: u64,
    pub repeat_ms: u64,
    pub repeat_enabled: bool,
    pub piper_path: String,
    pub voice_model_path: String,
    pub sample_rate: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            settle_ms: 100,
            repeat_ms: 3000,
            repeat_enabled: true,
            piper_path: "./piper_voice/piper/piper".into(),
            voice_model_path: "./piper_voice/en_US-lessac-medium.onnx".into(),
            sample_rate: 22050,
        }
    }
}

impl SpeechConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// `None` cuando la repetición periódica está desactivada.
    pub fn repeat(&self) -> Option<Duration> {
        self.repeat_enabled.then(|| Duration::from_millis(self.repeat_ms))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub guidance: GuidancePolicy,
    pub speech: SpeechConfig,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> DomainResult<Self> {
        let cfg: Self =
            serde_json::from_str(text).map_err(|e| DomainError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DomainError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Lee el fichero indicado en `GUIDANCE_CONFIG`, o usa los valores por defecto.
    pub fn from_env() -> DomainResult<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        let invalid = |msg: &str| Err(DomainError::InvalidConfig(msg.into()));

        if self.display.width == 0 || self.display.height == 0 {
            return invalid("display width/height must be non-zero");
        }
        if self.display.render_interval_ms == 0
            || self.display.video_interval_ms == 0
            || self.camera.capture_interval_ms == 0
        {
            return invalid("render, video and capture intervals must be non-zero");
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return invalid("jpeg_quality must be in 1..=100");
        }
        if self.speech.repeat_enabled && self.speech.repeat_ms == 0 {
            return invalid("repeat_ms must be non-zero when repetition is enabled");
        }
        if !(0.0..=180.0).contains(&self.guidance.cluster_angle_deg) {
            return invalid("cluster_angle_deg must be in [0, 180]");
        }
        Ok(())
    }
}
