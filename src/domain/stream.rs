use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::detection::{BoxDetection, DetectionResult};
use super::draw::OverlayFrame;
use super::guidance::GuidanceState;

/// Mensajes que llegan desde el puente del detector remoto.
/// Sobre el socket van como `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DetectorInbound {
    Result(Box<DetectionResult>),
    GrayscaleModeSync(bool),
}

/// Mensajes hacia el detector: frames capturados y cambio de modo.
/// Mensaje del detector que no se pudo decodificar. Conserva el nombre del
/// evento cuando el sobre sí era legible.
#[derive(Debug, Clone, PartialEq)]
pub struct UndecodedInbound {
    pub event: Option<String>,
    pub reason: String,
}

impl UndecodedInbound {
    /// Era la respuesta a una petición de detección.
    pub fn is_result(&self) -> bool {
        self.event.as_deref() == Some("result")
    }
}

pub fn decode_detector(text: &str) -> Result<DetectorInbound, UndecodedInbound> {
    let value: Value = serde_json::from_str(text).map_err(|e| UndecodedInbound {
        event: None,
        reason: e.to_string(),
    })?;
    let event = value.get("event").and_then(Value::as_str).map(str::to_owned);
    serde_json::from_value(value).map_err(|e| UndecodedInbound {
        event,
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DetectorOutbound {
    /// `data:image/jpeg;base64,...`
    Image(String),
    ToggleGrayscale(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Mensajes que envía un cliente de visualización.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DisplayInbound {
    DisplayResize(DisplaySize),
    ToggleGrayscale(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceUpdate {
    #[serde(flatten)]
    pub guidance: GuidanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptic: Option<Vec<u32>>,
}

impl From<GuidanceState> for GuidanceUpdate {
    fn from(guidance: GuidanceState) -> Self {
        let haptic = guidance.severity.haptic_pattern().map(|p| p.to_vec());
        Self { guidance, haptic }
    }
}

/// Frame de cámara para pintar bajo el overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// `data:image/jpeg;base64,...`
    pub image: String,
}

/// Difusión hacia los clientes de visualización.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DisplayEvent {
    Frame(VideoFrame),
    Overlay(OverlayFrame),
    Guidance(GuidanceUpdate),
    GrayscaleMode(bool),
}

/// Resumen legible de las clases detectadas, p.ej. `"1 Scooter, 2 Stop"`.
pub fn summarize_detections(detections: &[BoxDetection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class_name.as_str()).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guidance::Severity;

    #[test]
    fn inbound_envelope() {
        let msg: DetectorInbound = serde_json::from_str(
            r#"{"event": "result", "data": {"navigation": {"state": "straight"}}}"#,
        )
        .unwrap();
        match msg {
            DetectorInbound::Result(r) => assert!(r.navigation.is_some()),
            other => panic!("unexpected {:?}", other),
        }
        let msg: DetectorInbound =
            serde_json::from_str(r#"{"event": "grayscale_mode_sync", "data": true}"#).unwrap();
        assert_eq!(msg, DetectorInbound::GrayscaleModeSync(true));
    }

    #[test]
    fn undecodable_result_keeps_its_event_name() {
        let bad = decode_detector(r#"{"event": "result", "data": 42}"#).unwrap_err();
        assert!(bad.is_result());

        let bad = decode_detector(r#"{"event": "grayscale_mode_sync", "data": "on"}"#).unwrap_err();
        assert_eq!(bad.event.as_deref(), Some("grayscale_mode_sync"));
        assert!(!bad.is_result());

        let bad = decode_detector("not json").unwrap_err();
        assert_eq!(bad.event, None);
    }

    #[test]
    fn decode_accepts_lenient_results() {
        let msg = decode_detector(r#"{"event": "result", "data": {"navigation": {"warnings": null}}}"#).unwrap();
        assert!(matches!(msg, DetectorInbound::Result(r) if r.navigation.is_some()));
    }

    #[test]
    fn outbound_envelope() {
        let json = serde_json::to_value(DetectorOutbound::ToggleGrayscale(false)).unwrap();
        assert_eq!(json, serde_json::json!({"event": "toggle_grayscale", "data": false}));
    }

    #[test]
    fn guidance_update_carries_haptics() {
        let update = GuidanceUpdate::from(GuidanceState::new("obstacle detected", Severity::Danger));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["message"], "obstacle detected");
        assert_eq!(json["severity"], "danger");
        assert_eq!(json["haptic"], serde_json::json!([200, 100, 200]));
    }

    #[test]
    fn summary_counts_classes() {
        let det = |c: &str| BoxDetection { class_name: c.into(), ..Default::default() };
        assert_eq!(summarize_detections(&[det("Stop"), det("Scooter"), det("Stop")]), "1 Scooter, 2 Stop");
    }
}
