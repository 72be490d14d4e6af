use serde::{Deserialize, Serialize};

use super::geometry::Vec2;

/// Primitivas de dibujo en coordenadas de la superficie de visualización.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    StrokeRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
        line_width: f64,
    },
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        color: String,
        font_px: f64,
        /// Color del contorno, si el texto lleva trazo.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outline: Option<String>,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: String,
        line_width: f64,
    },
}

/// Una pasada completa del renderizador sobre la superficie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub commands: Vec<DrawCommand>,
}
