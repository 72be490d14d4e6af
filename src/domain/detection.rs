use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Campo tolerante: `null` o un tipo inesperado valen lo mismo que ausente.
fn lenient<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(de)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Lista tolerante: se descartan los elementos ilegibles, no la lista entera.
fn lenient_items<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => items.into_iter().filter_map(|v| T::deserialize(v).ok()).collect(),
        _ => Vec::new(),
    })
}

fn lenient_opt_items<'de, D, T>(de: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => Some(items.into_iter().filter_map(|v| T::deserialize(v).ok()).collect()),
        _ => None,
    })
}

/// Coordenadas tal y como llegan del detector. Se guardan como `Vec` porque el
/// productor no garantiza longitud; los lectores validan con `coords()`.
pub type RawCoords = Vec<f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxDetection {
    #[serde(rename = "box", default, deserialize_with = "lenient")]
    pub coords: RawCoords,
    #[serde(rename = "class", default, deserialize_with = "lenient")]
    pub class_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<f64>,
}

impl BoxDetection {
    pub fn coords(&self) -> Option<[f64; 4]> {
        box_from_raw(&self.coords)
    }
}

pub fn box_from_raw(raw: &[f64]) -> Option<[f64; 4]> {
    match raw {
        [x1, y1, x2, y2, ..] => Some([*x1, *y1, *x2, *y2]),
        _ => None,
    }
}

pub fn point_from_raw(raw: &[f64]) -> Option<[f64; 2]> {
    match raw {
        [x, y, ..] => Some([*x, *y]),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavState {
    Intersection,
    Straight,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavDirection {
    Forward,
    Stop,
    Left,
    Right,
    #[default]
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    #[serde(default, deserialize_with = "lenient")]
    pub sound_button: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub traffic_light: Option<bool>,
}

/// Algunos productores mandan la lista de obstáculos como array y otros como
/// una cadena suelta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Obstacles {
    List(Vec<String>),
    Text(String),
}

impl Default for Obstacles {
    fn default() -> Self {
        Obstacles::List(Vec::new())
    }
}

impl Obstacles {
    pub fn is_empty(&self) -> bool {
        match self {
            Obstacles::List(items) => items.is_empty(),
            Obstacles::Text(text) => text.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    #[serde(default, deserialize_with = "lenient")]
    pub state: NavState,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: NavDirection,
    #[serde(default, deserialize_with = "lenient")]
    pub signals: Signals,
    #[serde(default, deserialize_with = "lenient")]
    pub obstacles: Obstacles,
    #[serde(default, deserialize_with = "lenient_items")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    #[serde(default, deserialize_with = "lenient")]
    pub start: RawCoords,
    #[serde(default, deserialize_with = "lenient")]
    pub end: RawCoords,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Arrow {
    /// Devuelve `(inicio, fin)` sólo si ambos extremos tienen dos componentes.
    pub fn endpoints(&self) -> Option<([f64; 2], [f64; 2])> {
        Some((point_from_raw(&self.start)?, point_from_raw(&self.end)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrowSet {
    #[serde(default, deserialize_with = "lenient")]
    pub state_text: String,
    #[serde(default, deserialize_with = "lenient_items")]
    pub arrows: Vec<Arrow>,
}

/// Geometría cruda de bloques táctiles, cuando el detector no precalcula flechas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDetails {
    #[serde(default, deserialize_with = "lenient_items")]
    pub merged_stop_boxes: Vec<RawCoords>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub go_boxes: Vec<RawCoords>,
}

/// Un frame de salida del detector remoto. Se sustituye entero en cada mensaje.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub grayscale_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_items", skip_serializing_if = "Option::is_none")]
    pub box_coords: Option<Vec<RawCoords>>,
    #[serde(default, deserialize_with = "lenient_opt_items", skip_serializing_if = "Option::is_none")]
    pub boxes: Option<Vec<BoxDetection>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Navigation>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub arrows: Option<ArrowSet>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub block_details: Option<BlockDetails>,
    #[serde(default, deserialize_with = "lenient_opt_items", skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl DetectionResult {
    pub fn boxes(&self) -> &[BoxDetection] {
        self.boxes.as_deref().unwrap_or_default()
    }

    pub fn classes(&self) -> &[String] {
        self.classes.as_deref().unwrap_or_default()
    }

    /// Flechas precalculadas por el detector (vacío si no hay).
    pub fn arrows(&self) -> &[Arrow] {
        self.arrows.as_ref().map(|a| a.arrows.as_slice()).unwrap_or_default()
    }
}
