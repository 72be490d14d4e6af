//! Renderizado de la capa superpuesta: cajas, etiquetas y flechas sobre la
//! superficie de visualización, siempre a partir del último resultado.

use std::f64::consts::PI;

use crate::application::arrows::{synthesize, SynthesisParams};
use crate::application::mapper::CoordinateMapper;
use crate::domain::config::GuidancePolicy;
use crate::domain::detection::{box_from_raw, Arrow, BoxDetection, DetectionResult, RawCoords};
use crate::domain::draw::{DrawCommand, OverlayFrame};
use crate::domain::geometry::{normalize_box, Vec2};

const BOX_LINE_WIDTH: f64 = 3.0;
const LABEL_FONT_PX: f64 = 14.0;
const LABEL_HEIGHT: f64 = 20.0;
const CHIP_FONT_PX: f64 = 20.0;
const CHIP_HEIGHT: f64 = 28.0;
const CHIP_BACKGROUND: &str = "rgba(0, 0, 0, 0.7)";
const ARROW_LINE_WIDTH: f64 = 4.0;
const ARROW_DEFAULT_COLOR: &str = "#FFFF00";
const ARROW_HEAD_LEN: f64 = 15.0;
const ARROW_HEAD_SPREAD: f64 = PI / 6.0;
/// Longitud de las flechas sintetizadas respecto a la diagonal del frame.
const SYNTH_ARROW_RATIO: f64 = 0.15;
const LEGACY_COLORS: [&str; 5] = ["#FF1493", "#00FF7F", "#FFD700", "#FF8000", "#8A2BE2"];

/// Superficie de dibujo. La implementación de producción graba comandos que
/// luego rasteriza el cliente de visualización.
pub trait Surface {
    fn clear(&mut self);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str, line_width: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    fn fill_text(&mut self, x: f64, y: f64, text: &str, color: &str, font_px: f64, outline: Option<&str>);
    fn line(&mut self, from: Vec2, to: Vec2, color: &str, line_width: f64);
    fn measure_text(&self, text: &str, font_px: f64) -> f64;
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_frame(self, width: u32, height: u32, grayscale: bool) -> OverlayFrame {
        OverlayFrame {
            width,
            height,
            grayscale,
            commands: self.commands,
        }
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str, line_width: f64) {
        self.commands.push(DrawCommand::StrokeRect { x, y, w, h, color: color.into(), line_width });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.commands.push(DrawCommand::FillRect { x, y, w, h, color: color.into() });
    }

    fn fill_text(&mut self, x: f64, y: f64, text: &str, color: &str, font_px: f64, outline: Option<&str>) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.into(),
            color: color.into(),
            font_px,
            outline: outline.map(str::to_string),
        });
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: &str, line_width: f64) {
        self.commands.push(DrawCommand::Line { from, to, color: color.into(), line_width });
    }

    // Aproximación para fuente sans en negrita: ~0.6 em por carácter.
    fn measure_text(&self, text: &str, font_px: f64) -> f64 {
        text.chars().count() as f64 * font_px * 0.6
    }
}

/// Color de caja/fondo de etiqueta por modelo de detección.
pub fn model_color(model: &str) -> &'static str {
    match model {
        "block" => "#FFD700",
        "scooter" => "#FF1493",
        "button" => "#00FF7F",
        _ => "#FFFFFF",
    }
}

pub fn text_color(model: &str) -> &'static str {
    match model {
        "scooter" => "#FFFFFF",
        _ => "#000000",
    }
}

pub fn display_name(class_name: &str) -> &str {
    match class_name {
        "Go_Forward" => "Forward",
        "Stop" => "Stop",
        "Scooter" => "Scooter",
        "Sound_Button" => "Sound Button",
        other => other,
    }
}

pub fn box_label(det: &BoxDetection) -> String {
    let name = display_name(&det.class_name);
    match det.confidence.filter(|c| *c > 0.0) {
        Some(c) => format!("{} ({:.1}%)", name, c * 100.0),
        None => name.to_string(),
    }
}

pub struct OverlayRenderer {
    policy: GuidancePolicy,
}

impl OverlayRenderer {
    pub fn new(policy: GuidancePolicy) -> Self {
        Self { policy }
    }

    /// Una pasada completa. Devuelve `false` si no se pudo proyectar porque
    /// aún no se conoce la resolución nativa (la superficie queda limpia).
    pub fn render(&self, result: Option<&DetectionResult>, mapper: &CoordinateMapper, surface: &mut dyn Surface) -> bool {
        surface.clear();
        let Some(source) = mapper.source() else {
            return false;
        };
        let Some(result) = result else {
            return true;
        };

        if !result.boxes().is_empty() {
            for det in result.boxes() {
                self.draw_detection(det, mapper, surface);
            }
        } else if let Some(coords) = result.box_coords.as_deref() {
            for (index, raw) in coords.iter().enumerate() {
                draw_legacy_box(index, raw, mapper, surface);
            }
        }

        if !result.arrows().is_empty() {
            let state_text = result.arrows.as_ref().map(|a| a.state_text.as_str()).unwrap_or_default();
            draw_state_chip(state_text, surface);
            for arrow in result.arrows() {
                draw_projected_arrow(arrow, mapper, surface);
            }
        } else if let (Some(details), true) = (&result.block_details, self.policy.synthesize_arrows) {
            let params = SynthesisParams {
                proximity_factor: self.policy.proximity_factor,
                cluster_angle_deg: self.policy.cluster_angle_deg,
                arrow_length: source.diagonal() * SYNTH_ARROW_RATIO,
            };
            let synthesized = synthesize(details, &params);
            if !synthesized.arrows.is_empty() {
                draw_state_chip(&synthesized.state_text, surface);
                for arrow in &synthesized.arrows {
                    draw_projected_arrow(arrow, mapper, surface);
                }
            }
        }
        true
    }

    fn draw_detection(&self, det: &BoxDetection, mapper: &CoordinateMapper, surface: &mut dyn Surface) {
        let Some(b) = det.coords().and_then(|b| mapper.project_box(&b)) else {
            return;
        };
        let color = model_color(&det.model);
        draw_labelled_box(normalize_box(&b), &box_label(det), color, text_color(&det.model), surface);
    }
}

fn draw_legacy_box(index: usize, raw: &RawCoords, mapper: &CoordinateMapper, surface: &mut dyn Surface) {
    let Some(b) = box_from_raw(raw).and_then(|b| mapper.project_box(&b)) else {
        return;
    };
    let color = LEGACY_COLORS[index % LEGACY_COLORS.len()];
    let text = if index % 2 == 0 { "#FFFFFF" } else { "#000000" };
    draw_labelled_box(normalize_box(&b), &format!("Object {}", index + 1), color, text, surface);
}

fn draw_labelled_box(b: [f64; 4], label: &str, color: &str, text: &str, surface: &mut dyn Surface) {
    let [x1, y1, x2, y2] = b;
    surface.stroke_rect(x1, y1, x2 - x1, y2 - y1, color, BOX_LINE_WIDTH);
    let width = surface.measure_text(label, LABEL_FONT_PX) + 8.0;
    surface.fill_rect(x1, y1 - LABEL_HEIGHT, width, LABEL_HEIGHT, color);
    surface.fill_text(x1 + 4.0, y1 - 6.0, label, text, LABEL_FONT_PX, None);
}

fn draw_state_chip(state_text: &str, surface: &mut dyn Surface) {
    if state_text.is_empty() {
        return;
    }
    let text = format!("State: {}", state_text);
    let width = surface.measure_text(&text, CHIP_FONT_PX) + 16.0;
    surface.fill_rect(16.0, 16.0, width, CHIP_HEIGHT, CHIP_BACKGROUND);
    surface.fill_text(24.0, 36.0, &text, "#FFFFFF", CHIP_FONT_PX, Some("#000000"));
}

fn draw_projected_arrow(arrow: &Arrow, mapper: &CoordinateMapper, surface: &mut dyn Surface) {
    let Some((start, end)) = arrow.endpoints() else {
        return;
    };
    let (Some(from), Some(to)) = (mapper.project(start), mapper.project(end)) else {
        return;
    };
    let color = arrow.color.as_deref().unwrap_or(ARROW_DEFAULT_COLOR);
    draw_arrow(from, to, color, surface);
}

/// Fuste más dos alas. La cabeza nunca es más larga que el propio fuste.
pub fn draw_arrow(from: Vec2, to: Vec2, color: &str, surface: &mut dyn Surface) {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    let angle = dy.atan2(dx);
    let head = ARROW_HEAD_LEN.min(dx.hypot(dy));

    surface.line(from, to, color, ARROW_LINE_WIDTH);
    for spread in [-ARROW_HEAD_SPREAD, ARROW_HEAD_SPREAD] {
        let wing = [
            to[0] - head * (angle + spread).cos(),
            to[1] - head * (angle + spread).sin(),
        ];
        surface.line(to, wing, color, ARROW_LINE_WIDTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mapper::Extent;
    use crate::domain::detection::{ArrowSet, BlockDetails};

    fn mapper(source: Option<Extent>, target: Extent) -> CoordinateMapper {
        let m = CoordinateMapper::new(target);
        if let Some(s) = source {
            m.set_source(s);
        }
        m
    }

    fn render(result: &DetectionResult, m: &CoordinateMapper) -> Vec<DrawCommand> {
        let mut surface = RecordingSurface::new();
        OverlayRenderer::new(GuidancePolicy::default()).render(Some(result), m, &mut surface);
        surface.commands().to_vec()
    }

    fn lines(cmds: &[DrawCommand]) -> Vec<(Vec2, Vec2, String)> {
        cmds.iter()
            .filter_map(|c| match c {
                DrawCommand::Line { from, to, color, .. } => Some((*from, *to, color.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn waits_for_source_extent() {
        let m = mapper(None, Extent::new(640.0, 480.0));
        let mut surface = RecordingSurface::new();
        let drawn = OverlayRenderer::new(GuidancePolicy::default()).render(
            Some(&DetectionResult::default()),
            &m,
            &mut surface,
        );
        assert!(!drawn);
        assert_eq!(surface.commands(), [DrawCommand::Clear]);
    }

    #[test]
    fn boxes_are_scaled_and_labelled() {
        let m = mapper(Some(Extent::new(640.0, 480.0)), Extent::new(1280.0, 960.0));
        let result = DetectionResult {
            boxes: Some(vec![BoxDetection {
                coords: vec![50.0, 40.0, 10.0, 20.0], // esquinas invertidas
                class_name: "Scooter".into(),
                model: "scooter".into(),
                confidence: Some(0.873),
            }]),
            ..Default::default()
        };
        let cmds = render(&result, &m);
        assert_eq!(cmds[0], DrawCommand::Clear);
        assert_eq!(
            cmds[1],
            DrawCommand::StrokeRect { x: 20.0, y: 40.0, w: 80.0, h: 40.0, color: "#FF1493".into(), line_width: 3.0 }
        );
        match &cmds[3] {
            DrawCommand::Text { text, color, x, y, .. } => {
                assert_eq!(text, "Scooter (87.3%)");
                assert_eq!(color, "#FFFFFF");
                assert_eq!((*x, *y), (24.0, 34.0));
            }
            other => panic!("expected label text, got {:?}", other),
        }
    }

    #[test]
    fn legacy_coordinates_cycle_palette() {
        let m = mapper(Some(Extent::new(100.0, 100.0)), Extent::new(100.0, 100.0));
        let result = DetectionResult {
            box_coords: Some(vec![vec![0.0, 30.0, 10.0, 40.0], vec![20.0, 30.0, 30.0, 40.0], vec![1.0]]),
            ..Default::default()
        };
        let cmds = render(&result, &m);
        let texts: Vec<_> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Object 1", "Object 2"]);
        assert!(matches!(&cmds[1], DrawCommand::StrokeRect { color, .. } if color == "#FF1493"));
    }

    #[test]
    fn precomputed_arrows_with_chip() {
        let m = mapper(Some(Extent::new(100.0, 100.0)), Extent::new(200.0, 200.0));
        let result = DetectionResult {
            arrows: Some(ArrowSet {
                state_text: "Intersection".into(),
                arrows: vec![Arrow { start: vec![10.0, 50.0], end: vec![60.0, 50.0], color: None }],
            }),
            ..Default::default()
        };
        let cmds = render(&result, &m);
        assert!(cmds.iter().any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "State: Intersection")));
        let l = lines(&cmds);
        assert_eq!(l.len(), 3);
        assert_eq!(l[0], ([20.0, 100.0], [120.0, 100.0], "#FFFF00".to_string()));
        // alas detrás de la punta
        assert!(l[1].1[0] < 120.0 && l[2].1[0] < 120.0);
    }

    #[test]
    fn arrow_head_is_capped_by_shaft() {
        let mut surface = RecordingSurface::new();
        draw_arrow([0.0, 0.0], [4.0, 0.0], "#FFF", &mut surface);
        for (_, wing, _) in lines(surface.commands()).into_iter().skip(1) {
            assert!(wing[0] >= 0.0 - 1e-9);
        }
    }

    #[test]
    fn block_details_synthesize_arrows() {
        let m = mapper(Some(Extent::new(640.0, 480.0)), Extent::new(640.0, 480.0));
        let result = DetectionResult {
            block_details: Some(BlockDetails {
                merged_stop_boxes: vec![vec![100.0, 100.0, 120.0, 120.0]],
                go_boxes: vec![vec![130.0, 100.0, 150.0, 120.0]],
            }),
            ..Default::default()
        };
        let cmds = render(&result, &m);
        let l = lines(&cmds);
        assert_eq!(l.len(), 3);
        assert_eq!(l[0].0, [110.0, 110.0]);
        // 15% de la diagonal de 640x480 = 120 px
        assert!((l[0].1[0] - 230.0).abs() < 1e-3);
        assert!(cmds.iter().any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "State: Intersection")));
    }

    #[test]
    fn no_result_only_clears() {
        let m = mapper(Some(Extent::new(10.0, 10.0)), Extent::new(10.0, 10.0));
        let mut surface = RecordingSurface::new();
        assert!(OverlayRenderer::new(GuidancePolicy::default()).render(None, &m, &mut surface));
        assert_eq!(surface.commands(), [DrawCommand::Clear]);
    }
}
