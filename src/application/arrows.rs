//! Síntesis de flechas de navegación a partir de la geometría cruda de bloques
//! táctiles, para cuando el detector no las envía precalculadas.

use crate::domain::detection::{box_from_raw, Arrow, BlockDetails};
use crate::domain::geometry::{
    box_center, cluster_directions, merge_close_boxes, norm, normalize_box, sub, BoxCoords, Vec2,
    DEFAULT_MERGE_IOU,
};

pub const INTERSECTION_COLOR: &str = "#FFFF00";
pub const STRAIGHT_COLOR: &str = "#FF0000";
const PATH_POINTS_PER_BOX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    pub proximity_factor: f64,
    pub cluster_angle_deg: f64,
    pub arrow_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesized {
    pub state_text: String,
    pub arrows: Vec<Arrow>,
}

fn arrow(start: Vec2, end: Vec2, color: &str) -> Arrow {
    Arrow {
        start: start.to_vec(),
        end: end.to_vec(),
        color: Some(color.to_string()),
    }
}

/// Vectores desde el centro de un bloque stop hacia los bloques go cercanos
/// (distancia en `(0, ancho * proximity_factor)`).
pub fn candidate_vectors(stop: &BoxCoords, go_boxes: &[BoxCoords], proximity_factor: f64) -> Vec<Vec2> {
    let stop = normalize_box(stop);
    let center = box_center(&stop);
    let threshold = (stop[2] - stop[0]) * proximity_factor;
    go_boxes
        .iter()
        .map(|g| sub(&box_center(&normalize_box(g)), &center))
        .filter(|v| {
            let d = norm(v);
            d > 0.0 && d < threshold
        })
        .collect()
}

/// Una flecha por dirección agrupada, desde el centro del bloque stop.
pub fn intersection_arrows(stops: &[BoxCoords], go_boxes: &[BoxCoords], params: &SynthesisParams) -> Vec<Arrow> {
    let mut out = Vec::new();
    for stop in stops {
        let center = box_center(&normalize_box(stop));
        let candidates = candidate_vectors(stop, go_boxes, params.proximity_factor);
        for dir in cluster_directions(&candidates, params.cluster_angle_deg) {
            let len = norm(&dir) + 1e-6;
            let end = [
                center[0] + dir[0] / len * params.arrow_length,
                center[1] + dir[1] / len * params.arrow_length,
            ];
            out.push(arrow(center, end, INTERSECTION_COLOR));
        }
    }
    out
}

/// Puntos de paso: 4 por caja go repartidos en vertical (o el centro si la caja
/// es demasiado baja).
pub fn path_points(go_boxes: &[BoxCoords]) -> Vec<Vec2> {
    let mut points = Vec::new();
    for b in go_boxes {
        let b = normalize_box(b);
        let step = ((b[3] - b[1]) / PATH_POINTS_PER_BOX as f64).floor();
        if step > 0.0 {
            let x = ((b[0] + b[2]) / 2.0).floor();
            for i in 0..PATH_POINTS_PER_BOX {
                points.push([x, b[1] + i as f64 * step + (step / 2.0).floor()]);
            }
        } else {
            points.push(box_center(&b));
        }
    }
    points
}

/// Segmentos de abajo hacia arriba; se omite cualquier par cuya y no decrezca.
pub fn straight_path(go_boxes: &[BoxCoords]) -> Vec<Arrow> {
    let mut points = path_points(go_boxes);
    if points.len() < 2 {
        return Vec::new();
    }
    points.sort_by(|a, b| b[1].total_cmp(&a[1]));
    points
        .windows(2)
        .filter(|w| w[0][1] > w[1][1])
        .map(|w| arrow(w[0], w[1], STRAIGHT_COLOR))
        .collect()
}

pub fn synthesize(details: &BlockDetails, params: &SynthesisParams) -> Synthesized {
    let stops: Vec<BoxCoords> = details.merged_stop_boxes.iter().filter_map(|b| box_from_raw(b)).collect();
    let stops = merge_close_boxes(&stops, DEFAULT_MERGE_IOU);
    let go: Vec<BoxCoords> = details.go_boxes.iter().filter_map(|b| box_from_raw(b)).collect();

    if !stops.is_empty() && !go.is_empty() {
        Synthesized {
            state_text: "Intersection".into(),
            arrows: intersection_arrows(&stops, &go, params),
        }
    } else if !go.is_empty() {
        Synthesized {
            state_text: "Straight".into(),
            arrows: straight_path(&go),
        }
    } else {
        Synthesized::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: SynthesisParams = SynthesisParams {
        proximity_factor: 3.0,
        cluster_angle_deg: 45.0,
        arrow_length: 100.0,
    };

    #[test]
    fn go_blocks_outside_proximity_are_ignored() {
        let stop = [100.0, 100.0, 120.0, 120.0]; // ancho 20 -> radio 60
        let near = [130.0, 100.0, 150.0, 120.0]; // +30 en x
        let far = [300.0, 100.0, 320.0, 120.0];
        let v = candidate_vectors(&stop, &[near, far, stop], 3.0);
        assert_eq!(v, vec![[30.0, 0.0]]);
    }

    #[test]
    fn intersection_arrows_follow_clusters() {
        let stop = [100.0, 100.0, 120.0, 120.0];
        let right_a = [130.0, 100.0, 150.0, 120.0];
        let right_b = [132.0, 102.0, 152.0, 122.0];
        let up = [100.0, 60.0, 120.0, 80.0];
        let arrows = intersection_arrows(&[stop], &[right_a, right_b, up], &PARAMS);
        assert_eq!(arrows.len(), 2);
        let (s, e) = arrows[0].endpoints().unwrap();
        assert_eq!(s, [110.0, 110.0]);
        assert!(e[0] > 205.0 && (e[1] - 110.0).abs() < 4.0);
        let (_, e) = arrows[1].endpoints().unwrap();
        assert!((e[0] - 110.0).abs() < 1e-3 && (e[1] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn straight_path_runs_bottom_to_top() {
        let arrows = straight_path(&[[0.0, 0.0, 10.0, 40.0]]);
        // puntos en y = 5, 15, 25, 35 -> tres segmentos ascendentes
        assert_eq!(arrows.len(), 3);
        assert_eq!(arrows[0].endpoints().unwrap(), ([5.0, 35.0], [5.0, 25.0]));
        assert_eq!(arrows[2].endpoints().unwrap(), ([5.0, 15.0], [5.0, 5.0]));
    }

    #[test]
    fn straight_path_skips_equal_heights() {
        // dos cajas bajas a la misma altura: centros con la misma y
        let arrows = straight_path(&[[0.0, 10.0, 10.0, 12.0], [20.0, 10.0, 30.0, 12.0]]);
        assert!(arrows.is_empty());
    }

    #[test]
    fn synthesize_picks_situation() {
        let details = BlockDetails {
            merged_stop_boxes: vec![],
            go_boxes: vec![vec![0.0, 0.0, 10.0, 40.0]],
        };
        let s = synthesize(&details, &PARAMS);
        assert_eq!(s.state_text, "Straight");
        assert_eq!(s.arrows.len(), 3);

        let empty = synthesize(&BlockDetails::default(), &PARAMS);
        assert!(empty.arrows.is_empty());
        assert!(empty.state_text.is_empty());
    }
}
