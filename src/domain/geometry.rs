//! Utilidades geométricas en espacio de pantalla (+y hacia abajo).

use serde::{Deserialize, Serialize};

pub type Vec2 = [f64; 2];

/// `[x1, y1, x2, y2]` en píxeles del detector.
pub type BoxCoords = [f64; 4];

pub const DEFAULT_CLUSTER_ANGLE_DEG: f64 = 45.0;
pub const DEFAULT_MERGE_IOU: f64 = 0.7;

/// Las 8 direcciones principales, en el orden de los sectores de 45°
/// empezando en 0° (derecha) y girando en sentido horario en pantalla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compass {
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
    Up,
    UpRight,
}

impl Compass {
    const SECTORS: [Compass; 8] = [
        Compass::Right,
        Compass::DownRight,
        Compass::Down,
        Compass::DownLeft,
        Compass::Left,
        Compass::UpLeft,
        Compass::Up,
        Compass::UpRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Compass::Right => "right",
            Compass::DownRight => "down-right",
            Compass::Down => "down",
            Compass::DownLeft => "down-left",
            Compass::Left => "left",
            Compass::UpLeft => "up-left",
            Compass::Up => "up",
            Compass::UpRight => "up-right",
        }
    }
}

impl std::fmt::Display for Compass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn box_center(b: &BoxCoords) -> Vec2 {
    [((b[0] + b[2]) / 2.0).floor(), ((b[1] + b[3]) / 2.0).floor()]
}

/// Ordena las esquinas para que `x1 <= x2` y `y1 <= y2`.
pub fn normalize_box(b: &BoxCoords) -> BoxCoords {
    [b[0].min(b[2]), b[1].min(b[3]), b[0].max(b[2]), b[1].max(b[3])]
}

pub fn norm(v: &Vec2) -> f64 {
    v[0].hypot(v[1])
}

pub fn sub(a: &Vec2, b: &Vec2) -> Vec2 {
    [a[0] - b[0], a[1] - b[1]]
}

/// Ángulo en grados entre dos vectores, en [0, 180].
/// Un vector de longitud cero se considera máximamente distinto (180).
pub fn angle_between(v1: &Vec2, v2: &Vec2) -> f64 {
    let n1 = norm(v1);
    let n2 = norm(v2);
    if n1 == 0.0 || n2 == 0.0 {
        return 180.0;
    }
    let cos = (v1[0] * v2[0] + v1[1] * v2[1]) / (n1 * n2);
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Agrupamiento voraz de una pasada. Cada vector se une al primer grupo cuyo
/// representante (su primer miembro) esté a menos de `threshold_deg`; si no,
/// abre un grupo nuevo. Devuelve la media (sin renormalizar) de cada grupo en
/// orden de creación. El resultado depende del orden de entrada.
pub fn cluster_directions(vectors: &[Vec2], threshold_deg: f64) -> Vec<Vec2> {
    let mut groups: Vec<Vec<Vec2>> = Vec::new();
    for v in vectors {
        match groups
            .iter_mut()
            .find(|g| angle_between(v, &g[0]) < threshold_deg)
        {
            Some(group) => group.push(*v),
            None => groups.push(vec![*v]),
        }
    }

    groups
        .iter()
        .map(|g| {
            let n = g.len() as f64;
            let (sx, sy) = g.iter().fold((0.0, 0.0), |(sx, sy), v| (sx + v[0], sy + v[1]));
            [sx / n, sy / n]
        })
        .collect()
}

/// Clasifica un vector de pantalla en uno de los 8 sectores de 45° centrados
/// en las direcciones principales (`[c - 22.5°, c + 22.5°)`).
pub fn classify_direction(v: &Vec2) -> Compass {
    let deg = v[1].atan2(v[0]).to_degrees().rem_euclid(360.0);
    let idx = ((deg + 22.5) / 45.0).floor() as usize % 8;
    Compass::SECTORS[idx]
}

fn area(b: &BoxCoords) -> f64 {
    (b[2] - b[0]) * (b[3] - b[1])
}

pub fn iou(a: &BoxCoords, b: &BoxCoords) -> f64 {
    let xa = a[0].max(b[0]);
    let ya = a[1].max(b[1]);
    let xb = a[2].min(b[2]);
    let yb = a[3].min(b[3]);
    let inter = (xb - xa).max(0.0) * (yb - ya).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }
    inter / (area(a) + area(b) - inter)
}

/// Fusiona cajas solapadas: ordena por área descendente y descarta las que
/// solapan con la base retenida con IoU >= `iou_threshold`.
pub fn merge_close_boxes(boxes: &[BoxCoords], iou_threshold: f64) -> Vec<BoxCoords> {
    let mut remaining: Vec<BoxCoords> = boxes.iter().map(normalize_box).collect();
    remaining.sort_by(|a, b| area(b).total_cmp(&area(a)));

    let mut merged = Vec::new();
    while !remaining.is_empty() {
        let base = remaining.remove(0);
        remaining.retain(|other| iou(&base, other) < iou_threshold);
        merged.push(base);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_floored() {
        assert_eq!(box_center(&[0.0, 0.0, 5.0, 3.0]), [2.0, 1.0]);
        assert_eq!(box_center(&[10.0, 10.0, 50.0, 50.0]), [30.0, 30.0]);
    }

    #[test]
    fn angle_basics() {
        assert!((angle_between(&[1.0, 0.0], &[0.0, 1.0]) - 90.0).abs() < 1e-9);
        assert!((angle_between(&[1.0, 0.0], &[-1.0, 0.0]) - 180.0).abs() < 1e-9);
        assert_eq!(angle_between(&[1.0, 0.0], &[2.0, 0.0]), 0.0);
        assert_eq!(angle_between(&[0.0, 0.0], &[1.0, 0.0]), 180.0);
    }

    #[test]
    fn single_vector_cluster_is_unchanged() {
        assert_eq!(cluster_directions(&[[3.0, -4.0]], 45.0), vec![[3.0, -4.0]]);
        assert!(cluster_directions(&[], 45.0).is_empty());
    }

    #[test]
    fn near_parallel_vectors_merge() {
        let out = cluster_directions(&[[1.0, 0.0], [0.9, 0.1], [-1.0, 0.0]], 45.0);
        assert_eq!(out.len(), 2);
        assert!((out[0][0] - 0.95).abs() < 1e-9);
        assert!((out[0][1] - 0.05).abs() < 1e-9);
        assert_eq!(out[1], [-1.0, 0.0]);
    }

    #[test]
    fn membership_depends_on_first_member() {
        // (1, 1.2) queda a ~50° de (1,0) y a ~40° de (0,1)
        let out = cluster_directions(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.2]], 45.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], [1.0, 0.0]);
        assert!((out[1][0] - 0.5).abs() < 1e-9);
        assert!((out[1][1] - 1.1).abs() < 1e-9);
    }

    #[test]
    fn compass_sectors() {
        assert_eq!(classify_direction(&[1.0, 0.0]), Compass::Right);
        assert_eq!(classify_direction(&[0.0, -1.0]), Compass::Up);
        assert_eq!(classify_direction(&[0.0, 1.0]), Compass::Down);
        assert_eq!(classify_direction(&[-1.0, 0.0]), Compass::Left);
        assert_eq!(classify_direction(&[1.0, -1.0]), Compass::UpRight);
        assert_eq!(classify_direction(&[-1.0, -1.0]), Compass::UpLeft);
        assert_eq!(classify_direction(&[1.0, 1.0]), Compass::DownRight);
        let a = 22.0f64.to_radians();
        assert_eq!(classify_direction(&[a.cos(), a.sin()]), Compass::Right);
        let a = 23.0f64.to_radians();
        assert_eq!(classify_direction(&[a.cos(), a.sin()]), Compass::DownRight);
        // justo por debajo de 360° vuelve a "right"
        assert_eq!(classify_direction(&[1.0, -0.01]), Compass::Right);
    }

    #[test]
    fn merge_drops_heavy_overlaps_only() {
        let boxes = [
            [0.0, 0.0, 10.0, 10.0],
            [0.0, 0.0, 10.0, 9.0],
            [100.0, 100.0, 110.0, 110.0],
        ];
        let merged = merge_close_boxes(&boxes, DEFAULT_MERGE_IOU);
        assert_eq!(merged, vec![[0.0, 0.0, 10.0, 10.0], [100.0, 100.0, 110.0, 110.0]]);
    }

    #[test]
    fn normalize_orders_corners() {
        assert_eq!(normalize_box(&[50.0, 40.0, 10.0, 20.0]), [10.0, 20.0, 50.0, 40.0]);
    }
}
