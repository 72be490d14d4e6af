use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::watch;

use crate::domain::geometry::{BoxCoords, Vec2};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }
}

/// Escala cada eje por separado. `None` si la extensión de origen es nula en
/// algún eje: el llamador debe esperar a conocer la resolución nativa.
pub fn project(point: Vec2, source: Extent, target: Extent) -> Option<Vec2> {
    if source.width == 0.0 || source.height == 0.0 {
        return None;
    }
    Some([
        point[0] * target.width / source.width,
        point[1] * target.height / source.height,
    ])
}

/// Traduce coordenadas del detector (resolución nativa de la cámara) a la
/// superficie de visualización.
pub struct CoordinateMapper {
    source_tx: watch::Sender<Option<Extent>>,
    source_rx: watch::Receiver<Option<Extent>>,
    target: Extent,
}

impl CoordinateMapper {
    pub fn new(target: Extent) -> Self {
        let (source_tx, source_rx) = watch::channel(None);
        Self {
            source_tx,
            source_rx,
            target,
        }
    }

    /// Publica la resolución nativa leída del dispositivo de captura.
    pub fn set_source(&self, source: Extent) {
        self.source_tx.send_replace(Some(source));
    }

    pub fn reset_source(&self) {
        self.source_tx.send_replace(None);
    }

    pub fn set_target(&mut self, target: Extent) {
        self.target = target;
    }

    pub fn source(&self) -> Option<Extent> {
        (*self.source_rx.borrow()).filter(|e| !e.is_empty())
    }

    pub fn target(&self) -> Extent {
        self.target
    }

    pub fn is_ready(&self) -> bool {
        self.source().is_some()
    }

    /// Se resuelve cuando hay una extensión de origen utilizable. El futuro no
    /// toma prestado el mapper, así que puede vivir dentro de un `select!`.
    pub fn ready(&self) -> impl Future<Output = Option<Extent>> + Send + 'static {
        let mut rx = self.source_rx.clone();
        async move {
            rx.wait_for(|e| e.is_some_and(|e| !e.is_empty()))
                .await
                .ok()
                .and_then(|e| *e)
        }
    }

    pub fn project(&self, point: Vec2) -> Option<Vec2> {
        project(point, self.source()?, self.target)
    }

    pub fn project_box(&self, b: &BoxCoords) -> Option<BoxCoords> {
        let [x1, y1] = self.project([b[0], b[1]])?;
        let [x2, y2] = self.project([b[2], b[3]])?;
        Some([x1, y1, x2, y2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_axes_independently() {
        let p = project([100.0, 50.0], Extent::new(640.0, 480.0), Extent::new(320.0, 480.0));
        assert_eq!(p, Some([50.0, 50.0]));
    }

    #[test]
    fn zero_source_is_refused() {
        assert_eq!(project([1.0, 1.0], Extent::new(0.0, 480.0), Extent::new(10.0, 10.0)), None);
        assert_eq!(project([1.0, 1.0], Extent::new(640.0, 0.0), Extent::new(10.0, 10.0)), None);
    }

    #[test]
    fn mapper_defers_until_source_known() {
        let mapper = CoordinateMapper::new(Extent::new(1280.0, 960.0));
        assert!(!mapper.is_ready());
        assert_eq!(mapper.project([10.0, 10.0]), None);

        mapper.set_source(Extent::new(640.0, 480.0));
        assert_eq!(mapper.project_box(&[10.0, 20.0, 30.0, 40.0]), Some([20.0, 40.0, 60.0, 80.0]));
    }

    #[tokio::test]
    async fn ready_resolves_once_source_is_published() {
        let mapper = CoordinateMapper::new(Extent::new(100.0, 100.0));
        let ready = tokio::spawn(mapper.ready());

        mapper.set_source(Extent::new(0.0, 0.0));
        tokio::task::yield_now().await;
        assert!(!ready.is_finished());

        mapper.set_source(Extent::new(640.0, 480.0));
        assert_eq!(ready.await.unwrap(), Some(Extent::new(640.0, 480.0)));
    }
}
