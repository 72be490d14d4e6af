use std::sync::{Arc, RwLock};

use crate::domain::detection::DetectionResult;

/// Último `DetectionResult` recibido. Cada ingesta sustituye al anterior por
/// completo; los lectores sólo clonan el `Arc`, nunca ven un valor a medias.
#[derive(Clone, Default)]
pub struct DetectionStore {
    current: Arc<RwLock<Option<Arc<DetectionResult>>>>,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&self, result: DetectionResult) -> Arc<DetectionResult> {
        let result = Arc::new(result);
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(result.clone());
        result
    }

    pub fn current(&self) -> Option<Arc<DetectionResult>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
