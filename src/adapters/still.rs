use async_trait::async_trait;
use std::path::Path;

use crate::adapters::frames::encode_jpeg;
use crate::application::ports::{CapturedFrame, FrameSource};
use crate::domain::errors::{DomainError, DomainResult};

/// Fuente de frames a partir de una imagen fija. Útil en banco de pruebas
/// sin cámara: cada captura devuelve el mismo JPEG.
pub struct StillImageSource {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>, jpeg_quality: u8) -> DomainResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| DomainError::CaptureDeviceFailure(format!("{}: {}", path.display(), e)))?;
        let rgb = img.to_rgb8();
        let jpeg = encode_jpeg(&rgb, jpeg_quality)
            .map_err(|e| DomainError::CaptureDeviceFailure(e.to_string()))?;
        Ok(Self {
            jpeg,
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn capture_jpeg(&mut self) -> DomainResult<CapturedFrame> {
        Ok(CapturedFrame {
            jpeg: self.jpeg.clone(),
            width: self.width,
            height: self.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_capture_failure() {
        let err = StillImageSource::open("/nonexistent/frame.jpg", 80).err().unwrap();
        assert!(matches!(err, DomainError::CaptureDeviceFailure(_)));
    }

    #[tokio::test]
    async fn reencodes_file_and_reports_native_extent() {
        let path = std::env::temp_dir().join(format!("still-source-{}.png", std::process::id()));
        image::RgbImage::from_pixel(32, 24, image::Rgb([0, 0, 255]))
            .save(&path)
            .unwrap();

        let mut src = StillImageSource::open(&path, 80).unwrap();
        assert_eq!(src.extent(), (32, 24));
        let frame = src.capture_jpeg().await.unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);

        let _ = std::fs::remove_file(path);
    }
}
