use async_trait::async_trait;

use crate::adapters::still::StillImageSource;
use crate::application::ports::{CameraPort, FrameSource};
use crate::domain::{
    config::CameraSource,
    errors::{DomainError, DomainResult},
};

/// Abre la fuente de frames que indique la configuración.
pub struct DeviceCamera;

#[async_trait]
impl CameraPort for DeviceCamera {
    async fn open(&self, source: &CameraSource, jpeg_quality: u8) -> DomainResult<Box<dyn FrameSource>> {
        match source {
            CameraSource::Still { path } => {
                let path = path.clone();
                let src = tokio::task::spawn_blocking(move || StillImageSource::open(path, jpeg_quality))
                    .await
                    .map_err(|e| DomainError::CaptureDeviceFailure(e.to_string()))??;
                Ok(Box::new(src))
            }
            CameraSource::V4l2 { path, fourcc, width, height, fps } => {
                open_v4l2(path, fourcc, *width, *height, *fps, jpeg_quality).await
            }
        }
    }
}

#[cfg(feature = "v4l2")]
async fn open_v4l2(
    path: &str,
    fourcc: &str,
    width: u32,
    height: u32,
    fps: u32,
    jpeg_quality: u8,
) -> DomainResult<Box<dyn FrameSource>> {
    use crate::adapters::v4l2::capture::{CaptureConfig, V4l2Source};

    let src = V4l2Source::open(CaptureConfig {
        camera_path: path.to_string(),
        fourcc: fourcc.to_string(),
        width,
        height,
        fps,
        jpeg_quality,
    })
    .await?;
    Ok(Box::new(src))
}

#[cfg(not(feature = "v4l2"))]
async fn open_v4l2(
    path: &str,
    _fourcc: &str,
    _width: u32,
    _height: u32,
    _fps: u32,
    _jpeg_quality: u8,
) -> DomainResult<Box<dyn FrameSource>> {
    Err(DomainError::CaptureDeviceFailure(format!(
        "{}: compilado sin soporte V4L2 (feature `v4l2`)",
        path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_still_image_fails_to_open() {
        let source = CameraSource::Still { path: "/nonexistent/frame.jpg".into() };
        let err = DeviceCamera.open(&source, 80).await.err().unwrap();
        assert!(matches!(err, DomainError::CaptureDeviceFailure(_)));
    }

    #[cfg(not(feature = "v4l2"))]
    #[tokio::test]
    async fn v4l2_without_feature_is_a_capture_failure() {
        let err = DeviceCamera.open(&CameraSource::default(), 80).await.err().unwrap();
        assert!(matches!(err, DomainError::CaptureDeviceFailure(_)));
    }
}
