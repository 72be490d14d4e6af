use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::mpsc as std_mpsc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::adapters::frames::{encode_jpeg, yuyv_to_rgb};
use crate::application::ports::{CapturedFrame, FrameSource};
use crate::domain::errors::{DomainError, DomainResult};

/// Configuración para inicializar la captura de vídeo.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub camera_path: String,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub jpeg_quality: u8,
}

type Reply = oneshot::Sender<DomainResult<CapturedFrame>>;

/// Cámara V4L2 atendida por un hilo dedicado.
///
/// El stream MMAP no puede cruzar hilos, así que vive en el hilo de captura y
/// cada petición viaja por un canal. Soltar el `V4l2Source` cierra el canal,
/// el hilo termina y el dispositivo se libera.
pub struct V4l2Source {
    requests: std_mpsc::Sender<Reply>,
    width: u32,
    height: u32,
}

impl V4l2Source {
    pub async fn open(cfg: CaptureConfig) -> DomainResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (requests, rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || capture_worker(cfg, ready_tx, rx))
            .map_err(|e| DomainError::CaptureDeviceFailure(e.to_string()))?;

        let (width, height) = ready_rx
            .await
            .map_err(|_| DomainError::CaptureDeviceFailure("el hilo de captura terminó".into()))??;

        Ok(Self { requests, width, height })
    }
}

#[async_trait]
impl FrameSource for V4l2Source {
    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn capture_jpeg(&mut self) -> DomainResult<CapturedFrame> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .map_err(|_| DomainError::CaptureDeviceFailure("cámara cerrada".into()))?;
        rx.await
            .map_err(|_| DomainError::CaptureDeviceFailure("cámara cerrada".into()))?
    }
}

fn parse_fourcc(s: &str) -> Result<FourCC> {
    let b = s.as_bytes();
    if b.len() != 4 {
        return Err(anyhow!("FourCC debe tener 4 caracteres"));
    }
    Ok(FourCC::new(&[b[0], b[1], b[2], b[3]]))
}

/// Aplica formato y FPS. El driver puede ajustar los valores a los más
/// cercanos soportados; se devuelven los reales.
fn configure(dev: &Device, cfg: &CaptureConfig) -> Result<(FourCC, u32, u32)> {
    let mut fmt = dev.format()?;
    fmt.fourcc = parse_fourcc(&cfg.fourcc)?;
    fmt.width = cfg.width;
    fmt.height = cfg.height;
    let actual = dev.set_format(&fmt)?;

    let mut params = dev.params()?;
    params.interval.numerator = 1;
    params.interval.denominator = cfg.fps;
    if let Err(e) = dev.set_params(&params) {
        warn!("El driver no aceptó {} FPS: {}", cfg.fps, e);
    }

    Ok((actual.fourcc, actual.width, actual.height))
}

fn grab(stream: &mut Stream<'_>, fourcc: FourCC, w: u32, h: u32, quality: u8) -> Result<Vec<u8>> {
    let (data, meta) = stream.next()?;
    let used = data.get(..meta.bytesused as usize).filter(|d| !d.is_empty()).unwrap_or(data);
    let fcc = fourcc.str().map_err(|_| anyhow!("FourCC inválido"))?;

    match fcc {
        // MJPG ya es una secuencia de JPEGs
        "MJPG" => Ok(used.to_vec()),
        "YUYV" => encode_jpeg(&yuyv_to_rgb(used, w, h), quality),
        _ => Err(anyhow!("Formato de cámara {} no soportado", fcc)),
    }
}

fn capture_worker(
    cfg: CaptureConfig,
    ready: oneshot::Sender<DomainResult<(u32, u32)>>,
    requests: std_mpsc::Receiver<Reply>,
) {
    let fail = |e: anyhow::Error| DomainError::CaptureDeviceFailure(format!("{}: {}", cfg.camera_path, e));

    let dev = match Device::with_path(&cfg.camera_path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(fail(e.into())));
            return;
        }
    };
    let (fourcc, width, height) = match configure(&dev, &cfg) {
        Ok(v) => v,
        Err(e) => {
            let _ = ready.send(Err(fail(e)));
            return;
        }
    };
    // Dos buffers: con capturas cada varios cientos de ms no interesa encolar frames viejos.
    let mut stream = match Stream::with_buffers(&dev, Type::VideoCapture, 2) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(fail(e.into())));
            return;
        }
    };

    info!("Cámara abierta: {}x{} [{}] a {} FPS", width, height, fourcc, cfg.fps);
    if ready.send(Ok((width, height))).is_err() {
        return;
    }

    while let Ok(reply) = requests.recv() {
        let frame = grab(&mut stream, fourcc, width, height, cfg.jpeg_quality)
            .map(|jpeg| CapturedFrame { jpeg, width, height })
            .map_err(fail);
        let _ = reply.send(frame);
    }

    info!("Cámara {} liberada.", cfg.camera_path);
}
