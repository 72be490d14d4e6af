use anyhow::Result;
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, Rgb, RgbImage};

/// Comprime un frame RGB a JPEG con la calidad indicada (1..=100).
pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut jpeg, quality);
    enc.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    Ok(jpeg)
}

/// Convierte un buffer YUYV (YUV 4:2:2) a RGB.
pub fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);

    // Cada bloque de 4 bytes define 2 píxeles: [Y0, U, Y1, V]
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;
        if y >= h {
            break;
        }

        out.put_pixel(x, y, bt601(y0, u, v));
        if x + 1 < w {
            out.put_pixel(x + 1, y, bt601(y1, u, v));
        }
    }
    out
}

fn bt601(y: f32, u: f32, v: f32) -> Rgb<u8> {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    Rgb([r, g, b])
}
