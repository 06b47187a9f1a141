//! Scannable code images for boxes.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::io::Cursor;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Renders `data` as a QR code PNG. Each module is `scale` pixels wide and
/// the code is surrounded by `border` light modules.
pub fn render_png(data: &str, scale: u32, border: u32) -> Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| anyhow!("failed to encode QR data: {:?}", e))?;
    let width = code.width() as u32;
    let colors = code.to_colors();

    let side = (width + 2 * border) * scale;
    let img = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        if mx < border || my < border || mx >= border + width || my >= border + width {
            return LIGHT;
        }
        let index = ((my - border) * width + (mx - border)) as usize;
        match colors[index] {
            Color::Dark => DARK,
            Color::Light => LIGHT,
        }
    });

    let mut out = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out)
}
