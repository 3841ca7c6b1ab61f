use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::{
    config::color::MarkerColor,
    foundation::error::{MarkerError, MarkerResult},
    position::MarkerBounds,
    render::backend::{FrameRequest, MarkerRenderer},
};

/// Draws the marker in-process, no external tool needed.
///
/// Coverage follows ImageMagick's `rectangle` primitive without anti-aliasing: columns
/// `round(x0)..=round(x1)` and rows `round(top_y)..=round(bottom_y)`, clipped to the image.
/// The decoded base image is cached and reused while the path does not change.
#[derive(Debug, Default)]
pub struct RasterRenderer {
    base: Mutex<Option<(PathBuf, Arc<RgbaImage>)>>,
}

impl RasterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn load_base(&self, path: &Path) -> Result<Arc<RgbaImage>, String> {
        let mut cached = self
            .base
            .lock()
            .map_err(|_| "base image cache lock poisoned".to_owned())?;
        if let Some((p, img)) = cached.as_ref()
            && p == path
        {
            return Ok(Arc::clone(img));
        }

        let img = image::open(path)
            .map_err(|e| format!("failed to decode base image '{}': {e}", path.display()))?
            .to_rgba8();
        let img = Arc::new(img);
        *cached = Some((path.to_path_buf(), Arc::clone(&img)));
        Ok(img)
    }
}

impl MarkerRenderer for RasterRenderer {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn render_frame(&self, req: &FrameRequest<'_>) -> MarkerResult<()> {
        let frame = req.bounds.frame.0;
        let base = self
            .load_base(req.base_image)
            .map_err(|msg| MarkerError::render(frame, msg))?;

        let mut canvas = (*base).clone();
        fill_marker(&mut canvas, &req.bounds, req.color);

        save_image(canvas, &req.out_path).map_err(|e| {
            MarkerError::render(
                frame,
                format!("failed to write '{}': {e}", req.out_path.display()),
            )
        })
    }
}

fn save_image(canvas: RgbaImage, path: &Path) -> image::ImageResult<()> {
    let img = DynamicImage::ImageRgba8(canvas);
    match ImageFormat::from_path(path) {
        // JPEG has no alpha channel.
        Ok(ImageFormat::Jpeg) => img.to_rgb8().save(path),
        _ => img.save(path),
    }
}

/// Fill the marker rectangle, blending `color` source-over.
pub fn fill_marker(img: &mut RgbaImage, bounds: &MarkerBounds, color: MarkerColor) {
    let Some((xs, ys)) = pixel_span(img.width(), img.height(), bounds) else {
        return;
    };
    for y in ys {
        for x in xs.clone() {
            let dst = img.get_pixel_mut(x, y);
            *dst = blend_over(*dst, color);
        }
    }
}

/// Inclusive pixel columns and rows covered by `bounds`, or `None` when fully off-image.
fn pixel_span(
    width: u32,
    height: u32,
    bounds: &MarkerBounds,
) -> Option<(std::ops::RangeInclusive<u32>, std::ops::RangeInclusive<u32>)> {
    fn span(a: f64, b: f64, len: u32) -> Option<std::ops::RangeInclusive<u32>> {
        if len == 0 {
            return None;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo = lo.round();
        let hi = hi.round();
        let max = f64::from(len - 1);
        if hi < 0.0 || lo > max {
            return None;
        }
        Some((lo.max(0.0) as u32)..=(hi.min(max) as u32))
    }

    let xs = span(bounds.x0, bounds.x1, width)?;
    let ys = span(bounds.top_y, bounds.bottom_y, height)?;
    Some((xs, ys))
}

fn blend_over(dst: Rgba<u8>, src: MarkerColor) -> Rgba<u8> {
    if src.is_opaque() {
        return Rgba(src.to_rgba8());
    }
    if src.a == 0 {
        return dst;
    }

    let sa = f32::from(src.a) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mix = |s: u8, d: u8| -> u8 {
        let s = f32::from(s) / 255.0;
        let d = f32::from(d) / 255.0;
        let c = (s * sa + d * da * (1.0 - sa)) / out_a;
        (c.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    Rgba([
        mix(src.r, dst[0]),
        mix(src.g, dst[1]),
        mix(src.b, dst[2]),
        (out_a.clamp(0.0, 1.0) * 255.0).round() as u8,
    ])
}
