use std::path::{Path, PathBuf};

use crate::{
    config::color::MarkerColor,
    foundation::error::MarkerResult,
    position::MarkerBounds,
    render::{
        magick::{MagickOpts, MagickRenderer},
        raster::RasterRenderer,
    },
};

/// One marker draw: copy `base_image`, fill `bounds` with `color`, write `out_path`.
#[derive(Clone, Debug)]
pub struct FrameRequest<'a> {
    pub base_image: &'a Path,
    pub bounds: MarkerBounds,
    pub color: MarkerColor,
    pub out_path: PathBuf,
}

/// Draws the marker rectangle for a single frame.
///
/// Implementations block until the output file is completely written (or the attempt failed) and
/// never modify `base_image`. Failures are reported as [`MarkerError::Render`] carrying the frame
/// index.
///
/// [`MarkerError::Render`]: crate::MarkerError::Render
pub trait MarkerRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render_frame(&self, req: &FrameRequest<'_>) -> MarkerResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// External ImageMagick process per frame.
    Magick,
    /// In-process drawing on the `image` crate.
    Raster,
}

pub fn create_renderer(
    kind: BackendKind,
    magick: &MagickOpts,
) -> MarkerResult<Box<dyn MarkerRenderer>> {
    match kind {
        BackendKind::Magick => Ok(Box::new(MagickRenderer::new(magick.clone())?)),
        BackendKind::Raster => Ok(Box::new(RasterRenderer::new())),
    }
}
