pub(crate) mod backend;
pub(crate) mod magick;
pub(crate) mod raster;
