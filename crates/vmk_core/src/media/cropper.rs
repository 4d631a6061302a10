//! Region cropping.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::models::{Coordinates, ImageSize};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Image error for {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Region {x},{y} {width}x{height} lies outside the {image_width}x{image_height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Nothing to render")]
    NothingToRender,
}

impl MediaError {
    fn image(path: &Path, source: image::ImageError) -> Self {
        Self::Image {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Read the pixel size of an image from its header.
pub fn image_size(path: &Path) -> Result<ImageSize, MediaError> {
    let (width, height) = image::image_dimensions(path).map_err(|e| MediaError::image(path, e))?;
    Ok(ImageSize { width, height })
}

/// Cuts one rectangle out of the source image.
pub trait RegionCropper: Send + Sync {
    /// Write the region to `out_path`. An empty rectangle copies the whole image.
    fn crop(&self, source: &Path, region: &Coordinates, out_path: &Path) -> Result<(), MediaError>;
}

/// Cropper backed by the `image` crate. The output format follows the
/// extension of `out_path`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCropper;

impl ImageCropper {
    pub fn new() -> Self {
        Self
    }
}

impl RegionCropper for ImageCropper {
    fn crop(&self, source: &Path, region: &Coordinates, out_path: &Path) -> Result<(), MediaError> {
        let img = image::open(source).map_err(|e| MediaError::image(source, e))?;

        let cut = if region.is_empty() {
            img
        } else {
            let size = ImageSize {
                width: img.width(),
                height: img.height(),
            };
            if !region.fits_within(size) {
                return Err(MediaError::OutOfBounds {
                    x: region.x,
                    y: region.y,
                    width: region.width,
                    height: region.height,
                    image_width: size.width,
                    image_height: size.height,
                });
            }
            img.crop_imm(region.x, region.y, region.width, region.height)
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|source| MediaError::Io {
                operation: "creating cuts directory".to_string(),
                source,
            })?;
        }
        cut.save(out_path).map_err(|e| MediaError::image(out_path, e))?;
        Ok(())
    }
}
