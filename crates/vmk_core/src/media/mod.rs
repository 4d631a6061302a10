//! Image and video operations: cutting regions out of the source picture
//! and rendering the final video.

mod compositor;
mod cropper;

pub use compositor::{ClipEntry, CompositionManifest, Compositor, FfmpegCompositor};
pub use cropper::{image_size, ImageCropper, MediaError, RegionCropper};
