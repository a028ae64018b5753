//! Letterbox preprocessing for square-input detectors.
//!
//! The oriented image is anchored at the top-left of a black square canvas
//! and scaled to `S x S`. Padding only ever lands on the right and bottom,
//! so a box in model space maps back to the original image with a single
//! multiplicative factor and no translation:
//!
//! `x_orig = x_model * max(W, H) / S`
//!
//! # Usage
//! ```rust,ignore
//! use vscan_media::preprocess::{letterbox, ImageSource};
//!
//! let image = ImageSource::from_path("photo.jpg").load()?;
//! let letterboxed = letterbox(&image, 320)?;
//! let chw = letterboxed.to_chw();
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Images with either dimension above this are rejected.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Where a detect-image request gets its pixels from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes (JPEG, PNG, ...)
    Bytes(Vec<u8>),
    /// Path on the local filesystem
    Path(PathBuf),
    /// `file://` URI or bare path string
    Uri(String),
    /// Already-decoded, already-oriented RGB pixels
    Pixels(RgbImage),
}

impl ImageSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    /// Resolve and decode into oriented RGB pixels.
    pub fn load(self) -> MediaResult<RgbImage> {
        match self {
            ImageSource::Bytes(bytes) => decode_image(&bytes),
            ImageSource::Path(path) => load_path(&path),
            ImageSource::Uri(uri) => load_path(&uri_to_path(&uri)?),
            ImageSource::Pixels(pixels) => {
                check_dimensions(pixels.width(), pixels.height())?;
                Ok(pixels)
            }
        }
    }
}

fn load_path(path: &Path) -> MediaResult<RgbImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Map a `file://` URI (or plain path string) to a filesystem path.
fn uri_to_path(uri: &str) -> MediaResult<PathBuf> {
    match url::Url::parse(uri) {
        Ok(parsed) if parsed.scheme() == "file" => parsed
            .to_file_path()
            .map_err(|_| MediaError::decode_failure(format!("invalid file URI: {}", uri))),
        Ok(parsed) if parsed.scheme().len() > 1 => Err(MediaError::decode_failure(format!(
            "unsupported URI scheme: {}",
            parsed.scheme()
        ))),
        // Bare paths, including Windows drive letters parsed as one-letter schemes
        _ => Ok(PathBuf::from(uri)),
    }
}

fn check_dimensions(width: u32, height: u32) -> MediaResult<()> {
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(MediaError::decode_failure(format!(
            "image {}x{} exceeds the {}px limit",
            width, height, MAX_IMAGE_DIMENSION
        )));
    }
    Ok(())
}

/// Decode encoded bytes to RGB with EXIF orientation applied.
///
/// Dimensions are checked from the header before pixel data is decoded.
pub fn decode_image(bytes: &[u8]) -> MediaResult<RgbImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| MediaError::decode_failure(e.to_string()))?;

    let mut decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();
    check_dimensions(width, height)?;

    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    Ok(image.into_rgb8())
}

/// Output of the letterbox step.
#[derive(Debug, Clone)]
pub struct Letterboxed {
    /// `S x S x 3` HWC tensor with values in [0, 1]
    pub tensor: Vec<f32>,
    pub input_size: u32,
    /// Original width after orientation, before any transform
    pub orig_width: u32,
    /// Original height after orientation, before any transform
    pub orig_height: u32,
}

impl Letterboxed {
    /// Factor mapping model-space coordinates back to original pixels.
    pub fn scale(&self) -> f32 {
        letterbox_scale(self.orig_width, self.orig_height, self.input_size)
    }

    /// Channel-planar copy of the tensor for the model runtime.
    pub fn to_chw(&self) -> Vec<f32> {
        hwc_to_chw(&self.tensor, self.input_size as usize)
    }
}

/// `max(W, H) / S`.
pub fn letterbox_scale(orig_width: u32, orig_height: u32, input_size: u32) -> f32 {
    orig_width.max(orig_height) as f32 / input_size as f32
}

/// Letterbox an oriented RGB image into a normalized `S x S` tensor.
///
/// Scaling the image by `S / maxDim` and pasting it at (0, 0) on a black
/// `S x S` canvas is the same geometry as padding to `maxDim x maxDim`
/// first, without allocating the padded square.
pub fn letterbox(image: &RgbImage, input_size: u32) -> MediaResult<Letterboxed> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 || input_size == 0 {
        return Err(MediaError::resize_failure(format!(
            "cannot letterbox {}x{} into {}x{}",
            orig_width, orig_height, input_size, input_size
        )));
    }

    let max_dim = orig_width.max(orig_height) as f64;
    let factor = input_size as f64 / max_dim;
    let scaled_width = ((orig_width as f64 * factor).round() as u32).clamp(1, input_size);
    let scaled_height = ((orig_height as f64 * factor).round() as u32).clamp(1, input_size);

    let mut canvas = RgbImage::new(input_size, input_size);
    if scaled_width == orig_width && scaled_height == orig_height {
        imageops::replace(&mut canvas, image, 0, 0);
    } else {
        let resized = imageops::resize(image, scaled_width, scaled_height, FilterType::CatmullRom);
        imageops::replace(&mut canvas, &resized, 0, 0);
    }

    let tensor: Vec<f32> = canvas.as_raw().iter().map(|&v| v as f32 / 255.0).collect();

    debug!(
        orig = format!("{}x{}", orig_width, orig_height),
        scaled = format!("{}x{}", scaled_width, scaled_height),
        input_size,
        "Letterbox complete"
    );

    Ok(Letterboxed {
        tensor,
        input_size,
        orig_width,
        orig_height,
    })
}

/// Reshape an `S x S x 3` HWC tensor into `3 x S x S` CHW.
pub fn hwc_to_chw(hwc: &[f32], size: usize) -> Vec<f32> {
    let plane = size * size;
    let mut chw = vec![0.0f32; 3 * plane];
    for (i, px) in hwc.chunks_exact(3).take(plane).enumerate() {
        chw[i] = px[0];
        chw[plane + i] = px[1];
        chw[2 * plane + i] = px[2];
    }
    chw
}
