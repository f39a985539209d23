//! Source raster loading and foreground keying.

use std::path::Path;

use image::{GrayImage, ImageFormat, RgbaImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::config::{KeyingMethod, ThresholdMethod};
use crate::error::EscherError;

/// Decode an uploaded image, accepting only PNG and JPEG.
///
/// The format is sniffed from the bytes, not the file name.
pub fn decode_upload(bytes: &[u8]) -> Result<RgbaImage, EscherError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) | Ok(ImageFormat::Jpeg) => {}
        _ => {
            return Err(EscherError::InputRejected(
                "Please upload a PNG or JPG image.".into(),
            ))
        }
    }
    Ok(image::load_from_memory(bytes)?.into_rgba8())
}

/// Read and decode an upload from disk.
pub fn load_upload(path: &Path) -> Result<RgbaImage, EscherError> {
    let bytes = std::fs::read(path)?;
    decode_upload(&bytes)
}

/// Isolates the subject of a raster into its alpha channel.
///
/// Real background removal is a heavyweight model that lives outside this
/// crate; implementations wrap it behind this trait.
pub trait BackgroundRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, EscherError>;
}

/// Pass-through for rasters that are already alpha-keyed (drawings,
/// pre-cut PNGs).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaKey;

impl BackgroundRemover for AlphaKey {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, EscherError> {
        Ok(image.clone())
    }
}

/// Keys the foreground by luminance: pixels darker than the threshold
/// become opaque, the rest transparent.
#[derive(Debug, Clone, Copy)]
pub struct LumaKey {
    pub threshold: ThresholdMethod,
    /// Treat light pixels as foreground instead.
    pub invert: bool,
}

impl BackgroundRemover for LumaKey {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, EscherError> {
        let gray = flatten_to_luma(image);
        let level = match self.threshold {
            ThresholdMethod::Fixed(t) => t,
            ThresholdMethod::Otsu => {
                let t = otsu_level(&gray);
                log::debug!("Otsu threshold = {}", t);
                t
            }
        };
        let kind = if self.invert {
            ThresholdType::Binary
        } else {
            ThresholdType::BinaryInverted
        };
        let mask = threshold(&gray, level, kind);

        let mut keyed = image.clone();
        for (pixel, m) in keyed.pixels_mut().zip(mask.pixels()) {
            pixel.0[3] = m.0[0];
        }
        Ok(keyed)
    }
}

/// Build the keyer selected by `method`.
pub fn remover_for(method: KeyingMethod) -> Box<dyn BackgroundRemover> {
    match method {
        KeyingMethod::Alpha => Box::new(AlphaKey),
        KeyingMethod::Luma { threshold, invert } => Box::new(LumaKey { threshold, invert }),
    }
}

/// Luminance with transparent pixels composited over white.
fn flatten_to_luma(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as f64 / 255.0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        let over_white = luma * a + 255.0 * (1.0 - a);
        image::Luma([over_white.round().clamp(0.0, 255.0) as u8])
    })
}

/// Extract the alpha channel as a grayscale image.
pub fn alpha_channel(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([image.get_pixel(x, y).0[3]])
    })
}
