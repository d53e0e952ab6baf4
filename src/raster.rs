//! Page rasters and the preprocessing we apply before OCR.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage, imageops::FilterType};

use crate::prelude::*;

/// Midpoint of the contrast stretch.
const CONTRAST_MIDPOINT: f32 = 128.0;

/// Gain of the contrast stretch.
const CONTRAST_GAIN: f32 = 1.5;

/// Enhanced values above this become white.
const WHITE_THRESHOLD: f32 = 140.0;

/// Enhanced values below this become black.
const BLACK_THRESHOLD: f32 = 100.0;

/// A single page (or input image) as an RGBA raster.
///
/// These are short-lived: one is created per page, enhanced, handed to the
/// OCR engine and dropped before the next page is rendered.
#[derive(Clone, Debug)]
pub struct PageImage {
    image: RgbaImage,
}

impl PageImage {
    /// Wrap an existing RGBA image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn decode(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data).context("failed to decode image")?;
        Ok(Self {
            image: image.to_rgba8(),
        })
    }

    /// Decode an encoded image and scale it to fit inside `max_width` by
    /// `max_height`, preserving its aspect ratio.
    ///
    /// Small images are scaled up, but never by more than `max_upscale`.
    pub fn decode_to_fit(
        data: &[u8],
        max_width: u32,
        max_height: u32,
        max_upscale: f32,
    ) -> Result<Self> {
        let image = image::load_from_memory(data).context("failed to decode image")?;
        let (width, height) = fit_within(
            image.width(),
            image.height(),
            max_width,
            max_height,
            max_upscale,
        )?;
        trace!(
            from_width = image.width(),
            from_height = image.height(),
            width,
            height,
            "Resizing image for OCR"
        );
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);
        Ok(Self {
            image: resized.to_rgba8(),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The underlying image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode as PNG, for handing to external tools.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("failed to encode page as PNG")?;
        Ok(png)
    }

    /// Enhance this image for OCR, keeping the original if that fails.
    pub fn enhance_for_ocr(&mut self) {
        let (width, height) = self.image.dimensions();
        if let Err(err) = enhance_pixels(&mut self.image, width, height) {
            warn!("Image enhancement failed, using original image: {:?}", err);
        }
    }
}

/// Compute the size of an image scaled to fit within a bounding box.
///
/// The scale factor is the smaller of the two axis ratios, capped at
/// `max_upscale`. Dimensions are rounded down, but never to zero.
pub fn fit_within(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
    max_upscale: f32,
) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(anyhow!("image has no pixels ({}x{})", width, height));
    }
    let scale_x = max_width as f32 / width as f32;
    let scale_y = max_height as f32 / height as f32;
    let scale = scale_x.min(scale_y).min(max_upscale);
    let new_width = ((width as f32 * scale).floor() as u32).max(1);
    let new_height = ((height as f32 * scale).floor() as u32).max(1);
    Ok((new_width, new_height))
}

/// Turn an RGBA buffer into high-contrast grayscale, in place.
///
/// Each pixel is converted to luminance, stretched around mid-gray, and then
/// thresholded: light values become white, dark values become black, and
/// values in between are kept so anti-aliased stroke edges survive. Alpha is
/// never touched.
///
/// If `pixels` doesn't hold exactly `width * height` RGBA pixels, nothing is
/// modified and an error is returned.
pub fn enhance_pixels(pixels: &mut [u8], width: u32, height: u32) -> Result<()> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| anyhow!("image dimensions {}x{} overflow", width, height))?;
    if pixels.len() != expected_len {
        return Err(anyhow!(
            "pixel buffer holds {} bytes, but a {}x{} RGBA image needs {}",
            pixels.len(),
            width,
            height,
            expected_len
        ));
    }

    for pixel in pixels.chunks_exact_mut(4) {
        let value = enhance_value(pixel[0], pixel[1], pixel[2]);
        pixel[0] = value;
        pixel[1] = value;
        pixel[2] = value;
    }
    Ok(())
}

/// Map one RGB pixel to its enhanced gray value.
fn enhance_value(r: u8, g: u8, b: u8) -> u8 {
    let gray = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    let enhanced =
        ((gray - CONTRAST_MIDPOINT) * CONTRAST_GAIN + CONTRAST_MIDPOINT).clamp(0.0, 255.0);
    if enhanced > WHITE_THRESHOLD {
        255
    } else if enhanced < BLACK_THRESHOLD {
        0
    } else {
        enhanced.round() as u8
    }
}
