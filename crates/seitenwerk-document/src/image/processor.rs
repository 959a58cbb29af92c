// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, quarter-turn rotation, background flattening and
// encoding to PNG/JPEG/WebP. Operates on in-memory images using the `image`
// crate.

use image::{DynamicImage, ImageFormat, RgbaImage};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Color, RasterFormat, Rotation};
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new processor, so calls
/// chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_rgba(bitmap)
///     .rotate(Rotation::Deg90)
///     .flatten(Color::WHITE)
///     .encode(RasterFormat::Jpeg, 85)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode encoded bytes (JPEG, PNG, GIF, WebP).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| SeitenwerkError::Image(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: DynamicImage::ImageRgba8(image),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    pub fn into_rgba8(self) -> RgbaImage {
        self.image.into_rgba8()
    }

    // -- Transformations ------------------------------------------------------

    /// Rotate clockwise by a quarter-turn multiple. Lossless.
    pub fn rotate(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::Deg0 => self.image,
            Rotation::Deg90 => self.image.rotate90(),
            Rotation::Deg180 => self.image.rotate180(),
            Rotation::Deg270 => self.image.rotate270(),
        };
        Self { image }
    }

    /// Composite onto an opaque `background`, dropping the alpha channel's
    /// effect.
    pub fn flatten(self, background: Color) -> Self {
        let mut rgba = self.image.into_rgba8();
        let [br, bg, bb] = background.to_rgb8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let alpha = u16::from(a);
            let mix = |fg: u8, back: u8| -> u8 {
                ((u16::from(fg) * alpha + u16::from(back) * (255 - alpha) + 127) / 255) as u8
            };
            pixel.0 = [mix(r, br), mix(g, bg), mix(b, bb), 255];
        }
        Self::from_rgba(rgba)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode in `format`. `quality` (1-100) applies to JPEG only; WebP is
    /// written lossless.
    pub fn encode(&self, format: RasterFormat, quality: u8) -> Result<Vec<u8>> {
        match format {
            RasterFormat::Png => self.to_png_bytes(),
            RasterFormat::Jpeg => self.to_jpeg_bytes(quality),
            RasterFormat::WebP => self.to_webp_bytes(),
        }
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| SeitenwerkError::Image(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }

    pub fn to_webp_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgba = self.image.to_rgba8();
        let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buffer);
        rgba.write_with_encoder(encoder)
            .map_err(|err| SeitenwerkError::Image(format!("WebP encoding failed: {err}")))?;
        Ok(buffer)
    }
}

fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| SeitenwerkError::Image(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let p = ImageProcessor::from_rgba(sample()).rotate(Rotation::Deg90);
        assert_eq!((p.width(), p.height()), (2, 4));
        let p = p.rotate(Rotation::Deg270);
        assert_eq!((p.width(), p.height()), (4, 2));
    }

    #[test]
    fn flatten_fills_transparency_with_background() {
        let flat = ImageProcessor::from_rgba(sample())
            .flatten(Color::WHITE)
            .into_rgba8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(flat.get_pixel(3, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn encodes_each_raster_format() {
        let p = ImageProcessor::from_rgba(sample());
        let png = p.encode(RasterFormat::Png, 90).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        let jpeg = p.encode(RasterFormat::Jpeg, 80).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
        let webp = p.encode(RasterFormat::WebP, 80).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn png_round_trip_keeps_alpha() {
        let png = ImageProcessor::from_rgba(sample()).to_png_bytes().unwrap();
        let back = ImageProcessor::from_bytes(&png).unwrap().into_rgba8();
        assert_eq!(back.get_pixel(3, 0).0[3], 0);
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = ImageProcessor::from_bytes(b"not an image").err().unwrap();
        assert!(matches!(err, SeitenwerkError::Image(_)));
    }
}
