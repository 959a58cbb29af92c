// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image XObject decoding to RGBA bitmaps.

use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{Object, Stream};
use seitenwerk_core::Color;
use tracing::warn;

use crate::model::{ResourceId, ResourcePool};
use crate::pdf::objects;

#[derive(Debug, Clone)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorSpace>, palette: Vec<u8> },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn resolve(pool: &ResourcePool, obj: &Object) -> Option<Self> {
        match pool.resolve(obj) {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => {
                let family = items.first().map(|f| pool.resolve(f)).and_then(objects::name)?;
                match family {
                    b"ICCBased" => {
                        let n = items
                            .get(1)
                            .and_then(|s| pool.dict(s))
                            .and_then(|d| pool.lookup(d, b"N"))
                            .and_then(objects::integer)
                            .unwrap_or(3);
                        Some(match n {
                            1 => Self::Gray,
                            4 => Self::Cmyk,
                            _ => Self::Rgb,
                        })
                    }
                    b"CalRGB" | b"Lab" => Some(Self::Rgb),
                    b"CalGray" => Some(Self::Gray),
                    b"Indexed" | b"I" => {
                        let base = Self::resolve(pool, items.get(1)?)?;
                        let palette = match items.get(3).map(|p| (p, pool.resolve(p))) {
                            Some((_, Object::String(bytes, _))) => bytes.clone(),
                            Some((raw, Object::Stream(_))) => ResourceId::from_reference(raw)
                                .and_then(|id| pool.stream_data(id))
                                .unwrap_or_default(),
                            _ => Vec::new(),
                        };
                        Some(Self::Indexed {
                            base: Box::new(base),
                            palette,
                        })
                    }
                    other => Self::from_name(other),
                }
            }
            _ => None,
        }
    }

    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Some(Self::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(Self::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(Self::Cmyk),
            _ => None,
        }
    }

    /// Colour of one pixel from its 8-bit component samples.
    fn to_rgb(&self, samples: &[u8]) -> [u8; 3] {
        match self {
            Self::Gray => [samples[0]; 3],
            Self::Rgb => [samples[0], samples[1], samples[2]],
            Self::Cmyk => cmyk_to_rgb8(samples[0], samples[1], samples[2], samples[3]),
            Self::Indexed { base, palette } => {
                let n = base.components();
                let start = samples[0] as usize * n;
                match palette.get(start..start + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

pub(crate) fn cmyk_to_rgb8(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u16::from(k);
    let ch = |v: u8| ((255 - u16::from(v)) * k / 255) as u8;
    [ch(c), ch(m), ch(y)]
}

/// Unpack `bpc`-bit samples of one row to 8-bit values.
fn unpack_row(row: &[u8], count: usize, bpc: u8) -> Vec<u8> {
    match bpc {
        8 => row.iter().take(count).copied().collect(),
        16 => row.chunks(2).take(count).map(|pair| pair[0]).collect(),
        1 | 2 | 4 => {
            let per_byte = 8 / bpc as usize;
            let mask = (1u16 << bpc) - 1;
            let max = mask as u32;
            (0..count)
                .map(|i| {
                    let byte = row.get(i / per_byte).copied().unwrap_or(0);
                    let shift = 8 - bpc as usize * (i % per_byte + 1);
                    let v = (u16::from(byte) >> shift) & mask;
                    (u32::from(v) * 255 / max) as u8
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Raw (unscaled) index values for indexed images with bpc < 8.
fn unpack_indices(row: &[u8], count: usize, bpc: u8) -> Vec<u8> {
    match bpc {
        8 => row.iter().take(count).copied().collect(),
        1 | 2 | 4 => {
            let per_byte = 8 / bpc as usize;
            let mask = (1u8 << bpc) - 1;
            (0..count)
                .map(|i| {
                    let byte = row.get(i / per_byte).copied().unwrap_or(0);
                    let shift = 8 - bpc as usize * (i % per_byte + 1);
                    (byte >> shift) & mask
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Positive dimensions that fit `u32` and multiply to at most `max_pixels`.
fn bounded_dimensions(width: i64, height: i64, max_pixels: u64) -> Option<(u32, u32)> {
    let width = u32::try_from(width).ok().filter(|&w| w > 0)?;
    let height = u32::try_from(height).ok().filter(|&h| h > 0)?;
    let pixels = u64::from(width).checked_mul(u64::from(height))?;
    (pixels <= max_pixels).then_some((width, height))
}

/// Decode an image XObject. Returns `None` (with a warning) for anything
/// unsupported or larger than `max_pixels`; the caller skips the image.
pub(crate) fn decode_image(
    pool: &ResourcePool,
    stream: &Stream,
    fill: Color,
    max_pixels: u64,
) -> Option<RgbaImage> {
    let dict = &stream.dict;
    let width = pool.lookup(dict, b"Width").and_then(objects::integer)?;
    let height = pool.lookup(dict, b"Height").and_then(objects::integer)?;
    let Some((width, height)) = bounded_dimensions(width, height, max_pixels) else {
        warn!(width, height, "Image dimensions out of bounds, skipping");
        return None;
    };

    let filters = objects::filters(stream);
    let mut bitmap = match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") | Some(b"DCT") => {
            if filters.len() > 1 {
                warn!("Chained filters before DCTDecode are not supported");
                return None;
            }
            decode_jpeg(&stream.content, width, height)?
        }
        Some(other @ (b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode")) => {
            warn!(filter = %String::from_utf8_lossy(other), "Unsupported image filter");
            return None;
        }
        _ => decode_raw(pool, stream, width, height, fill)?,
    };

    if let Some(mask) = dict
        .get(b"SMask")
        .ok()
        .and_then(ResourceId::from_reference)
        .and_then(|id| pool.stream(id))
        .and_then(|s| decode_raw(pool, s, width, height, Color::BLACK))
    {
        let (w, h) = bitmap.dimensions();
        let mask = if mask.dimensions() == (w, h) {
            mask
        } else {
            image::imageops::resize(&mask, w, h, image::imageops::FilterType::Triangle)
        };
        for (pixel, alpha) in bitmap.pixels_mut().zip(mask.pixels()) {
            pixel[3] = ((u16::from(pixel[3]) * u16::from(alpha[0])) / 255) as u8;
        }
    }
    Some(bitmap)
}

fn decode_jpeg(data: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    match image::load_from_memory_with_format(data, ImageFormat::Jpeg) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            if rgba.dimensions() != (width, height) {
                warn!(
                    declared = ?(width, height),
                    actual = ?rgba.dimensions(),
                    "JPEG size differs from image dictionary"
                );
            }
            Some(rgba)
        }
        Err(err) => {
            warn!(%err, "Cannot decode DCT image");
            None
        }
    }
}

fn decode_raw(
    pool: &ResourcePool,
    stream: &Stream,
    width: u32,
    height: u32,
    fill: Color,
) -> Option<RgbaImage> {
    let dict = &stream.dict;
    let data = objects::decode_stream(stream);
    let is_mask = matches!(pool.lookup(dict, b"ImageMask"), Some(Object::Boolean(true)));
    let bpc = if is_mask {
        1
    } else {
        let declared = pool
            .lookup(dict, b"BitsPerComponent")
            .and_then(objects::integer)
            .unwrap_or(8);
        match u8::try_from(declared) {
            Ok(bpc) => bpc,
            Err(_) => {
                warn!(bpc = declared, "Unsupported bits per component");
                return None;
            }
        }
    };
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        warn!(bpc, "Unsupported bits per component");
        return None;
    }
    let space = if is_mask {
        ColorSpace::Gray
    } else {
        match pool.lookup(dict, b"ColorSpace") {
            Some(obj) => ColorSpace::resolve(pool, obj)?,
            None => ColorSpace::Gray,
        }
    };
    let decode_inverted = matches!(
        pool.lookup(dict, b"Decode"),
        Some(Object::Array(d)) if d.first().and_then(objects::number) == Some(1.0)
    );

    let n = space.components();
    let samples_per_row = width as usize * n;
    let row_bytes = (samples_per_row * bpc as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        warn!(
            expected = row_bytes * height as usize,
            actual = data.len(),
            "Image data truncated"
        );
    }

    let paint = fill.to_rgb8();
    let mut bitmap = RgbaImage::new(width, height);
    for y in 0..height {
        let start = y as usize * row_bytes;
        let row = data.get(start..(start + row_bytes).min(data.len())).unwrap_or_default();
        let samples = match space {
            ColorSpace::Indexed { .. } => unpack_indices(row, samples_per_row, bpc),
            _ => unpack_row(row, samples_per_row, bpc),
        };
        for x in 0..width {
            let at = x as usize * n;
            let Some(px) = samples.get(at..at + n) else {
                break;
            };
            let pixel = if is_mask {
                // Sample 0 paints unless /Decode is [1 0].
                let paints = (px[0] == 0) != decode_inverted;
                if paints {
                    Rgba([paint[0], paint[1], paint[2], 255])
                } else {
                    Rgba([0, 0, 0, 0])
                }
            } else {
                let mut rgb = space.to_rgb(px);
                if decode_inverted && !matches!(space, ColorSpace::Indexed { .. }) {
                    rgb = rgb.map(|v| 255 - v);
                }
                Rgba([rgb[0], rgb[1], rgb[2], 255])
            };
            bitmap.put_pixel(x, y, pixel);
        }
    }
    Some(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, dictionary};

    fn raw_image(dict: Dictionary, data: Vec<u8>) -> (ResourcePool, Stream) {
        (ResourcePool::new(), Stream::new(dict, data))
    }

    #[test]
    fn decodes_rgb_samples() {
        let (pool, stream) = raw_image(
            dictionary! {
                "Subtype" => "Image", "Width" => 2, "Height" => 1,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        );
        let img = decode_image(&pool, &stream, Color::BLACK, 1_000).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn decodes_one_bit_gray() {
        let (pool, stream) = raw_image(
            dictionary! {
                "Width" => 3, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 1,
            },
            vec![0b1010_0000],
        );
        let img = decode_image(&pool, &stream, Color::BLACK, 1_000).unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
        assert_eq!(img.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn decodes_indexed_palette() {
        let (pool, stream) = raw_image(
            dictionary! {
                "Width" => 2, "Height" => 1, "BitsPerComponent" => 8,
                "ColorSpace" => vec![
                    Object::Name(b"Indexed".to_vec()),
                    Object::Name(b"DeviceRGB".to_vec()),
                    Object::Integer(1),
                    Object::string_literal(vec![0u8, 255, 0, 10, 20, 30]),
                ],
            },
            vec![1, 0],
        );
        let img = decode_image(&pool, &stream, Color::BLACK, 1_000).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn stencil_mask_uses_fill_colour() {
        let (pool, stream) = raw_image(
            dictionary! { "Width" => 2, "Height" => 1, "ImageMask" => true },
            vec![0b0100_0000],
        );
        let img = decode_image(&pool, &stream, Color::rgb(1.0, 0.0, 0.0), 1_000).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn cmyk_conversion() {
        assert_eq!(cmyk_to_rgb8(0, 0, 0, 0), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb8(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb8(255, 0, 0, 0), [0, 255, 255]);
    }

    #[test]
    fn oversized_images_are_skipped() {
        let (pool, stream) = raw_image(
            dictionary! { "Width" => 100, "Height" => 100, "ColorSpace" => "DeviceGray" },
            vec![0; 10_000],
        );
        assert!(decode_image(&pool, &stream, Color::BLACK, 9_999).is_none());
    }

    #[test]
    fn dimensions_beyond_u32_are_skipped() {
        let (pool, stream) = raw_image(
            dictionary! {
                "Width" => 4_294_967_296i64, "Height" => 4_294_967_296i64,
                "ColorSpace" => "DeviceGray",
            },
            vec![0; 16],
        );
        assert!(decode_image(&pool, &stream, Color::BLACK, u64::MAX).is_none());
        let max = i64::from(u32::MAX);
        assert_eq!(bounded_dimensions(max, max, u64::MAX), Some((u32::MAX, u32::MAX)));
        assert_eq!(bounded_dimensions(0, 10, 1_000), None);
        assert_eq!(bounded_dimensions(-1, 10, 1_000), None);
    }

    #[test]
    fn wide_bits_per_component_is_not_truncated() {
        let (pool, stream) = raw_image(
            dictionary! {
                "Width" => 1, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 264,
            },
            vec![0; 4],
        );
        assert!(decode_image(&pool, &stream, Color::BLACK, 1_000).is_none());
    }
}
