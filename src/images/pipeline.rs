//! Image derivative pipeline: decode, upright, downscale, re-encode.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// Compress an uploaded image into a variant capped at `max_width`.
///
/// Availability beats optimality: any decode or encode failure falls back to
/// the unmodified upload bytes.
pub fn compress(data: &[u8], max_width: u32, quality: u8) -> Vec<u8> {
    match try_compress(data, max_width, quality) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("Image compression failed, storing original bytes: {}", e);
            data.to_vec()
        }
    }
}

fn try_compress(data: &[u8], max_width: u32, quality: u8) -> image::ImageResult<Vec<u8>> {
    let format = image::guess_format(data)?;

    // GIFs pass through untouched: re-encoding would drop animation frames.
    if format == ImageFormat::Gif {
        return Ok(data.to_vec());
    }

    let mut decoder = ImageReader::with_format(Cursor::new(data), format).into_decoder()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    // Bake any EXIF rotation into the pixel buffer so the stored variant is
    // upright and the width check sees post-rotation dimensions.
    img.apply_orientation(orientation);

    // Proportional downscale only; never upscale.
    if img.width() > max_width {
        let scaled_height =
            ((img.height() as u64 * max_width as u64) / img.width() as u64).max(1) as u32;
        img = img.resize(max_width, scaled_height, FilterType::Lanczos3);
    }

    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                PngFilterType::Adaptive,
            ))?;
        }
        ImageFormat::WebP => {
            img.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
        }
        // JPEG, and the lossy fallback for anything not handled above.
        _ => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
        }
    }
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 80, 40]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, 90))
            .unwrap();
        out.into_inner()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([0, 200, 0]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Fast,
            PngFilterType::NoFilter,
        ))
        .unwrap();
        out.into_inner()
    }

    fn decoded_dimensions(data: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(data).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_wide_jpeg_downscaled_proportionally() {
        let original = jpeg_bytes(3000, 4000);
        let thumb = compress(&original, 800, 80);
        let (w, h) = decoded_dimensions(&thumb);
        assert!(w <= 800);
        // 3:4 aspect ratio preserved.
        assert!((h as f64 / w as f64 - 4.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_original_variant_capped_at_larger_threshold() {
        let original = jpeg_bytes(3000, 4000);
        let variant = compress(&original, 1920, 100);
        let (w, _) = decoded_dimensions(&variant);
        assert!(w <= 1920);
        assert!(w > 800);
    }

    #[test]
    fn test_small_image_never_upscaled() {
        let original = jpeg_bytes(400, 300);
        let out = compress(&original, 800, 80);
        assert_eq!(decoded_dimensions(&out), (400, 300));
    }

    #[test]
    fn test_png_stays_png() {
        let original = png_bytes(1200, 900);
        let out = compress(&original, 800, 80);
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        assert_eq!(decoded_dimensions(&out).0, 800);
    }

    #[test]
    fn test_gif_passes_through_unmodified() {
        let img = image::RgbaImage::from_pixel(1200, 900, image::Rgba([1, 2, 3, 255]));
        let mut out = Cursor::new(Vec::new());
        {
            let mut encoder = image::codecs::gif::GifEncoder::new(&mut out);
            encoder
                .encode_frame(image::Frame::new(img))
                .unwrap();
        }
        let original = out.into_inner();
        let result = compress(&original, 800, 80);
        assert_eq!(result, original);
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_original() {
        let garbage = b"definitely not an image".to_vec();
        let out = compress(&garbage, 800, 80);
        assert_eq!(out, garbage);
    }
}
