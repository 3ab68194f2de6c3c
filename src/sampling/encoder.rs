use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 360;
pub const JPEG_QUALITY: u8 = 80;

/// Scales `image` to the fixed capture raster and encodes it as JPEG.
///
/// The aspect ratio is not preserved; the raster is always 640x360.
pub fn encode_frame(image: &DynamicImage) -> Result<Vec<u8>> {
    let raster = if image.width() == FRAME_WIDTH && image.height() == FRAME_HEIGHT {
        image.to_rgb8()
    } else {
        image
            .resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle)
            .to_rgb8()
    };

    let mut jpeg = Vec::with_capacity(64 * 1024);
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&raster)
        .context("jpeg encode failed")?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn output_is_jpeg_at_capture_raster() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1920, 1080, Rgba([40, 80, 120, 255])));
        let bytes = encode_frame(&source).unwrap();

        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (FRAME_WIDTH, FRAME_HEIGHT));
    }

    #[test]
    fn small_sources_are_scaled_up() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255])));
        let bytes = encode_frame(&source).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (FRAME_WIDTH, FRAME_HEIGHT));
    }
}
