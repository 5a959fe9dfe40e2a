use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageResult};

use super::detector::Detection;

pub fn decode(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Shrinks so that the longer edge is at most `max_edge`. Never upscales.
pub fn downscale(img: DynamicImage, max_edge: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if max_edge == 0 || longest <= max_edge {
        return img;
    }
    let scale = max_edge as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_edge);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_edge);
    img.resize_exact(nw, nh, FilterType::Triangle)
}

/// Crops to the detection box clamped to the image. `None` when nothing of the
/// box lies inside the image.
pub fn crop(img: &DynamicImage, region: &Detection) -> Option<DynamicImage> {
    let (w, h) = img.dimensions();
    let x0 = region.x.max(0.0).floor().min(w as f32) as u32;
    let y0 = region.y.max(0.0).floor().min(h as f32) as u32;
    let x1 = (region.x + region.width).ceil().clamp(0.0, w as f32) as u32;
    let y1 = (region.y + region.height).ceil().clamp(0.0, h as f32) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(img.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

pub fn encode_png(img: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

pub fn to_base64_png(img: &DynamicImage) -> ImageResult<String> {
    Ok(BASE64.encode(encode_png(img)?))
}

#[cfg(test)]
pub(crate) fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 120, 40]),
    ));
    encode_png(&img).expect("encode test image")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, width: f32, height: f32) -> Detection {
        Detection {
            label: "plate".into(),
            confidence: 0.9,
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn downscale_keeps_aspect_ratio() {
        let img = decode(&blank_png(1024, 512)).unwrap();
        let small = downscale(img, 512);
        assert_eq!(small.dimensions(), (512, 256));

        let tall = downscale(decode(&blank_png(300, 900)).unwrap(), 512);
        assert_eq!(tall.dimensions(), (171, 512));
    }

    #[test]
    fn downscale_never_upscales() {
        let img = decode(&blank_png(200, 100)).unwrap();
        assert_eq!(downscale(img, 512).dimensions(), (200, 100));
    }

    #[test]
    fn crop_is_clamped_to_bounds() {
        let img = decode(&blank_png(100, 80)).unwrap();
        let inside = crop(&img, &region(10.0, 20.0, 30.0, 40.0)).unwrap();
        assert_eq!(inside.dimensions(), (30, 40));

        let overflowing = crop(&img, &region(-10.0, 60.0, 50.0, 100.0)).unwrap();
        assert_eq!(overflowing.dimensions(), (40, 20));

        assert!(crop(&img, &region(150.0, 10.0, 20.0, 20.0)).is_none());
    }

    #[test]
    fn base64_png_decodes_back() {
        let img = decode(&blank_png(16, 8)).unwrap();
        let b64 = to_base64_png(&img).unwrap();
        let bytes = BASE64.decode(b64).unwrap();
        assert_eq!(decode(&bytes).unwrap().dimensions(), (16, 8));
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(decode(b"definitely not a png").is_err());
    }
}
