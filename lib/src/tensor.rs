//! Conversion of images into `channels x height x width` tensors.

use image::{ImageBuffer, Pixel};
use ndarray::Array3;

/// A `channels x height x width` tensor
pub type Tensor = Array3<f32>;

fn pack<P, F>(img: &ImageBuffer<P, Vec<P::Subpixel>>, convert: F) -> Tensor
where
    P: Pixel + 'static,
    F: Fn(P::Subpixel) -> f32,
{
    let (width, height) = img.dimensions();
    let channels = usize::from(P::CHANNEL_COUNT);

    Array3::from_shape_fn((channels, height as usize, width as usize), |(c, y, x)| {
        convert(img.get_pixel(x as u32, y as u32).channels()[c])
    })
}

/// Packs 8-bit values, scaling them to `[0, 1]`
pub fn from_bytes<P>(img: &ImageBuffer<P, Vec<u8>>) -> Tensor
where
    P: Pixel<Subpixel = u8> + 'static,
{
    pack(img, |v| f32::from(v) / 255.0)
}

/// Packs floating point values as they are
pub fn from_floats<P>(img: &ImageBuffer<P, Vec<f32>>) -> Tensor
where
    P: Pixel<Subpixel = f32> + 'static,
{
    pack(img, |v| v)
}

/// Treats the values as being in `[0, 1]`, stretches them to 8 bits and
/// truncates, before scaling them back to `[0, 1]`
pub fn from_unit_quantized<P>(img: &ImageBuffer<P, Vec<f32>>) -> Tensor
where
    P: Pixel<Subpixel = f32> + 'static,
{
    pack(img, |v| f32::from((v * 255.0) as u8) / 255.0)
}

/// Same as `from_unit_quantized`, for images that are still 8-bit. Any
/// nonzero value saturates.
pub fn from_bytes_quantized<P>(img: &ImageBuffer<P, Vec<u8>>) -> Tensor
where
    P: Pixel<Subpixel = u8> + 'static,
{
    pack(img, |v| f32::from(v.saturating_mul(255)) / 255.0)
}

/// Converts a 1 or 3 channel tensor with values in `[0, 1]` back into an
/// 8-bit image, any other channel count yields `None`
pub fn to_image(tensor: &Tensor) -> Option<image::DynamicImage> {
    let (channels, height, width) = tensor.dim();
    let byte = |c: usize, x: u32, y: u32| {
        (tensor[[c, y as usize, x as usize]].max(0.0).min(1.0) * 255.0).round() as u8
    };

    match channels {
        1 => Some(image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(
            width as u32,
            height as u32,
            |x, y| image::Luma([byte(0, x, y)]),
        ))),
        3 => Some(image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(
            width as u32,
            height as u32,
            |x, y| image::Rgb([byte(0, x, y), byte(1, x, y), byte(2, x, y)]),
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout_is_channels_first() {
        let img = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8, y as u8, 255]));
        let t = from_bytes(&img);

        assert_eq!(t.dim(), (3, 2, 3));
        assert_eq!(t[[0, 1, 2]], 2.0 / 255.0);
        assert_eq!(t[[1, 1, 2]], 1.0 / 255.0);
        assert_eq!(t[[2, 0, 0]], 1.0);
    }

    #[test]
    fn floats_are_untouched() {
        let img = crate::utils::GrayF32Image::from_fn(2, 2, |x, _| image::Luma([x as f32 * 0.3]));
        let t = from_floats(&img);
        assert_eq!(t.dim(), (1, 2, 2));
        assert_eq!(t[[0, 0, 1]], 0.3);
    }

    #[test]
    fn quantization_truncates() {
        let img = crate::utils::GrayF32Image::from_fn(3, 1, |x, _| {
            image::Luma([[0.0, 0.5, 1.0][x as usize]])
        });
        let t = from_unit_quantized(&img);
        assert_eq!(t[[0, 0, 0]], 0.0);
        assert_eq!(t[[0, 0, 1]], 127.0 / 255.0);
        assert_eq!(t[[0, 0, 2]], 1.0);

        let img = image::GrayImage::from_fn(2, 1, |x, _| image::Luma([x as u8]));
        let t = from_bytes_quantized(&img);
        assert_eq!(t[[0, 0, 0]], 0.0);
        assert_eq!(t[[0, 0, 1]], 1.0);
    }

    #[test]
    fn back_to_image() {
        let img = image::RgbImage::from_fn(4, 3, |x, y| {
            image::Rgb([x as u8 * 60, y as u8 * 100, 7])
        });
        let round = to_image(&from_bytes(&img)).unwrap().to_rgb8();
        assert_eq!(round, img);

        let mask = image::GrayImage::from_fn(4, 3, |x, _| {
            image::Luma([if x > 1 { 255 } else { 0 }])
        });
        let round = to_image(&from_bytes(&mask)).unwrap().to_luma8();
        assert_eq!(round, mask);

        assert!(to_image(&Tensor::zeros((2, 4, 4))).is_none());
    }
}
