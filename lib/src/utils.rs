use crate::{Dims, Error};
use image::{imageops, ImageBuffer, Luma, Pixel};
use std::path::Path;

/// Single channel image with floating point intensities
pub type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Luminance weights applied to linear RGB in [0, 1]
const LUMA_R: f32 = 0.2125;
const LUMA_G: f32 = 0.7154;
const LUMA_B: f32 = 0.0721;

/// A 3 channel image as it moves through the pipeline.
///
/// Decoded images keep their 8-bit intensities until they are resized, at
/// which point they are resampled into `[0, 1]` floating point values.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub enum ColorImage {
    /// Decoded 8-bit intensities, untouched by resizing
    Byte(image::RgbImage),
    /// Resampled intensities normalized to `[0, 1]`
    Unit(image::Rgb32FImage),
}

impl ColorImage {
    /// Broadcasts any decoded image, including single channel ones, to 3
    /// channels.
    pub fn from_dynamic(img: &image::DynamicImage) -> Self {
        Self::Byte(img.to_rgb8())
    }

    pub fn dims(&self) -> Dims {
        let (width, height) = match self {
            Self::Byte(img) => img.dimensions(),
            Self::Unit(img) => img.dimensions(),
        };

        Dims { width, height }
    }

    /// Center crops (optionally) and resamples to `dims`, always producing
    /// `ColorImage::Unit`, even if the size doesn't change.
    pub fn resize(&self, dims: Dims, center_crop: bool) -> Self {
        let unit = match self {
            Self::Byte(img) => image::DynamicImage::ImageRgb8(img.clone()).to_rgb32f(),
            Self::Unit(img) => img.clone(),
        };

        Self::Unit(resize_crop(&unit, dims, center_crop))
    }

    pub fn flip_horizontal(&self) -> Self {
        match self {
            Self::Byte(img) => Self::Byte(imageops::flip_horizontal(img)),
            Self::Unit(img) => Self::Unit(imageops::flip_horizontal(img)),
        }
    }

    /// Derives the luminance of the image, in `[0, 1]` regardless of how the
    /// color values are stored
    pub fn to_gray(&self) -> GrayF32Image {
        fn luma(rgb: [f32; 3]) -> f32 {
            LUMA_R * rgb[0] + LUMA_G * rgb[1] + LUMA_B * rgb[2]
        }

        let Dims { width, height } = self.dims();
        match self {
            Self::Byte(img) => GrayF32Image::from_fn(width, height, |x, y| {
                let p = img.get_pixel(x, y);
                Luma([luma([
                    f32::from(p[0]) / 255.0,
                    f32::from(p[1]) / 255.0,
                    f32::from(p[2]) / 255.0,
                ])])
            }),
            Self::Unit(img) => GrayF32Image::from_fn(width, height, |x, y| {
                let p = img.get_pixel(x, y);
                Luma([luma([p[0], p[1], p[2]])])
            }),
        }
    }
}

/// Reads and decodes the image at `path`, the format is inferred from the
/// file contents and extension, see `image::open` for details
pub fn load_dynamic_image(path: &Path) -> Result<image::DynamicImage, Error> {
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_owned(),
        source,
    })
}

/// Returns the `(x, y, side)` of the largest square centered in an image of
/// the specified size
pub(crate) fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Resamples an image to exactly `dims`, first cropping the largest centered
/// square out of non-square images if `center_crop` is set.
///
/// The resize is always performed, so the output is always a fresh buffer
/// of the requested size with the same channel count as the input.
pub fn resize_crop<P>(
    img: &ImageBuffer<P, Vec<f32>>,
    dims: Dims,
    center_crop: bool,
) -> ImageBuffer<P, Vec<f32>>
where
    P: Pixel<Subpixel = f32> + 'static,
{
    let (width, height) = img.dimensions();

    if center_crop && width != height {
        let (x, y, side) = center_square(width, height);
        let cropped = imageops::crop_imm(img, x, y, side, side).to_image();

        imageops::resize(
            &cropped,
            dims.width,
            dims.height,
            imageops::FilterType::Triangle,
        )
    } else {
        imageops::resize(img, dims.width, dims.height, imageops::FilterType::Triangle)
    }
}

/// Binarizes an image, any intensity above zero becomes 255. Needed after
/// resampling masks since interpolation blurs their borders.
pub(crate) fn threshold(img: &GrayF32Image) -> image::GrayImage {
    let (width, height) = img.dimensions();
    image::GrayImage::from_fn(width, height, |x, y| {
        Luma([if img.get_pixel(x, y)[0] > 0.0 { 255 } else { 0 }])
    })
}
