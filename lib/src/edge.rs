//! Structural edge maps paired with each sample.

use crate::{canny::Canny, utils, utils::GrayF32Image, Dims, Error, Mode};
use image::{GrayImage, Luma};
use ndarray::Array2;
use rand::Rng;
use std::{fmt, path::PathBuf, str::FromStr};

/// Smoothing scale used by the edge detector
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Sigma {
    /// No edges at all, the edge map is always blank
    Blank,
    /// A new integer sigma in `1..=4` is drawn for every edge map
    Random,
    /// Always the same sigma
    Fixed(f32),
}

impl Sigma {
    /// Maps `-1` to `Blank`, `0` to `Random` and positive values to `Fixed`
    pub fn from_value(value: f32) -> Result<Self, Error> {
        if value == -1.0 {
            Ok(Self::Blank)
        } else if value == 0.0 {
            Ok(Self::Random)
        } else if value > 0.0 && value.is_finite() {
            Ok(Self::Fixed(value))
        } else {
            Err(Error::InvalidRange(crate::errors::InvalidRange {
                min: -1.0,
                max: f32::MAX,
                value,
                name: "sigma",
            }))
        }
    }

    /// Returns the sigma to use for a single edge map, or `None` if edges
    /// are disabled
    pub fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> Option<f32> {
        match self {
            Self::Blank => None,
            Self::Random => Some(rng.gen_range(1..=4) as f32),
            Self::Fixed(sigma) => Some(sigma),
        }
    }
}

impl FromStr for Sigma {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f32 = s
            .parse()
            .map_err(|e| format!("invalid sigma '{}': {}", s, e))?;
        Self::from_value(value).map_err(|e| e.to_string())
    }
}

/// Where edge maps come from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EdgeSource {
    /// Detected from the grayscale image
    Canny,
    /// Loaded from the external edge list, at the same index as the sample
    External,
}

impl fmt::Display for EdgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Canny => "canny",
            Self::External => "external",
        })
    }
}

impl FromStr for EdgeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "canny" => Ok(Self::Canny),
            "2" | "external" => Ok(Self::External),
            other => Err(format!(
                "edge source '{}' not one of: 'canny', 'external'",
                other
            )),
        }
    }
}

pub(crate) fn gray_to_array(img: &GrayF32Image) -> Array2<f32> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0]
    })
}

fn edges_to_gray(edges: &Array2<bool>) -> GrayF32Image {
    let (height, width) = edges.dim();
    GrayF32Image::from_fn(width as u32, height as u32, |x, y| {
        Luma([if edges[[y as usize, x as usize]] { 1.0 } else { 0.0 }])
    })
}

/// Produces the edge map of a sample
pub struct EdgeSynthesizer<'a> {
    source: EdgeSource,
    sigma: Sigma,
    nms: bool,
    mode: Mode,
    pool: &'a [PathBuf],
}

impl<'a> EdgeSynthesizer<'a> {
    /// Creates a synthesizer, `pool` is the list of external edge maps, which
    /// must not be empty when using `EdgeSource::External`
    pub fn new(
        source: EdgeSource,
        sigma: Sigma,
        nms: bool,
        mode: Mode,
        pool: &'a [PathBuf],
    ) -> Result<Self, Error> {
        if source == EdgeSource::External && pool.is_empty() {
            return Err(Error::EmptyPool("edge"));
        }

        Ok(Self {
            source,
            sigma,
            nms,
            mode,
            pool,
        })
    }

    /// Synthesizes the edge map for the grayscale image of the sample at
    /// `index`.
    ///
    /// During evaluation, edges are never detected inside the occluded
    /// region of `mask`, as the model is not supposed to know about them.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        gray: &GrayF32Image,
        index: usize,
        mask: &GrayImage,
        rng: &mut R,
    ) -> Result<GrayF32Image, Error> {
        let (width, height) = gray.dimensions();

        if mask.dimensions() != (width, height) {
            return Err(Error::SizeMismatch(crate::errors::SizeMismatch {
                name: "mask",
                expected: (width, height),
                actual: mask.dimensions(),
            }));
        }

        match self.source {
            EdgeSource::Canny => Ok(self.detect(gray, mask, rng)),
            EdgeSource::External => {
                let path = self.pool.get(index).ok_or(Error::IndexOutOfRange {
                    list: "edge",
                    index,
                    len: self.pool.len(),
                })?;

                let external = utils::load_dynamic_image(path)?.to_luma32f();
                let mut edge = utils::resize_crop(&external, Dims::new(width, height), true);

                if self.nms {
                    let detected = self.detect(gray, mask, rng);
                    for (e, d) in edge.pixels_mut().zip(detected.pixels()) {
                        e[0] *= d[0];
                    }
                }

                Ok(edge)
            }
        }
    }

    fn detect<R: Rng + ?Sized>(
        &self,
        gray: &GrayF32Image,
        mask: &GrayImage,
        rng: &mut R,
    ) -> GrayF32Image {
        let (width, height) = gray.dimensions();

        let sigma = match self.sigma.draw(rng) {
            Some(sigma) => sigma,
            None => return GrayF32Image::new(width, height),
        };
        tracing::trace!(sigma, "detecting edges");

        let visible = match self.mode {
            Mode::Train => None,
            Mode::Eval => Some(Array2::from_shape_fn(
                (height as usize, width as usize),
                |(y, x)| mask.get_pixel(x as u32, y as u32)[0] == 0,
            )),
        };

        let edges = Canny::new(sigma).detect(&gray_to_array(gray), visible.as_ref());
        edges_to_gray(&edges)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn step(size: u32) -> GrayF32Image {
        GrayF32Image::from_fn(size, size, |x, _| Luma([if x < size / 2 { 0.0 } else { 1.0 }]))
    }

    #[test]
    fn sigma_values() {
        assert_eq!(Sigma::from_value(-1.0).unwrap(), Sigma::Blank);
        assert_eq!(Sigma::from_value(0.0).unwrap(), Sigma::Random);
        assert_eq!(Sigma::from_value(1.5).unwrap(), Sigma::Fixed(1.5));
        assert!(Sigma::from_value(-0.5).is_err());
        assert!(Sigma::from_value(f32::NAN).is_err());
        assert_eq!("-1".parse::<Sigma>(), Ok(Sigma::Blank));
        assert!("abc".parse::<Sigma>().is_err());
    }

    #[test]
    fn random_sigma_is_an_integer_in_range() {
        let mut rng = Pcg32::seed_from_u64(2);
        for _ in 0..100 {
            let s = Sigma::Random.draw(&mut rng).unwrap();
            assert!((1.0..=4.0).contains(&s));
            assert_eq!(s.fract(), 0.0);
        }
    }

    #[test]
    fn blank_sigma_has_no_edges() {
        let synth = EdgeSynthesizer::new(EdgeSource::Canny, Sigma::Blank, false, Mode::Train, &[])
            .unwrap();
        let mut rng = Pcg32::seed_from_u64(0);

        let gray = step(32);
        let edge = synth
            .synthesize(&gray, 0, &GrayImage::new(32, 32), &mut rng)
            .unwrap();

        assert_eq!(edge.dimensions(), (32, 32));
        assert!(edge.pixels().all(|p| p[0] == 0.0));
    }

    #[test]
    fn eval_mode_suppresses_occluded_edges() {
        let gray = step(32);
        // occlude the bottom half of the image
        let mask = GrayImage::from_fn(32, 32, |_, y| Luma([if y >= 16 { 255 } else { 0 }]));
        let mut rng = Pcg32::seed_from_u64(0);

        let mut synthesize = |mode| {
            EdgeSynthesizer::new(EdgeSource::Canny, Sigma::Fixed(1.0), false, mode, &[])
                .unwrap()
                .synthesize(&gray, 0, &mask, &mut rng)
                .unwrap()
        };
        let train = synthesize(Mode::Train);
        let eval = synthesize(Mode::Eval);

        let lower = |img: &GrayF32Image| {
            img.enumerate_pixels()
                .filter(|(_, y, p)| *y >= 16 && p[0] > 0.0)
                .count()
        };

        assert!(lower(&train) > 0);
        assert_eq!(lower(&eval), 0);
        assert!(eval.pixels().any(|p| p[0] == 1.0));
        assert!(eval.pixels().all(|p| p[0] == 0.0 || p[0] == 1.0));
    }

    #[test]
    fn external_needs_pool() {
        assert!(matches!(
            EdgeSynthesizer::new(EdgeSource::External, Sigma::Random, true, Mode::Train, &[]),
            Err(Error::EmptyPool("edge"))
        ));
    }

    #[test]
    fn mask_must_match() {
        let synth = EdgeSynthesizer::new(EdgeSource::Canny, Sigma::Random, false, Mode::Train, &[])
            .unwrap();
        let mut rng = Pcg32::seed_from_u64(0);

        assert!(matches!(
            synth.synthesize(&step(8), 0, &GrayImage::new(4, 8), &mut rng),
            Err(Error::SizeMismatch(_))
        ));
    }
}
