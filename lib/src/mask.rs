//! Occlusion mask synthesis.
//!
//! Every mask is a single channel 8-bit image of the same size as the image
//! it is paired with, where 255 marks the region to be inpainted and 0
//! everything else.

use crate::{utils, Dims, Error};
use image::{GrayImage, Luma};
use imageproc::contours::{self, BorderType};
use rand::Rng;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// How occlusion masks are produced for each sample.
///
/// `ExternalOrBlock` and `ExternalBlockOrHalf` pick one of the concrete
/// strategies anew every time a mask is synthesized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaskStrategy {
    /// A block half the width and height of the image at a random position
    RandomBlock,
    /// Either the left or the right half of the image
    Half,
    /// A random mask from the external mask list
    External,
    /// `RandomBlock` or `External`, with equal probability
    ExternalOrBlock,
    /// `RandomBlock`, `Half` or `External`, with equal probability
    ExternalBlockOrHalf,
    /// The external mask at the same index as the sample. Used for
    /// evaluation, as it is fully reproducible, and additionally yields an
    /// auxiliary noise mask.
    Aligned,
}

impl MaskStrategy {
    /// Maps the numeric strategy codes `1..=6`
    pub fn from_code(code: u8) -> Result<Self, Error> {
        Ok(match code {
            1 => Self::RandomBlock,
            2 => Self::Half,
            3 => Self::External,
            4 => Self::ExternalOrBlock,
            5 => Self::ExternalBlockOrHalf,
            6 => Self::Aligned,
            other => {
                return Err(Error::InvalidRange(crate::errors::InvalidRange {
                    min: 1.0,
                    max: 6.0,
                    value: f32::from(other),
                    name: "mask",
                }))
            }
        })
    }

    pub fn code(self) -> u8 {
        match self {
            Self::RandomBlock => 1,
            Self::Half => 2,
            Self::External => 3,
            Self::ExternalOrBlock => 4,
            Self::ExternalBlockOrHalf => 5,
            Self::Aligned => 6,
        }
    }

    /// True if the strategy can read from the external mask list
    pub fn uses_external(self) -> bool {
        !matches!(self, Self::RandomBlock | Self::Half)
    }

    /// Resolves the meta strategies into a concrete one
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> MaskKind {
        match self {
            Self::RandomBlock => MaskKind::RandomBlock,
            Self::Half => MaskKind::Half,
            Self::External => MaskKind::External,
            Self::Aligned => MaskKind::Aligned,
            Self::ExternalOrBlock => {
                if rng.gen_bool(0.5) {
                    MaskKind::RandomBlock
                } else {
                    MaskKind::External
                }
            }
            Self::ExternalBlockOrHalf => match rng.gen_range(0..3) {
                0 => MaskKind::RandomBlock,
                1 => MaskKind::Half,
                _ => MaskKind::External,
            },
        }
    }
}

/// A concrete way of producing a mask, see `MaskStrategy`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MaskKind {
    RandomBlock,
    Half,
    External,
    Aligned,
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self {
            Self::RandomBlock => MaskStrategy::RandomBlock,
            Self::Half => MaskStrategy::Half,
            Self::External => MaskStrategy::External,
            Self::Aligned => MaskStrategy::Aligned,
        };

        fmt::Display::fmt(&strategy, f)
    }
}

impl fmt::Display for MaskStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RandomBlock => "random-block",
            Self::Half => "half",
            Self::External => "external",
            Self::ExternalOrBlock => "external-or-block",
            Self::ExternalBlockOrHalf => "external-block-or-half",
            Self::Aligned => "aligned",
        };

        f.write_str(name)
    }
}

impl FromStr for MaskStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).map_err(|e| e.to_string());
        }

        Ok(match s {
            "random-block" => Self::RandomBlock,
            "half" => Self::Half,
            "external" => Self::External,
            "external-or-block" => Self::ExternalOrBlock,
            "external-block-or-half" => Self::ExternalBlockOrHalf,
            "aligned" => Self::Aligned,
            other => return Err(format!("unknown mask strategy '{}'", other)),
        })
    }
}

/// The result of synthesizing a mask
pub struct SynthesizedMask {
    /// The binary occlusion mask
    pub mask: GrayImage,
    /// The mask with the bounding box of every connected region filled with
    /// random noise, only produced by `MaskStrategy::Aligned`
    pub noise: Option<GrayImage>,
    /// The concrete strategy that produced the mask
    pub kind: MaskKind,
}

/// Creates a mask of `dims` with a single `block` sized rectangle at `offset`
pub fn block_mask(dims: Dims, block: Dims, offset: (u32, u32)) -> GrayImage {
    let (x0, y0) = offset;
    GrayImage::from_fn(dims.width, dims.height, |x, y| {
        let inside = x >= x0 && x < x0 + block.width && y >= y0 && y < y0 + block.height;
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Overwrites the bounding box of every outermost connected region of `mask`
/// with uniform noise
pub fn fill_regions_with_noise<R: Rng + ?Sized>(mask: &GrayImage, rng: &mut R) -> GrayImage {
    let mut noisy = mask.clone();

    let outermost = contours::find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none());

    for contour in outermost {
        if contour.points.is_empty() {
            continue;
        }

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0, 0);
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                noisy.put_pixel(x, y, Luma([rng.gen::<u8>()]));
            }
        }
    }

    noisy
}

/// Synthesizes occlusion masks according to a `MaskStrategy`
pub struct MaskSynthesizer<'a> {
    strategy: MaskStrategy,
    pool: &'a [PathBuf],
}

impl<'a> MaskSynthesizer<'a> {
    /// Creates a synthesizer, `pool` is the list of external masks, which
    /// may only be empty if the strategy never reads from it
    pub fn new(strategy: MaskStrategy, pool: &'a [PathBuf]) -> Result<Self, Error> {
        if strategy.uses_external() && pool.is_empty() {
            return Err(Error::EmptyPool("mask"));
        }

        Ok(Self { strategy, pool })
    }

    /// Synthesizes the mask for the sample at `index`, whose image has the
    /// specified dimensions
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        dims: Dims,
        index: usize,
        rng: &mut R,
    ) -> Result<SynthesizedMask, Error> {
        let kind = self.strategy.resolve(rng);

        let (mask, noise) = match kind {
            MaskKind::RandomBlock => {
                let block = Dims::new(dims.width / 2, dims.height / 2);
                let x = rng.gen_range(0..=dims.width - block.width);
                let y = rng.gen_range(0..=dims.height - block.height);

                (block_mask(dims, block, (x, y)), None)
            }
            MaskKind::Half => {
                let block = Dims::new(dims.width / 2, dims.height);
                let x = if rng.gen_bool(0.5) { 0 } else { dims.width / 2 };

                (block_mask(dims, block, (x, 0)), None)
            }
            MaskKind::External => {
                let path = &self.pool[rng.gen_range(0..self.pool.len())];
                (self.load(path, dims, true)?, None)
            }
            MaskKind::Aligned => {
                let path = self.pool.get(index).ok_or(Error::IndexOutOfRange {
                    list: "mask",
                    index,
                    len: self.pool.len(),
                })?;

                // masks aren't necessarily square, so keep the full frame
                let mask = self.load(path, dims, false)?;
                let noise = fill_regions_with_noise(&mask, rng);

                (mask, Some(noise))
            }
        };

        Ok(SynthesizedMask { mask, noise, kind })
    }

    fn load(&self, path: &Path, dims: Dims, center_crop: bool) -> Result<GrayImage, Error> {
        let img = utils::load_dynamic_image(path)?.to_luma32f();
        let resized = utils::resize_crop(&img, dims, center_crop);

        Ok(utils::threshold(&resized))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::collections::HashSet;

    fn is_binary(mask: &GrayImage) -> bool {
        mask.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    /// Returns (min_x, min_y, max_x, max_y) of the foreground
    fn bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
        let mut b: Option<(u32, u32, u32, u32)> = None;
        for (x, y, p) in mask.enumerate_pixels() {
            if p[0] == 255 {
                b = Some(match b {
                    None => (x, y, x, y),
                    Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
                });
            }
        }
        b
    }

    #[test]
    fn codes_round_trip() {
        for code in 1..=6 {
            assert_eq!(MaskStrategy::from_code(code).unwrap().code(), code);
        }
        assert!(MaskStrategy::from_code(0).is_err());
        assert!(MaskStrategy::from_code(7).is_err());

        assert_eq!("4".parse::<MaskStrategy>(), Ok(MaskStrategy::ExternalOrBlock));
        assert_eq!("half".parse::<MaskStrategy>(), Ok(MaskStrategy::Half));
        assert!("nope".parse::<MaskStrategy>().is_err());
    }

    #[test]
    fn meta_strategies_resolve_per_call() {
        let mut rng = Pcg32::seed_from_u64(3);

        let seen: HashSet<_> = (0..200)
            .map(|_| MaskStrategy::ExternalOrBlock.resolve(&mut rng))
            .collect();
        assert_eq!(
            seen,
            [MaskKind::RandomBlock, MaskKind::External].iter().copied().collect()
        );

        let seen: HashSet<_> = (0..200)
            .map(|_| MaskStrategy::ExternalBlockOrHalf.resolve(&mut rng))
            .collect();
        assert_eq!(
            seen,
            [MaskKind::RandomBlock, MaskKind::Half, MaskKind::External]
                .iter()
                .copied()
                .collect()
        );

        assert_eq!(MaskStrategy::Aligned.resolve(&mut rng), MaskKind::Aligned);
    }

    #[test]
    fn random_block_fits() {
        let synth = MaskSynthesizer::new(MaskStrategy::RandomBlock, &[]).unwrap();
        let mut rng = Pcg32::seed_from_u64(9);

        for i in 0..50 {
            let out = synth.synthesize(Dims::square(256), i, &mut rng).unwrap();
            assert_eq!(out.kind, MaskKind::RandomBlock);
            assert!(out.noise.is_none());
            assert!(is_binary(&out.mask));

            let (x0, y0, x1, y1) = bounds(&out.mask).unwrap();
            assert_eq!(x1 - x0 + 1, 128);
            assert_eq!(y1 - y0 + 1, 128);
            assert!(x0 <= 128 && y0 <= 128);
        }
    }

    #[test]
    fn half_is_left_or_right() {
        let synth = MaskSynthesizer::new(MaskStrategy::Half, &[]).unwrap();
        let mut rng = Pcg32::seed_from_u64(1);

        let mut sides = [false; 2];
        for i in 0..50 {
            let out = synth.synthesize(Dims::new(100, 50), i, &mut rng).unwrap();
            assert_eq!(out.kind, MaskKind::Half);
            let b = bounds(&out.mask).unwrap();
            match b {
                (0, 0, 49, 49) => sides[0] = true,
                (50, 0, 99, 49) => sides[1] = true,
                other => panic!("unexpected half {:?}", other),
            }
            assert_eq!(out.mask.pixels().filter(|p| p[0] == 255).count(), 50 * 50);
        }

        assert!(sides[0] && sides[1]);
    }

    #[test]
    fn external_needs_pool() {
        for strategy in &[
            MaskStrategy::External,
            MaskStrategy::ExternalOrBlock,
            MaskStrategy::ExternalBlockOrHalf,
            MaskStrategy::Aligned,
        ] {
            assert!(matches!(
                MaskSynthesizer::new(*strategy, &[]),
                Err(Error::EmptyPool("mask"))
            ));
        }
    }

    #[test]
    fn noise_fills_bounding_boxes() {
        let mut mask = GrayImage::new(20, 20);
        // an L shaped region, its bounding box is 2..8 x 2..8
        for i in 2..8 {
            mask.put_pixel(2, i, Luma([255]));
            mask.put_pixel(i, 7, Luma([255]));
        }
        // and a separate square
        for y in 12..15 {
            for x in 14..18 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let mut rng = Pcg32::seed_from_u64(5);
        let noisy = fill_regions_with_noise(&mask, &mut rng);

        for (x, y, p) in noisy.enumerate_pixels() {
            let in_l = (2..8).contains(&x) && (2..8).contains(&y);
            let in_sq = (14..18).contains(&x) && (12..15).contains(&y);
            if !in_l && !in_sq {
                assert_eq!(p[0], 0, "{},{} outside of the regions", x, y);
            }
        }

        // it's noise, so the boxes shouldn't just be the original mask
        let changed = noisy
            .pixels()
            .zip(mask.pixels())
            .filter(|(a, b)| a[0] != b[0])
            .count();
        assert!(changed > 10);
    }
}
