//! Canny edge detection with an optional region mask.
//!
//! The detector smooths the image with a gaussian, takes Sobel gradients,
//! thins them with non-maximum suppression and finally keeps weak edges
//! only when they are connected to a strong one.
//!
//! When a mask is supplied, only pixels inside the mask contribute to the
//! smoothing, and edges are only ever reported inside the mask (shrunk by
//! one pixel), so an occluded region never produces edges.

use ndarray::{Array2, Zip};

/// Parameters of the edge detector, intensities are expected in `[0, 1]`
#[derive(Copy, Clone, Debug)]
pub struct Canny {
    /// Standard deviation of the smoothing gaussian
    pub sigma: f32,
    /// Gradient magnitude below which a pixel is never an edge
    pub low_threshold: f32,
    /// Gradient magnitude above which a pixel is always an edge
    pub high_threshold: f32,
}

impl Canny {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            low_threshold: 0.1,
            high_threshold: 0.2,
        }
    }

    /// Detects edges in `img`. If `mask` is provided it must have the same
    /// shape as `img`, and edges are only detected where it is `true`.
    pub fn detect(&self, img: &Array2<f32>, mask: Option<&Array2<bool>>) -> Array2<bool> {
        let (height, width) = img.dim();
        let mut edges = Array2::from_elem((height, width), false);

        if height < 3 || width < 3 {
            return edges;
        }

        let mask = match mask {
            Some(mask) => mask.clone(),
            None => Array2::from_elem((height, width), true),
        };

        let smoothed = masked_smooth(img, &mask, self.sigma);
        let eroded = erode(&mask);

        let (isobel, jsobel) = sobel(&smoothed);
        let magnitude = Zip::from(&isobel)
            .and(&jsobel)
            .map_collect(|i, j| (i * i + j * j).sqrt());

        let maxima = self.local_maxima(&isobel, &jsobel, &magnitude, &eroded);

        // hysteresis, grow 8-connected regions of weak edges from the strong ones
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for ((row, col), &is_max) in maxima.indexed_iter() {
            if is_max && magnitude[[row, col]] >= self.high_threshold {
                edges[[row, col]] = true;
                stack.push((row, col));
            }
        }

        while let Some((row, col)) = stack.pop() {
            for nr in row.saturating_sub(1)..=(row + 1).min(height - 1) {
                for nc in col.saturating_sub(1)..=(col + 1).min(width - 1) {
                    if !edges[[nr, nc]] && maxima[[nr, nc]] {
                        edges[[nr, nc]] = true;
                        stack.push((nr, nc));
                    }
                }
            }
        }

        edges
    }

    /// Non-maximum suppression with the gradient magnitude of neighbors
    /// interpolated along the gradient direction. Only pixels above the low
    /// threshold and inside `eroded` are considered.
    fn local_maxima(
        &self,
        isobel: &Array2<f32>,
        jsobel: &Array2<f32>,
        magnitude: &Array2<f32>,
        eroded: &Array2<bool>,
    ) -> Array2<bool> {
        let (height, width) = magnitude.dim();
        let mut maxima = Array2::from_elem((height, width), false);

        for row in 1..height - 1 {
            for col in 1..width - 1 {
                let m = magnitude[[row, col]];
                if !eroded[[row, col]] || m < self.low_threshold {
                    continue;
                }

                let gi = isobel[[row, col]];
                let gj = jsobel[[row, col]];
                let (ai, aj) = (gi.abs(), gj.abs());

                let diagonal = (gi >= 0.0 && gj >= 0.0) || (gi <= 0.0 && gj <= 0.0);
                let at = |r: usize, c: usize| magnitude[[r, c]];

                let (n1a, n1b, n2a, n2b, w) = if diagonal {
                    if ai > aj {
                        (
                            at(row + 1, col),
                            at(row + 1, col + 1),
                            at(row - 1, col),
                            at(row - 1, col - 1),
                            aj / ai,
                        )
                    } else {
                        (
                            at(row, col + 1),
                            at(row + 1, col + 1),
                            at(row, col - 1),
                            at(row - 1, col - 1),
                            ai / aj,
                        )
                    }
                } else if ai < aj {
                    (
                        at(row, col + 1),
                        at(row - 1, col + 1),
                        at(row, col - 1),
                        at(row + 1, col - 1),
                        ai / aj,
                    )
                } else {
                    (
                        at(row - 1, col),
                        at(row - 1, col + 1),
                        at(row + 1, col),
                        at(row + 1, col - 1),
                        aj / ai,
                    )
                };

                if n1b * w + n1a * (1.0 - w) <= m && n2b * w + n2a * (1.0 - w) <= m {
                    maxima[[row, col]] = true;
                }
            }
        }

        maxima
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = ((4.0 * sigma + 0.5).floor() as isize).max(1);
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|x| {
            let x = x as f32;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }

    kernel
}

/// Separable gaussian blur with zero padding
fn blur(img: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (height, width) = img.dim();
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = Array2::<f32>::zeros((height, width));
    for ((row, col), out) in horizontal.indexed_iter_mut() {
        *out = kernel
            .iter()
            .enumerate()
            .filter_map(|(i, k)| {
                let c = col as isize + i as isize - radius;
                if c >= 0 && c < width as isize {
                    Some(img[[row, c as usize]] * k)
                } else {
                    None
                }
            })
            .sum();
    }

    let mut vertical = Array2::<f32>::zeros((height, width));
    for ((row, col), out) in vertical.indexed_iter_mut() {
        *out = kernel
            .iter()
            .enumerate()
            .filter_map(|(i, k)| {
                let r = row as isize + i as isize - radius;
                if r >= 0 && r < height as isize {
                    Some(horizontal[[r as usize, col]] * k)
                } else {
                    None
                }
            })
            .sum();
    }

    vertical
}

/// Smooths only the masked pixels, normalizing by how much of the kernel
/// fell inside the mask so unmasked values don't bleed in
fn masked_smooth(img: &Array2<f32>, mask: &Array2<bool>, sigma: f32) -> Array2<f32> {
    let kernel = gaussian_kernel(sigma);

    let masked = Zip::from(img)
        .and(mask)
        .map_collect(|&v, &m| if m { v } else { 0.0 });
    let weights = mask.mapv(|m| if m { 1.0 } else { 0.0 });

    let blurred = blur(&masked, &kernel);
    let bleed = blur(&weights, &kernel);

    Zip::from(&blurred)
        .and(&bleed)
        .map_collect(|&v, &b| v / (b + f32::EPSILON))
}

/// 3x3 binary erosion, pixels outside the image count as unmasked
fn erode(mask: &Array2<bool>) -> Array2<bool> {
    let (height, width) = mask.dim();
    let mut eroded = Array2::from_elem((height, width), false);

    for row in 1..height.saturating_sub(1) {
        for col in 1..width.saturating_sub(1) {
            eroded[[row, col]] = (row - 1..=row + 1)
                .all(|r| (col - 1..=col + 1).all(|c| mask[[r, c]]));
        }
    }

    eroded
}

fn reflect(i: isize, len: usize) -> usize {
    let len = len as isize;
    let i = if i < 0 { -i - 1 } else { i };
    (if i >= len { 2 * len - i - 1 } else { i }) as usize
}

/// Unnormalized Sobel gradients along rows and columns, reflecting at borders
fn sobel(img: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    const ROWS: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
    const COLS: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

    let (height, width) = img.dim();
    let mut isobel = Array2::<f32>::zeros((height, width));
    let mut jsobel = Array2::<f32>::zeros((height, width));

    for row in 0..height {
        for col in 0..width {
            let mut gi = 0.0;
            let mut gj = 0.0;
            for (ky, (krow, kcol)) in ROWS.iter().zip(COLS.iter()).enumerate() {
                let r = reflect(row as isize + ky as isize - 1, height);
                for kx in 0..3 {
                    let c = reflect(col as isize + kx as isize - 1, width);
                    let v = img[[r, c]];
                    gi += v * krow[kx];
                    gj += v * kcol[kx];
                }
            }
            isobel[[row, col]] = gi;
            jsobel[[row, col]] = gj;
        }
    }

    (isobel, jsobel)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Left half black, right half white
    fn step(size: usize) -> Array2<f32> {
        Array2::from_shape_fn((size, size), |(_, c)| if c < size / 2 { 0.0 } else { 1.0 })
    }

    #[test]
    fn flat_image_has_no_edges() {
        let img = Array2::from_elem((16, 16), 0.5);
        let edges = Canny::new(2.0).detect(&img, None);
        assert!(edges.iter().all(|e| !e));
    }

    #[test]
    fn finds_vertical_step() {
        let img = step(32);
        let edges = Canny::new(1.0).detect(&img, None);

        // every interior row has an edge right at the step
        for row in 2..30 {
            let cols: Vec<_> = (0..32).filter(|&c| edges[[row, c]]).collect();
            assert!(!cols.is_empty(), "row {} has no edge", row);
            assert!(cols.iter().all(|&c| c == 15 || c == 16), "{:?}", cols);
        }

        // the border is never an edge
        for i in 0..32 {
            assert!(!edges[[0, i]] && !edges[[31, i]]);
            assert!(!edges[[i, 0]] && !edges[[i, 31]]);
        }
    }

    #[test]
    fn mask_suppresses_edges() {
        let img = step(32);
        // only the top half may contain edges
        let mask = Array2::from_shape_fn((32, 32), |(r, _)| r < 16);
        let edges = Canny::new(1.0).detect(&img, Some(&mask));

        assert!(edges.iter().any(|&e| e));
        for ((row, _), &e) in edges.indexed_iter() {
            if row >= 15 {
                assert!(!e);
            }
        }
    }

    #[test]
    fn tiny_images_are_empty() {
        let img = Array2::from_elem((2, 40), 1.0);
        let edges = Canny::new(1.0).detect(&img, None);
        assert_eq!(edges.dim(), (2, 40));
        assert!(edges.iter().all(|e| !e));
    }

    #[test]
    fn kernel_is_normalized() {
        let kernel = gaussian_kernel(2.0);
        assert_eq!(kernel.len(), 17);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn reflection() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(2, 5), 2);
    }
}
