use crate::{
    edge::{EdgeSource, EdgeSynthesizer, Sigma},
    errors::{InvalidRange, SizeMismatch},
    flist::{self, FileSource},
    mask::{MaskStrategy, MaskSynthesizer},
    tensor::{self, Tensor},
    utils::{self, ColorImage},
    Dims, Error,
};
use image::{imageops, GrayImage};
use rand::Rng;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Whether samples are assembled for training or for evaluation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    /// Masks are always read at the same index as the image, and edges are
    /// never detected inside the occluded region
    Eval,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Eval => "eval",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Self::Train),
            "eval" | "test" => Ok(Self::Eval),
            other => Err(format!("mode '{}' not one of: 'train', 'eval'", other)),
        }
    }
}

/// A single sample, every tensor is `channels x height x width`, all of
/// them share the same height and width.
#[derive(Clone, Debug)]
pub struct Sample {
    /// The color image, 3 channels
    pub image: Tensor,
    /// Luminance of the color image
    pub gray: Tensor,
    /// The edge map
    pub edge: Tensor,
    /// The occlusion mask, 1 where the image is to be inpainted
    pub mask: Tensor,
    /// The pre-inpainted reference image, 3 channels
    pub inpainted: Tensor,
    /// The auxiliary noise mask, all zeros unless the mask strategy
    /// produced one
    pub noise: Tensor,
}

impl Sample {
    /// The sample in the order `(image, gray, edge, mask, inpainted, noise)`
    pub fn into_tuple(self) -> (Tensor, Tensor, Tensor, Tensor, Tensor, Tensor) {
        (
            self.image,
            self.gray,
            self.edge,
            self.mask,
            self.inpainted,
            self.noise,
        )
    }
}

struct Parameters {
    input_size: u32,
    sigma: Sigma,
    edge_source: EdgeSource,
    mask_strategy: MaskStrategy,
    nms: bool,
    mode: Mode,
    augment: bool,
    flip_noise: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            input_size: 256,
            sigma: Sigma::Fixed(2.0),
            edge_source: EdgeSource::Canny,
            mask_strategy: MaskStrategy::ExternalOrBlock,
            nms: false,
            mode: Mode::Train,
            augment: true,
            flip_noise: false,
        }
    }
}

/// The files a dataset reads from
#[derive(Default)]
struct Files {
    images: Vec<PathBuf>,
    inpainted: Vec<PathBuf>,
    edges: Vec<PathBuf>,
    masks: Vec<PathBuf>,
}

/// A dataset of inpainting samples.
///
/// Each sample is assembled on demand from the files at its index, there
/// is no caching and no state is shared between calls, all randomness comes
/// from the generator passed to each call.
///
/// # Example
/// ```no_run
/// use inpaint_dataset::{Dataset, MaskStrategy};
///
/// let dataset = Dataset::builder()
///     .images("data/places2_train.flist")
///     .inpainted("data/places2_inpainted.flist")
///     .masks("data/masks")
///     .mask_strategy(MaskStrategy::ExternalOrBlock)
///     .input_size(256)
///     .build().expect("failed to build dataset");
///
/// let mut rng = inpaint_dataset::seeded_rng(7);
/// let (image, gray, edge, mask, inpainted, noise) =
///     dataset.get(0, &mut rng).expect("failed to load sample").into_tuple();
/// ```
pub struct Dataset {
    files: Files,
    params: Parameters,
}

impl Dataset {
    /// Creates a new dataset builder with default parameters.
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// The number of samples
    pub fn len(&self) -> usize {
        self.files.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.images.is_empty()
    }

    /// The mask strategy in effect, which is always `MaskStrategy::Aligned`
    /// in evaluation mode
    pub fn mask_strategy(&self) -> MaskStrategy {
        self.params.mask_strategy
    }

    pub fn mode(&self) -> Mode {
        self.params.mode
    }

    /// The path of the image at `index`
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.files.images.get(index).map(PathBuf::as_path)
    }

    /// The file name of the image at `index`
    pub fn name(&self, index: usize) -> Option<String> {
        self.path(index)
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Assembles the sample at `index`.
    ///
    /// If the sample can't be assembled, eg. because one of its files is
    /// missing or corrupt, the failure is logged and the sample at index 0
    /// is returned instead. An error is only returned if that also fails.
    pub fn get<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<Sample, Error> {
        match self.load_item(index, rng) {
            Ok(sample) => Ok(sample),
            Err(err) => {
                tracing::warn!(
                    index,
                    path = %self.path(index).map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %err,
                    "failed to load sample, substituting the first sample"
                );

                self.load_item(0, rng)
            }
        }
    }

    /// Assembles the sample at `index`, returning any error that occurs.
    pub fn load_item<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<Sample, Error> {
        let params = &self.params;

        let image_path = lookup(&self.files.images, "image", index)?;
        let inpainted_path = lookup(&self.files.inpainted, "inpainted", index)?;

        let mut image = ColorImage::from_dynamic(&utils::load_dynamic_image(image_path)?);
        let mut inpainted = ColorImage::from_dynamic(&utils::load_dynamic_image(inpainted_path)?);

        if params.input_size != 0 {
            let dims = Dims::square(params.input_size);
            image = image.resize(dims, true);
            inpainted = inpainted.resize(dims, true);
        }

        let dims = image.dims();
        check_size("inpainted image", dims, inpainted.dims())?;

        let mut gray = image.to_gray();

        let masks = MaskSynthesizer::new(params.mask_strategy, &self.files.masks)?;
        let synthesized = masks.synthesize(dims, index, rng)?;
        tracing::trace!(index, mask = %synthesized.kind, "synthesized mask");
        let mut mask = synthesized.mask;
        let mut noise = synthesized
            .noise
            .unwrap_or_else(|| GrayImage::new(dims.width, dims.height));

        let edges = EdgeSynthesizer::new(
            params.edge_source,
            params.sigma,
            params.nms,
            params.mode,
            &self.files.edges,
        )?;
        let mut edge = edges.synthesize(&gray, index, &mask, rng)?;

        check_size("mask", dims, Dims::from_tuple(mask.dimensions()))?;
        check_size("noise mask", dims, Dims::from_tuple(noise.dimensions()))?;
        check_size("edge map", dims, Dims::from_tuple(edge.dimensions()))?;

        if params.augment && rng.gen_bool(0.5) {
            image = image.flip_horizontal();
            inpainted = inpainted.flip_horizontal();
            gray = imageops::flip_horizontal(&gray);
            edge = imageops::flip_horizontal(&edge);
            mask = imageops::flip_horizontal(&mask);

            if params.flip_noise {
                noise = imageops::flip_horizontal(&noise);
            }
        }

        let sample = match params.mode {
            Mode::Train => Sample {
                image: quantized(&image),
                gray: tensor::from_floats(&gray),
                edge: tensor::from_floats(&edge),
                mask: tensor::from_bytes(&mask),
                inpainted: quantized(&inpainted),
                noise: tensor::from_bytes(&noise),
            },
            Mode::Eval => Sample {
                image: direct(&image),
                gray: tensor::from_floats(&gray),
                edge: tensor::from_floats(&edge),
                mask: tensor::from_bytes(&mask),
                inpainted: direct(&inpainted),
                noise: tensor::from_bytes(&noise),
            },
        };

        Ok(sample)
    }

    /// Returns an endless iterator of batches, walking the dataset in order
    /// and starting over once the end is reached. A trailing partial batch
    /// is dropped.
    pub fn batches<R: Rng>(&self, batch_size: usize, rng: R) -> Result<Batches<'_, R>, Error> {
        if batch_size == 0 || batch_size > self.len() {
            return Err(Error::InvalidBatchSize(batch_size, self.len()));
        }

        Ok(Batches {
            dataset: self,
            batch_size,
            next: 0,
            rng,
        })
    }
}

fn lookup<'a>(list: &'a [PathBuf], name: &'static str, index: usize) -> Result<&'a PathBuf, Error> {
    list.get(index).ok_or(Error::IndexOutOfRange {
        list: name,
        index,
        len: list.len(),
    })
}

fn check_size(name: &'static str, expected: Dims, actual: Dims) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::SizeMismatch(SizeMismatch {
            name,
            expected: (expected.width, expected.height),
            actual: (actual.width, actual.height),
        }))
    }
}

fn quantized(img: &ColorImage) -> Tensor {
    match img {
        ColorImage::Byte(img) => tensor::from_bytes_quantized(img),
        ColorImage::Unit(img) => tensor::from_unit_quantized(img),
    }
}

fn direct(img: &ColorImage) -> Tensor {
    match img {
        ColorImage::Byte(img) => tensor::from_bytes(img),
        ColorImage::Unit(img) => tensor::from_floats(img),
    }
}

/// Endless iterator over batches of a `Dataset`, see `Dataset::batches`
pub struct Batches<'a, R> {
    dataset: &'a Dataset,
    batch_size: usize,
    next: usize,
    rng: R,
}

impl<'a, R: Rng> Iterator for Batches<'a, R> {
    type Item = Result<Vec<Sample>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next + self.batch_size > self.dataset.len() {
            self.next = 0;
        }

        let start = self.next;
        self.next += self.batch_size;

        let batch = (start..start + self.batch_size)
            .map(|index| self.dataset.get(index, &mut self.rng))
            .collect();

        Some(batch)
    }
}

/// Builds a dataset by setting parameters and file lists, calling `build`
/// resolves the file lists and checks that the configuration can actually
/// produce samples
#[derive(Default)]
pub struct DatasetBuilder {
    images: FileSource,
    inpainted: FileSource,
    edges: FileSource,
    masks: FileSource,
    params: Parameters,
}

impl DatasetBuilder {
    /// Creates a new `DatasetBuilder`, can also be created via
    /// `Dataset::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The images to inpaint. This list determines the size of the dataset.
    pub fn images<S: Into<FileSource>>(mut self, src: S) -> Self {
        self.images = src.into();
        self
    }

    /// The pre-inpainted reference images, aligned with `images`
    pub fn inpainted<S: Into<FileSource>>(mut self, src: S) -> Self {
        self.inpainted = src.into();
        self
    }

    /// External edge maps, aligned with `images`. Only used with
    /// `EdgeSource::External`.
    pub fn edges<S: Into<FileSource>>(mut self, src: S) -> Self {
        self.edges = src.into();
        self
    }

    /// External occlusion masks. Sampled randomly by `MaskStrategy::External`
    /// and read at the same index as the image by `MaskStrategy::Aligned`.
    pub fn masks<S: Into<FileSource>>(mut self, src: S) -> Self {
        self.masks = src.into();
        self
    }

    /// The side of the square that images are center cropped and resized to,
    /// 0 keeps the images as they are.
    ///
    /// Default: 256
    pub fn input_size(mut self, size: u32) -> Self {
        self.params.input_size = size;
        self
    }

    /// The smoothing of the edge detector.
    ///
    /// Default: `Sigma::Fixed(2.0)`
    pub fn sigma(mut self, sigma: Sigma) -> Self {
        self.params.sigma = sigma;
        self
    }

    /// Default: `EdgeSource::Canny`
    pub fn edge_source(mut self, source: EdgeSource) -> Self {
        self.params.edge_source = source;
        self
    }

    /// How occlusion masks are produced. Ignored in evaluation mode, which
    /// always uses `MaskStrategy::Aligned`.
    ///
    /// Default: `MaskStrategy::ExternalOrBlock`
    pub fn mask_strategy(mut self, strategy: MaskStrategy) -> Self {
        self.params.mask_strategy = strategy;
        self
    }

    /// Keeps only the external edges that coincide with detected ones.
    ///
    /// Default: false
    pub fn nms(mut self, enabled: bool) -> Self {
        self.params.nms = enabled;
        self
    }

    /// Default: `Mode::Train`
    pub fn mode(mut self, mode: Mode) -> Self {
        self.params.mode = mode;
        self
    }

    /// Randomly flips samples horizontally.
    ///
    /// Default: true
    pub fn augment(mut self, enabled: bool) -> Self {
        self.params.augment = enabled;
        self
    }

    /// Also flips the auxiliary noise mask when a sample is flipped, which
    /// keeps it aligned with the occlusion mask. Disabled by default, so
    /// samples match the ones existing models were trained on.
    ///
    /// Default: false
    pub fn flip_noise_mask(mut self, enabled: bool) -> Self {
        self.params.flip_noise = enabled;
        self
    }

    /// Creates a `Dataset`, or returns an error if invalid parameters were
    /// specified or a file list the configuration needs is empty.
    pub fn build(mut self) -> Result<Dataset, Error> {
        if self.params.mode == Mode::Eval && self.params.mask_strategy != MaskStrategy::Aligned {
            tracing::debug!(
                configured = %self.params.mask_strategy,
                "evaluation mode always uses aligned masks"
            );
            self.params.mask_strategy = MaskStrategy::Aligned;
        }

        self.check_parameters_validity()?;

        let files = Files {
            images: flist::load(self.images),
            inpainted: flist::load(self.inpainted),
            edges: flist::load(self.edges),
            masks: flist::load(self.masks),
        };

        tracing::debug!(
            images = files.images.len(),
            inpainted = files.inpainted.len(),
            edges = files.edges.len(),
            masks = files.masks.len(),
            "resolved file lists"
        );

        if files.images.is_empty() {
            return Err(Error::EmptyPool("image"));
        }

        if files.inpainted.is_empty() {
            return Err(Error::EmptyPool("inpainted"));
        }

        // Both synthesizers check that their pools can serve the configuration
        MaskSynthesizer::new(self.params.mask_strategy, &files.masks)?;
        EdgeSynthesizer::new(
            self.params.edge_source,
            self.params.sigma,
            self.params.nms,
            self.params.mode,
            &files.edges,
        )?;

        Ok(Dataset {
            files,
            params: self.params,
        })
    }

    fn check_parameters_validity(&self) -> Result<(), Error> {
        if let Sigma::Fixed(sigma) = self.params.sigma {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(Error::InvalidRange(InvalidRange {
                    min: 0.0,
                    max: f32::MAX,
                    value: sigma,
                    name: "sigma",
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eval_forces_aligned_masks() {
        let dataset = Dataset::builder()
            .images(vec![PathBuf::from("a.png")])
            .inpainted(vec![PathBuf::from("a_inpainted.png")])
            .masks(vec![PathBuf::from("a_mask.png")])
            .mask_strategy(MaskStrategy::RandomBlock)
            .mode(Mode::Eval)
            .build()
            .unwrap();

        assert_eq!(dataset.mask_strategy(), MaskStrategy::Aligned);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.name(0).as_deref(), Some("a.png"));
        assert_eq!(dataset.name(1), None);
    }

    #[test]
    fn empty_pools_fail_fast() {
        let builder = || {
            Dataset::builder()
                .images(vec![PathBuf::from("a.png")])
                .inpainted(vec![PathBuf::from("b.png")])
        };

        assert!(matches!(
            builder().mask_strategy(MaskStrategy::External).build(),
            Err(Error::EmptyPool("mask"))
        ));
        assert!(matches!(
            builder()
                .mask_strategy(MaskStrategy::Half)
                .edge_source(EdgeSource::External)
                .build(),
            Err(Error::EmptyPool("edge"))
        ));
        assert!(matches!(
            Dataset::builder().mask_strategy(MaskStrategy::Half).build(),
            Err(Error::EmptyPool("image"))
        ));
        assert!(builder().mask_strategy(MaskStrategy::Half).build().is_ok());
    }

    #[test]
    fn invalid_sigma() {
        let res = Dataset::builder()
            .images(vec![PathBuf::from("a.png")])
            .inpainted(vec![PathBuf::from("b.png")])
            .mask_strategy(MaskStrategy::RandomBlock)
            .sigma(Sigma::Fixed(-3.0))
            .build();

        assert!(matches!(res, Err(Error::InvalidRange(_))));
    }

    #[test]
    fn modes_parse() {
        assert_eq!("train".parse::<Mode>(), Ok(Mode::Train));
        assert_eq!("eval".parse::<Mode>(), Ok(Mode::Eval));
        assert!("both".parse::<Mode>().is_err());
    }
}
