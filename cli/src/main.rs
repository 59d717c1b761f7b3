mod progress;

use structopt::StructOpt;

use inpaint_dataset::{
    image::ImageFormat, tensor, Dataset, EdgeSource, Error, MaskStrategy, Mode, Sample, Sigma,
};
use progress::Progress;
use std::path::{Path, PathBuf};

fn parse_img_fmt(input: &str) -> Result<(ImageFormat, &'static str), Error> {
    let fmt = match input {
        "png" => (ImageFormat::Png, "png"),
        "jpg" => (ImageFormat::Jpeg, "jpg"),
        "bmp" => (ImageFormat::Bmp, "bmp"),
        other => return Err(Error::UnsupportedOutputFormat(other.to_owned())),
    };

    Ok(fmt)
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Inspect {
    /// The number of samples to inspect, defaults to the whole dataset
    #[structopt(long)]
    count: Option<usize>,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Dump {
    /// The directory the sample images are written to, created if needed
    #[structopt(long, short, parse(from_os_str))]
    out: PathBuf,
    /// Index of the first sample to dump
    #[structopt(long, default_value = "0")]
    start: usize,
    /// The number of samples to dump, defaults to the rest of the dataset
    #[structopt(long)]
    count: Option<usize>,
    /// The format to save the images as
    #[structopt(long, default_value = "png", parse(try_from_str = parse_img_fmt))]
    format: (ImageFormat, &'static str),
}

#[derive(StructOpt)]
enum Subcommand {
    /// Prints a summary line for each sample
    #[structopt(name = "inspect")]
    Inspect(Inspect),
    /// Writes every component of each sample to disk as images
    #[structopt(name = "dump")]
    Dump(Dump),
}

#[derive(StructOpt)]
#[structopt(
    name = "inpaint-dataset",
    about = "Assembles inpainting training samples from image, mask and edge lists",
    rename_all = "kebab-case"
)]
struct Opt {
    /// The images to inpaint, either a directory, a single image, or a text
    /// file listing one image path per line
    #[structopt(long, parse(from_os_str))]
    images: PathBuf,
    /// The pre-inpainted reference images, aligned with `--images`
    #[structopt(long, parse(from_os_str))]
    inpainted: PathBuf,
    /// External edge maps, aligned with `--images`
    #[structopt(long, parse(from_os_str))]
    edges: Option<PathBuf>,
    /// External occlusion masks
    #[structopt(long, parse(from_os_str))]
    masks: Option<PathBuf>,
    /// The side of the square samples are resized to, 0 keeps the original size
    #[structopt(long, default_value = "256")]
    input_size: u32,
    /// Edge detector smoothing. -1 disables edges, 0 picks a random sigma
    /// in 1..=4 for every sample
    #[structopt(long, default_value = "2", allow_hyphen_values = true)]
    sigma: Sigma,
    /// Where edge maps come from: 'canny' (1) or 'external' (2)
    #[structopt(long, default_value = "canny")]
    edge: EdgeSource,
    /// How masks are produced: 'random-block' (1), 'half' (2), 'external' (3),
    /// 'external-or-block' (4), 'external-block-or-half' (5), 'aligned' (6)
    #[structopt(long, default_value = "external-or-block")]
    mask: MaskStrategy,
    /// Keep only the external edges that coincide with detected ones
    #[structopt(long)]
    nms: bool,
    /// 'train' or 'eval', evaluation always uses aligned masks
    #[structopt(long, default_value = "train")]
    mode: Mode,
    /// Disables random horizontal flips
    #[structopt(long)]
    no_augment: bool,
    /// Flips the auxiliary noise mask along with the rest of the sample
    #[structopt(long)]
    flip_noise_mask: bool,
    /// A seed value for the random generator, to get reproducible samples
    #[structopt(long, default_value = "0")]
    seed: u64,
    /// Hides the progress bar
    #[structopt(long)]
    no_progress: bool,
    #[structopt(subcommand)]
    cmd: Subcommand,
}

fn main() {
    if let Err(e) = real_main() {
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        std::process::exit(1);
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();
    init_logging();

    let dataset = Dataset::builder()
        .images(args.images)
        .inpainted(args.inpainted)
        .edges(args.edges)
        .masks(args.masks)
        .input_size(args.input_size)
        .sigma(args.sigma)
        .edge_source(args.edge)
        .mask_strategy(args.mask)
        .nms(args.nms)
        .mode(args.mode)
        .augment(!args.no_augment)
        .flip_noise_mask(args.flip_noise_mask)
        .build()?;
    tracing::info!(
        samples = dataset.len(),
        mode = %dataset.mode(),
        mask = %dataset.mask_strategy(),
        "dataset ready"
    );

    let mut rng = inpaint_dataset::seeded_rng(args.seed);

    match args.cmd {
        Subcommand::Inspect(inspect) => {
            let count = inspect.count.unwrap_or_else(|| dataset.len()).min(dataset.len());
            println!("{} samples", dataset.len());

            for index in 0..count {
                let sample = dataset.get(index, &mut rng)?;
                println!("{}", summarize(&dataset, index, &sample));
            }
        }
        Subcommand::Dump(dump) => {
            let end = match dump.count {
                Some(count) => dump.start.saturating_add(count).min(dataset.len()),
                None => dataset.len(),
            };
            let range = dump.start.min(end)..end;

            std::fs::create_dir_all(&dump.out)?;
            let progress = Progress::new(range.len(), !args.no_progress);

            for index in range {
                let sample = dataset.get(index, &mut rng)?;
                let stem = stem(&dataset, index);

                save_sample(&sample, &dump.out, &stem, dump.format)?;
                progress.sample_done(&stem);
            }
        }
    }

    Ok(())
}

/// The output file stem for a sample, prefixed with its index since the
/// same file name can appear in several directories of a list
fn stem(dataset: &Dataset, index: usize) -> String {
    let name = dataset
        .path(index)
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!("{:06}_{}", index, name)
}

fn summarize(dataset: &Dataset, index: usize, sample: &Sample) -> String {
    let (_, height, width) = sample.image.dim();
    let coverage = sample.mask.mean().unwrap_or(0.0);
    let edges = sample.edge.iter().filter(|&&v| v > 0.0).count();

    format!(
        "{:>6} {} {}x{} mask {:.1}% edge pixels {}",
        index,
        dataset.name(index).unwrap_or_default(),
        width,
        height,
        coverage * 100.0,
        edges
    )
}

fn save_sample(
    sample: &Sample,
    dir: &Path,
    stem: &str,
    (format, ext): (ImageFormat, &str),
) -> Result<(), Error> {
    let parts = [
        ("image", &sample.image),
        ("gray", &sample.gray),
        ("edge", &sample.edge),
        ("mask", &sample.mask),
        ("inpainted", &sample.inpainted),
        ("noise", &sample.noise),
    ];

    for (kind, t) in parts.iter() {
        if let Some(img) = tensor::to_image(t) {
            let path = dir.join(format!("{}_{}.{}", stem, kind, ext));
            img.save_with_format(&path, format)?;
        }
    }

    Ok(())
}
