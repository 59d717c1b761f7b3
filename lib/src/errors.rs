use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f32,
    pub(crate) max: f32,
    pub(crate) value: f32,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub struct SizeMismatch {
    pub(crate) name: &'static str,
    pub(crate) expected: (u32, u32),
    pub(crate) actual: (u32, u32),
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the {} is {}x{}, but the image it is paired with is {}x{}",
            self.name, self.actual.0, self.actual.1, self.expected.0, self.expected.1
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to save
    Image(image::ImageError),
    /// A file in one of the lists could not be read or decoded
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// Two arrays that make up a sample do not share the same dimensions
    SizeMismatch(SizeMismatch),
    /// A file list the configuration depends on resolved to no files at all
    EmptyPool(&'static str),
    /// A positional lookup went past the end of a file list that is expected
    /// to be aligned with the main image list
    IndexOutOfRange {
        list: &'static str,
        index: usize,
        len: usize,
    },
    /// The batch size is zero or larger than the dataset
    InvalidBatchSize(usize, usize),
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) | Self::Decode { source: err, .. } => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::Decode { path, source } => {
                write!(f, "failed to load '{}': {}", path.display(), source)
            }
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::SizeMismatch(sm) => write!(f, "{}", sm),
            Self::EmptyPool(list) => write!(
                f,
                "the {} list is required by the configuration, but contains no files",
                list
            ),
            Self::IndexOutOfRange { list, index, len } => write!(
                f,
                "index {} is out of range for the {} list, which only has {} file(s)",
                index, list, len
            ),
            Self::InvalidBatchSize(batch, len) => write!(
                f,
                "a batch size of {} is invalid for a dataset of {} sample(s)",
                batch, len
            ),
            Self::Io(io) => write!(f, "{}", io),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}
