//! Resolution of the various ways a list of files can be specified.

use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Where a list of files comes from
#[derive(Clone, Debug)]
pub enum FileSource {
    /// No files at all
    None,
    /// The paths are already known
    List(Vec<PathBuf>),
    /// A directory of images, a single image, or a text file listing one
    /// path per line
    Path(PathBuf),
}

impl Default for FileSource {
    fn default() -> Self {
        Self::None
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for FileSource {
    fn from(list: Vec<PathBuf>) -> Self {
        Self::List(list)
    }
}

impl<T: Into<FileSource>> From<Option<T>> for FileSource {
    fn from(src: Option<T>) -> Self {
        src.map_or(Self::None, Into::into)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Resolves a `FileSource` into an ordered list of paths.
///
/// * Directories yield their `jpg` and `png` files, sorted.
/// * Image files yield themselves.
/// * Any other file is read as a list of paths, one per line. If it can't be
///   read as text, it yields itself.
/// * Paths that don't exist yield nothing.
pub fn load(src: FileSource) -> Vec<PathBuf> {
    let path = match src {
        FileSource::None => return Vec::new(),
        FileSource::List(list) => return list,
        FileSource::Path(path) => path,
    };

    if path.is_dir() {
        let mut files: Vec<_> = match std::fs::read_dir(&path) {
            Ok(rd) => rd
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && matches!(
                            p.extension().and_then(|ext| ext.to_str()),
                            Some("jpg") | Some("png")
                        )
                })
                .collect(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unable to read directory");
                Vec::new()
            }
        };

        files.sort();
        return files;
    }

    if path.is_file() {
        if has_image_extension(&path) {
            return vec![path];
        }

        return match std::fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(_) => vec![path],
        };
    }

    Vec::new()
}
