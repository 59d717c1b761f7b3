// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `inpaint-dataset` prepares training and evaluation samples for edge guided
//! image inpainting models.
//!
//! For every source image, a sample bundles the image itself, its grayscale
//! version, a structural edge map, a synthesized occlusion mask, a
//! pre-inpainted reference image and an auxiliary noise mask, all as
//! `channels x height x width` tensors that share the same size and the same
//! random horizontal flip.
//!
//! First, you build a `Dataset` via a `DatasetBuilder`, which follows the
//! builder pattern. Calling `build` on the `DatasetBuilder` resolves all of
//! the file lists and checks the configuration for errors.
//!
//! `Dataset` has a `get()` method which assembles the sample at an index,
//! using the random number generator you pass to it for mask placement, edge
//! smoothing scales, flips and noise.
//!
//! ## Features
//!
//! 1. Random block, half image, and external masks, or a random mix of them
//! 2. Index aligned masks with auxiliary noise masks for reproducible evaluation
//! 3. Canny edges with random or fixed smoothing, or external edge maps
//! 4. Edges suppressed inside the occluded region during evaluation
//!
//! ## Usage
//!
//! ```no_run
//! let dataset = inpaint_dataset::Dataset::builder()
//!     // Set some parameters
//!     .input_size(256)
//!     .sigma(inpaint_dataset::Sigma::Random)
//!     // Specify the files
//!     .images("datasets/places2_train")
//!     .inpainted("datasets/places2_train_inpainted")
//!     .masks("datasets/irregular_masks")
//!     // Build the dataset
//!     .build().expect("failed to build dataset");
//!
//! let mut rng = inpaint_dataset::seeded_rng(10);
//! for index in 0..dataset.len() {
//!     let sample = dataset.get(index, &mut rng).expect("failed to load sample");
//!     assert_eq!(sample.image.dim().0, 3);
//! }
//! ```
pub mod canny;
pub mod dataset;
pub mod edge;
mod errors;
pub mod flist;
pub mod mask;
pub mod tensor;
mod utils;

pub use image;
pub use ndarray;

pub use dataset::{Batches, Dataset, DatasetBuilder, Mode, Sample};
pub use edge::{EdgeSource, EdgeSynthesizer, Sigma};
pub use errors::Error;
pub use flist::FileSource;
pub use mask::{MaskKind, MaskStrategy, MaskSynthesizer};
pub use tensor::Tensor;
pub use utils::{load_dynamic_image, resize_crop, ColorImage, GrayF32Image};

/// The random number generator used throughout tests and tools
pub type SampleRng = rand_pcg::Pcg32;

/// Creates a `SampleRng` from a seed
pub fn seeded_rng(seed: u64) -> SampleRng {
    use rand::SeedableRng;
    SampleRng::seed_from_u64(seed)
}

/// Simple dimensions struct
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
    pub(crate) fn from_tuple((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}
