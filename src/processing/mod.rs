//! Per-file image pipeline: format detection, validation, scaling and encoding

pub mod codec;
pub mod formats;
pub mod resize;
pub mod task;
pub mod validation;

pub use codec::{ImageCodec, ImageCrateCodec};
pub use formats::{has_supported_extension, output_path_for, InputFormat, OUTPUT_EXTENSION};
pub use resize::{scaled_dimensions, validate_scale, FilterType};
pub use task::{ImageJob, JobFailure, JobOutcome, JobResult, ResizeTask};
pub use validation::ImageValidator;
