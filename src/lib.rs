// Library exports for testing and reuse

pub mod cli;
pub mod crs;
pub mod error;
pub mod fusion;
pub mod io;
pub mod overview;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod stack;
pub mod stats;
pub mod validate;

// Re-export commonly used types
pub use error::{PansharpenError, Result};
pub use fusion::{fuse, fuse_with_method};
pub use io::{open_raster, read_band, write_raster, OutputOptions};
pub use pipeline::{run_pansharpen, run_resize, PansharpenRequest, ResizeRequest};
pub use raster::{PixelType, Raster, RasterMetadata};
pub use resample::{resample, resize, ResampleMethod};
pub use stack::stack;
pub use stats::compute_stats;
