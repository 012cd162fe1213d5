use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationReport;

#[derive(Error, Debug)]
pub enum PansharpenError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Invalid tile size: {0} (must be multiple of 16)")]
    InvalidTileSize(usize),

    #[error("Invalid parameters:\n{0}")]
    Validation(ValidationReport),
}

pub type Result<T> = std::result::Result<T, PansharpenError>;
