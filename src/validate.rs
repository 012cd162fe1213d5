use crate::error::{PansharpenError, Result};
use crate::io::{validate_compression, validate_tile_size};
use crate::pipeline::{PansharpenRequest, ResizeRequest};
use std::fmt;
use std::path::Path;

/// A problem with one user-supplied parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a request, so they can be fixed in one go
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<FieldIssue>,
}

impl ValidationReport {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_issue(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PansharpenError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn check_input(report: &mut ValidationReport, field: &'static str, path: &Path) {
    if !path.exists() {
        report.push(field, format!("{} does not exist", path.display()));
    }
    if !has_extension(path, &["tif", "tiff"]) {
        report.push(field, format!("{} is not a GeoTIFF file", path.display()));
    }
}

fn check_output(report: &mut ValidationReport, field: &'static str, path: &Path, inputs: &[&Path]) {
    if !has_extension(path, &["tif"]) {
        report.push(field, format!("{} is not a GeoTIFF (.tif) file", path.display()));
    }

    let in_geodatabase = path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| name.to_ascii_lowercase().ends_with(".gdb"))
            .unwrap_or(false)
    });
    if in_geodatabase {
        report.push(field, "the output file cannot be saved in a geodatabase (.gdb)");
    }

    if inputs.iter().any(|input| *input == path) {
        report.push(field, "the output would overwrite an input");
    }
}

fn check_output_options(report: &mut ValidationReport, compression: &str, tile_size: Option<usize>) {
    if let Err(e) = validate_compression(compression) {
        report.push("compress", e.to_string());
    }
    if let Some(Err(e)) = tile_size.map(validate_tile_size) {
        report.push("tile_size", e.to_string());
    }
}

/// Check every field of a pansharpening request before any raster is opened
pub fn validate_pansharpen_request(request: &PansharpenRequest) -> Result<()> {
    let mut report = ValidationReport::default();

    check_input(&mut report, "reference", &request.reference_path);
    check_input(&mut report, "target", &request.target_path);
    check_output(
        &mut report,
        "output",
        &request.output_path,
        &[&request.reference_path, &request.target_path],
    );

    if let Some(weights) = &request.weights {
        if weights.is_empty() {
            report.push("weights", "at least one weight is required");
        } else if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            report.push("weights", "weights must be non-negative numbers");
        } else if weights.iter().sum::<f64>() <= 0.0 {
            report.push("weights", "weights must have a positive sum");
        }
    }

    if let Some(nodata) = request.nodata_override {
        if nodata.is_infinite() {
            report.push("nodata", "nodata must be a finite number or NaN");
        }
    }

    check_output_options(&mut report, &request.output.compression, request.output.tile_size);

    report.into_result()
}

/// Check every field of a resize request before the raster is opened
pub fn validate_resize_request(request: &ResizeRequest) -> Result<()> {
    let mut report = ValidationReport::default();

    check_input(&mut report, "input", &request.input_path);
    check_output(&mut report, "output", &request.output_path, &[&request.input_path]);

    if !request.cell_size.is_finite() || request.cell_size <= 0.0 {
        report.push("cell_size", "zero or negative cell size value is invalid");
    }

    check_output_options(&mut report, &request.output.compression, request.output.tile_size);

    report.into_result()
}
