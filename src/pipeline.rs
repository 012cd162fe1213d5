use crate::crs::check_spatial_references;
use crate::error::Result;
use crate::fusion::fuse_with_method;
use crate::io::{open_raster, remove_raster, write_raster, write_statistics, OutputOptions};
use crate::overview::{build_overviews, OverviewMethod};
use crate::raster::Raster;
use crate::resample::{resample_onto, resize, GridSpec, ResampleMethod};
use crate::stack::stack;
use crate::stats::compute_stats;
use crate::validate::{validate_pansharpen_request, validate_resize_request};
use log::info;
use std::path::{Path, PathBuf};

/// Everything needed for one pansharpening run
#[derive(Debug, Clone, PartialEq)]
pub struct PansharpenRequest {
    pub reference_path: PathBuf,
    pub target_path: PathBuf,
    pub output_path: PathBuf,
    pub weights: Option<Vec<f64>>,
    pub resampling_method: ResampleMethod,
    pub stack: bool,
    pub compute_stats: bool,
    pub build_overviews: bool,
    pub overview_method: OverviewMethod,
    /// Overrides the reference band's own nodata value
    pub nodata_override: Option<f64>,
    pub output: OutputOptions,
}

/// Everything needed to resample one raster to a new cell size
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub cell_size: f64,
    pub resampling_method: ResampleMethod,
    pub compute_stats: bool,
    pub build_overviews: bool,
    pub overview_method: OverviewMethod,
    pub output: OutputOptions,
}

/// `<dir>/<stem>_stacked.tif` next to the fused output
pub fn stacked_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}_stacked.tif", stem))
}

/// Statistics and overviews on a finished output file
fn post_process(
    path: &Path,
    raster: &Raster,
    compute: bool,
    overviews: bool,
    overview_method: OverviewMethod,
) -> Result<()> {
    if compute {
        info!("Calculating statistics");
        write_statistics(path, &compute_stats(raster))?;
    }
    if overviews {
        build_overviews(path, overview_method)?;
    }
    Ok(())
}

/// Fuse the target with the reference and write the result.
///
/// Returns the path of the final file: the stacked raster when stacking was
/// requested (the intermediate fused file is removed), otherwise the fused raster.
pub fn run_pansharpen(request: &PansharpenRequest) -> Result<PathBuf> {
    validate_pansharpen_request(request)?;

    let mut reference = open_raster(&request.reference_path)?;
    if let Some(nodata) = request.nodata_override {
        info!("Using nodata value: {}", nodata);
        reference = reference.with_nodata(Some(nodata));
    }
    let target = open_raster(&request.target_path)?;

    check_spatial_references(
        &reference.metadata().projection,
        &target.metadata().projection,
    );

    let fused = fuse_with_method(
        &reference,
        &target,
        request.weights.as_deref(),
        request.resampling_method,
    )?;
    write_raster(&request.output_path, &fused, &request.output)?;

    if !request.stack {
        post_process(
            &request.output_path,
            &fused,
            request.compute_stats,
            request.build_overviews,
            request.overview_method,
        )?;
        return Ok(request.output_path.clone());
    }

    // The fused grid may be a window of the reference grid; crop the reference to it
    let aligned_reference = resample_onto(
        &reference,
        GridSpec::of(fused.metadata()),
        ResampleMethod::Nearest,
    )?;
    let stacked = stack(&aligned_reference, &fused)?;

    let stacked_path = stacked_output_path(&request.output_path);
    write_raster(&stacked_path, &stacked, &request.output)?;
    remove_raster(&request.output_path)?;

    post_process(
        &stacked_path,
        &stacked,
        request.compute_stats,
        request.build_overviews,
        request.overview_method,
    )?;
    Ok(stacked_path)
}

/// Resample a raster to a new cell size and write the result
pub fn run_resize(request: &ResizeRequest) -> Result<PathBuf> {
    validate_resize_request(request)?;

    let input = open_raster(&request.input_path)?;
    let resized = resize(&input, request.cell_size, request.resampling_method)?;
    write_raster(&request.output_path, &resized, &request.output)?;

    post_process(
        &request.output_path,
        &resized,
        request.compute_stats,
        request.build_overviews,
        request.overview_method,
    )?;
    Ok(request.output_path.clone())
}
