use crate::error::{PansharpenError, Result};
use crate::raster::{is_nodata, Extent, PixelType, Raster, RasterMetadata};
use crate::resample::{resample_to_grid, GridSpec, ResampleMethod};
use log::{debug, info, warn};
use ndarray::{s, Array2};

/// Tolerance, in pixels, when snapping an extent onto the reference grid
const SNAP_EPSILON: f64 = 1e-6;

/// Window of the reference grid that falls inside the overlap of both inputs
#[derive(Debug, Clone, PartialEq)]
struct OutputWindow {
    col_start: usize,
    col_end: usize,
    row_start: usize,
    row_end: usize,
    grid: GridSpec,
}

impl OutputWindow {
    fn is_full(&self, metadata: &RasterMetadata) -> bool {
        self.col_start == 0
            && self.row_start == 0
            && self.col_end == metadata.width
            && self.row_end == metadata.height
    }
}

/// Check the optional weights against the band count, defaulting to a uniform mean
fn resolve_weights(weights: Option<&[f64]>, band_count: usize) -> Result<Vec<f64>> {
    if band_count == 0 {
        return Err(PansharpenError::InvalidArgument(
            "target raster has no bands".to_string(),
        ));
    }

    let weights = match weights {
        None => return Ok(vec![1.0; band_count]),
        Some(weights) => weights,
    };

    if weights.len() != band_count {
        return Err(PansharpenError::InvalidArgument(format!(
            "got {} weights for {} target bands",
            weights.len(),
            band_count
        )));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(PansharpenError::InvalidArgument(format!(
            "weights must be finite and non-negative, got {}",
            bad
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(PansharpenError::InvalidArgument(
            "weights must have a positive sum".to_string(),
        ));
    }

    Ok(weights.to_vec())
}

/// Index range `[start, end)` of the pixels between `a` and `b` along one axis
fn axis_window(a: f64, b: f64, origin: f64, step: f64, len: usize) -> (usize, usize) {
    let (lo, hi) = {
        let (u, v) = ((a - origin) / step, (b - origin) / step);
        (u.min(v), v.max(u))
    };
    let start = (lo + SNAP_EPSILON).floor().max(0.0) as usize;
    let end = ((hi - SNAP_EPSILON).ceil().max(0.0) as usize).min(len);
    (start.min(len), end)
}

fn output_window(reference: &RasterMetadata, overlap: &Extent) -> Result<OutputWindow> {
    let gt = reference.geotransform;
    let (col_start, col_end) =
        axis_window(overlap.min_x, overlap.max_x, gt[0], gt[1], reference.width);
    let (row_start, row_end) =
        axis_window(overlap.min_y, overlap.max_y, gt[3], gt[5], reference.height);

    if col_end <= col_start || row_end <= row_start {
        return Err(PansharpenError::GeometryMismatch(
            "overlap of the inputs is smaller than one reference pixel".to_string(),
        ));
    }

    let geotransform = [
        gt[0] + col_start as f64 * gt[1],
        gt[1],
        0.0,
        gt[3] + row_start as f64 * gt[5],
        0.0,
        gt[5],
    ];

    Ok(OutputWindow {
        col_start,
        col_end,
        row_start,
        row_end,
        grid: GridSpec {
            width: col_end - col_start,
            height: row_end - row_start,
            geotransform,
        },
    })
}

/// Reject a nodata marker that would not survive being written as `pixel_type`
fn check_nodata_fits(nodata: Option<f64>, pixel_type: PixelType) -> Result<()> {
    let Some(nd) = nodata else {
        return Ok(());
    };
    let representable = if nd.is_nan() {
        !pixel_type.is_integer()
    } else {
        pixel_type.clamp_value(nd) == nd
    };
    if !representable {
        return Err(PansharpenError::InvalidArgument(format!(
            "nodata value {} cannot be stored as {}",
            nd,
            pixel_type.name()
        )));
    }
    Ok(())
}

/// Output type for a given reference type; 64-bit integers do not fit the `f64`
/// accumulator and are promoted to `Float64`
fn output_pixel_type(reference: PixelType) -> PixelType {
    if reference.fits_f64_accumulator() {
        reference
    } else {
        warn!(
            "Reference pixel type {} cannot be represented exactly in the accumulator, writing Float64",
            reference.name()
        );
        PixelType::Float64
    }
}

/// Pansharpen `target` with `reference` using nearest-neighbour resampling.
///
/// See [`fuse_with_method`].
pub fn fuse(reference: &Raster, target: &Raster, weights: Option<&[f64]>) -> Result<Raster> {
    fuse_with_method(reference, target, weights, ResampleMethod::Nearest)
}

/// Simple-mean pansharpening.
///
/// The target bands are resampled onto the reference grid (restricted to the overlap
/// of both inputs). A pseudo-reference is formed as the weighted mean of the
/// resampled bands, and every band is scaled by `reference / pseudo`. Where the
/// pseudo-reference is zero the gain is zero. Results are rounded and clamped to
/// the reference pixel type.
///
/// Pixels where the reference is nodata, or where a target band has no valid sample,
/// are written as the reference nodata value (or zero when it has none). The nodata
/// value must be representable in the output pixel type. With a nodata of zero, valid
/// zero-gain pixels are indistinguishable from nodata once written.
pub fn fuse_with_method(
    reference: &Raster,
    target: &Raster,
    weights: Option<&[f64]>,
    method: ResampleMethod,
) -> Result<Raster> {
    if reference.band_count() != 1 {
        return Err(PansharpenError::InvalidArgument(format!(
            "reference must have exactly one band, got {}",
            reference.band_count()
        )));
    }
    let weights = resolve_weights(weights, target.band_count())?;
    let weight_sum: f64 = weights.iter().sum();

    let ref_meta = reference.metadata();
    let target_meta = target.metadata();

    let overlap = reference
        .extent()?
        .intersection(&target.extent()?)
        .ok_or_else(|| {
            PansharpenError::GeometryMismatch(
                "reference and target extents do not overlap".to_string(),
            )
        })?;

    if ref_meta.pixel_width >= target_meta.pixel_width
        || ref_meta.pixel_height >= target_meta.pixel_height
    {
        warn!(
            "Reference pixels ({:.6} x {:.6}) are not finer than target pixels ({:.6} x {:.6})",
            ref_meta.pixel_width,
            ref_meta.pixel_height,
            target_meta.pixel_width,
            target_meta.pixel_height
        );
    }

    let window = output_window(ref_meta, &overlap)?;
    if !window.is_full(ref_meta) {
        warn!(
            "Inputs overlap partially, fusing a {}x{} window of the {}x{} reference",
            window.grid.width, window.grid.height, ref_meta.width, ref_meta.height
        );
    }

    let output_type = output_pixel_type(ref_meta.pixel_type);
    let ref_nodata = ref_meta.nodata;
    check_nodata_fits(ref_nodata, output_type)?;
    let fill = ref_nodata.unwrap_or(0.0);

    info!(
        "Fusing {} band(s) onto a {}x{} grid ({} resampling, weights {:?})",
        target.band_count(),
        window.grid.width,
        window.grid.height,
        method,
        weights
    );

    let resampled = resample_to_grid(target, &window.grid, method)?;
    let ref_band = reference
        .band(0)
        .ok_or_else(|| PansharpenError::InvalidArgument("reference has no band".to_string()))?
        .slice(s![window.row_start..window.row_end, window.col_start..window.col_end]);

    let shape = (window.grid.height, window.grid.width);
    let mut fused: Vec<Array2<f64>> = resampled.iter().map(|_| Array2::zeros(shape)).collect();
    let mut samples = vec![0.0; resampled.len()];
    let mut zero_gain_pixels = 0usize;

    for ((row, col), &ref_value) in ref_band.indexed_iter() {
        for (sample, band) in samples.iter_mut().zip(&resampled) {
            *sample = band[[row, col]];
        }

        let masked = ref_value.is_nan()
            || is_nodata(ref_value, ref_nodata)
            || samples.iter().any(|v| v.is_nan());
        if masked {
            for band in fused.iter_mut() {
                band[[row, col]] = fill;
            }
            continue;
        }

        let pseudo = samples
            .iter()
            .zip(&weights)
            .map(|(value, weight)| value * weight)
            .sum::<f64>()
            / weight_sum;

        // Degenerate pseudo-reference (or an overflowing ratio) yields zero gain
        let gain = if pseudo == 0.0 {
            0.0
        } else {
            let ratio = ref_value / pseudo;
            if ratio.is_finite() {
                ratio
            } else {
                0.0
            }
        };
        if gain == 0.0 {
            zero_gain_pixels += 1;
        }

        for (band, value) in fused.iter_mut().zip(&samples) {
            band[[row, col]] = output_type.clamp_value(value * gain);
        }
    }

    debug!("{} pixel(s) had zero gain", zero_gain_pixels);
    if zero_gain_pixels > 0 && ref_nodata == Some(0.0) {
        warn!(
            "{} zero-gain pixel(s) share the nodata value 0 and will read back as nodata",
            zero_gain_pixels
        );
    }

    let metadata = RasterMetadata::new(
        window.grid.width,
        window.grid.height,
        window.grid.geotransform,
        ref_meta.projection.clone(),
        ref_nodata,
        output_type,
    );

    Raster::new(fused, metadata)
}
