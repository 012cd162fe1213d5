use crate::error::{PansharpenError, Result};
use crate::raster::{is_nodata, Extent, PixelType, Raster, RasterMetadata};
use clap::ValueEnum;
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Interpolation used when moving a raster onto another pixel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResampleMethod {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    #[value(name = "cubicspline")]
    CubicSpline,
    Lanczos,
    Average,
}

impl ResampleMethod {
    pub fn name(self) -> &'static str {
        match self {
            ResampleMethod::Nearest => "nearest",
            ResampleMethod::Bilinear => "bilinear",
            ResampleMethod::Cubic => "cubic",
            ResampleMethod::CubicSpline => "cubicspline",
            ResampleMethod::Lanczos => "lanczos",
            ResampleMethod::Average => "average",
        }
    }

    /// Kernel half-width in source pixels, for the convolution methods
    fn support(self) -> Option<i64> {
        match self {
            ResampleMethod::Bilinear => Some(1),
            ResampleMethod::Cubic | ResampleMethod::CubicSpline => Some(2),
            ResampleMethod::Lanczos => Some(3),
            ResampleMethod::Nearest | ResampleMethod::Average => None,
        }
    }

    fn kernel(self, t: f64) -> f64 {
        let t = t.abs();
        match self {
            ResampleMethod::Bilinear => (1.0 - t).max(0.0),
            ResampleMethod::Cubic => {
                // Keys cubic convolution, a = -0.5
                let a = -0.5;
                if t <= 1.0 {
                    (a + 2.0) * t.powi(3) - (a + 3.0) * t.powi(2) + 1.0
                } else if t < 2.0 {
                    a * t.powi(3) - 5.0 * a * t.powi(2) + 8.0 * a * t - 4.0 * a
                } else {
                    0.0
                }
            }
            ResampleMethod::CubicSpline => {
                if t < 1.0 {
                    (4.0 - 6.0 * t.powi(2) + 3.0 * t.powi(3)) / 6.0
                } else if t < 2.0 {
                    (2.0 - t).powi(3) / 6.0
                } else {
                    0.0
                }
            }
            ResampleMethod::Lanczos => {
                if t < 1e-12 {
                    1.0
                } else if t < 3.0 {
                    let sinc = |x: f64| (PI * x).sin() / (PI * x);
                    sinc(t) * sinc(t / 3.0)
                } else {
                    0.0
                }
            }
            ResampleMethod::Nearest | ResampleMethod::Average => 0.0,
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResampleMethod {
    type Err = PansharpenError;

    fn from_str(s: &str) -> Result<Self> {
        <ResampleMethod as ValueEnum>::from_str(s, true).map_err(|_| {
            PansharpenError::InvalidArgument(format!("unknown resampling method: {}", s))
        })
    }
}

/// Destination pixel grid for resampling
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
}

impl GridSpec {
    pub fn of(metadata: &RasterMetadata) -> Self {
        Self {
            width: metadata.width,
            height: metadata.height,
            geotransform: metadata.geotransform,
        }
    }
}

/// Source taps and weights contributing to one destination row or column
type Taps = Vec<(usize, f64)>;

/// Compute the source taps for every destination index along one axis.
///
/// Coordinates are expressed in source pixel units, where pixel `i` spans `[i, i + 1)`.
fn axis_taps(
    method: ResampleMethod,
    dst_len: usize,
    dst_origin: f64,
    dst_step: f64,
    src_origin: f64,
    src_step: f64,
    src_len: usize,
) -> Vec<Taps> {
    let last = src_len as i64 - 1;
    let clamp = |i: i64| i.clamp(0, last) as usize;
    let to_src = |coord: f64| (coord - src_origin) / src_step;

    (0..dst_len)
        .map(|i| {
            let center = to_src(dst_origin + (i as f64 + 0.5) * dst_step);
            let nearest = vec![(clamp(center.floor() as i64), 1.0)];

            match method {
                ResampleMethod::Nearest => nearest,
                ResampleMethod::Average => {
                    let a = to_src(dst_origin + i as f64 * dst_step);
                    let b = to_src(dst_origin + (i + 1) as f64 * dst_step);
                    let (u0, u1) = (a.min(b), a.max(b));

                    let first = (u0.floor() as i64).max(0);
                    let end = (u1.ceil() as i64).min(src_len as i64);
                    let taps: Taps = (first..end)
                        .filter_map(|c| {
                            let overlap = u1.min(c as f64 + 1.0) - u0.max(c as f64);
                            (overlap > 0.0).then_some((c as usize, overlap))
                        })
                        .collect();

                    if taps.is_empty() {
                        nearest
                    } else {
                        taps
                    }
                }
                _ => {
                    let support = method.support().unwrap_or(1);
                    let centered = center - 0.5;
                    let base = centered.floor() as i64;
                    ((base - support + 1)..=(base + support))
                        .filter_map(|j| {
                            let weight = method.kernel(centered - j as f64);
                            (weight != 0.0).then_some((clamp(j), weight))
                        })
                        .collect()
                }
            }
        })
        .collect()
}

fn resample_band(
    band: &Array2<f64>,
    nodata: Option<f64>,
    row_taps: &[Taps],
    col_taps: &[Taps],
) -> Array2<f64> {
    Array2::from_shape_fn((row_taps.len(), col_taps.len()), |(row, col)| {
        let mut acc = 0.0;
        let mut weight_sum = 0.0;

        for &(src_row, wy) in &row_taps[row] {
            for &(src_col, wx) in &col_taps[col] {
                let value = band[[src_row, src_col]];
                if value.is_nan() || is_nodata(value, nodata) {
                    continue;
                }
                let weight = wy * wx;
                acc += weight * value;
                weight_sum += weight;
            }
        }

        // NaN marks a destination pixel without any valid source sample
        if weight_sum.abs() > 1e-12 {
            acc / weight_sum
        } else {
            f64::NAN
        }
    })
}

/// Resample every band of `raster` onto `grid`.
///
/// Destination pixels with no valid source sample are returned as `NaN`.
pub fn resample_to_grid(
    raster: &Raster,
    grid: &GridSpec,
    method: ResampleMethod,
) -> Result<Vec<Array2<f64>>> {
    if grid.width == 0 || grid.height == 0 {
        return Err(PansharpenError::InvalidArgument(format!(
            "destination grid has invalid dimensions: {}x{}",
            grid.width, grid.height
        )));
    }

    let metadata = raster.metadata();
    // Both extents are computed to reject rotated transforms up front
    metadata.extent()?;
    Extent::from_geotransform(&grid.geotransform, grid.width, grid.height)?;

    let src_gt = &metadata.geotransform;
    let dst_gt = &grid.geotransform;

    let col_taps = axis_taps(
        method,
        grid.width,
        dst_gt[0],
        dst_gt[1],
        src_gt[0],
        src_gt[1],
        metadata.width,
    );
    let row_taps = axis_taps(
        method,
        grid.height,
        dst_gt[3],
        dst_gt[5],
        src_gt[3],
        src_gt[5],
        metadata.height,
    );

    debug!(
        "Resampling {} band(s) {}x{} -> {}x{} ({})",
        raster.band_count(),
        metadata.width,
        metadata.height,
        grid.width,
        grid.height,
        method
    );

    let nodata = metadata.nodata;
    let bands = raster
        .bands()
        .par_iter()
        .map(|band| resample_band(band, nodata, &row_taps, &col_taps))
        .collect();

    Ok(bands)
}

/// Replace interpolation gaps with nodata (or zero) and fit values to the pixel type
fn finalize_band(mut band: Array2<f64>, pixel_type: PixelType, nodata: Option<f64>) -> Array2<f64> {
    band.mapv_inplace(|value| {
        if value.is_nan() {
            nodata.unwrap_or(0.0)
        } else {
            pixel_type.clamp_value(value)
        }
    });
    band
}

/// Resample a raster onto `grid`, keeping its pixel type, projection and nodata.
///
/// On a grid aligned with the source, nearest-neighbour resampling is an exact crop.
pub fn resample_onto(raster: &Raster, grid: GridSpec, method: ResampleMethod) -> Result<Raster> {
    let bands = resample_to_grid(raster, &grid, method)?;
    let source = raster.metadata();

    let metadata = RasterMetadata::new(
        grid.width,
        grid.height,
        grid.geotransform,
        source.projection.clone(),
        source.nodata,
        source.pixel_type,
    );
    let bands = bands
        .into_iter()
        .map(|band| finalize_band(band, source.pixel_type, source.nodata))
        .collect();

    Raster::new(bands, metadata)
}

/// Resample a raster to `width` x `height` pixels over its own extent
pub fn resample(
    raster: &Raster,
    width: usize,
    height: usize,
    method: ResampleMethod,
) -> Result<Raster> {
    if width == 0 || height == 0 {
        return Err(PansharpenError::InvalidArgument(format!(
            "target size must be positive, got {}x{}",
            width, height
        )));
    }

    let extent = raster.extent()?;
    let gt = raster.metadata().geotransform;
    let geotransform = [
        gt[0],
        extent.width() / width as f64 * gt[1].signum(),
        0.0,
        gt[3],
        0.0,
        extent.height() / height as f64 * gt[5].signum(),
    ];

    resample_onto(raster, GridSpec { width, height, geotransform }, method)
}

/// Resample a raster to square cells of `cell_size` map units
pub fn resize(raster: &Raster, cell_size: f64, method: ResampleMethod) -> Result<Raster> {
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(PansharpenError::InvalidArgument(format!(
            "cell size must be positive, got {}",
            cell_size
        )));
    }

    let extent = raster.extent()?;
    let width = ((extent.width() / cell_size).round() as usize).max(1);
    let height = ((extent.height() / cell_size).round() as usize).max(1);

    info!(
        "Resizing {}x{} -> {}x{} (cell size {}, {})",
        raster.width(),
        raster.height(),
        width,
        height,
        cell_size,
        method
    );

    let gt = raster.metadata().geotransform;
    let geotransform = [
        gt[0],
        cell_size * gt[1].signum(),
        0.0,
        gt[3],
        0.0,
        cell_size * gt[5].signum(),
    ];

    resample_onto(raster, GridSpec { width, height, geotransform }, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn raster(bands: Vec<Array2<f64>>, pixel: f64, nodata: Option<f64>) -> Raster {
        let (height, width) = bands[0].dim();
        let metadata = RasterMetadata::new(
            width,
            height,
            [0.0, pixel, 0.0, height as f64 * pixel, 0.0, -pixel],
            "",
            nodata,
            PixelType::Float32,
        );
        Raster::new(bands, metadata).unwrap()
    }

    #[test]
    fn test_nearest_upsample_replicates() {
        let source = raster(vec![arr2(&[[1.0, 2.0], [3.0, 4.0]])], 2.0, None);
        let result = resample(&source, 4, 4, ResampleMethod::Nearest).unwrap();
        let band = result.band(0).unwrap();

        assert_eq!(
            band,
            &arr2(&[
                [1.0, 1.0, 2.0, 2.0],
                [1.0, 1.0, 2.0, 2.0],
                [3.0, 3.0, 4.0, 4.0],
                [3.0, 3.0, 4.0, 4.0],
            ])
        );
        assert_eq!(result.metadata().pixel_width, 1.0);
    }

    #[test]
    fn test_kernels_preserve_constant_field() {
        let source = raster(vec![Array2::from_elem((3, 3), 7.0)], 3.0, None);
        for method in [
            ResampleMethod::Bilinear,
            ResampleMethod::Cubic,
            ResampleMethod::CubicSpline,
            ResampleMethod::Lanczos,
            ResampleMethod::Average,
        ] {
            let result = resample(&source, 9, 9, method).unwrap();
            for &value in result.band(0).unwrap().iter() {
                assert_abs_diff_eq!(value, 7.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_bilinear_interpolates_between_centres() {
        let source = raster(vec![arr2(&[[0.0, 10.0]])], 2.0, None);
        let result = resample(&source, 4, 1, ResampleMethod::Bilinear).unwrap();
        let band = result.band(0).unwrap();

        // Destination centres at 0.25, 0.75, 1.25, 1.75 in source units
        assert_abs_diff_eq!(band[[0, 0]], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(band[[0, 1]], 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(band[[0, 2]], 7.5, epsilon = 1e-9);
        assert_abs_diff_eq!(band[[0, 3]], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_average_downsample() {
        let source = raster(
            vec![arr2(&[
                [1.0, 3.0, 5.0, 5.0],
                [1.0, 3.0, 5.0, 5.0],
                [0.0, 0.0, 2.0, 2.0],
                [0.0, 4.0, 2.0, 2.0],
            ])],
            1.0,
            None,
        );
        let result = resample(&source, 2, 2, ResampleMethod::Average).unwrap();
        assert_eq!(result.band(0).unwrap(), &arr2(&[[2.0, 5.0], [1.0, 2.0]]));
    }

    #[test]
    fn test_nodata_excluded_from_average() {
        let source = raster(
            vec![arr2(&[[-9999.0, 4.0], [2.0, -9999.0]])],
            1.0,
            Some(-9999.0),
        );
        let result = resample(&source, 1, 1, ResampleMethod::Average).unwrap();
        assert_eq!(result.band(0).unwrap()[[0, 0]], 3.0);
    }

    #[test]
    fn test_all_nodata_becomes_nodata() {
        let source = raster(vec![Array2::from_elem((2, 2), -1.0)], 1.0, Some(-1.0));
        let result = resample(&source, 4, 4, ResampleMethod::Bilinear).unwrap();
        assert!(result.band(0).unwrap().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_resize_cell_size() {
        let source = raster(vec![Array2::zeros((10, 20))], 30.0, None);
        let result = resize(&source, 60.0, ResampleMethod::Nearest).unwrap();
        assert_eq!(result.width(), 10);
        assert_eq!(result.height(), 5);
        assert_eq!(result.metadata().geotransform[1], 60.0);
        assert_eq!(result.metadata().geotransform[5], -60.0);
    }

    #[test]
    fn test_resize_rounds_partial_cells() {
        // 300 / 70 = 4.29 and 150 / 70 = 2.14
        let source = raster(vec![Array2::from_elem((5, 10), 3.0)], 30.0, None);
        let result = resize(&source, 70.0, ResampleMethod::Average).unwrap();
        assert_eq!((result.width(), result.height()), (4, 2));

        // 300 / 80 = 3.75 rounds up
        let result = resize(&source, 80.0, ResampleMethod::Nearest).unwrap();
        assert_eq!(result.width(), 4);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let source = raster(vec![Array2::zeros((2, 2))], 1.0, None);
        assert!(matches!(
            resample(&source, 0, 2, ResampleMethod::Nearest),
            Err(PansharpenError::InvalidArgument(_))
        ));
        assert!(matches!(
            resize(&source, 0.0, ResampleMethod::Nearest),
            Err(PansharpenError::InvalidArgument(_))
        ));
        assert!(matches!(
            resize(&source, -5.0, ResampleMethod::Nearest),
            Err(PansharpenError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("cubicspline".parse::<ResampleMethod>().unwrap(), ResampleMethod::CubicSpline);
        assert_eq!("Nearest".parse::<ResampleMethod>().unwrap(), ResampleMethod::Nearest);
        assert!("bicubic".parse::<ResampleMethod>().is_err());
    }
}
