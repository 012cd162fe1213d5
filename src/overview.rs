use crate::error::{PansharpenError, Result};
use crate::io::open_for_update;
use clap::ValueEnum;
use gdal::Metadata;
use log::{debug, info};
use std::fmt;
use std::path::Path;

/// Decimation factors of the overview levels
pub const OVERVIEW_FACTORS: [usize; 4] = [2, 4, 8, 16];

/// Metadata domain holding the overview resampling tag
pub const OVERVIEW_TAG_DOMAIN: &str = "rio_overview";

/// Resampling accepted by GDAL's overview builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OverviewMethod {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    #[value(name = "cubic_spline")]
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Gauss,
    Rms,
}

impl OverviewMethod {
    pub fn name(self) -> &'static str {
        match self {
            OverviewMethod::Nearest => "nearest",
            OverviewMethod::Bilinear => "bilinear",
            OverviewMethod::Cubic => "cubic",
            OverviewMethod::CubicSpline => "cubic_spline",
            OverviewMethod::Lanczos => "lanczos",
            OverviewMethod::Average => "average",
            OverviewMethod::Mode => "mode",
            OverviewMethod::Gauss => "gauss",
            OverviewMethod::Rms => "rms",
        }
    }

    pub fn gdal_name(self) -> &'static str {
        match self {
            OverviewMethod::Nearest => "NEAREST",
            OverviewMethod::Bilinear => "BILINEAR",
            OverviewMethod::Cubic => "CUBIC",
            OverviewMethod::CubicSpline => "CUBICSPLINE",
            OverviewMethod::Lanczos => "LANCZOS",
            OverviewMethod::Average => "AVERAGE",
            OverviewMethod::Mode => "MODE",
            OverviewMethod::Gauss => "GAUSS",
            OverviewMethod::Rms => "RMS",
        }
    }
}

impl fmt::Display for OverviewMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Overview factors that still leave at least one pixel in each direction
pub fn overview_factors(width: usize, height: usize) -> Vec<i32> {
    let min_dim = width.min(height);
    OVERVIEW_FACTORS
        .iter()
        .filter(|&&factor| min_dim / factor >= 1)
        .map(|&factor| factor as i32)
        .collect()
}

/// Build overviews for all bands of the raster at `path` and tag the method used
pub fn build_overviews(path: &Path, method: OverviewMethod) -> Result<()> {
    info!("Building overviews for {} ({})", path.display(), method);

    let mut dataset = open_for_update(path)?;
    let (width, height) = dataset.raster_size();

    let levels = overview_factors(width, height);
    if levels.is_empty() {
        debug!("Raster too small for overviews ({}x{}), skipping", width, height);
        return Ok(());
    }

    info!("Creating {} overview levels: {:?}", levels.len(), levels);

    // Empty bands list means build for all bands
    dataset
        .build_overviews(method.gdal_name(), &levels, &[])
        .map_err(|e| {
            PansharpenError::UnsupportedFormat(format!("failed to build overviews: {}", e))
        })?;
    dataset.set_metadata_item("resampling", method.name(), OVERVIEW_TAG_DOMAIN)?;

    info!("Overviews created successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_factors_large() {
        assert_eq!(overview_factors(1024, 512), vec![2, 4, 8, 16]);
    }

    #[test]
    fn test_overview_factors_small() {
        assert_eq!(overview_factors(5, 100), vec![2, 4]);
        assert!(overview_factors(1, 1).is_empty());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(OverviewMethod::default().gdal_name(), "NEAREST");
        assert_eq!(OverviewMethod::CubicSpline.name(), "cubic_spline");
        assert_eq!(OverviewMethod::CubicSpline.gdal_name(), "CUBICSPLINE");
        assert_eq!(
            <OverviewMethod as ValueEnum>::from_str("rms", false).unwrap(),
            OverviewMethod::Rms
        );
        assert!(<OverviewMethod as ValueEnum>::from_str("q1", false).is_err());
    }
}
