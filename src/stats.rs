use crate::raster::{is_nodata, Raster};
use log::debug;
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub valid_count: usize,
    pub total_count: usize,
}

impl BandStatistics {
    pub fn valid_percent(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            100.0 * self.valid_count as f64 / self.total_count as f64
        }
    }
}

fn band_statistics(band: &Array2<f64>, nodata: Option<f64>) -> Option<BandStatistics> {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut mean = 0.0;
    let mut m2 = 0.0;

    // Welford's running mean/variance
    for &value in band.iter() {
        if !value.is_finite() || is_nodata(value, nodata) {
            continue;
        }
        count += 1;
        min = min.min(value);
        max = max.max(value);
        let delta = value - mean;
        mean += delta / count as f64;
        m2 += delta * (value - mean);
    }

    if count == 0 {
        return None;
    }

    Some(BandStatistics {
        min,
        max,
        mean,
        // Population standard deviation, as GDAL reports it
        std_dev: (m2 / count as f64).sqrt(),
        valid_count: count,
        total_count: band.len(),
    })
}

/// Per-band statistics excluding nodata and non-finite samples.
///
/// Bands without any valid sample yield `None`.
pub fn compute_stats(raster: &Raster) -> Vec<Option<BandStatistics>> {
    raster
        .bands()
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let stats = band_statistics(band, raster.nodata());
            debug!("Band {} statistics: {:?}", i + 1, stats);
            stats
        })
        .collect()
}
