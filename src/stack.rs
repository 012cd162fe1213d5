use crate::error::{PansharpenError, Result};
use crate::raster::{Raster, RasterMetadata};
use log::{debug, info, warn};

/// Relative tolerance when comparing geotransform coefficients
const TRANSFORM_TOLERANCE: f64 = 1e-9;

fn same_grid(a: &RasterMetadata, b: &RasterMetadata) -> bool {
    a.width == b.width
        && a.height == b.height
        && a.geotransform
            .iter()
            .zip(&b.geotransform)
            .all(|(x, y)| (x - y).abs() <= TRANSFORM_TOLERANCE * x.abs().max(y.abs()).max(1.0))
}

/// Nodata markers are equal, treating two NaN markers as the same
fn same_nodata(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        (None, None) => true,
        _ => false,
    }
}

/// Concatenate the bands of `a` and `b`, in that order, into a new raster.
///
/// Both inputs must share size and geotransform. The output type holds both input
/// types; projection and nodata come from `a`.
pub fn stack(a: &Raster, b: &Raster) -> Result<Raster> {
    let (meta_a, meta_b) = (a.metadata(), b.metadata());

    if !same_grid(meta_a, meta_b) {
        return Err(PansharpenError::GeometryMismatch(format!(
            "cannot stack {}x{} {:?} with {}x{} {:?}",
            meta_a.width,
            meta_a.height,
            meta_a.geotransform,
            meta_b.width,
            meta_b.height,
            meta_b.geotransform
        )));
    }

    let pixel_type = meta_a.pixel_type.union(meta_b.pixel_type);
    if pixel_type != meta_a.pixel_type || pixel_type != meta_b.pixel_type {
        debug!(
            "Stacking {} with {} as {}",
            meta_a.pixel_type.name(),
            meta_b.pixel_type.name(),
            pixel_type.name()
        );
    }

    if !same_nodata(meta_a.nodata, meta_b.nodata) {
        warn!(
            "Nodata values differ ({:?} vs {:?}), the stack keeps {:?}",
            meta_a.nodata, meta_b.nodata, meta_a.nodata
        );
    }

    info!(
        "Stacking {} + {} bands",
        a.band_count(),
        b.band_count()
    );

    let bands = a.bands().iter().chain(b.bands()).cloned().collect();
    let metadata = RasterMetadata::new(
        meta_a.width,
        meta_a.height,
        meta_a.geotransform,
        meta_a.projection.clone(),
        meta_a.nodata,
        pixel_type,
    );

    Raster::new(bands, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelType;
    use ndarray::Array2;

    fn raster(values: &[f64], origin_x: f64, pixel_type: PixelType) -> Raster {
        let bands = values.iter().map(|&v| Array2::from_elem((3, 2), v)).collect();
        let metadata = RasterMetadata::new(
            2,
            3,
            [origin_x, 10.0, 0.0, 30.0, 0.0, -10.0],
            "",
            Some(0.0),
            pixel_type,
        );
        Raster::new(bands, metadata).unwrap()
    }

    #[test]
    fn test_band_order_is_a_then_b() {
        let a = raster(&[1.0], 0.0, PixelType::UInt8);
        let b = raster(&[2.0, 3.0, 4.0], 0.0, PixelType::UInt8);

        let ab = stack(&a, &b).unwrap();
        let order: Vec<f64> = ab.bands().iter().map(|band| band[[0, 0]]).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0, 4.0]);

        let ba = stack(&b, &a).unwrap();
        let order: Vec<f64> = ba.bands().iter().map(|band| band[[0, 0]]).collect();
        assert_eq!(order, vec![2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_pixel_type_widened() {
        let a = raster(&[1.0], 0.0, PixelType::UInt8);
        let b = raster(&[2.0], 0.0, PixelType::UInt16);
        assert_eq!(stack(&a, &b).unwrap().pixel_type(), PixelType::UInt16);
    }

    #[test]
    fn test_nodata_taken_from_first_input() {
        let a = raster(&[1.0], 0.0, PixelType::Int16);
        let b = raster(&[2.0], 0.0, PixelType::Int16).with_nodata(Some(-1.0));

        assert!(!same_nodata(a.nodata(), b.nodata()));
        assert!(same_nodata(Some(f64::NAN), Some(f64::NAN)));
        assert!(!same_nodata(Some(0.0), None));
        assert_eq!(stack(&a, &b).unwrap().nodata(), Some(0.0));
        assert_eq!(stack(&b, &a).unwrap().nodata(), Some(-1.0));
    }

    #[test]
    fn test_mismatched_grid_rejected() {
        let a = raster(&[1.0], 0.0, PixelType::UInt8);
        let b = raster(&[2.0], 5.0, PixelType::UInt8);
        assert!(matches!(stack(&a, &b), Err(PansharpenError::GeometryMismatch(_))));
    }
}
