use crate::error::{PansharpenError, Result};
use gdal::raster::GdalDataType;
use ndarray::Array2;

/// Numeric sample type of a raster as stored on disk.
///
/// Samples are always held as `f64` in memory; the pixel type decides how they are
/// rounded and clamped when written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

const INTEGER_TYPES: [PixelType; 8] = [
    PixelType::UInt8,
    PixelType::Int8,
    PixelType::UInt16,
    PixelType::Int16,
    PixelType::UInt32,
    PixelType::Int32,
    PixelType::UInt64,
    PixelType::Int64,
];

impl PixelType {
    /// Map a GDAL band type onto a pixel type, rejecting complex and unknown types
    pub fn from_gdal(data_type: GdalDataType) -> Result<Self> {
        if data_type == GdalDataType::Unknown {
            return Err(PansharpenError::UnsupportedPixelType(
                "unknown GDAL data type".to_string(),
            ));
        }

        let bits = data_type.bits();
        let pixel_type = if data_type.is_floating() {
            match bits {
                32 => Some(PixelType::Float32),
                64 => Some(PixelType::Float64),
                _ => None,
            }
        } else if data_type.is_integer() {
            match (bits, data_type.is_signed()) {
                (8, false) => Some(PixelType::UInt8),
                (8, true) => Some(PixelType::Int8),
                (16, false) => Some(PixelType::UInt16),
                (16, true) => Some(PixelType::Int16),
                (32, false) => Some(PixelType::UInt32),
                (32, true) => Some(PixelType::Int32),
                (64, false) => Some(PixelType::UInt64),
                (64, true) => Some(PixelType::Int64),
                _ => None,
            }
        } else {
            None
        };

        pixel_type.ok_or_else(|| PansharpenError::UnsupportedPixelType(data_type.name()))
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelType::UInt8 => "Byte",
            PixelType::Int8 => "Int8",
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::UInt32 => "UInt32",
            PixelType::Int32 => "Int32",
            PixelType::UInt64 => "UInt64",
            PixelType::Int64 => "Int64",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, PixelType::Float32 | PixelType::Float64)
    }

    /// Whether every value of this type survives a round trip through `f64`
    pub fn fits_f64_accumulator(self) -> bool {
        !matches!(self, PixelType::UInt64 | PixelType::Int64)
    }

    /// Inclusive range of representable values
    pub fn range(self) -> (f64, f64) {
        match self {
            PixelType::UInt8 => (0.0, u8::MAX as f64),
            PixelType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            PixelType::UInt16 => (0.0, u16::MAX as f64),
            PixelType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            PixelType::UInt32 => (0.0, u32::MAX as f64),
            PixelType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            PixelType::UInt64 => (0.0, u64::MAX as f64),
            PixelType::Int64 => (i64::MIN as f64, i64::MAX as f64),
            PixelType::Float32 => (f32::MIN as f64, f32::MAX as f64),
            PixelType::Float64 => (f64::MIN, f64::MAX),
        }
    }

    /// Round (integer types) and clamp a value into this type's range.
    /// Out-of-range values saturate, they never wrap.
    pub fn clamp_value(self, value: f64) -> f64 {
        let (min, max) = self.range();
        let value = if self.is_integer() { value.round() } else { value };
        value.clamp(min, max)
    }

    /// Narrowest type able to hold every value of both `self` and `other`
    pub fn union(self, other: PixelType) -> PixelType {
        if self == other {
            return self;
        }

        let (a_min, a_max) = self.range();
        let (b_min, b_max) = other.range();

        if self.is_integer() && other.is_integer() {
            return INTEGER_TYPES
                .iter()
                .copied()
                .find(|candidate| {
                    let (min, max) = candidate.range();
                    min <= a_min.min(b_min) && max >= a_max.max(b_max)
                })
                .unwrap_or(PixelType::Float64);
        }

        // Float32 holds integers of up to 16 bits exactly
        let fits_f32 = |t: PixelType| {
            matches!(
                t,
                PixelType::Float32
                    | PixelType::UInt8
                    | PixelType::Int8
                    | PixelType::UInt16
                    | PixelType::Int16
            )
        };
        if fits_f32(self) && fits_f32(other) {
            PixelType::Float32
        } else {
            PixelType::Float64
        }
    }
}

/// Test a sample against an optional nodata marker (NaN markers match NaN samples)
pub fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd,
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
    pub pixel_type: PixelType,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl RasterMetadata {
    pub fn new(
        width: usize,
        height: usize,
        geotransform: [f64; 6],
        projection: impl Into<String>,
        nodata: Option<f64>,
        pixel_type: PixelType,
    ) -> Self {
        Self {
            width,
            height,
            band_count: 0,
            geotransform,
            projection: projection.into(),
            nodata,
            pixel_type,
            pixel_width: geotransform[1].abs(),
            pixel_height: geotransform[5].abs(),
        }
    }

    /// Geographic footprint of the grid
    pub fn extent(&self) -> Result<Extent> {
        Extent::from_geotransform(&self.geotransform, self.width, self.height)
    }
}

/// Axis-aligned geographic bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn from_geotransform(gt: &[f64; 6], width: usize, height: usize) -> Result<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(PansharpenError::GeometryMismatch(format!(
                "rotated geotransforms are not supported (rotation terms {}, {})",
                gt[2], gt[4]
            )));
        }
        if gt[1] == 0.0 || gt[5] == 0.0 {
            return Err(PansharpenError::GeometryMismatch(
                "geotransform has a zero pixel size".to_string(),
            ));
        }

        let x_end = gt[0] + width as f64 * gt[1];
        let y_end = gt[3] + height as f64 * gt[5];

        Ok(Self {
            min_x: gt[0].min(x_end),
            max_x: gt[0].max(x_end),
            min_y: gt[3].min(y_end),
            max_y: gt[3].max(y_end),
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Overlapping area of two extents, `None` unless it has positive area
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let overlap = Extent {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        };

        if overlap.width() > 0.0 && overlap.height() > 0.0 {
            Some(overlap)
        } else {
            None
        }
    }
}

/// A georeferenced grid of one or more bands sharing the same shape and transform
#[derive(Debug, Clone)]
pub struct Raster {
    metadata: RasterMetadata,
    bands: Vec<Array2<f64>>,
}

impl Raster {
    /// Assemble a raster, checking that every band matches the metadata's shape
    pub fn new(bands: Vec<Array2<f64>>, mut metadata: RasterMetadata) -> Result<Self> {
        if bands.is_empty() {
            return Err(PansharpenError::InvalidArgument(
                "a raster needs at least one band".to_string(),
            ));
        }
        if metadata.width == 0 || metadata.height == 0 {
            return Err(PansharpenError::InvalidArgument(format!(
                "raster has invalid dimensions: {}x{}",
                metadata.width, metadata.height
            )));
        }

        let expected = (metadata.height, metadata.width);
        if let Some((index, band)) = bands
            .iter()
            .enumerate()
            .find(|(_, band)| band.dim() != expected)
        {
            return Err(PansharpenError::InvalidArgument(format!(
                "band {} has shape {:?}, expected {:?}",
                index + 1,
                band.dim(),
                expected
            )));
        }

        metadata.band_count = bands.len();
        Ok(Self { metadata, bands })
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    pub fn width(&self) -> usize {
        self.metadata.width
    }

    pub fn height(&self) -> usize {
        self.metadata.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn pixel_type(&self) -> PixelType {
        self.metadata.pixel_type
    }

    pub fn nodata(&self) -> Option<f64> {
        self.metadata.nodata
    }

    pub fn bands(&self) -> &[Array2<f64>] {
        &self.bands
    }

    /// Band by zero-based index
    pub fn band(&self, index: usize) -> Option<&Array2<f64>> {
        self.bands.get(index)
    }

    pub fn extent(&self) -> Result<Extent> {
        self.metadata.extent()
    }

    /// Replace the nodata marker without touching any samples
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.metadata.nodata = nodata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn metadata(width: usize, height: usize, pixel: f64) -> RasterMetadata {
        RasterMetadata::new(
            width,
            height,
            [0.0, pixel, 0.0, height as f64 * pixel, 0.0, -pixel],
            "",
            None,
            PixelType::UInt8,
        )
    }

    #[test]
    fn test_extent_north_up() {
        let extent = metadata(4, 2, 10.0).extent().unwrap();
        assert_eq!(extent.min_x, 0.0);
        assert_eq!(extent.max_x, 40.0);
        assert_eq!(extent.min_y, 0.0);
        assert_eq!(extent.max_y, 20.0);
    }

    #[test]
    fn test_extent_rejects_rotation() {
        let gt = [0.0, 1.0, 0.5, 10.0, 0.0, -1.0];
        assert!(matches!(
            Extent::from_geotransform(&gt, 10, 10),
            Err(PansharpenError::GeometryMismatch(_))
        ));
    }

    #[test]
    fn test_intersection() {
        let a = Extent { min_x: 0.0, max_x: 10.0, min_y: 0.0, max_y: 10.0 };
        let b = Extent { min_x: 5.0, max_x: 15.0, min_y: -5.0, max_y: 5.0 };
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap, Extent { min_x: 5.0, max_x: 10.0, min_y: 0.0, max_y: 5.0 });

        // Touching edges have no area
        let c = Extent { min_x: 10.0, max_x: 20.0, min_y: 0.0, max_y: 10.0 };
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_clamp_value_saturates() {
        assert_eq!(PixelType::UInt8.clamp_value(300.0), 255.0);
        assert_eq!(PixelType::UInt8.clamp_value(-4.0), 0.0);
        assert_eq!(PixelType::UInt8.clamp_value(12.6), 13.0);
        assert_eq!(PixelType::Int16.clamp_value(-40000.0), -32768.0);
        assert_eq!(PixelType::Float32.clamp_value(12.6), 12.6);
    }

    #[test]
    fn test_union() {
        assert_eq!(PixelType::UInt8.union(PixelType::UInt8), PixelType::UInt8);
        assert_eq!(PixelType::UInt8.union(PixelType::UInt16), PixelType::UInt16);
        assert_eq!(PixelType::UInt8.union(PixelType::Int8), PixelType::Int16);
        assert_eq!(PixelType::UInt16.union(PixelType::Float32), PixelType::Float32);
        assert_eq!(PixelType::Int32.union(PixelType::Float32), PixelType::Float64);
        assert_eq!(PixelType::UInt64.union(PixelType::Int64), PixelType::Float64);
    }

    #[test]
    fn test_from_gdal() {
        assert_eq!(PixelType::from_gdal(GdalDataType::UInt16).unwrap(), PixelType::UInt16);
        assert_eq!(PixelType::from_gdal(GdalDataType::Float32).unwrap(), PixelType::Float32);
        assert!(matches!(
            PixelType::from_gdal(GdalDataType::Unknown),
            Err(PansharpenError::UnsupportedPixelType(_))
        ));
    }

    #[test]
    fn test_is_nodata() {
        assert!(is_nodata(-9999.0, Some(-9999.0)));
        assert!(!is_nodata(0.0, Some(-9999.0)));
        assert!(is_nodata(f64::NAN, Some(f64::NAN)));
        assert!(!is_nodata(f64::NAN, None));
    }

    #[test]
    fn test_new_rejects_mismatched_bands() {
        let bands = vec![arr2(&[[1.0, 2.0], [3.0, 4.0]]), arr2(&[[1.0, 2.0]])];
        assert!(matches!(
            Raster::new(bands, metadata(2, 2, 1.0)),
            Err(PansharpenError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_new_sets_band_count() {
        let bands = vec![arr2(&[[1.0, 2.0]]), arr2(&[[3.0, 4.0]])];
        let raster = Raster::new(bands, metadata(2, 1, 1.0)).unwrap();
        assert_eq!(raster.band_count(), 2);
        assert_eq!(raster.metadata().band_count, 2);
    }
}
