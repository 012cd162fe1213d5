use crate::error::{PansharpenError, Result};
use crate::raster::{PixelType, Raster, RasterMetadata};
use crate::stats::BandStatistics;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType, RasterBand};
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags, Metadata};
use log::{debug, info, warn};
use ndarray::Array2;
use std::path::Path;

const OUTPUT_DRIVER: &str = "GTiff";

/// GeoTIFF creation settings for written rasters
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub compression: String,
    pub tile_size: Option<usize>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            compression: "NONE".to_string(),
            tile_size: None,
        }
    }
}

impl OutputOptions {
    pub fn validate(&self) -> Result<()> {
        validate_compression(&self.compression)?;
        if let Some(tile_size) = self.tile_size {
            validate_tile_size(tile_size)?;
        }
        Ok(())
    }

    /// GTiff creation options
    pub fn dataset_options(&self) -> Vec<String> {
        let mut options = vec![format!("COMPRESS={}", self.compression)];
        if let Some(tile_size) = self.tile_size {
            options.push("TILED=YES".to_string());
            options.push(format!("BLOCKXSIZE={}", tile_size));
            options.push(format!("BLOCKYSIZE={}", tile_size));
        }
        options.push("BIGTIFF=IF_SAFER".to_string());
        options
    }
}

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    let valid_types = ["DEFLATE", "LZW", "ZSTD", "NONE"];
    if !valid_types.contains(&compression) {
        return Err(PansharpenError::InvalidCompression(compression.to_string()));
    }
    Ok(())
}

/// Validate tile size (must be multiple of 16)
pub fn validate_tile_size(tile_size: usize) -> Result<()> {
    if tile_size == 0 || tile_size % 16 != 0 {
        return Err(PansharpenError::InvalidTileSize(tile_size));
    }
    Ok(())
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PansharpenError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Extract metadata from a dataset without reading any pixels
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size();
    let height = rasterband.y_size();

    if width == 0 || height == 0 {
        return Err(PansharpenError::InvalidArgument(format!(
            "raster has invalid dimensions: {}x{}",
            width, height
        )));
    }

    let pixel_type = PixelType::from_gdal(rasterband.band_type())?;
    let geotransform = dataset.geo_transform()?;

    let mut metadata = RasterMetadata::new(
        width,
        height,
        geotransform,
        dataset.projection(),
        rasterband.no_data_value(),
        pixel_type,
    );
    metadata.band_count = dataset.raster_count();

    if metadata.pixel_width <= 0.0 || metadata.pixel_height <= 0.0 {
        return Err(PansharpenError::GeometryMismatch(format!(
            "non-positive pixel size: {} x {}",
            metadata.pixel_width, metadata.pixel_height
        )));
    }

    Ok(metadata)
}

/// Open a raster and read all of its bands
pub fn open_raster(path: &Path) -> Result<Raster> {
    info!("Opening raster: {}", path.display());
    ensure_exists(path)?;

    let dataset = Dataset::open(path).map_err(|e| {
        PansharpenError::UnsupportedFormat(format!("{}: {}", path.display(), e))
    })?;
    let metadata = extract_metadata_from_dataset(&dataset)?;

    debug!(
        "Raster {}x{}, {} band(s), {}, pixel size {:.6} x {:.6}, nodata {:?}",
        metadata.width,
        metadata.height,
        metadata.band_count,
        metadata.pixel_type.name(),
        metadata.pixel_width,
        metadata.pixel_height,
        metadata.nodata
    );

    let (width, height) = (metadata.width, metadata.height);
    let mut bands = Vec::with_capacity(metadata.band_count);
    for index in 1..=metadata.band_count {
        let rasterband = dataset.rasterband(index)?;
        PixelType::from_gdal(rasterband.band_type())?;

        let buffer = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
        let data_vec: Vec<f64> = buffer.into_iter().collect();
        bands.push(Array2::from_shape_vec((height, width), data_vec)?);
    }

    Raster::new(bands, metadata)
}

/// Band by one-based index, as GDAL numbers them
pub fn read_band(raster: &Raster, index: usize) -> Result<&Array2<f64>> {
    index
        .checked_sub(1)
        .and_then(|i| raster.band(i))
        .ok_or_else(|| {
            PansharpenError::InvalidArgument(format!(
                "band {} out of range (raster has {} bands)",
                index,
                raster.band_count()
            ))
        })
}

/// Open an existing raster for in-place updates
pub fn open_for_update(path: &Path) -> Result<Dataset> {
    ensure_exists(path)?;
    let options = DatasetOptions {
        open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_RASTER,
        ..Default::default()
    };
    Dataset::open_ex(path, options)
        .map_err(|e| PansharpenError::UnsupportedFormat(format!("{}: {}", path.display(), e)))
}

fn write_typed<T: GdalType + Copy>(
    path: &Path,
    raster: &Raster,
    options: &OutputOptions,
    convert: impl Fn(f64) -> T,
) -> Result<()> {
    let metadata = raster.metadata();
    let (width, height) = (metadata.width, metadata.height);

    let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)?;
    let mut gdal_options = CslStringList::new();
    for opt in options.dataset_options() {
        gdal_options.add_string(&opt)?;
    }

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path,
        width,
        height,
        raster.band_count(),
        &gdal_options,
    )?;

    dataset.set_geo_transform(&metadata.geotransform)?;
    if !metadata.projection.is_empty() {
        dataset.set_projection(&metadata.projection)?;
    }

    for (i, band) in raster.bands().iter().enumerate() {
        let band_index = i + 1;
        debug!("Writing band {}", band_index);

        let mut raster_band = dataset.rasterband(band_index)?;
        let data: Vec<T> = band
            .iter()
            .map(|&value| convert(metadata.pixel_type.clamp_value(value)))
            .collect();
        let mut buffer = Buffer::new((width, height), data);
        raster_band.write((0, 0), (width, height), &mut buffer)?;

        if let Some(nodata) = metadata.nodata {
            raster_band.set_no_data_value(Some(nodata))?;
        }
    }

    Ok(())
}

/// Write a raster as GeoTIFF using its own pixel type
pub fn write_raster(path: &Path, raster: &Raster, options: &OutputOptions) -> Result<()> {
    options.validate()?;
    info!(
        "Writing {} band(s) as {}: {}",
        raster.band_count(),
        raster.pixel_type().name(),
        path.display()
    );

    // Values are already rounded and clamped, so the casts below are exact
    match raster.pixel_type() {
        PixelType::UInt8 => write_typed(path, raster, options, |v| v as u8),
        PixelType::Int8 => {
            debug!("Storing Int8 samples as Int16");
            write_typed(path, raster, options, |v| v as i16)
        }
        PixelType::UInt16 => write_typed(path, raster, options, |v| v as u16),
        PixelType::Int16 => write_typed(path, raster, options, |v| v as i16),
        PixelType::UInt32 => write_typed(path, raster, options, |v| v as u32),
        PixelType::Int32 => write_typed(path, raster, options, |v| v as i32),
        PixelType::UInt64 | PixelType::Int64 => {
            warn!(
                "Storing {} samples as Float64",
                raster.pixel_type().name()
            );
            write_typed(path, raster, options, |v| v)
        }
        PixelType::Float32 => write_typed(path, raster, options, |v| v as f32),
        PixelType::Float64 => write_typed(path, raster, options, |v| v),
    }?;

    info!("Successfully wrote {} bands to output", raster.band_count());
    Ok(())
}

/// Store per-band statistics as GDAL's standard band metadata items
pub fn write_statistics(path: &Path, stats: &[Option<BandStatistics>]) -> Result<()> {
    info!("Writing band statistics: {}", path.display());
    let dataset = open_for_update(path)?;

    for (i, band_stats) in stats.iter().enumerate() {
        let Some(band_stats) = band_stats else {
            warn!("Band {} has no valid pixels, skipping statistics", i + 1);
            continue;
        };

        let mut raster_band = dataset.rasterband(i + 1)?;
        let items = [
            ("STATISTICS_MINIMUM", band_stats.min),
            ("STATISTICS_MAXIMUM", band_stats.max),
            ("STATISTICS_MEAN", band_stats.mean),
            ("STATISTICS_STDDEV", band_stats.std_dev),
            ("STATISTICS_VALID_PERCENT", band_stats.valid_percent()),
        ];
        for (key, value) in items {
            raster_band.set_metadata_item(key, &value.to_string(), "")?;
        }
    }

    Ok(())
}

/// Delete a raster written by this tool, along with any sidecar files
pub fn remove_raster(path: &Path) -> Result<()> {
    debug!("Removing {}", path.display());
    let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)?;
    driver.delete(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_compression_valid() {
        assert!(validate_compression("DEFLATE").is_ok());
        assert!(validate_compression("LZW").is_ok());
        assert!(validate_compression("ZSTD").is_ok());
        assert!(validate_compression("NONE").is_ok());
    }

    #[test]
    fn test_validate_compression_invalid() {
        assert!(validate_compression("INVALID").is_err());
        assert!(validate_compression("jpeg").is_err());
    }

    #[test]
    fn test_validate_tile_size() {
        assert!(validate_tile_size(256).is_ok());
        assert!(validate_tile_size(512).is_ok());
        assert!(validate_tile_size(0).is_err());
        assert!(validate_tile_size(100).is_err());
    }

    #[test]
    fn test_dataset_options() {
        let untiled = OutputOptions::default().dataset_options();
        assert_eq!(untiled, vec!["COMPRESS=NONE", "BIGTIFF=IF_SAFER"]);

        let tiled = OutputOptions {
            compression: "DEFLATE".to_string(),
            tile_size: Some(512),
        }
        .dataset_options();
        assert_eq!(tiled.len(), 5);
        assert!(tiled.contains(&"TILED=YES".to_string()));
        assert!(tiled.contains(&"BLOCKXSIZE=512".to_string()));
        assert!(tiled.contains(&"BLOCKYSIZE=512".to_string()));
    }

    #[test]
    fn test_read_band_is_one_based() {
        let metadata = RasterMetadata::new(2, 1, [0.0, 1.0, 0.0, 1.0, 0.0, -1.0], "", None, PixelType::UInt8);
        let bands = vec![Array2::from_elem((1, 2), 1.0), Array2::from_elem((1, 2), 2.0)];
        let raster = Raster::new(bands, metadata).unwrap();

        assert_eq!(read_band(&raster, 2).unwrap()[[0, 0]], 2.0);
        assert!(matches!(read_band(&raster, 0), Err(PansharpenError::InvalidArgument(_))));
        assert!(matches!(read_band(&raster, 3), Err(PansharpenError::InvalidArgument(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let result = open_raster(Path::new("/nonexistent/reference.tif"));
        assert!(matches!(result, Err(PansharpenError::FileNotFound(_))));
    }
}
