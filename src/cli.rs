use crate::io::OutputOptions;
use crate::overview::OverviewMethod;
use crate::pipeline::{PansharpenRequest, ResizeRequest};
use crate::resample::ResampleMethod;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pansharpen")]
#[command(about = "Sharpen multispectral GeoTIFFs with a high-resolution band (simple mean)")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fuse a multispectral raster with a high-resolution reference band
    Fuse(FuseArgs),

    /// Resample a raster to a new cell size
    Resize(ResizeArgs),
}

#[derive(ClapArgs, Debug)]
pub struct FinishingArgs {
    /// Calculate band statistics on the output
    #[arg(long)]
    pub stats: bool,

    /// Build overviews (pyramids) on the output
    #[arg(long)]
    pub overviews: bool,

    /// Resampling used for the overviews
    #[arg(long, value_enum, default_value_t = OverviewMethod::Nearest)]
    pub overview_method: OverviewMethod,

    /// GeoTIFF compression (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, value_name = "TYPE", default_value = "NONE")]
    pub compress: String,

    /// Write a tiled GeoTIFF with square tiles of this size (multiple of 16)
    #[arg(long, value_name = "PIXELS")]
    pub tile_size: Option<usize>,
}

impl FinishingArgs {
    fn output_options(&self) -> OutputOptions {
        OutputOptions {
            compression: self.compress.to_ascii_uppercase(),
            tile_size: self.tile_size,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct FuseArgs {
    /// High-resolution single-band GeoTIFF
    #[arg(short, long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Lower-resolution multi-band GeoTIFF to sharpen
    #[arg(short = 'm', long, value_name = "FILE")]
    pub target: PathBuf,

    /// Output GeoTIFF path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Per-band weights of the pseudo-reference (default: equal weights)
    #[arg(short, long, value_name = "W", value_delimiter = ',', allow_negative_numbers = true)]
    pub weights: Option<Vec<f64>>,

    /// Resampling used to bring the target onto the reference grid
    #[arg(long, value_enum, default_value_t = ResampleMethod::Nearest)]
    pub resampling: ResampleMethod,

    /// Override the reference nodata value (default: read from input)
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub nodata: Option<f64>,

    /// Stack the reference band and the fused bands into <output>_stacked.tif
    #[arg(long)]
    pub stack: bool,

    #[command(flatten)]
    pub finishing: FinishingArgs,
}

impl FuseArgs {
    pub fn into_request(self) -> PansharpenRequest {
        let output = self.finishing.output_options();
        PansharpenRequest {
            reference_path: self.reference,
            target_path: self.target,
            output_path: self.output,
            weights: self.weights,
            resampling_method: self.resampling,
            stack: self.stack,
            compute_stats: self.finishing.stats,
            build_overviews: self.finishing.overviews,
            overview_method: self.finishing.overview_method,
            nodata_override: self.nodata,
            output,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct ResizeArgs {
    /// Input GeoTIFF path
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output GeoTIFF path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// New cell size in map units
    #[arg(short, long, value_name = "SIZE", allow_negative_numbers = true)]
    pub cell_size: f64,

    /// Resampling algorithm
    #[arg(long, value_enum, default_value_t = ResampleMethod::Nearest)]
    pub resampling: ResampleMethod,

    #[command(flatten)]
    pub finishing: FinishingArgs,
}

impl ResizeArgs {
    pub fn into_request(self) -> ResizeRequest {
        let output = self.finishing.output_options();
        ResizeRequest {
            input_path: self.input,
            output_path: self.output,
            cell_size: self.cell_size,
            resampling_method: self.resampling,
            compute_stats: self.finishing.stats,
            build_overviews: self.finishing.overviews,
            overview_method: self.finishing.overview_method,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fuse() {
        let args = Args::try_parse_from([
            "pansharpen",
            "fuse",
            "-r",
            "pan.tif",
            "-m",
            "ms.tif",
            "-o",
            "out.tif",
            "--weights",
            "1,2,0.5",
            "--resampling",
            "cubicspline",
            "--stack",
            "--overviews",
            "--overview-method",
            "cubic_spline",
            "--compress",
            "deflate",
        ])
        .unwrap();

        let Command::Fuse(fuse) = args.command else {
            panic!("expected the fuse subcommand");
        };
        let request = fuse.into_request();

        assert_eq!(request.weights, Some(vec![1.0, 2.0, 0.5]));
        assert_eq!(request.resampling_method, ResampleMethod::CubicSpline);
        assert!(request.stack);
        assert!(request.build_overviews);
        assert!(!request.compute_stats);
        assert_eq!(request.overview_method, OverviewMethod::CubicSpline);
        assert_eq!(request.output.compression, "DEFLATE");
    }

    #[test]
    fn test_parse_fuse_defaults() {
        let args =
            Args::try_parse_from(["pansharpen", "fuse", "-r", "a.tif", "-m", "b.tif", "-o", "c.tif"])
                .unwrap();
        let Command::Fuse(fuse) = args.command else {
            panic!("expected the fuse subcommand");
        };
        let request = fuse.into_request();

        assert_eq!(request.weights, None);
        assert_eq!(request.resampling_method, ResampleMethod::Nearest);
        assert_eq!(request.overview_method, OverviewMethod::Nearest);
        assert_eq!(request.output, OutputOptions::default());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result = Args::try_parse_from([
            "pansharpen", "fuse", "-r", "a.tif", "-m", "b.tif", "-o", "c.tif", "--resampling", "bicubic",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_resize() {
        let args = Args::try_parse_from([
            "pansharpen", "-v", "resize", "-i", "in.tif", "-o", "out.tif", "-c", "15", "--stats",
        ])
        .unwrap();
        assert!(args.verbose);

        let Command::Resize(resize) = args.command else {
            panic!("expected the resize subcommand");
        };
        let request = resize.into_request();
        assert_eq!(request.cell_size, 15.0);
        assert!(request.compute_stats);
    }
}
