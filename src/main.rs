use clap::Parser;
use env_logger::Env;
use log::info;

use geotiff_pansharpen::cli::{Args, Command};
use geotiff_pansharpen::pipeline::{run_pansharpen, run_resize};
use geotiff_pansharpen::{PansharpenError, Result};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== GeoTIFF Pansharpening ===");

    match args.threads {
        Some(n_threads) => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build_global()
                .map_err(|e| PansharpenError::InvalidArgument(format!("thread pool: {}", e)))?;
            info!("Resampling with {} threads", n_threads);
        }
        None => info!("Resampling with all available threads"),
    }

    let written = match args.command {
        Command::Fuse(fuse) => run_pansharpen(&fuse.into_request())?,
        Command::Resize(resize) => run_resize(&resize.into_request())?,
    };

    info!("Output: {}", written.display());
    info!("=== Done! ===");
    Ok(())
}
