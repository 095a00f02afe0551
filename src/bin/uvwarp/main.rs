//! uvwarp CLI - project images into UV texture space.
//!
//! Usage: uvwarp <COMMAND> [OPTIONS]
//!
//! Run `uvwarp --help` for available commands. Set `RUST_LOG=debug` for
//! per-file and per-warp statistics.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use uvwarp::io;
use uvwarp::prelude::{
    warp_feature_with_progress, CorrespondenceMap, FeatureMap, Progress, WarpOptions,
};
use uvwarp::warp::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(name = "uvwarp")]
#[command(author, version, about = "Warp images into UV space with IUV correspondences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display IUV image statistics
    Info {
        /// IUV image file
        #[arg(long)]
        iuv: PathBuf,
    },

    /// Warp images into UV space
    Warp {
        /// RGB image files
        #[arg(short, long, required = true, num_args = 1..)]
        image: Vec<PathBuf>,

        /// IUV image files, one per image
        #[arg(long, required = true, num_args = 1..)]
        iuv: Vec<PathBuf>,

        /// Output directory (receives texture/ and uv/ subdirectories)
        #[arg(short, long)]
        out: PathBuf,

        /// UV resolution (default: half the image height)
        #[arg(short, long)]
        resolution: Option<usize>,

        /// Foreground confidence threshold
        #[arg(short, long, default_value = "0.5")]
        threshold: f32,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { iuv } => {
            cmd_info(&iuv)?;
        }

        Commands::Warp {
            image,
            iuv,
            out,
            resolution,
            threshold,
            sequential,
        } => {
            cmd_warp(&image, &iuv, &out, resolution, threshold, sequential)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, stage| {
        if total == 0 {
            return;
        }

        let percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Only redraw when the bar moves forward.
        let previous = max_percent.fetch_max(percent, Ordering::Relaxed);
        if percent <= previous && percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        eprint!(
            "\r[{}{}] {:3}% {:<28}",
            "=".repeat(filled),
            " ".repeat(bar_width - filled),
            percent,
            stage
        );
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = io::load_iuv(path)?;
    let (_, height, width) = raw.dim();

    println!("File: {}", path.display());
    println!("Size: {} x {}", width, height);
    println!("Foreground: {:.2}%", io::foreground_fraction(&raw) * 100.0);

    let correspondence = io::prepare_correspondence(io::stack_batch(&[raw])?)?;
    match uv_ranges(&correspondence) {
        Some((u_range, v_range)) => {
            println!("U range: [{:.3}, {:.3}]", u_range.0, u_range.1);
            println!("V range: [{:.3}, {:.3}]", v_range.0, v_range.1);
        }
        None => println!("No foreground pixels"),
    }

    Ok(())
}

/// `(min, max)` of u and v over the foreground of the first batch element.
fn uv_ranges(correspondence: &CorrespondenceMap) -> Option<((f32, f32), (f32, f32))> {
    let mut u_range = (f32::INFINITY, f32::NEG_INFINITY);
    let mut v_range = (f32::INFINITY, f32::NEG_INFINITY);
    for row in 0..correspondence.height() {
        for col in 0..correspondence.width() {
            if correspondence.confidence(0, row, col) > DEFAULT_THRESHOLD {
                let uv = correspondence.uv(0, row, col);
                u_range = (u_range.0.min(uv.x), u_range.1.max(uv.x));
                v_range = (v_range.0.min(uv.y), v_range.1.max(uv.y));
            }
        }
    }
    u_range.0.is_finite().then_some((u_range, v_range))
}

fn cmd_warp(
    images: &[PathBuf],
    iuvs: &[PathBuf],
    out: &Path,
    resolution: Option<usize>,
    threshold: f32,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if images.len() != iuvs.len() {
        return Err(format!(
            "got {} images but {} IUV maps; pass one IUV map per image",
            images.len(),
            iuvs.len()
        )
        .into());
    }

    let rgb = images.iter().map(io::load_rgb).collect::<uvwarp::error::Result<Vec<_>>>()?;
    let raw_iuv = iuvs.iter().map(io::load_iuv).collect::<uvwarp::error::Result<Vec<_>>>()?;
    let features = FeatureMap::new(io::stack_batch(&rgb)?);
    let correspondence = io::prepare_correspondence(io::stack_batch(&raw_iuv)?)?;

    println!(
        "Loaded: {} images of {} x {}",
        features.batch_size(),
        features.width(),
        features.height()
    );

    let resolution = resolution.unwrap_or_else(|| (features.height() / 2).max(1));
    let options = WarpOptions::with_resolution(resolution)
        .with_threshold(threshold)
        .with_parallel(!sequential);

    let mode = if sequential { "sequential" } else { "parallel" };
    println!("Warping into {} x {} UV space ({})...", resolution, resolution, mode);

    let progress = create_progress();
    let start = Instant::now();
    let warped = warp_feature_with_progress(&correspondence, &features, &options, &progress)?;
    let elapsed = start.elapsed();

    for (b, image) in images.iter().enumerate() {
        println!(
            "  {}: {} of {} UV cells covered",
            image.display(),
            warped.covered_cells(b),
            resolution * resolution
        );
    }

    let names: Vec<String> = images
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    io::save_texture(&names, out.join("texture"), &warped)?;
    io::save_uv_map(&names, out.join("uv"), &warped)?;
    println!("Saved: {} ({:.2?})", out.display(), elapsed);

    Ok(())
}
