//! ArcShot command-line front end.
//!
//! Offline access to the capture core: inspect scroll plans, composite image
//! files, and finish pending results left in a store directory.

use anyhow::{Context, Result, anyhow};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use arcshot::compose::{EncodedImage, crop, round_corners_encoded, stitch_images};
use arcshot::config::{get_config, init_config};
use arcshot::logging::{init_logging, install_panic_hook};
use arcshot::paths::{self, AppDirs};
use arcshot::reconcile::{FileStore, ResultReconciler, prune_stale};
use arcshot::{PageGeometry, PixelRect, PlanOutcome, ScrollPlanner, Selection};

#[derive(Parser)]
#[command(name = "arcshot", version, about = "Scrolling screenshot capture core")]
struct Cli {
    /// Path to config.json (defaults to the one next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the scroll plan for a page
    Plan {
        #[arg(long)]
        scroll_height: u32,
        #[arg(long)]
        viewport_height: u32,
        /// Selection as x,y,width,height in viewport pixels
        #[arg(long, value_parser = parse_selection)]
        selection: Option<Selection>,
        /// Scroll offset at the time the selection was drawn
        #[arg(long, requires = "selection")]
        scroll_offset: Option<u32>,
    },
    /// Stitch frame images top to bottom
    Stitch {
        #[arg(long, default_value_t = 0)]
        overlap: u32,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Crop an image (the rectangle is clamped to the image)
    Crop {
        #[arg(long, allow_negative_numbers = true)]
        x: i64,
        #[arg(long, allow_negative_numbers = true)]
        y: i64,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        input: PathBuf,
        output: PathBuf,
    },
    /// Round the corners of an image
    Round {
        #[arg(long)]
        radius: u32,
        input: PathBuf,
        output: PathBuf,
    },
    /// Finish the authoritative pending result and save it
    Reconcile {
        /// Pending store directory
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        radius: u32,
        /// Directory for the saved image (defaults to screenshots/)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Remove stale pending results
    Prune {
        #[arg(long)]
        store: Option<PathBuf>,
        /// Maximum age in seconds (defaults to the configured value)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

fn parse_selection(value: &str) -> Result<Selection, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err("expected x,y,width,height".to_string());
    }
    let x = parts[0].parse::<i32>().map_err(|e| format!("x: {}", e))?;
    let y = parts[1].parse::<i32>().map_err(|e| format!("y: {}", e))?;
    let width = parts[2].parse::<u32>().map_err(|e| format!("width: {}", e))?;
    let height = parts[3].parse::<u32>().map_err(|e| format!("height: {}", e))?;
    Selection::new(x, y, width, height).ok_or_else(|| "selection must not be empty".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = paths::app_dirs();
    dirs.ensure().context("Failed to create output directories")?;
    init_logging(&dirs.log_file());
    install_panic_hook();
    init_config(cli.config.as_deref());

    match cli.command {
        Command::Plan {
            scroll_height,
            viewport_height,
            selection,
            scroll_offset,
        } => {
            let geometry = PageGeometry::new(scroll_height, viewport_height);
            let selection = match (selection, scroll_offset) {
                (Some(selection), Some(offset)) => Some(selection.in_document(offset)),
                (selection, _) => selection,
            };
            run_plan(&geometry, selection.as_ref())
        }
        Command::Stitch {
            overlap,
            output,
            frames,
        } => run_stitch(&frames, overlap, &output),
        Command::Crop {
            x,
            y,
            width,
            height,
            input,
            output,
        } => {
            let image = open_rgba(&input)?;
            let cropped = crop(&image, &PixelRect::new(x, y, width, height));
            if cropped.width() == 0 || cropped.height() == 0 {
                return Err(anyhow!("Crop rectangle lies outside {}", input.display()));
            }
            cropped
                .save(&output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            log::info!(
                "Cropped to {}x{}: {}",
                cropped.width(),
                cropped.height(),
                output.display()
            );
            Ok(())
        }
        Command::Round {
            radius,
            input,
            output,
        } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let rounded =
                round_corners_encoded(EncodedImage::new(bytes), radius, get_config().max_corner_radius)?;
            std::fs::write(&output, rounded.as_bytes())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            log::info!("Saved {}", output.display());
            Ok(())
        }
        Command::Reconcile {
            store,
            radius,
            output_dir,
        } => run_reconcile(dirs, store, radius, output_dir).await,
        Command::Prune {
            store,
            max_age_secs,
        } => {
            let store = FileStore::open(store.unwrap_or_else(|| dirs.store.clone()))?;
            let max_age =
                Duration::from_secs(max_age_secs.unwrap_or(get_config().reconcile.stale_after_secs));
            let removed = prune_stale(&store, max_age, Utc::now())?;
            log::info!("Pruned {} stale record(s) from {}", removed, store.dir().display());
            Ok(())
        }
    }
}

fn run_plan(geometry: &PageGeometry, selection: Option<&Selection>) -> Result<()> {
    let planner = ScrollPlanner::new(get_config().planner.clone());
    match planner.plan(geometry, selection)? {
        PlanOutcome::NoScrollNeeded => println!("No scrolling needed"),
        PlanOutcome::Scroll(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

fn open_rgba(path: &Path) -> Result<image::RgbaImage> {
    Ok(image::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .to_rgba8())
}

fn run_stitch(frames: &[PathBuf], overlap: u32, output: &Path) -> Result<()> {
    let images = frames
        .iter()
        .map(|path| open_rgba(path))
        .collect::<Result<Vec<_>>>()?;
    let stitched = stitch_images(images, overlap)?;
    stitched
        .save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    log::info!(
        "Stitched {} frames into {}x{}: {}",
        frames.len(),
        stitched.width(),
        stitched.height(),
        output.display()
    );
    Ok(())
}

async fn run_reconcile(
    dirs: &AppDirs,
    store: Option<PathBuf>,
    radius: u32,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = get_config();
    let store = FileStore::open(store.unwrap_or_else(|| dirs.store.clone()))?;
    let reconciler = ResultReconciler::new(config);
    let result = reconciler.reconcile_store(&store).await?;
    for degradation in &result.degradations {
        log::warn!("Result is degraded: {:?}", degradation);
    }

    let image = round_corners_encoded(result.image, radius, config.max_corner_radius)?;
    let dir = output_dir.unwrap_or_else(|| dirs.screenshots.clone());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = paths::output_path(&dir, Local::now());
    std::fs::write(&path, image.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!(
        "Saved {} result captured at {}: {}",
        result.source,
        result.captured_at,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        let selection = parse_selection("10, -5,200,100").unwrap();
        assert_eq!(selection, Selection::new(10, -5, 200, 100).unwrap());
        assert!(parse_selection("1,2,3").is_err());
        assert!(parse_selection("1,2,0,4").is_err());
        assert!(parse_selection("a,2,3,4").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "arcshot",
            "crop",
            "--x",
            "-10",
            "--y",
            "5",
            "--width",
            "20",
            "--height",
            "30",
            "in.png",
            "out.png",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Crop { x: -10, .. }));

        let cli = Cli::try_parse_from([
            "arcshot",
            "plan",
            "--scroll-height",
            "3000",
            "--viewport-height",
            "800",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Plan { selection: None, .. }));
    }
}
