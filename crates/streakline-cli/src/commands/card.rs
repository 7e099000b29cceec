use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use streakline_core::render::{render_card, render_placeholder};
use streakline_core::store::{AnalyticsStore, StoreHandle};
use tokio::runtime::Runtime;

use crate::settings::Settings;

const MIN_SCALE: f32 = 0.5;
const MAX_SCALE: f32 = 4.0;

pub fn run_card(username: &str, output: Option<PathBuf>, png: bool, scale: f32) -> Result<()> {
    let key = streakline_core::canonical_username(username)?;

    let settings = Settings::load();
    let store = StoreHandle::new(settings.database_path());

    let rt = Runtime::new()?;
    let record = rt
        .block_on(store.find(&key))
        .context("Failed to read analytics database")?;

    let svg = match &record {
        Some(record) => render_card(record),
        None => {
            eprintln!(
                "  {}",
                format!("No analytics data for {}; writing placeholder card", username).yellow()
            );
            render_placeholder()
        }
    };

    let bytes = if png {
        svg_to_png(&svg, scale)?
    } else {
        svg.into_bytes()
    };

    let output = output.unwrap_or_else(|| default_output(username, png));
    write_output(&output, &bytes)?;

    println!("  {} {}", "Saved card to".green(), output.display());
    Ok(())
}

fn default_output(username: &str, png: bool) -> PathBuf {
    let ext = if png { "png" } else { "svg" };
    PathBuf::from(format!("{}-stats.{}", username, ext))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Rasterize an SVG document at `scale` times its intrinsic size.
pub fn svg_to_png(svg: &str, scale: f32) -> Result<Vec<u8>> {
    let scale = scale.clamp(MIN_SCALE, MAX_SCALE);

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|err| anyhow::anyhow!("Failed to parse SVG: {err:?}"))?;

    let scaled_size = tree
        .size()
        .to_int_size()
        .scale_by(scale)
        .ok_or_else(|| anyhow::anyhow!("Invalid scaled SVG size"))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(scaled_size.width(), scaled_size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to create pixmap"))?;
    let transform = resvg::tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| anyhow::anyhow!("Failed to encode PNG: {err}"))
}
