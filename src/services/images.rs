//! Renumbers and reformats an entry's supplementary images
//!
//! Maintenance pass over everything in an entry directory except the cover:
//! eligible images are sorted by current filename and rewritten to
//! `{base}-{i}.jpg`. Running it twice in a row is a no-op the second time.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
use tracing::{debug, error, info, warn};

use super::acquire::COVER_FILENAME;
use super::record;
use super::sanitize::sanitize_name;

/// Extensions (lowercase, no dot) accepted for conversion to jpg.
const CONVERTIBLE_EXTENSIONS: &[&str] = &["png", "webp", "jpeg", "bmp", "gif", "tiff"];

const CANONICAL_EXTENSION: &str = "jpg";
const JPEG_QUALITY: u8 = 90;

/// Per-directory outcome; the pass failed iff any single file failed.
#[derive(Debug, Default)]
pub struct NormalizeSummary {
    pub renamed: usize,
    pub converted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl NormalizeSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

enum Outcome {
    Renamed,
    Converted,
}

/// Normalizes every non-cover image in `dir`.
///
/// The naming base is the record's `name` when readable, the directory's
/// own name otherwise. Per-file faults are logged and counted; processing
/// always continues with the remaining files.
pub fn normalize_images(dir: &Path) -> Result<NormalizeSummary> {
    info!(dir = %dir.display(), "Normalizing images");

    let base = record::display_name(dir).unwrap_or_else(|| {
        let fallback = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        warn!(dir = %dir.display(), "No readable record name, using directory name");
        fallback
    });
    let safe_base = sanitize_name(&base);

    let mut files = eligible_files(dir)?;
    files.sort();

    if files.is_empty() {
        info!(dir = %dir.display(), "No images to process");
        return Ok(NormalizeSummary::default());
    }

    let mut summary = NormalizeSummary::default();
    for (index, old_path) in files.iter().enumerate() {
        let target = dir.join(format!("{}-{}.{}", safe_base, index + 1, CANONICAL_EXTENSION));

        if *old_path == target {
            debug!(file = %target.display(), "Already normalized");
            summary.unchanged += 1;
            continue;
        }

        match normalize_one(old_path, &target) {
            Ok(Outcome::Renamed) => summary.renamed += 1,
            Ok(Outcome::Converted) => summary.converted += 1,
            Err(e) => {
                error!(error = %e, file = %old_path.display(), "Failed to process image");
                summary.failed += 1;
                // Best effort: do not leave a half-written target behind.
                if target.exists() {
                    let _ = fs::remove_file(&target);
                }
            }
        }
    }

    info!(
        dir = %dir.display(),
        renamed = summary.renamed,
        converted = summary.converted,
        unchanged = summary.unchanged,
        failed = summary.failed,
        "Image normalization finished"
    );
    Ok(summary)
}

/// Non-cover files whose extension is the canonical format or convertible.
fn eligible_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(COVER_FILENAME)
        {
            continue;
        }
        let Some(ext) = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
        else {
            continue;
        };
        if ext == CANONICAL_EXTENSION || CONVERTIBLE_EXTENSIONS.contains(&ext.as_str()) {
            files.push(path);
        }
    }

    Ok(files)
}

fn normalize_one(old_path: &Path, target: &Path) -> Result<Outcome> {
    let ext = old_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == CANONICAL_EXTENSION {
        debug!(from = %old_path.display(), to = %target.display(), "Renaming");
        fs::rename(old_path, target)
            .with_context(|| format!("Failed to rename {}", old_path.display()))?;
        return Ok(Outcome::Renamed);
    }

    debug!(from = %old_path.display(), to = %target.display(), "Converting");
    let img =
        image::open(old_path).with_context(|| format!("Failed to decode {}", old_path.display()))?;
    let rgb = flatten_to_white(img);

    let file = File::create(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .with_context(|| format!("Failed to encode {}", target.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", target.display()))?;

    // The converted copy is safe on disk; a stuck original is only clutter.
    if let Err(e) = fs::remove_file(old_path) {
        warn!(error = %e, file = %old_path.display(), "Converted but could not delete the original");
    }

    Ok(Outcome::Converted)
}

/// Alpha and palette sources (GIF/PNG decode to RGBA) are composited onto
/// opaque white so transparent regions do not turn black in the JPEG.
fn flatten_to_white(img: DynamicImage) -> RgbImage {
    if img.color().has_alpha() {
        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut canvas, &rgba, 0, 0);
        DynamicImage::ImageRgba8(canvas).into_rgb8()
    } else {
        img.into_rgb8()
    }
}
