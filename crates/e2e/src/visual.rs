//! Baseline comparison for the metabox screenshot

use std::path::{Path, PathBuf};

use image::{Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference tolerated before a pixel counts as changed
/// (anti-aliasing, font hinting).
const CHANNEL_TOLERANCE: i32 = 5;

/// Visual check configuration (`[visual]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Directory of baseline PNGs; `None` disables the check
    pub baseline_dir: Option<PathBuf>,

    pub diff_dir: PathBuf,

    /// Allowed share of differing pixels (0.0 - 100.0 percent)
    pub threshold: f64,

    /// Write the current screenshot as the new baseline
    pub update_baseline: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: None,
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            update_baseline: false,
        }
    }
}

/// Outcome of comparing one screenshot with its baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiff {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
    pub baseline_created: bool,
}

impl VisualDiff {
    fn identical(name: &str, total_pixels: u64, baseline_created: bool) -> Self {
        Self {
            name: name.to_string(),
            matches: true,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels,
            diff_image_path: None,
            baseline_created,
        }
    }

    /// Turn a mismatch into an error
    pub fn into_result(self, threshold: f64) -> E2eResult<Self> {
        if self.matches {
            Ok(self)
        } else {
            Err(E2eError::ScreenshotMismatch {
                name: self.name,
                diff_percent: self.diff_percent,
                threshold,
            })
        }
    }
}

pub struct VisualTester {
    baseline_dir: PathBuf,
    diff_dir: PathBuf,
    threshold: f64,
    update_baseline: bool,
}

impl VisualTester {
    /// `None` when no baseline directory is configured
    pub fn from_config(config: &VisualConfig) -> E2eResult<Option<Self>> {
        let Some(baseline_dir) = config.baseline_dir.clone() else {
            return Ok(None);
        };
        std::fs::create_dir_all(&baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Some(Self {
            baseline_dir,
            diff_dir: config.diff_dir.clone(),
            threshold: config.threshold,
            update_baseline: config.update_baseline,
        }))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare `actual` against `<baseline_dir>/<file stem>.png`
    ///
    /// Returns `Ok(None)` when there is no baseline yet and updating is off.
    pub fn compare(&self, actual: &Path) -> E2eResult<Option<VisualDiff>> {
        let name = actual
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                E2eError::VisualRegression(format!("no file name in {}", actual.display()))
            })?;

        if !actual.is_file() {
            return Err(E2eError::VisualRegression(format!(
                "screenshot not found: {}",
                actual.display()
            )));
        }

        let baseline = self.baseline_dir.join(format!("{}.png", name));

        if self.update_baseline {
            std::fs::copy(actual, &baseline)?;
            info!("Baseline for '{}' written to {}", name, baseline.display());
            return Ok(Some(VisualDiff::identical(&name, 0, true)));
        }

        if !baseline.exists() {
            info!(
                "No baseline for '{}' at {} - rerun with update_baseline to create it",
                name,
                baseline.display()
            );
            return Ok(None);
        }

        if sha256_file(actual)? == sha256_file(&baseline)? {
            debug!("'{}' is byte-identical to its baseline", name);
            let img = image::open(actual)?;
            let total = u64::from(img.width()) * u64::from(img.height());
            return Ok(Some(VisualDiff::identical(&name, total, false)));
        }

        let actual_img = image::open(actual)?.to_rgba8();
        let baseline_img = image::open(&baseline)?.to_rgba8();
        let mut diff = diff_images(&name, &actual_img, &baseline_img, self.threshold);

        if diff.diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            render_diff(&actual_img, &baseline_img).save(&path)?;
            diff.diff_image_path = Some(path);
        }

        if !diff.matches {
            warn!(
                "'{}' differs from baseline by {:.2}% (threshold {:.2}%)",
                name, diff.diff_percent, self.threshold
            );
        }

        Ok(Some(diff))
    }
}

/// Count differing pixels. Pixels outside the overlap of differently sized
/// images all count as differing.
fn diff_images(name: &str, actual: &RgbaImage, baseline: &RgbaImage, threshold: f64) -> VisualDiff {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let total_pixels = u64::from(width) * u64::from(height);

    let mut diff_pixels = 0u64;
    for y in 0..height {
        for x in 0..width {
            let differs = match (actual.get_pixel_checked(x, y), baseline.get_pixel_checked(x, y)) {
                (Some(a), Some(b)) => pixels_differ(a, b),
                _ => true,
            };
            if differs {
                diff_pixels += 1;
            }
        }
    }

    let diff_percent = if total_pixels == 0 {
        0.0
    } else {
        diff_pixels as f64 / total_pixels as f64 * 100.0
    };

    VisualDiff {
        name: name.to_string(),
        matches: diff_percent <= threshold,
        diff_percent,
        diff_pixels,
        total_pixels,
        diff_image_path: None,
        baseline_created: false,
    }
}

/// Red where pixels differ, the dimmed actual image elsewhere
fn render_diff(actual: &RgbaImage, baseline: &RgbaImage) -> RgbaImage {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());

    RgbaImage::from_fn(width, height, |x, y| {
        match (actual.get_pixel_checked(x, y), baseline.get_pixel_checked(x, y)) {
            (Some(a), Some(b)) if !pixels_differ(a, b) => {
                let c = a.channels();
                Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128])
            }
            _ => Rgba([255, 0, 0, 255]),
        }
    })
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > CHANNEL_TOLERANCE)
}

pub fn sha256_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&data)))
}
