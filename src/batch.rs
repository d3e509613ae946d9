//! Runs one session per image and collects the results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GenericImageView, RgbaImage};

use crate::session::{LabeledRegion, SessionEnd, SessionOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Images taller than this are shown downscaled.
    pub max_window_height: Option<u32>,
    pub resize_factor: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_window_height: None,
            resize_factor: 2,
        }
    }
}

/// An image ready to be annotated.
pub struct PreparedImage {
    pub path: PathBuf,
    /// What the operator sees and draws on.
    pub display: RgbaImage,
    /// Dimensions of the file on disk.
    pub original_size: (u32, u32),
    /// Factor mapping display coordinates back onto the original.
    pub scale: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAnnotations {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<LabeledRegion>,
}

pub type AnnotationResult = BTreeMap<PathBuf, ImageAnnotations>;

/// List the entries of `dir` in the order the filesystem returns them.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read image folder: {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read image folder: {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

pub struct Batch {
    pending: std::vec::IntoIter<PathBuf>,
    options: BatchOptions,
    result: AnnotationResult,
    stopped: bool,
}

impl Batch {
    pub fn new(paths: Vec<PathBuf>, options: BatchOptions) -> Self {
        Self {
            pending: paths.into_iter(),
            options,
            result: AnnotationResult::new(),
            stopped: false,
        }
    }

    /// Load the next readable image. Files that fail to decode are skipped
    /// and never show up in the result.
    pub fn next_image(&mut self) -> Option<PreparedImage> {
        if self.stopped {
            return None;
        }
        for path in self.pending.by_ref() {
            match image::open(&path) {
                Ok(img) => return Some(prepare(path, img, &self.options)),
                Err(err) => log::warn!("skipping {}: {err}", path.display()),
            }
        }
        None
    }

    /// Record `image`'s finished session and load the image to show next.
    /// Returns `None` when the run is over, either because the operator
    /// stopped it or because no readable images are left.
    pub fn advance(
        &mut self,
        image: &PreparedImage,
        outcome: SessionOutcome,
    ) -> Option<PreparedImage> {
        if self.record(image, outcome) {
            self.next_image()
        } else {
            None
        }
    }

    /// Store a finished session, mapped back to original image coordinates.
    /// Returns `false` once the operator has asked to stop.
    fn record(&mut self, image: &PreparedImage, outcome: SessionOutcome) -> bool {
        let regions: Vec<LabeledRegion> = outcome
            .regions
            .iter()
            .map(|r| r.scaled(image.scale))
            .collect();
        log::info!(
            "{}: {} region(s){}",
            image.path.display(),
            regions.len(),
            if outcome.end == SessionEnd::Abort {
                ", stopping"
            } else {
                ""
            }
        );
        let (width, height) = image.original_size;
        self.result.insert(
            image.path.clone(),
            ImageAnnotations {
                width,
                height,
                regions,
            },
        );
        if outcome.end == SessionEnd::Abort {
            self.stopped = true;
        }
        !self.stopped
    }

    pub fn finish(self) -> AnnotationResult {
        self.result
    }
}

fn prepare(path: PathBuf, img: image::DynamicImage, options: &BatchOptions) -> PreparedImage {
    let (width, height) = img.dimensions();
    let factor = options.resize_factor.max(1);
    let oversized = options.max_window_height.is_some_and(|max| height > max);

    let display = if oversized && factor > 1 {
        log::debug!("{}: showing at 1/{factor} size", path.display());
        image::imageops::resize(
            &img.to_rgba8(),
            (width / factor).max(1),
            (height / factor).max(1),
            FilterType::Triangle,
        )
    } else {
        img.to_rgba8()
    };

    PreparedImage {
        path,
        display,
        original_size: (width, height),
        scale: if oversized { factor } else { 1 },
    }
}

/// Drive `batch` to completion, calling `annotate` once per readable image.
pub fn run_batch(
    mut batch: Batch,
    mut annotate: impl FnMut(&PreparedImage) -> SessionOutcome,
) -> AnnotationResult {
    let mut current = batch.next_image();
    while let Some(image) = current {
        let outcome = annotate(&image);
        current = batch.advance(&image, outcome);
    }
    batch.finish()
}
