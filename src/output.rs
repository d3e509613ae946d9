//! Label files: one `.txt` next to each annotated image, one line per region.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::batch::AnnotationResult;
use crate::session::LabeledRegion;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// `class x y width height` in pixels.
    #[default]
    Raw,
    /// `class cx cy w h`, each relative to the image size.
    Yolo,
}

pub fn annotation_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("txt")
}

/// Digits after the decimal point in yolo coordinates.
pub const YOLO_DECIMALS: usize = 6;

/// The class is written as its decimal index. Yolo coordinates are rounded to
/// [`YOLO_DECIMALS`] places with trailing zeros dropped.
pub fn format_line(region: &LabeledRegion, format: Format, width: u32, height: u32) -> String {
    let class = region.class.value();
    let r = region.bounds;
    match format {
        Format::Raw => format!("{class} {} {} {} {}", r.x, r.y, r.width, r.height),
        Format::Yolo => {
            let b = r.to_normalized(width, height);
            format!(
                "{class} {} {} {} {}",
                fraction(b.cx),
                fraction(b.cy),
                fraction(b.w),
                fraction(b.h)
            )
        }
    }
}

fn fraction(v: f64) -> String {
    let s = format!("{:.*}", YOLO_DECIMALS, v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Write every entry of `result` and return the number of files written.
/// Stops at the first file that cannot be created; files already written are
/// left as they are.
pub fn write_annotations(result: &AnnotationResult, format: Format) -> Result<usize> {
    let mut written = 0;
    for (image_path, annotations) in result {
        let path = annotation_path(image_path);
        let file = File::create(&path).with_context(|| {
            format!(
                "could not open {} for writing; check that the image folder is writable",
                path.display()
            )
        })?;
        let mut out = BufWriter::new(file);
        for region in &annotations.regions {
            writeln!(
                out,
                "{}",
                format_line(region, format, annotations.width, annotations.height)
            )
            .with_context(|| format!("failed to write {}", path.display()))?;
        }
        out.flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!(
            "wrote {} line(s) to {}",
            annotations.regions.len(),
            path.display()
        );
        written += 1;
    }
    Ok(written)
}
