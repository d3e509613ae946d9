use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{ArgAction, Parser};

use crate::batch::BatchOptions;
use crate::output::Format;

#[derive(Parser, Debug)]
#[command(
    name = "bbox-annotate",
    version,
    about = "Draw and label bounding boxes over a folder of images",
    after_help = "TIP: Use absolute paths to avoid any problems with the software!"
)]
pub struct Cli {
    /// Path to the image folder
    #[arg(short, long)]
    pub images: PathBuf,
    /// Images taller than this are scaled down for display (<= 0 disables)
    #[arg(
        short = 'm',
        long,
        visible_alias = "maxWindowHeight",
        allow_negative_numbers = true
    )]
    pub max_window_height: Option<i64>,
    /// Divisor used when scaling images down
    #[arg(
        short = 'r',
        long,
        visible_alias = "resizeFactor",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub resize_factor: u32,
    /// Write normalized center/size (yolo) labels instead of pixel boxes
    #[arg(long, action = ArgAction::SetTrue)]
    pub yolo: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.images.is_dir(),
            "image folder does not exist or is not a directory: {}",
            self.images.display()
        );
        Ok(())
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            max_window_height: self
                .max_window_height
                .filter(|&h| h > 0)
                .map(|h| u32::try_from(h).unwrap_or(u32::MAX)),
            resize_factor: self.resize_factor,
        }
    }

    pub fn format(&self) -> Format {
        if self.yolo {
            Format::Yolo
        } else {
            Format::Raw
        }
    }
}
