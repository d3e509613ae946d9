use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;

use bbox_annotate::app::{AnnotatorApp, Handoff};
use bbox_annotate::batch::{list_images, Batch};
use bbox_annotate::config::Cli;
use bbox_annotate::output::write_annotations;

const KEY_TIPS: &str = "\
* mark rectangles with the left mouse button (click a corner, then the opposite corner),
* a second click on the same row or column as the first gives no rectangle and is ignored,
* press {'0','1','2','3','4','5','6','7','8','9'} to accept a selection,
* press 'd' to delete the latest selection,
* press 'n' to proceed with next image,
* press 'esc' to stop.";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let paths = list_images(&cli.images)?;
    if paths.is_empty() {
        log::warn!("no files found in {}", cli.images.display());
        return Ok(());
    }

    println!("{KEY_TIPS}");

    let batch = Batch::new(paths, cli.batch_options());
    let handoff: Handoff = Rc::new(RefCell::new(None));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_resizable(false)
            .with_title("bbox-annotate"),
        ..Default::default()
    };

    let app_handoff = handoff.clone();
    eframe::run_native(
        "bbox-annotate",
        options,
        Box::new(move |cc| Ok(Box::new(AnnotatorApp::new(&cc.egui_ctx, batch, app_handoff)))),
    )
    .map_err(|err| anyhow!("failed to run annotation window: {err}"))?;

    let Some(result) = handoff.borrow_mut().take() else {
        log::warn!("annotation window closed before any results were collected");
        return Ok(());
    };

    let written = write_annotations(&result, cli.format())
        .context("annotations were not saved completely")?;
    log::info!("wrote {written} annotation file(s)");
    Ok(())
}
