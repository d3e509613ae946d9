//! Interactive bounding-box annotation over a folder of images.
//!
//! Each readable image gets one [`session::Session`]; the [`batch::Batch`]
//! collects the labeled regions and [`output`] writes them out as one text
//! file per image, either as pixel boxes or as normalized yolo boxes.

pub mod app;
pub mod batch;
pub mod config;
pub mod geometry;
pub mod output;
pub mod render;
pub mod session;
