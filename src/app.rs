//! Window adapter: turns egui input into session events and shows the
//! composed frame for the image being annotated.

use std::cell::RefCell;
use std::rc::Rc;

use eframe::egui;
use image::RgbaImage;

use crate::batch::{AnnotationResult, Batch, PreparedImage};
use crate::geometry::Point;
use crate::session::{self, Canvas, ClassLabel, InputEvent, Key, Session};

/// Where the app leaves the collected annotations once the batch is over.
pub type Handoff = Rc<RefCell<Option<AnnotationResult>>>;

/// The window's texture, title and size, scoped to one session at a time.
struct WindowCanvas {
    ctx: egui::Context,
    texture: Option<egui::TextureHandle>,
}

impl Canvas for WindowCanvas {
    fn open(&mut self, title: &str) {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Title(title.to_string()));
    }

    fn show(&mut self, frame: &RgbaImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image =
            egui::ColorImage::from_rgba_unmultiplied(size, frame.as_flat_samples().as_slice());
        match self.texture.as_mut() {
            Some(tex) => tex.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                let ppp = self.ctx.pixels_per_point();
                self.ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(
                    frame.width() as f32 / ppp,
                    frame.height() as f32 / ppp,
                )));
                self.texture = Some(self.ctx.load_texture(
                    "canvas",
                    color_image,
                    egui::TextureOptions::NEAREST,
                ));
            }
        }
        self.ctx.request_repaint();
    }

    fn close(&mut self) {
        self.texture = None;
    }
}

struct Active {
    image: PreparedImage,
    session: Session,
}

pub struct AnnotatorApp {
    batch: Option<Batch>,
    current: Option<Active>,
    handoff: Handoff,

    canvas: WindowCanvas,
    // Where the image was painted last frame, in screen points.
    image_rect: Option<egui::Rect>,
}

impl AnnotatorApp {
    pub fn new(ctx: &egui::Context, mut batch: Batch, handoff: Handoff) -> Self {
        let first = batch.next_image();
        let mut app = Self {
            batch: Some(batch),
            current: None,
            handoff,
            canvas: WindowCanvas {
                ctx: ctx.clone(),
                texture: None,
            },
            image_rect: None,
        };
        app.begin(first);
        app
    }

    fn begin(&mut self, next: Option<PreparedImage>) {
        let Some(image) = next else {
            self.finish_batch();
            return;
        };
        log::info!("annotating {}", image.path.display());
        self.canvas.open(&image.path.display().to_string());
        self.canvas.show(&image.display);
        self.current = Some(Active {
            image,
            session: Session::new(),
        });
    }

    /// Close the current session and open whatever the batch hands out next.
    fn end_current(&mut self) {
        let Some(Active { image, session }) = self.current.take() else {
            return;
        };
        self.canvas.close();
        self.image_rect = None;
        let next = self
            .batch
            .as_mut()
            .and_then(|batch| batch.advance(&image, session.into_outcome()));
        self.begin(next);
    }

    fn finish_batch(&mut self) {
        if let Some(batch) = self.batch.take() {
            *self.handoff.borrow_mut() = Some(batch.finish());
        }
        self.canvas.ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    /// Stop the run as if ESC had been pressed, keeping the current image.
    fn abort(&mut self) {
        if let Some(active) = self.current.as_mut() {
            active.session.handle(InputEvent::KeyPress(Key::Escape));
        }
        self.end_current();
        self.finish_batch();
    }

    /// Convert a screen position to image pixels. Presses outside the image
    /// are dropped; motion is clamped so a drag can run up to the border.
    fn screen_to_image(&self, pos: egui::Pos2, clamp: bool) -> Option<Point> {
        let rect = self.image_rect?;
        let active = self.current.as_ref()?;
        if !clamp && !rect.contains(pos) {
            return None;
        }
        let (w, h) = active.image.display.dimensions();
        let rel = (pos - rect.min) / rect.size();
        let x = (rel.x * w as f32).floor().clamp(0.0, w.saturating_sub(1) as f32);
        let y = (rel.y * h as f32).floor().clamp(0.0, h.saturating_sub(1) as f32);
        Some(Point::new(x as i32, y as i32))
    }

    fn translate(&self, event: &egui::Event) -> Option<InputEvent> {
        match event {
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed: true,
                ..
            } => self.screen_to_image(*pos, false).map(InputEvent::PointerDown),
            egui::Event::PointerMoved(pos) => {
                self.screen_to_image(*pos, true).map(InputEvent::PointerMove)
            }
            egui::Event::Key {
                key,
                pressed: true,
                repeat: false,
                modifiers,
                ..
            } => Some(InputEvent::KeyPress(if modifiers.is_none() {
                map_key(*key)
            } else {
                Key::Other
            })),
            _ => None,
        }
    }

    fn dispatch(&mut self, events: &[egui::Event]) {
        for event in events {
            let Some(input) = self.translate(event) else {
                continue;
            };
            let Some(active) = self.current.as_mut() else {
                return;
            };
            if session::step(
                &mut active.session,
                &active.image.display,
                input,
                &mut self.canvas,
            ) {
                // Anything left in this batch of events was aimed at the
                // image being closed.
                self.end_current();
                return;
            }
        }
    }
}

fn map_key(key: egui::Key) -> Key {
    use egui::Key as K;
    let digit = match key {
        K::Num0 => 0,
        K::Num1 => 1,
        K::Num2 => 2,
        K::Num3 => 3,
        K::Num4 => 4,
        K::Num5 => 5,
        K::Num6 => 6,
        K::Num7 => 7,
        K::Num8 => 8,
        K::Num9 => 9,
        K::D => return Key::Undo,
        K::N => return Key::Next,
        K::Escape => return Key::Escape,
        _ => return Key::Other,
    };
    ClassLabel::new(digit).map_or(Key::Other, Key::Digit)
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            log::info!("window closed, stopping");
            self.abort();
            return;
        }

        let events = ctx.input(|i| i.events.clone());
        self.dispatch(&events);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let Some(tex) = self.canvas.texture.as_ref() else {
                    self.image_rect = None;
                    return;
                };
                let size = tex.size_vec2() / ctx.pixels_per_point();
                let (rect, _response) =
                    ui.allocate_exact_size(size, egui::Sense::click_and_drag());
                ui.painter().image(
                    tex.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                self.image_rect = Some(rect);
            });
    }
}
