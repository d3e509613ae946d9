//! Per-image annotation session.
//!
//! A [`Session`] owns everything that changes while one image is being
//! labeled: the committed regions, the drag in progress and the rectangle
//! waiting for a class digit. It consumes one [`InputEvent`] at a time and
//! reports whether the canvas needs to be redrawn or the session is over.

use image::RgbaImage;

use crate::geometry::{Point, Rect};
use crate::render::{self, Overlay};

/// Class index chosen with a digit key. Always in `0..=9`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassLabel(u8);

impl ClassLabel {
    pub fn new(value: u8) -> Option<Self> {
        (value <= 9).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        char::from(b'0' + self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabeledRegion {
    pub bounds: Rect,
    pub class: ClassLabel,
}

impl LabeledRegion {
    /// Same region on an image `factor` times larger.
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            bounds: self.bounds.scaled(factor),
            class: self.class,
        }
    }
}

// ── Input ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Digit(ClassLabel),
    Undo,
    Next,
    Escape,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    KeyPress(Key),
}

// ── State ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dragging,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// `n`: move on to the next image.
    Advance,
    /// ESC: stop the whole run after this image.
    Abort,
}

/// What handling a single event did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    Redraw,
    Finished(SessionEnd),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub regions: Vec<LabeledRegion>,
    pub end: SessionEnd,
}

#[derive(Clone, Debug)]
pub struct Session {
    committed: Vec<LabeledRegion>,
    anchor: Option<Point>,
    cursor: Option<Point>,
    provisional: Option<Rect>,
    phase: Phase,
    end: Option<SessionEnd>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            committed: Vec::new(),
            anchor: None,
            cursor: None,
            provisional: None,
            phase: Phase::Idle,
            end: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn regions(&self) -> &[LabeledRegion] {
        &self.committed
    }

    /// Rectangle from the last completed drag that has not been labeled yet.
    pub fn provisional(&self) -> Option<Rect> {
        self.provisional
    }

    pub fn handle(&mut self, event: InputEvent) -> Transition {
        if self.phase == Phase::Done {
            return Transition::Ignored;
        }
        match event {
            InputEvent::PointerDown(p) => self.pointer_down(p),
            InputEvent::PointerMove(p) => self.pointer_move(p),
            InputEvent::KeyPress(key) => self.key_press(key),
        }
    }

    fn pointer_down(&mut self, p: Point) -> Transition {
        match self.anchor.take() {
            None => {
                self.anchor = Some(p);
                self.cursor = Some(p);
                self.provisional = None;
                self.phase = Phase::Dragging;
                log::debug!("drag started at ({}, {})", p.x, p.y);
            }
            Some(anchor) => {
                let rect = Rect::from_corners(anchor, p);
                self.cursor = None;
                self.phase = Phase::Idle;
                self.provisional = (!rect.is_empty()).then_some(rect);
                log::debug!("drag finished: {rect:?}");
            }
        }
        Transition::Redraw
    }

    fn pointer_move(&mut self, p: Point) -> Transition {
        if self.phase != Phase::Dragging {
            return Transition::Ignored;
        }
        self.cursor = Some(p);
        Transition::Redraw
    }

    fn key_press(&mut self, key: Key) -> Transition {
        match key {
            Key::Digit(class) => self.commit(class),
            Key::Undo => self.undo(),
            Key::Next => self.finish(SessionEnd::Advance),
            Key::Escape => self.finish(SessionEnd::Abort),
            Key::Other => Transition::Ignored,
        }
    }

    fn commit(&mut self, class: ClassLabel) -> Transition {
        let Some(bounds) = self.provisional.take() else {
            return Transition::Ignored;
        };
        log::debug!("committed class {} at {bounds:?}", class.value());
        self.committed.push(LabeledRegion { bounds, class });
        Transition::Redraw
    }

    fn undo(&mut self) -> Transition {
        match self.committed.pop() {
            Some(removed) => {
                log::debug!("removed {removed:?}");
                Transition::Redraw
            }
            None => Transition::Ignored,
        }
    }

    fn finish(&mut self, end: SessionEnd) -> Transition {
        self.phase = Phase::Done;
        self.anchor = None;
        self.cursor = None;
        self.end = Some(end);
        Transition::Finished(end)
    }

    /// Compose the canvas for the current state on top of `base`.
    pub fn frame(&self, base: &RgbaImage) -> RgbaImage {
        let preview = match (self.anchor, self.cursor) {
            (Some(anchor), Some(cursor)) => Some((anchor, cursor)),
            _ => None,
        };
        render::compose(
            base,
            &Overlay {
                committed: &self.committed,
                provisional: self.provisional,
                preview,
            },
        )
    }

    /// Consume the session. A session that never finished counts as aborted.
    pub fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            regions: self.committed,
            end: self.end.unwrap_or(SessionEnd::Abort),
        }
    }
}

// ── Blocking driver ─────────────────────────────────────────────────────────

/// Blocking source of input events. `None` means the source is gone, for
/// instance because the window was closed.
pub trait EventSource {
    fn next_event(&mut self) -> Option<InputEvent>;
}

/// Display surface for one session.
pub trait Canvas {
    fn open(&mut self, title: &str);
    fn show(&mut self, frame: &RgbaImage);
    fn close(&mut self);
}

/// Feed one event to `session`, repainting `canvas` when the state changed.
/// Returns `true` once the session is over. Both [`run_session`] and the
/// window adapter drive sessions through this.
pub fn step(
    session: &mut Session,
    image: &RgbaImage,
    event: InputEvent,
    canvas: &mut impl Canvas,
) -> bool {
    match session.handle(event) {
        Transition::Ignored => false,
        Transition::Redraw => {
            canvas.show(&session.frame(image));
            false
        }
        Transition::Finished(end) => {
            log::debug!("session ended: {end:?}");
            true
        }
    }
}

/// Run one image's annotation pass to completion.
pub fn run_session(
    title: &str,
    image: &RgbaImage,
    events: &mut impl EventSource,
    canvas: &mut impl Canvas,
) -> SessionOutcome {
    let mut session = Session::new();
    canvas.open(title);
    canvas.show(image);

    while let Some(event) = events.next_event() {
        if step(&mut session, image, event, canvas) {
            break;
        }
    }

    canvas.close();
    session.into_outcome()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::VecDeque;

    fn down(x: i32, y: i32) -> InputEvent {
        InputEvent::PointerDown(Point::new(x, y))
    }

    fn moved(x: i32, y: i32) -> InputEvent {
        InputEvent::PointerMove(Point::new(x, y))
    }

    fn key(c: char) -> InputEvent {
        let key = match c {
            'd' => Key::Undo,
            'n' => Key::Next,
            '\u{1b}' => Key::Escape,
            c => c
                .to_digit(10)
                .and_then(|d| ClassLabel::new(d as u8))
                .map_or(Key::Other, Key::Digit),
        };
        InputEvent::KeyPress(key)
    }

    fn drag(session: &mut Session, from: (i32, i32), to: (i32, i32)) {
        session.handle(down(from.0, from.1));
        session.handle(moved(to.0, to.1));
        session.handle(down(to.0, to.1));
    }

    fn label(v: u8) -> ClassLabel {
        ClassLabel::new(v).unwrap()
    }

    #[test]
    fn class_labels_are_single_digits() {
        assert!(ClassLabel::new(9).is_some());
        assert!(ClassLabel::new(10).is_none());
        assert_eq!(label(3).as_char(), '3');
    }

    #[test]
    fn drag_then_commit_records_region() {
        let mut s = Session::new();
        assert_eq!(s.handle(down(10, 10)), Transition::Redraw);
        assert_eq!(s.phase(), Phase::Dragging);
        assert_eq!(s.handle(moved(30, 30)), Transition::Redraw);
        assert_eq!(s.handle(down(50, 60)), Transition::Redraw);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.provisional(), Some(Rect::new(10, 10, 40, 50)));

        assert_eq!(s.handle(key('3')), Transition::Redraw);
        assert_eq!(
            s.regions(),
            &[LabeledRegion {
                bounds: Rect::new(10, 10, 40, 50),
                class: label(3),
            }]
        );
        assert_eq!(s.provisional(), None);
    }

    #[test]
    fn every_drag_direction_commits_same_bounds() {
        let corners = [
            ((10, 20), (40, 60)),
            ((40, 60), (10, 20)),
            ((40, 20), (10, 60)),
            ((10, 60), (40, 20)),
        ];
        for (from, to) in corners {
            let mut s = Session::new();
            drag(&mut s, from, to);
            s.handle(key('1'));
            assert_eq!(s.regions()[0].bounds, Rect::new(10, 20, 30, 40));
        }
    }

    #[test]
    fn commit_without_completed_drag_is_noop() {
        let mut s = Session::new();
        assert_eq!(s.handle(key('1')), Transition::Ignored);
        assert!(s.regions().is_empty());

        // Mid-drag: the anchor alone is not a rectangle.
        s.handle(down(5, 5));
        s.handle(moved(20, 20));
        assert_eq!(s.handle(key('1')), Transition::Ignored);
        assert!(s.regions().is_empty());

        // A provisional rectangle can be labeled only once.
        s.handle(down(20, 20));
        s.handle(key('1'));
        assert_eq!(s.handle(key('2')), Transition::Ignored);
        assert_eq!(s.regions().len(), 1);
    }

    #[test]
    fn degenerate_drag_cannot_be_committed() {
        let mut s = Session::new();
        drag(&mut s, (10, 10), (10, 50));
        assert_eq!(s.provisional(), None);
        assert_eq!(s.handle(key('4')), Transition::Ignored);
        assert!(s.regions().is_empty());
    }

    #[test]
    fn starting_a_new_drag_discards_unlabeled_rectangle() {
        let mut s = Session::new();
        drag(&mut s, (0, 0), (10, 10));
        s.handle(down(50, 50));
        assert_eq!(s.provisional(), None);
        assert_eq!(s.handle(key('1')), Transition::Ignored);
    }

    #[test]
    fn undo_restores_previous_sequence() {
        let mut s = Session::new();
        drag(&mut s, (0, 0), (10, 10));
        s.handle(key('1'));
        let before = s.regions().to_vec();

        for round in 0..5 {
            drag(&mut s, (round, round), (round + 20, round + 30));
            s.handle(key('2'));
            assert_eq!(s.regions().len(), before.len() + 1);
            assert_eq!(s.handle(key('d')), Transition::Redraw);
            assert_eq!(s.regions(), before.as_slice());
        }
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut s = Session::new();
        assert_eq!(s.handle(key('d')), Transition::Ignored);
        assert!(s.regions().is_empty());
    }

    #[test]
    fn two_commits_then_undo_keeps_first() {
        let mut s = Session::new();
        drag(&mut s, (0, 0), (10, 10));
        s.handle(key('1'));
        drag(&mut s, (20, 20), (40, 40));
        s.handle(key('2'));
        s.handle(key('d'));
        assert_eq!(
            s.regions(),
            &[LabeledRegion {
                bounds: Rect::new(0, 0, 10, 10),
                class: label(1),
            }]
        );
    }

    #[test]
    fn moves_outside_a_drag_and_unknown_keys_are_ignored() {
        let mut s = Session::new();
        assert_eq!(s.handle(moved(3, 4)), Transition::Ignored);
        assert_eq!(s.handle(key('q')), Transition::Ignored);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn abort_keeps_committed_regions() {
        let mut s = Session::new();
        drag(&mut s, (0, 0), (10, 10));
        s.handle(key('5'));
        assert_eq!(
            s.handle(key('\u{1b}')),
            Transition::Finished(SessionEnd::Abort)
        );
        assert_eq!(s.phase(), Phase::Done);
        // Nothing is processed after the session ends.
        assert_eq!(s.handle(key('d')), Transition::Ignored);

        let outcome = s.into_outcome();
        assert_eq!(outcome.end, SessionEnd::Abort);
        assert_eq!(outcome.regions.len(), 1);
    }

    #[test]
    fn preview_does_not_touch_committed_state() {
        let base = RgbaImage::from_pixel(80, 80, Rgba([0, 0, 0, 255]));
        let mut s = Session::new();
        s.handle(down(10, 10));
        s.handle(moved(60, 70));
        let frame = s.frame(&base);
        assert_eq!(*frame.get_pixel(60, 40), render::PREVIEW_COLOR);
        assert!(s.regions().is_empty());
        assert_eq!(s.provisional(), None);
    }

    struct Scripted(VecDeque<InputEvent>);

    impl EventSource for Scripted {
        fn next_event(&mut self) -> Option<InputEvent> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct RecordingCanvas {
        opened: Option<String>,
        frames: usize,
        closed: bool,
    }

    impl Canvas for RecordingCanvas {
        fn open(&mut self, title: &str) {
            self.opened = Some(title.to_string());
        }

        fn show(&mut self, _frame: &RgbaImage) {
            self.frames += 1;
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn step_repaints_only_on_state_change() {
        let image = RgbaImage::new(50, 50);
        let mut canvas = RecordingCanvas::default();
        let mut s = Session::new();

        assert!(!step(&mut s, &image, moved(5, 5), &mut canvas));
        assert_eq!(canvas.frames, 0);
        assert!(!step(&mut s, &image, down(5, 5), &mut canvas));
        assert!(!step(&mut s, &image, moved(20, 20), &mut canvas));
        assert_eq!(canvas.frames, 2);
        assert!(step(&mut s, &image, key('n'), &mut canvas));
        assert_eq!(canvas.frames, 2);
    }

    #[test]
    fn run_session_returns_on_advance_and_closes_canvas() {
        let image = RgbaImage::new(200, 100);
        let mut events = Scripted(VecDeque::from(vec![
            down(10, 10),
            moved(50, 60),
            down(50, 60),
            key('3'),
            key('x'),
            key('n'),
            // Never read: the session is over.
            key('d'),
        ]));
        let mut canvas = RecordingCanvas::default();

        let outcome = run_session("a.png", &image, &mut events, &mut canvas);

        assert_eq!(outcome.end, SessionEnd::Advance);
        assert_eq!(outcome.regions.len(), 1);
        assert_eq!(outcome.regions[0].class, label(3));
        assert_eq!(events.0.len(), 1);
        assert_eq!(canvas.opened.as_deref(), Some("a.png"));
        // Initial frame plus one per redraw (down, move, down, commit).
        assert_eq!(canvas.frames, 5);
        assert!(canvas.closed);
    }

    #[test]
    fn run_session_treats_exhausted_source_as_abort() {
        let image = RgbaImage::new(10, 10);
        let mut events = Scripted(VecDeque::new());
        let mut canvas = RecordingCanvas::default();

        let outcome = run_session("b.png", &image, &mut events, &mut canvas);

        assert_eq!(outcome.end, SessionEnd::Abort);
        assert!(outcome.regions.is_empty());
        assert!(canvas.closed);
    }
}
