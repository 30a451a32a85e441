// ============================================================================
// EDIT SESSION — the one object that owns the canvas, history and results
// ============================================================================
//
// All user intents (pointer, keyboard, wheel, load, submit) go through
// `EditSession`. State transitions are explicit:
//
//   Idle --pointer_down--> Brushing --pointer_up--> Idle
//   Idle --begin_submit--> Submitting --finish_submit--> Idle
//
// Only one gesture or request is ever active. Without a loaded image every
// canvas operation is a silent no-op.

use std::path::Path;

use eframe::egui::Pos2;
use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{CursorData, Point, Viewport, map_pointer};
use crate::components::history::{HistoryManager, HistoryStep};
use crate::error::{EditError, Result};
use crate::io::{encode_png, load_image, save_png};
use crate::ops::brush::{self, BrushMode, BrushStyle};
use crate::ops::compositor::{self, PaddingInfo};
use crate::ops::edit_api::{self, EditRequest, EditService, RESPONSE_FORMAT};
use crate::settings::EditorSettings;

/// Brush slider range, in screen units.
pub const MIN_BRUSH_WIDTH: f32 = 10.0;
pub const MAX_BRUSH_WIDTH: f32 = 500.0;

/// An in-progress gesture, in canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    /// Where the gesture started (marquee corner).
    pub anchor: Point,
    /// Most recent pointer position.
    pub last: Point,
}

/// The request currently waiting on the edit service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSubmit {
    pub ticket: u64,
    /// Base image the request was built from.
    pub image_id: Uuid,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Brushing(Stroke),
    Submitting(PendingSubmit),
}

/// Handed out by `begin_submit`; the request runs elsewhere and its outcome
/// comes back through `finish_submit` with the same id.
#[derive(Clone, Debug)]
pub struct SubmitTicket {
    pub id: u64,
    pub request: EditRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Candidates stored, the first one is now on the canvas.
    Applied { candidates: usize },
    /// Request failed or returned nothing; canvas untouched.
    Failed(String),
    /// Response belongs to an old request or an image no longer shown.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushKey {
    Grow,
    Shrink,
}

struct LoadedImage {
    /// Working canvas: the current image with painted regions erased.
    canvas: RgbaImage,
    /// Current image without any mask painted on it.
    base: RgbaImage,
    /// Image shown before the last accepted edit.
    original: RgbaImage,
    padding: PaddingInfo,
    id: Uuid,
}

impl LoadedImage {
    fn install(&mut self, image: RgbaImage) {
        self.canvas = image.clone();
        self.base = image;
        self.id = Uuid::new_v4();
    }
}

pub struct EditSession {
    settings: EditorSettings,
    image: Option<LoadedImage>,
    history: HistoryManager,
    cursor: CursorData,
    viewport: Viewport,
    style: BrushStyle,
    state: SessionState,
    results: Vec<RgbaImage>,
    next_ticket: u64,
    /// Bumped on every canvas change, so views know when to re-upload.
    revision: u64,
}

impl EditSession {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            history: HistoryManager::new(settings.max_undo_steps),
            cursor: CursorData::new(settings.default_brush_width),
            viewport: Viewport::new(settings.initial_scale),
            settings,
            image: None,
            style: BrushStyle::default(),
            state: SessionState::Idle,
            results: Vec::new(),
            next_ticket: 1,
            revision: 0,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while an edit request is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Submitting(_))
    }

    pub fn canvas(&self) -> Option<&RgbaImage> {
        self.image.as_ref().map(|i| &i.canvas)
    }

    pub fn base_image(&self) -> Option<&RgbaImage> {
        self.image.as_ref().map(|i| &i.base)
    }

    pub fn original_image(&self) -> Option<&RgbaImage> {
        self.image.as_ref().map(|i| &i.original)
    }

    pub fn padding(&self) -> Option<PaddingInfo> {
        self.image.as_ref().map(|i| i.padding)
    }

    pub fn image_id(&self) -> Option<Uuid> {
        self.image.as_ref().map(|i| i.id)
    }

    pub fn results(&self) -> &[RgbaImage] {
        &self.results
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn cursor(&self) -> CursorData {
        self.cursor
    }

    pub fn scale(&self) -> f32 {
        self.viewport.scale()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn style(&self) -> BrushStyle {
        self.style
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Brush radius in canvas units.
    pub fn brush_radius(&self) -> f32 {
        self.cursor.canvas_radius(self.viewport.scale())
    }

    /// Marquee rectangle being dragged, in canvas space.
    pub fn marquee_preview(&self) -> Option<(Point, Point)> {
        match (self.style, self.state) {
            (BrushStyle::Marquee, SessionState::Brushing(stroke)) => {
                Some((stroke.anchor, stroke.last))
            }
            _ => None,
        }
    }

    // -- Loading ----------------------------------------------------------

    /// Install a new base image. History and results are dropped; a request
    /// still in flight will be discarded when it returns.
    pub fn load_image(&mut self, image: RgbaImage) {
        self.end_stroke();
        let (fitted, padding) = compositor::fit_image(&image, self.settings.square_size);
        drop(image);
        log_info!(
            "Loaded image as {}x{} (offset {},{})",
            padding.img_width,
            padding.img_height,
            padding.offset_x,
            padding.offset_y
        );
        self.image = Some(LoadedImage {
            canvas: fitted.clone(),
            base: fitted.clone(),
            original: fitted,
            padding,
            id: Uuid::new_v4(),
        });
        self.history.clear();
        self.results.clear();
        self.revision += 1;
    }

    pub fn load_image_file(&mut self, path: &Path) -> Result<()> {
        let image = load_image(path)?;
        self.load_image(image);
        Ok(())
    }

    // -- Pointer ------------------------------------------------------------

    /// Track the on-screen cursor without painting.
    pub fn hover(&mut self, client: Pos2) {
        self.cursor.x = client.x;
        self.cursor.y = client.y;
    }

    pub fn pointer_down(&mut self, origin: Pos2, client: Pos2) {
        self.hover(client);
        match self.state {
            SessionState::Submitting(_) => return,
            SessionState::Brushing(_) => self.pointer_up(),
            SessionState::Idle => {}
        }

        let radius = self.brush_radius();
        let point = map_pointer(origin, client, self.viewport.scale());
        let Some(image) = self.image.as_mut() else { return };

        if let Err(e) = self.history.commit_checkpoint(&image.canvas, self.style.label()) {
            log_err!("Failed to record checkpoint: {}", e);
            return;
        }

        if let BrushStyle::Brush(mode) = self.style {
            brush::paint_dab(&mut image.canvas, &image.base, point, radius, mode);
            self.revision += 1;
        }
        self.state = SessionState::Brushing(Stroke {
            anchor: point,
            last: point,
        });
    }

    pub fn pointer_move(&mut self, origin: Pos2, client: Pos2) {
        self.hover(client);
        let SessionState::Brushing(stroke) = self.state else { return };

        let radius = self.brush_radius();
        let point = map_pointer(origin, client, self.viewport.scale());
        if point == stroke.last {
            return;
        }
        let Some(image) = self.image.as_mut() else { return };

        if let BrushStyle::Brush(mode) = self.style {
            brush::paint_segment(&mut image.canvas, &image.base, stroke.last, point, radius, mode);
            self.revision += 1;
        }
        self.state = SessionState::Brushing(Stroke {
            anchor: stroke.anchor,
            last: point,
        });
    }

    pub fn pointer_up(&mut self) {
        let SessionState::Brushing(stroke) = self.state else { return };
        if self.style == BrushStyle::Marquee
            && let Some(image) = self.image.as_mut()
        {
            brush::paint_marquee(
                &mut image.canvas,
                &image.base,
                stroke.anchor,
                stroke.last,
                BrushMode::Add,
            );
            self.revision += 1;
        }
        self.state = SessionState::Idle;
    }

    fn end_stroke(&mut self) {
        if matches!(self.state, SessionState::Brushing(_)) {
            self.pointer_up();
        }
    }

    // -- Brush and view -----------------------------------------------------

    pub fn set_style(&mut self, style: BrushStyle) {
        self.end_stroke();
        self.style = style;
    }

    pub fn set_brush_width(&mut self, width: f32) {
        self.cursor.width = width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
    }

    pub fn key(&mut self, key: BrushKey) {
        let step = self.settings.brush_step;
        let min = self.settings.min_brush_width;
        let width = self.cursor.width;
        self.cursor.width = match key {
            BrushKey::Grow => (width + step).min(MAX_BRUSH_WIDTH),
            BrushKey::Shrink if width - step >= min => width - step,
            BrushKey::Shrink if width > min => min,
            BrushKey::Shrink => width,
        };
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.viewport.apply_wheel(delta_y);
    }

    // -- History --------------------------------------------------------------

    pub fn undo(&mut self) -> Result<HistoryStep> {
        self.end_stroke();
        let Some(image) = self.image.as_mut() else {
            return Ok(HistoryStep::NoOp);
        };
        let step = self.history.undo(&mut image.canvas, &image.base)?;
        self.revision += 1;
        Ok(step)
    }

    pub fn redo(&mut self) -> Result<HistoryStep> {
        self.end_stroke();
        let Some(image) = self.image.as_mut() else {
            return Ok(HistoryStep::NoOp);
        };
        let step = self.history.redo(&mut image.canvas)?;
        if step != HistoryStep::NoOp {
            self.revision += 1;
        }
        Ok(step)
    }

    pub fn reset(&mut self) {
        self.end_stroke();
        let Some(image) = self.image.as_mut() else { return };
        self.history.reset(&mut image.canvas, &image.base);
        self.revision += 1;
    }

    // -- Submission ---------------------------------------------------------

    /// Package the current image and mask. Moves the session to
    /// `Submitting`; the caller runs the request and reports back with
    /// `finish_submit`.
    pub fn begin_submit(&mut self, prompt: &str) -> Result<SubmitTicket> {
        match self.state {
            SessionState::Submitting(_) => return Err(EditError::SubmissionInFlight),
            SessionState::Brushing(_) => return Err(EditError::Busy),
            SessionState::Idle => {}
        }
        let image = self.image.as_ref().ok_or(EditError::NoImage)?;
        let square = self.settings.square_size;
        let background = self.settings.background;

        let (submission, _) = compositor::build_submission_canvas(&image.base, square, background);
        let mask = compositor::extract_mask(
            &image.canvas,
            &image.padding,
            square,
            background,
            self.settings.mask_convention,
        )?;

        let request = EditRequest {
            image_png: encode_png(&submission)?,
            mask_png: encode_png(&mask)?,
            prompt: edit_api::shape_prompt(prompt),
            size: self.settings.size_param(),
            n: self.settings.candidate_count,
            response_format: RESPONSE_FORMAT.to_string(),
        };

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.state = SessionState::Submitting(PendingSubmit {
            ticket: id,
            image_id: image.id,
        });
        log_info!("Submitting edit #{} ({:?})", id, request.prompt);
        Ok(SubmitTicket { id, request })
    }

    /// Apply the outcome of the request identified by `ticket`.
    pub fn finish_submit(&mut self, ticket: u64, outcome: Result<Vec<RgbaImage>>) -> SubmitOutcome {
        let SessionState::Submitting(pending) = self.state else {
            log_warn!("Ignoring edit #{}: nothing in flight", ticket);
            return SubmitOutcome::Discarded;
        };
        if pending.ticket != ticket {
            log_warn!("Ignoring edit #{}: #{} is in flight", ticket, pending.ticket);
            return SubmitOutcome::Discarded;
        }
        self.state = SessionState::Idle;

        let square = self.settings.square_size;
        let Some(image) = self.image.as_mut() else {
            return SubmitOutcome::Discarded;
        };
        if image.id != pending.image_id {
            log_info!("Discarding edit #{}: image changed while it was in flight", ticket);
            return SubmitOutcome::Discarded;
        }

        let candidates = match outcome {
            Ok(candidates) if candidates.is_empty() => {
                log_warn!("Edit #{} returned no candidates", ticket);
                return SubmitOutcome::Failed("the service returned no images".to_string());
            }
            Ok(candidates) => candidates,
            Err(e) => {
                log_err!("Edit #{} failed: {}", ticket, e);
                return SubmitOutcome::Failed(e.to_string());
            }
        };

        let cropped: Vec<RgbaImage> = candidates
            .iter()
            .map(|c| compositor::crop_result(c, &image.padding, square))
            .collect();

        image.original = image.base.clone();
        image.install(cropped[0].clone());
        self.history.clear();
        self.results = cropped;
        self.revision += 1;
        log_info!("Edit #{} applied ({} candidates)", ticket, self.results.len());
        SubmitOutcome::Applied {
            candidates: self.results.len(),
        }
    }

    /// Run a whole submission on the current thread.
    pub fn submit_blocking(
        &mut self,
        service: &dyn EditService,
        prompt: &str,
    ) -> Result<SubmitOutcome> {
        let ticket = self.begin_submit(prompt)?;
        let outcome = service.request_edit(&ticket.request);
        Ok(self.finish_submit(ticket.id, outcome))
    }

    // -- Results ------------------------------------------------------------

    /// Make candidate `index` the current image.
    pub fn select_result(&mut self, index: usize) -> Result<()> {
        let candidate = self
            .results
            .get(index)
            .cloned()
            .ok_or(EditError::NoSuchResult {
                index,
                len: self.results.len(),
            })?;
        self.end_stroke();
        let image = self.image.as_mut().ok_or(EditError::NoImage)?;
        image.install(candidate);
        self.history.clear();
        self.revision += 1;
        Ok(())
    }

    /// Go back to the image shown before the last accepted edit.
    pub fn restore_original(&mut self) -> bool {
        self.end_stroke();
        let Some(image) = self.image.as_mut() else { return false };
        let original = image.original.clone();
        image.install(original);
        self.history.clear();
        self.revision += 1;
        true
    }

    /// Save the working canvas as PNG.
    pub fn export_canvas(&self, path: &Path) -> Result<()> {
        let canvas = self.canvas().ok_or(EditError::NoImage)?;
        save_png(canvas, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decode_png;
    use crate::ops::edit_api::MockEditService;
    use image::Rgba;

    const ORIGIN: Pos2 = Pos2::new(100.0, 100.0);

    fn settings(square: u32) -> EditorSettings {
        EditorSettings {
            square_size: square,
            initial_scale: 0.5,
            ..EditorSettings::default()
        }
    }

    fn session_with(width: u32, height: u32, square: u32) -> EditSession {
        let mut session = EditSession::new(settings(square));
        session.load_image(RgbaImage::from_pixel(width, height, Rgba([90, 120, 150, 255])));
        session
    }

    fn stroke(session: &mut EditSession, from: Pos2, to: Pos2) {
        session.pointer_down(ORIGIN, from);
        session.pointer_move(ORIGIN, to);
        session.pointer_up();
    }

    #[test]
    fn pointer_maps_through_scale_onto_canvas() {
        let mut session = session_with(256, 256, 256);
        session.set_brush_width(10.0);
        session.pointer_down(ORIGIN, Pos2::new(150.0, 150.0));
        let canvas = session.canvas().unwrap();
        assert_eq!(canvas.get_pixel(100, 100)[3], 0);
        assert_eq!(canvas.get_pixel(0, 0)[3], 255);
        assert!(matches!(session.state(), SessionState::Brushing(_)));
    }

    #[test]
    fn stroke_undo_redo_round_trip() {
        let mut session = session_with(128, 128, 128);
        let before = session.canvas().unwrap().clone();
        stroke(&mut session, Pos2::new(110.0, 110.0), Pos2::new(150.0, 140.0));
        let painted = session.canvas().unwrap().clone();
        assert_ne!(painted, before);
        assert_eq!(session.history().undo_count(), 1);

        session.undo().unwrap();
        assert_eq!(session.canvas().unwrap(), &before);
        session.redo().unwrap();
        assert_eq!(session.canvas().unwrap(), &painted);
    }

    #[test]
    fn reset_then_undo_changes_nothing() {
        let mut session = session_with(64, 64, 64);
        stroke(&mut session, Pos2::new(110.0, 110.0), Pos2::new(120.0, 120.0));
        session.reset();
        let after_reset = session.canvas().unwrap().clone();
        assert_eq!(&after_reset, session.base_image().unwrap());
        assert_eq!(session.undo().unwrap(), HistoryStep::RestoredBase);
        assert_eq!(session.canvas().unwrap(), &after_reset);
        assert_eq!(session.history().redo_count(), 0);
    }

    #[test]
    fn stationary_pointer_does_not_repaint() {
        let mut session = session_with(64, 64, 64);
        session.pointer_down(ORIGIN, Pos2::new(110.0, 110.0));
        let revision = session.revision();
        session.pointer_move(ORIGIN, Pos2::new(110.0, 110.0));
        session.pointer_move(ORIGIN, Pos2::new(110.0, 110.0));
        assert_eq!(session.revision(), revision);
        session.pointer_move(ORIGIN, Pos2::new(111.0, 110.0));
        assert_eq!(session.revision(), revision + 1);
    }

    #[test]
    fn second_pointer_down_ends_previous_stroke() {
        let mut session = session_with(64, 64, 64);
        session.pointer_down(ORIGIN, Pos2::new(110.0, 110.0));
        session.pointer_down(ORIGIN, Pos2::new(120.0, 120.0));
        assert_eq!(session.history().undo_count(), 2);
        assert!(matches!(session.state(), SessionState::Brushing(_)));
    }

    #[test]
    fn marquee_clears_rectangle_on_release() {
        let mut session = session_with(64, 64, 64);
        session.set_style(BrushStyle::Marquee);
        session.pointer_down(ORIGIN, Pos2::new(105.0, 105.0));
        session.pointer_move(ORIGIN, Pos2::new(115.0, 110.0));
        // nothing painted until release
        assert_eq!(session.canvas().unwrap().get_pixel(12, 12)[3], 255);
        assert!(session.marquee_preview().is_some());
        session.pointer_up();
        let canvas = session.canvas().unwrap();
        assert_eq!(canvas.get_pixel(10, 10)[3], 0);
        assert_eq!(canvas.get_pixel(29, 19)[3], 0);
        assert_eq!(canvas.get_pixel(30, 20)[3], 255);
    }

    #[test]
    fn arrow_keys_resize_brush_with_floor() {
        let mut session = EditSession::new(settings(64));
        session.set_brush_width(30.0);
        session.key(BrushKey::Grow);
        assert_eq!(session.cursor().width, 35.0);
        for _ in 0..10 {
            session.key(BrushKey::Shrink);
        }
        assert_eq!(session.cursor().width, 20.0);
        session.set_brush_width(12.0);
        session.key(BrushKey::Shrink);
        assert_eq!(session.cursor().width, 12.0);
    }

    #[test]
    fn operations_without_image_are_noops() {
        let mut session = EditSession::new(settings(64));
        session.pointer_down(ORIGIN, Pos2::new(110.0, 110.0));
        session.pointer_move(ORIGIN, Pos2::new(120.0, 110.0));
        session.pointer_up();
        session.reset();
        assert_eq!(session.undo().unwrap(), HistoryStep::NoOp);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(session.begin_submit(""), Err(EditError::NoImage)));
    }

    #[test]
    fn submit_while_loading_is_rejected() {
        let mut session = session_with(64, 32, 64);
        let first = session.begin_submit("a cat").unwrap();
        assert!(session.is_loading());
        assert!(matches!(
            session.begin_submit("a dog"),
            Err(EditError::SubmissionInFlight)
        ));
        assert_eq!(first.request.prompt, "a cat in the same style");
        assert_eq!(first.request.size, "64x64");
    }

    #[test]
    fn submit_during_stroke_is_rejected() {
        let mut session = session_with(64, 64, 64);
        session.pointer_down(ORIGIN, Pos2::new(110.0, 110.0));
        assert!(matches!(session.begin_submit(""), Err(EditError::Busy)));
    }

    #[test]
    fn pointer_down_while_submitting_is_ignored() {
        let mut session = session_with(64, 64, 64);
        let before = session.canvas().unwrap().clone();
        session.begin_submit("").unwrap();
        session.pointer_down(ORIGIN, Pos2::new(110.0, 110.0));
        assert_eq!(session.canvas().unwrap(), &before);
        assert_eq!(session.history().undo_count(), 0);
        assert!(session.is_loading());
    }

    #[test]
    fn landscape_mask_aligns_with_padding() {
        let mut session = session_with(1200, 800, 1024);
        let padding = session.padding().unwrap();
        assert_eq!(padding.offset_x, 0);
        assert_eq!(padding.offset_y, (1024 - padding.img_height) / 2);

        session.set_brush_width(20.0);
        // canvas point (50, 10) at scale 0.5
        stroke(&mut session, Pos2::new(125.0, 105.0), Pos2::new(125.0, 105.0));
        let ticket = session.begin_submit("").unwrap();
        let mask = decode_png(&ticket.request.mask_png).unwrap();
        let image = decode_png(&ticket.request.image_png).unwrap();
        assert_eq!(mask.dimensions(), (1024, 1024));
        assert_eq!(image.dimensions(), (1024, 1024));

        let painted: Vec<(u32, u32)> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] == 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!painted.is_empty());
        for (_, y) in &painted {
            assert!(*y >= padding.offset_y && *y < padding.offset_y + padding.img_height);
        }
        assert_eq!(mask.get_pixel(50, 10 + padding.offset_y)[3], 0);
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn successful_submit_applies_first_candidate() {
        let mut session = session_with(64, 32, 64);
        stroke(&mut session, Pos2::new(110.0, 110.0), Pos2::new(115.0, 112.0));
        let before_base = session.base_image().unwrap().clone();
        let old_id = session.image_id();

        let red = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
        let blue = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 255, 255]));
        let mock = MockEditService::new(vec![red, blue]);
        let outcome = session.submit_blocking(&mock, "flowers").unwrap();

        assert_eq!(outcome, SubmitOutcome::Applied { candidates: 2 });
        assert_eq!(mock.calls(), 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.canvas().unwrap().dimensions(), (64, 32));
        assert_eq!(*session.canvas().unwrap().get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(session.original_image().unwrap(), &before_base);
        assert_ne!(session.image_id(), old_id);
        assert_eq!(session.history().undo_count(), 0);

        session.select_result(1).unwrap();
        assert_eq!(*session.canvas().unwrap().get_pixel(3, 3), Rgba([0, 0, 255, 255]));
        assert!(session.restore_original());
        assert_eq!(session.canvas().unwrap(), &before_base);
    }

    #[test]
    fn failed_or_empty_submit_leaves_canvas() {
        let mut session = session_with(64, 64, 64);
        stroke(&mut session, Pos2::new(110.0, 110.0), Pos2::new(115.0, 112.0));
        let before = session.canvas().unwrap().clone();

        let ticket = session.begin_submit("").unwrap();
        let outcome =
            session.finish_submit(ticket.id, Err(EditError::MalformedResponse("x".into())));
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.canvas().unwrap(), &before);

        let ticket = session.begin_submit("").unwrap();
        assert!(matches!(
            session.finish_submit(ticket.id, Ok(Vec::new())),
            SubmitOutcome::Failed(_)
        ));
        assert_eq!(session.canvas().unwrap(), &before);
        assert!(matches!(
            session.select_result(0),
            Err(EditError::NoSuchResult { index: 0, len: 0 })
        ));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut session = session_with(64, 64, 64);
        let ticket = session.begin_submit("").unwrap();
        session.load_image(RgbaImage::from_pixel(64, 64, Rgba([1, 2, 3, 255])));
        assert!(session.is_loading());
        assert!(matches!(session.begin_submit(""), Err(EditError::SubmissionInFlight)));

        let result = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
        assert_eq!(
            session.finish_submit(ticket.id, Ok(vec![result])),
            SubmitOutcome::Discarded
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.results().is_empty());
        assert_eq!(*session.canvas().unwrap().get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn unknown_ticket_is_discarded_without_ending_request() {
        let mut session = session_with(64, 64, 64);
        let ticket = session.begin_submit("").unwrap();
        assert_eq!(
            session.finish_submit(ticket.id + 7, Ok(Vec::new())),
            SubmitOutcome::Discarded
        );
        assert!(session.is_loading());
    }

    #[test]
    fn export_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.png");
        let session = session_with(16, 8, 16);
        session.export_canvas(&path).unwrap();
        assert_eq!(crate::io::load_image(&path).unwrap().dimensions(), (16, 8));
    }
}
