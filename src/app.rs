// ============================================================================
// GENFILL APP — desktop front end over `EditSession`
// ============================================================================
//
// The app only translates egui input into session calls and draws what the
// session holds. Decoding and the edit request run on the rayon pool and
// report back over channels that are drained at the top of every frame.

use std::sync::{Arc, mpsc};

use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use crate::components::history::HistoryPanel;
use crate::error::Result;
use crate::io::FileHandler;
use crate::ops::brush::BrushStyle;
use crate::ops::edit_api::{EditService, HttpEditService, MockEditService};
use crate::session::{BrushKey, EditSession, MAX_BRUSH_WIDTH, MIN_BRUSH_WIDTH, SubmitOutcome};
use crate::settings::EditorSettings;

/// Serve candidates from a local directory instead of the network.
pub const MOCK_DIR_ENV: &str = "GENFILL_MOCK_DIR";

const THUMBNAIL_SIZE: f32 = 96.0;
const CANVAS_BACKDROP: Color32 = Color32::from_gray(40);

enum IoResult {
    Loaded(RgbaImage),
    LoadFailed(String),
}

struct EditReply {
    ticket: u64,
    outcome: Result<Vec<RgbaImage>>,
}

enum Status {
    Info(String),
    Error(String),
}

pub struct GenFillApp {
    session: EditSession,
    prompt: String,
    file_handler: FileHandler,
    history_panel: HistoryPanel,
    service: Option<Arc<dyn EditService>>,

    // Background pipelines
    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
    pending_io_ops: usize,
    edit_sender: mpsc::Sender<EditReply>,
    edit_receiver: mpsc::Receiver<EditReply>,

    // GPU copies of what the session holds
    canvas_texture: Option<TextureHandle>,
    /// Session revision the canvas texture was built from.
    uploaded_revision: Option<u64>,
    result_textures: Vec<TextureHandle>,
    original_texture: Option<TextureHandle>,

    status: Option<Status>,
}

impl GenFillApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = EditorSettings::load();
        let (io_sender, io_receiver) = mpsc::channel();
        let (edit_sender, edit_receiver) = mpsc::channel();
        log_info!("Using edit endpoint {}", settings.api_endpoint);
        Self {
            session: EditSession::new(settings),
            prompt: String::new(),
            file_handler: FileHandler::new(),
            history_panel: HistoryPanel::default(),
            service: None,
            io_sender,
            io_receiver,
            pending_io_ops: 0,
            edit_sender,
            edit_receiver,
            canvas_texture: None,
            uploaded_revision: None,
            result_textures: Vec::new(),
            original_texture: None,
            status: None,
        }
    }

    // -- Background results -------------------------------------------------

    fn poll_background(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.io_receiver.try_recv() {
            self.pending_io_ops = self.pending_io_ops.saturating_sub(1);
            match result {
                IoResult::Loaded(image) => {
                    self.session.load_image(image);
                    self.refresh_thumbnails(ctx);
                    self.status = None;
                }
                IoResult::LoadFailed(msg) => {
                    log_err!("{}", msg);
                    self.status = Some(Status::Error(msg));
                }
            }
        }

        while let Ok(reply) = self.edit_receiver.try_recv() {
            match self.session.finish_submit(reply.ticket, reply.outcome) {
                SubmitOutcome::Applied { candidates } => {
                    self.refresh_thumbnails(ctx);
                    self.status = Some(Status::Info(format!("{candidates} results")));
                }
                SubmitOutcome::Failed(msg) => {
                    self.status = Some(Status::Error(format!("Edit failed: {msg}")));
                }
                SubmitOutcome::Discarded => {}
            }
        }
    }

    fn open_image(&mut self) {
        let Some(path) = self.file_handler.pick_image() else { return };
        let sender = self.io_sender.clone();
        self.pending_io_ops += 1;
        rayon::spawn(move || match crate::io::load_image(&path) {
            Ok(image) => {
                let _ = sender.send(IoResult::Loaded(image));
            }
            Err(e) => {
                let _ = sender.send(IoResult::LoadFailed(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    e
                )));
            }
        });
    }

    fn export_image(&mut self) {
        let Some(path) = self.file_handler.pick_save_path("genfill.png") else { return };
        self.status = Some(match self.session.export_canvas(&path) {
            Ok(()) => Status::Info(format!("Saved {}", path.display())),
            Err(e) => {
                log_err!("Export to {} failed: {}", path.display(), e);
                Status::Error(format!("Save failed: {e}"))
            }
        });
    }

    fn edit_service(&mut self) -> Result<Arc<dyn EditService>> {
        if let Some(service) = &self.service {
            return Ok(Arc::clone(service));
        }
        let service: Arc<dyn EditService> = match std::env::var(MOCK_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => {
                log_info!("Serving edits from mock directory {}", dir);
                Arc::new(MockEditService::from_dir(std::path::Path::new(&dir))?)
            }
            _ => Arc::new(HttpEditService::from_settings(self.session.settings())?),
        };
        self.service = Some(Arc::clone(&service));
        Ok(service)
    }

    fn submit(&mut self, ctx: &egui::Context) {
        let service = match self.edit_service() {
            Ok(s) => s,
            Err(e) => {
                self.status = Some(Status::Error(e.to_string()));
                return;
            }
        };
        let ticket = match self.session.begin_submit(&self.prompt) {
            Ok(t) => t,
            Err(e) => {
                self.status = Some(Status::Error(e.to_string()));
                return;
            }
        };
        self.status = None;

        let sender = self.edit_sender.clone();
        let ctx = ctx.clone();
        rayon::spawn(move || {
            let outcome = service.request_edit(&ticket.request);
            let _ = sender.send(EditReply {
                ticket: ticket.id,
                outcome,
            });
            ctx.request_repaint();
        });
    }

    // -- Textures -----------------------------------------------------------

    fn color_image(image: &RgbaImage) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_raw(),
        )
    }

    fn sync_canvas_texture(&mut self, ctx: &egui::Context) {
        if self.uploaded_revision == Some(self.session.revision()) {
            return;
        }
        let Some(canvas) = self.session.canvas() else { return };
        let image = Self::color_image(canvas);
        if let Some(texture) = &mut self.canvas_texture {
            texture.set(image, TextureOptions::LINEAR);
        } else {
            self.canvas_texture = Some(ctx.load_texture("canvas", image, TextureOptions::LINEAR));
        }
        self.uploaded_revision = Some(self.session.revision());
    }

    fn refresh_thumbnails(&mut self, ctx: &egui::Context) {
        self.result_textures = self
            .session
            .results()
            .iter()
            .enumerate()
            .map(|(i, img)| {
                let name = format!("result_{i}");
                ctx.load_texture(name, Self::color_image(img), TextureOptions::LINEAR)
            })
            .collect();
        self.original_texture = self
            .session
            .original_image()
            .map(|img| {
                ctx.load_texture("original", Self::color_image(img), TextureOptions::LINEAR)
            });
    }

    // -- Input ----------------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (grow, shrink, undo, redo) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            (
                i.key_pressed(egui::Key::ArrowUp),
                i.key_pressed(egui::Key::ArrowDown),
                cmd && !shift && i.key_pressed(egui::Key::Z),
                cmd && (i.key_pressed(egui::Key::Y) || (shift && i.key_pressed(egui::Key::Z))),
            )
        });
        if grow {
            self.session.key(BrushKey::Grow);
        }
        if shrink {
            self.session.key(BrushKey::Shrink);
        }
        if undo && let Err(e) = self.session.undo() {
            log_err!("Undo failed: {}", e);
        }
        if redo && let Err(e) = self.session.redo() {
            log_err!("Redo failed: {}", e);
        }
    }

    // -- Panels ---------------------------------------------------------------

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let loading = self.session.is_loading();
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                self.open_image();
            }
            let has_image = self.session.canvas().is_some();
            if ui.add_enabled(has_image, egui::Button::new("Save…")).clicked() {
                self.export_image();
            }
            ui.separator();

            let mut style = self.session.style();
            egui::ComboBox::from_id_source("brush_style")
                .selected_text(style.label())
                .show_ui(ui, |ui| {
                    for s in BrushStyle::all() {
                        ui.selectable_value(&mut style, *s, s.label());
                    }
                });
            if style != self.session.style() {
                self.session.set_style(style);
            }

            let mut width = self.session.cursor().width;
            ui.label("Brush");
            if ui
                .add(egui::Slider::new(&mut width, MIN_BRUSH_WIDTH..=MAX_BRUSH_WIDTH).integer())
                .changed()
            {
                self.session.set_brush_width(width);
            }
            ui.separator();

            if ui.add_enabled(has_image, egui::Button::new("Reset")).clicked() {
                self.session.reset();
            }
            let can_undo = has_image && self.session.history().can_undo();
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked()
                && let Err(e) = self.session.undo()
            {
                log_err!("Undo failed: {}", e);
            }
            if ui
                .add_enabled(self.session.history().can_redo(), egui::Button::new("Redo"))
                .clicked()
                && let Err(e) = self.session.redo()
            {
                log_err!("Redo failed: {}", e);
            }
        });

        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut self.prompt)
                .hint_text("Describe what should appear (blank fills in)")
                .desired_width(ui.available_width() - 120.0);
            let response = ui.add_enabled(!loading, edit);
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let can_submit = !loading && self.session.canvas().is_some();
            let clicked = ui
                .add_enabled(can_submit, egui::Button::new("Generate"))
                .clicked();
            if clicked || (enter && !loading) {
                self.submit(ctx);
            }
            if loading {
                ui.spinner();
            }
        });

        match &self.status {
            Some(Status::Info(msg)) => {
                ui.label(msg);
            }
            Some(Status::Error(msg)) => {
                ui.colored_label(Color32::from_rgb(220, 80, 80), msg);
            }
            None => {}
        }
    }

    fn results_strip(&mut self, ui: &mut egui::Ui) {
        if self.result_textures.is_empty() {
            return;
        }
        let mut chosen = None;
        let mut restore = false;
        egui::ScrollArea::horizontal().show(ui, |ui| {
            ui.horizontal(|ui| {
                if let Some(tex) = &self.original_texture {
                    ui.vertical(|ui| {
                        if thumbnail(ui, tex).clicked() {
                            restore = true;
                        }
                        ui.small("Original");
                    });
                }
                for (i, tex) in self.result_textures.iter().enumerate() {
                    ui.vertical(|ui| {
                        if thumbnail(ui, tex).clicked() {
                            chosen = Some(i);
                        }
                        ui.small(format!("#{}", i + 1));
                    });
                }
            });
        });

        if restore {
            self.session.restore_original();
        }
        if let Some(i) = chosen
            && let Err(e) = self.session.select_result(i)
        {
            self.status = Some(Status::Error(e.to_string()));
        }
    }

    fn canvas_view(&mut self, ui: &mut egui::Ui) {
        let Some((width, height)) = self.session.canvas().map(|c| c.dimensions()) else {
            ui.centered_and_justified(|ui| {
                if self.pending_io_ops > 0 {
                    ui.spinner();
                } else {
                    ui.weak("Open an image to start");
                }
            });
            return;
        };

        egui::ScrollArea::both().show(ui, |ui| {
            let size = self.session.viewport().display_rect(Pos2::ZERO, width, height).size();
            let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
            let rect = response.rect;
            let origin = rect.min;

            // Pointer → session
            let (pressed, held, released, moved, pointer) = ui.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.primary_down(),
                    i.pointer.primary_released(),
                    i.pointer.delta() != Vec2::ZERO,
                    i.pointer.interact_pos(),
                )
            });
            if let Some(pos) = pointer {
                if pressed && response.hovered() {
                    self.session.pointer_down(origin, pos);
                } else if held && moved {
                    self.session.pointer_move(origin, pos);
                }
            }
            if released {
                self.session.pointer_up();
            }
            if let Some(pos) = response.hover_pos() {
                self.session.hover(pos);
                let scroll = ui.input(|i| i.scroll_delta.y);
                if scroll.abs() > 0.1 {
                    // egui reports wheel-down as negative
                    self.session.wheel(-scroll);
                }
            }

            // Draw
            painter.rect_filled(rect, 0.0, CANVAS_BACKDROP);
            if let Some(texture) = &self.canvas_texture {
                let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                painter.image(texture.id(), rect, uv, Color32::WHITE);
            }

            let scale = self.session.scale();
            if let Some((a, b)) = self.session.marquee_preview() {
                let to_screen = |p: Pos2| origin + p.to_vec2() * scale;
                painter.rect_stroke(
                    Rect::from_two_pos(to_screen(a), to_screen(b)),
                    0.0,
                    Stroke::new(1.5, Color32::WHITE),
                );
            }
            if response.hovered() && matches!(self.session.style(), BrushStyle::Brush(_)) {
                let cursor = self.session.cursor();
                painter.circle_stroke(
                    Pos2::new(cursor.x, cursor.y),
                    cursor.width / 2.0,
                    Stroke::new(1.0, Color32::WHITE),
                );
            }
        });
    }
}

fn thumbnail(ui: &mut egui::Ui, texture: &TextureHandle) -> egui::Response {
    let [w, h] = texture.size();
    let fit = THUMBNAIL_SIZE / w.max(h).max(1) as f32;
    let size = egui::vec2(w as f32 * fit, h as f32 * fit);
    ui.add(egui::ImageButton::new(egui::load::SizedTexture::new(texture.id(), size)))
}

impl eframe::App for GenFillApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background(ctx);
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ctx, ui);
        });

        egui::TopBottomPanel::bottom("results").show(ctx, |ui| {
            self.results_strip(ui);
        });

        egui::SidePanel::right("history").default_width(180.0).show(ctx, |ui| {
            ui.heading("History");
            self.history_panel.show(ui, self.session.history());
            if let Some(path) = crate::logger::log_path() {
                ui.separator();
                ui.weak(format!("Log: {}", path.display()));
            }
        });

        // The canvas texture must reflect the panels' edits before drawing
        self.sync_canvas_texture(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            self.canvas_view(ui);
        });
        // Pointer edits made while drawing show up next frame
        if self.uploaded_revision != Some(self.session.revision()) {
            ctx.request_repaint();
        }
    }
}
