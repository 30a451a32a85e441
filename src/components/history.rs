use eframe::egui;
use image::RgbaImage;
use std::collections::VecDeque;

use crate::error::{EditError, Result};
use crate::io::{decode_png, encode_png};

// ============================================================================
// CANVAS SNAPSHOT — PNG-encoded copy of the working canvas
// ============================================================================

/// An immutable, losslessly encoded copy of the full canvas.
#[derive(Clone)]
pub struct CanvasSnapshot {
    description: String,
    width: u32,
    height: u32,
    png: Vec<u8>,
}

impl CanvasSnapshot {
    pub fn capture(canvas: &RgbaImage, description: impl Into<String>) -> Result<Self> {
        Ok(Self {
            description: description.into(),
            width: canvas.width(),
            height: canvas.height(),
            png: encode_png(canvas)?,
        })
    }

    /// Decode the snapshot back into pixels.
    pub fn restore(&self) -> Result<RgbaImage> {
        let image = decode_png(&self.png)?;
        if image.dimensions() != (self.width, self.height) {
            return Err(EditError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: image.dimensions(),
            });
        }
        Ok(image)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn memory_size(&self) -> usize {
        self.png.len() + self.description.len()
    }
}

/// What an undo/redo request ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryStep {
    /// A snapshot was restored; carries its description.
    Applied(String),
    /// Undo with nothing recorded: the base image was redrawn.
    RestoredBase,
    /// Redo with nothing recorded.
    NoOp,
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with memory limits
// ============================================================================

/// Undo/redo history of canvas checkpoints.
///
/// Checkpoints are taken *before* an edit starts, so undoing returns to the
/// pre-edit canvas.
pub struct HistoryManager {
    undo_stack: VecDeque<CanvasSnapshot>,
    redo_stack: VecDeque<CanvasSnapshot>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            max_memory_bytes: Some(100 * 1024 * 1024), // 100 MB default limit
            total_memory: 0,
        }
    }

    /// Record the current canvas as an undo checkpoint.
    pub fn commit_checkpoint(&mut self, canvas: &RgbaImage, description: &str) -> Result<()> {
        let snapshot = CanvasSnapshot::capture(canvas, description)?;
        self.push(snapshot);
        Ok(())
    }

    pub fn push(&mut self, snapshot: CanvasSnapshot) {
        // New actions invalidate the redo history
        for s in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(s.memory_size());
        }

        self.total_memory += snapshot.memory_size();
        self.undo_stack.push_back(snapshot);
        self.prune();
    }

    /// Step back one checkpoint. With nothing to undo, `base` is redrawn.
    pub fn undo(&mut self, canvas: &mut RgbaImage, base: &RgbaImage) -> Result<HistoryStep> {
        let Some(target) = self.undo_stack.back() else {
            *canvas = base.clone();
            return Ok(HistoryStep::RestoredBase);
        };

        let current = CanvasSnapshot::capture(canvas, target.description())?;
        let restored = target.restore()?;

        if let Some(target) = self.undo_stack.pop_back() {
            self.total_memory = self.total_memory.saturating_sub(target.memory_size());
            self.total_memory += current.memory_size();
            self.redo_stack.push_back(current);
            *canvas = restored;
            Ok(HistoryStep::Applied(target.description))
        } else {
            Ok(HistoryStep::NoOp)
        }
    }

    /// Re-apply the most recently undone checkpoint.
    pub fn redo(&mut self, canvas: &mut RgbaImage) -> Result<HistoryStep> {
        let Some(target) = self.redo_stack.back() else {
            return Ok(HistoryStep::NoOp);
        };

        let current = CanvasSnapshot::capture(canvas, target.description())?;
        let restored = target.restore()?;

        if let Some(target) = self.redo_stack.pop_back() {
            self.total_memory = self.total_memory.saturating_sub(target.memory_size());
            self.total_memory += current.memory_size();
            self.undo_stack.push_back(current);
            *canvas = restored;
            Ok(HistoryStep::Applied(target.description))
        } else {
            Ok(HistoryStep::NoOp)
        }
    }

    /// Drop all history and redraw `base`.
    pub fn reset(&mut self, canvas: &mut RgbaImage, base: &RgbaImage) {
        self.clear();
        *canvas = base.clone();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack
            .iter()
            .rev()
            .map(|s| s.description().to_string())
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Prune old checkpoints to stay within limits
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

// ============================================================================
// HISTORY PANEL - UI for displaying history
// ============================================================================

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
}

impl HistoryPanel {
    pub fn show(&mut self, ui: &mut egui::Ui, history: &HistoryManager) {
        ui.horizontal(|ui| {
            ui.label(format!(
                "Undo: {} | Redo: {}",
                history.undo_count(),
                history.redo_count()
            ));
            if ui
                .small_button("ℹ")
                .on_hover_text("Show memory info")
                .clicked()
            {
                self.show_memory_info = !self.show_memory_info;
            }
        });

        if self.show_memory_info {
            let mem_mb = history.memory_usage() as f64 / (1024.0 * 1024.0);
            ui.label(format!("Memory: {:.2} MB", mem_mb));
        }

        egui::ScrollArea::vertical()
            .max_height(150.0)
            .show(ui, |ui| {
                let items = history.undo_history();
                if items.is_empty() {
                    ui.weak("No history yet");
                } else {
                    for (i, desc) in items.iter().enumerate() {
                        if i == 0 {
                            ui.strong(format!("▶ {}", desc));
                        } else {
                            ui.label(format!("  {}", desc));
                        }
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn filled(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba([v, v, v, 255]))
    }

    #[test]
    fn undo_then_redo_restores_exact_pixels() {
        let base = filled(10);
        let mut canvas = base.clone();
        let mut history = HistoryManager::new(10);

        history.commit_checkpoint(&canvas, "Stroke").unwrap();
        canvas.put_pixel(3, 3, Rgba([1, 2, 3, 0]));
        canvas.put_pixel(4, 5, Rgba([200, 100, 0, 77]));
        let painted = canvas.clone();

        assert_eq!(
            history.undo(&mut canvas, &base).unwrap(),
            HistoryStep::Applied("Stroke".to_string())
        );
        assert_eq!(canvas, base);
        history.redo(&mut canvas).unwrap();
        assert_eq!(canvas, painted);
        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn undo_on_empty_stack_restores_base() {
        let base = filled(10);
        let mut canvas = filled(99);
        let mut history = HistoryManager::default();
        assert_eq!(
            history.undo(&mut canvas, &base).unwrap(),
            HistoryStep::RestoredBase
        );
        assert_eq!(canvas, base);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn redo_on_empty_stack_is_noop() {
        let mut canvas = filled(5);
        let mut history = HistoryManager::default();
        assert_eq!(history.redo(&mut canvas).unwrap(), HistoryStep::NoOp);
        assert_eq!(canvas, filled(5));
    }

    #[test]
    fn new_checkpoint_clears_redo() {
        let base = filled(0);
        let mut canvas = base.clone();
        let mut history = HistoryManager::default();
        history.commit_checkpoint(&canvas, "a").unwrap();
        canvas = filled(1);
        history.undo(&mut canvas, &base).unwrap();
        assert!(history.can_redo());
        history.commit_checkpoint(&canvas, "b").unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.undo_history(), vec!["b".to_string()]);
    }

    #[test]
    fn reset_then_undo_is_noop() {
        let base = filled(10);
        let mut canvas = base.clone();
        let mut history = HistoryManager::default();
        history.commit_checkpoint(&canvas, "a").unwrap();
        assert!(history.can_undo());
        canvas = filled(50);
        history.reset(&mut canvas, &base);
        assert!(!history.can_undo());
        assert_eq!(canvas, base);
        assert_eq!(history.memory_usage(), 0);

        history.undo(&mut canvas, &base).unwrap();
        assert_eq!(canvas, base);
        assert_eq!((history.undo_count(), history.redo_count()), (0, 0));
    }

    #[test]
    fn oldest_checkpoints_are_pruned() {
        let canvas = filled(0);
        let mut history = HistoryManager::new(3);
        for i in 0..5 {
            history.commit_checkpoint(&canvas, &format!("step {i}")).unwrap();
        }
        assert_eq!(history.undo_count(), 3);
        assert_eq!(history.undo_history()[2], "step 2");
    }
}
