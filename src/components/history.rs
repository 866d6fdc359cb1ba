use std::collections::VecDeque;
use std::sync::Arc;

use image::RgbaImage;

use crate::canvas::Region;
use crate::error::{EditorError, Result};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

// ============================================================================
// HISTORY ENTRY: region-scoped before/after patches
// ============================================================================

/// One committed edit: the pixels of `region` on layer `layer_index`
/// before and after the edit. Immutable once built.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    layer_index: usize,
    region: Region,
    before: Arc<RgbaImage>,
    after: Arc<RgbaImage>,
    description: String,
}

impl HistoryEntry {
    /// Fails with [`EditorError::PatchSize`] unless both patches are exactly
    /// the size of `region`.
    pub fn new(
        description: impl Into<String>,
        layer_index: usize,
        region: Region,
        before: RgbaImage,
        after: RgbaImage,
    ) -> Result<Self> {
        for patch in [&before, &after] {
            if patch.dimensions() != (region.width, region.height) {
                return Err(EditorError::PatchSize {
                    patch_width: patch.width(),
                    patch_height: patch.height(),
                    region_width: region.width,
                    region_height: region.height,
                });
            }
        }
        Ok(Self {
            layer_index,
            region,
            before: Arc::new(before),
            after: Arc::new(after),
            description: description.into(),
        })
    }

    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn before(&self) -> &RgbaImage {
        &self.before
    }

    pub fn after(&self) -> &RgbaImage {
        &self.after
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Two RGBA patches over the region plus the label.
    pub fn memory_size(&self) -> usize {
        2 * 4 * self.region.area() as usize + self.description.len()
    }

    fn restore(&self, patch: &Arc<RgbaImage>) -> Restore {
        Restore {
            layer_index: self.layer_index,
            region: self.region,
            patch: Arc::clone(patch),
        }
    }
}

/// What the caller must write back after an undo or redo: clear `region`
/// on layer `layer_index`, then draw `patch` at the region origin.
#[derive(Clone, Debug)]
pub struct Restore {
    pub layer_index: usize,
    pub region: Region,
    pub patch: Arc<RgbaImage>,
}

// ============================================================================
// UNDO STACK
// ============================================================================

/// Undo/redo histories. Never touches layer pixels; callers apply the
/// returned [`Restore`].
pub struct UndoStack {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    /// Optional entry cap (`None` = unbounded).
    max_entries: Option<usize>,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoStack {
    /// Unbounded history.
    pub fn new() -> Self {
        Self::with_limits(None, None)
    }

    pub fn with_limits(max_entries: Option<usize>, max_memory_bytes: Option<usize>) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_entries,
            max_memory_bytes,
            total_memory: 0,
        }
    }

    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self::with_limits(settings.history_max_len(), settings.history_max_bytes())
    }

    /// Push `entry` and drop everything redoable.
    pub fn commit(&mut self, entry: HistoryEntry) {
        for dropped in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
        }
        log_info!(
            "Commit '{}' on layer {} at {:?} ({} bytes)",
            entry.description,
            entry.layer_index,
            entry.region,
            entry.memory_size()
        );
        self.total_memory += entry.memory_size();
        self.undo_stack.push_back(entry);
        self.prune();
    }

    /// Move the newest entry to the redo stack and return its *before* patch.
    pub fn undo(&mut self) -> Option<Restore> {
        let entry = self.undo_stack.pop_back()?;
        let restore = entry.restore(&entry.before);
        self.redo_stack.push_back(entry);
        Some(restore)
    }

    /// Move the newest redo entry back and return its *after* patch.
    pub fn redo(&mut self) -> Option<Restore> {
        let entry = self.redo_stack.pop_back()?;
        let restore = entry.restore(&entry.after);
        self.undo_stack.push_back(entry);
        Some(restore)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description())
    }

    /// Newest undoable entry.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.undo_stack.back()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Memory held by both stacks (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Drop the oldest undo entries until both limits hold. The newest entry
    /// always survives.
    fn prune(&mut self) {
        if let Some(max) = self.max_entries {
            while self.undo_stack.len() > max.max(1) {
                self.drop_oldest();
            }
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                self.drop_oldest();
            }
        }
    }

    fn drop_oldest(&mut self) {
        if let Some(removed) = self.undo_stack.pop_front() {
            log_warn!("History limit reached, dropping '{}'", removed.description);
            self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn entry(layer: usize, value: u8) -> HistoryEntry {
        let region = Region::new(0, 0, 2, 2);
        HistoryEntry::new(
            "Brush Stroke",
            layer,
            region,
            RgbaImage::from_pixel(2, 2, Rgba([value, 0, 0, 255])),
            RgbaImage::from_pixel(2, 2, Rgba([value + 1, 0, 0, 255])),
        )
        .unwrap()
    }

    #[test]
    fn empty_stacks_return_none() {
        let mut stack = UndoStack::new();
        assert!(stack.undo().is_none());
        assert!(stack.redo().is_none());
        assert_eq!(stack.memory_usage(), 0);
    }

    #[test]
    fn undo_returns_before_and_redo_returns_after() {
        let mut stack = UndoStack::new();
        stack.commit(entry(3, 10));
        let undo = stack.undo().unwrap();
        assert_eq!(undo.layer_index, 3);
        assert_eq!(undo.patch.get_pixel(0, 0)[0], 10);
        let redo = stack.redo().unwrap();
        assert_eq!(redo.patch.get_pixel(0, 0)[0], 11);
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
    }

    #[test]
    fn commit_clears_redo() {
        let mut stack = UndoStack::new();
        stack.commit(entry(0, 1));
        stack.commit(entry(0, 2));
        stack.undo();
        stack.undo();
        assert_eq!(stack.redo_count(), 2);
        stack.commit(entry(0, 3));
        assert!(stack.redo().is_none());
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.memory_usage(), entry(0, 3).memory_size());
    }

    #[test]
    fn mismatched_patch_is_rejected() {
        let result = HistoryEntry::new(
            "Fill",
            0,
            Region::new(0, 0, 3, 3),
            RgbaImage::new(3, 3),
            RgbaImage::new(2, 3),
        );
        assert!(matches!(
            result,
            Err(EditorError::PatchSize { patch_width: 2, .. })
        ));
    }

    #[test]
    fn entry_limit_prunes_oldest() {
        let mut stack = UndoStack::with_limits(Some(2), None);
        for v in 0..5 {
            stack.commit(entry(0, v));
        }
        assert_eq!(stack.undo_count(), 2);
        assert_eq!(stack.undo().unwrap().patch.get_pixel(0, 0)[0], 4);
        assert_eq!(stack.undo().unwrap().patch.get_pixel(0, 0)[0], 3);
        assert!(stack.undo().is_none());
    }

    #[test]
    fn memory_limit_keeps_newest_entry() {
        let mut stack = UndoStack::with_limits(None, Some(1));
        stack.commit(entry(0, 1));
        stack.commit(entry(0, 2));
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.undo_description(), Some("Brush Stroke"));
    }
}
