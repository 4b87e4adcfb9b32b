//! Bump allocator over the 3D sprite grid.
//!
//! Slots are handed out row-major within a page, then page by page. Nothing
//! is ever reclaimed; a layout change rewinds the cursor to the origin.
//!
//! Capacity is checked before the cursor moves: the allocator fails with
//! [`SpriteError::OutOfSpace`] without touching any state once every slot of
//! every page is in use.

use serde::Serialize;

use crate::cell::SlotPosition;
use crate::config::{CellSize, DEFAULT_MAX_ARRAY_LEN, SpriteLimits};
use crate::error::SpriteError;

/// Upper bound for any grid dimension: coordinates are stored as `u16`.
pub const PAGE_INDEX_LIMIT: u32 = u16::MAX as u32;

/// Rows per page used before the first layout is configured.
pub const DEFAULT_MAX_Y: u32 = 100;

/// Snapshot of the grid dimensions reported to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Sprites per row.
    pub xnum: u32,
    /// Rows in use on the current page.
    pub ynum: u32,
    /// Index of the page the cursor is on.
    pub z: u32,
}

/// Hands out atlas slots in row-major order, page after page.
#[derive(Debug, Clone)]
pub struct BumpAllocator {
    x: u32,
    y: u32,
    z: u32,
    xnum: u32,
    ynum: u32,
    max_y: u32,
    page_limit: u32,
}

impl BumpAllocator {
    /// Degenerate single-column layout, usable until [`configure`](Self::configure).
    #[must_use]
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            xnum: 1,
            ynum: 1,
            max_y: DEFAULT_MAX_Y,
            page_limit: DEFAULT_MAX_ARRAY_LEN.min(PAGE_INDEX_LIMIT),
        }
    }

    /// Derive grid dimensions from `limits` and `cell` and rewind the cursor.
    pub fn configure(&mut self, limits: SpriteLimits, cell: CellSize) {
        let texture = limits.max_texture_size();
        self.xnum = (texture / cell.width()).clamp(1, PAGE_INDEX_LIMIT);
        self.max_y = (texture / cell.height()).clamp(1, PAGE_INDEX_LIMIT);
        self.page_limit = limits.max_array_len().min(PAGE_INDEX_LIMIT);
        self.rewind();
    }

    /// Move the cursor back to the origin, keeping the grid dimensions.
    pub fn rewind(&mut self) {
        self.ynum = 1;
        self.x = 0;
        self.y = 0;
        self.z = 0;
    }

    /// Hand out the slot under the cursor and advance past it.
    pub fn next_slot(&mut self) -> Result<SlotPosition, SpriteError> {
        if self.is_exhausted() {
            return Err(SpriteError::OutOfSpace);
        }
        let slot = self.cursor();
        self.advance();
        Ok(slot)
    }

    fn advance(&mut self) {
        self.x += 1;
        if self.x < self.xnum {
            return;
        }
        self.x = 0;
        self.y += 1;
        self.ynum = self.ynum.max(self.y + 1).min(self.max_y);
        if self.y < self.max_y {
            return;
        }
        self.y = 0;
        self.z += 1;
        if self.is_exhausted() {
            tracing::warn!(
                pages = self.page_limit,
                xnum = self.xnum,
                max_y = self.max_y,
                "sprite atlas exhausted"
            );
        }
    }

    /// Whether every slot has been handed out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.z >= self.page_limit
    }

    /// Position the next allocation will receive.
    ///
    /// Once exhausted, `z` equals the page limit and no longer names a page.
    #[must_use]
    pub fn cursor(&self) -> SlotPosition {
        SlotPosition::new(self.x as u16, self.y as u16, self.z as u16)
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout {
            xnum: self.xnum,
            ynum: self.ynum,
            z: self.z,
        }
    }

    #[must_use]
    pub fn xnum(&self) -> u32 {
        self.xnum
    }

    #[must_use]
    pub fn max_y(&self) -> u32 {
        self.max_y
    }

    /// Number of pages the cursor may fill.
    #[must_use]
    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    /// Total slots across all pages.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.xnum) * u64::from(self.max_y) * u64::from(self.page_limit)
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(texture: u32, pages: u32, w: u32, h: u32) -> BumpAllocator {
        let mut alloc = BumpAllocator::new();
        alloc.configure(
            SpriteLimits::new(texture, pages).expect("limits"),
            CellSize::new(w, h).expect("cell"),
        );
        alloc
    }

    #[test]
    fn layout_dimensions_follow_cell_size() {
        let alloc = configured(1000, 1000, 8, 16);
        assert_eq!(alloc.xnum(), 125);
        assert_eq!(alloc.max_y(), 62);
        assert_eq!(
            alloc.layout(),
            Layout {
                xnum: 125,
                ynum: 1,
                z: 0
            }
        );
    }

    #[test]
    fn oversized_cells_still_get_one_slot() {
        let alloc = configured(10, 3, 64, 64);
        assert_eq!(alloc.xnum(), 1);
        assert_eq!(alloc.max_y(), 1);
        assert_eq!(alloc.capacity(), 3);
    }

    #[test]
    fn huge_textures_clamp_to_u16_range() {
        let alloc = configured(u32::MAX, u32::MAX, 1, 1);
        assert_eq!(alloc.xnum(), PAGE_INDEX_LIMIT);
        assert_eq!(alloc.max_y(), PAGE_INDEX_LIMIT);
        assert_eq!(alloc.page_limit(), PAGE_INDEX_LIMIT);
    }

    #[test]
    fn wraps_rows_then_pages() {
        let mut alloc = configured(20, 4, 10, 10);
        let slots: Vec<SlotPosition> = (0..5).map(|_| alloc.next_slot().expect("slot")).collect();
        assert_eq!(
            slots,
            vec![
                SlotPosition::new(0, 0, 0),
                SlotPosition::new(1, 0, 0),
                SlotPosition::new(0, 1, 0),
                SlotPosition::new(1, 1, 0),
                SlotPosition::new(0, 0, 1),
            ]
        );
        assert_eq!(alloc.layout().ynum, 2);
        assert_eq!(alloc.layout().z, 1);
    }

    #[test]
    fn ynum_grows_with_rows_and_caps_at_max_y() {
        let mut alloc = configured(30, 2, 10, 10);
        assert_eq!(alloc.layout().ynum, 1);
        for _ in 0..3 {
            alloc.next_slot().expect("slot");
        }
        assert_eq!(alloc.layout().ynum, 2);
        for _ in 0..6 {
            alloc.next_slot().expect("slot");
        }
        // First page full; ynum never exceeds max_y.
        assert_eq!(alloc.layout().ynum, 3);
        assert_eq!(alloc.layout().z, 1);
    }

    #[test]
    fn exhaustion_is_checked_before_commit() {
        let mut alloc = configured(20, 2, 10, 10);
        assert_eq!(alloc.capacity(), 8);
        for _ in 0..8 {
            alloc.next_slot().expect("within capacity");
        }
        assert!(alloc.is_exhausted());
        let cursor = alloc.cursor();
        assert!(matches!(alloc.next_slot(), Err(SpriteError::OutOfSpace)));
        assert!(matches!(alloc.next_slot(), Err(SpriteError::OutOfSpace)));
        assert_eq!(alloc.cursor(), cursor);
    }

    #[test]
    fn configure_rewinds_cursor() {
        let mut alloc = configured(20, 2, 10, 10);
        for _ in 0..3 {
            alloc.next_slot().expect("slot");
        }
        alloc.configure(
            SpriteLimits::new(40, 2).expect("limits"),
            CellSize::new(10, 10).expect("cell"),
        );
        assert_eq!(alloc.cursor(), SlotPosition::ORIGIN);
        assert_eq!(alloc.layout().ynum, 1);
        assert_eq!(alloc.xnum(), 4);
    }

    #[test]
    fn unconfigured_allocator_is_single_column() {
        let mut alloc = BumpAllocator::new();
        assert_eq!(alloc.next_slot().expect("slot"), SlotPosition::new(0, 0, 0));
        assert_eq!(alloc.next_slot().expect("slot"), SlotPosition::new(0, 1, 0));
    }
}
