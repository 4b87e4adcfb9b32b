//! Glyph key → atlas slot cache.
//!
//! The map is a fixed table of [`BUCKET_COUNT`] buckets. Each bucket is a
//! chain of entries stored in link order; the first entry lives inline in
//! the table, so the common case of one glyph per bucket never allocates.
//!
//! Filled entries always form a prefix of a chain. A layout change clears
//! entries in place but keeps the chain storage, so repeated font-size
//! changes reuse the same nodes instead of reallocating them.

use smallvec::SmallVec;

use crate::allocator::{BumpAllocator, Layout};
use crate::cell::{Cell, GlyphKey, SlotPosition};
use crate::config::{CellSize, SpriteLimits};
use crate::dirty::{self, GlyphShaper, RenderRecord};
use crate::error::SpriteError;

/// Number of buckets: 8 bits of scalar plus the bold and italic bits.
pub const BUCKET_COUNT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Entry {
    pub(crate) key: GlyphKey,
    pub(crate) slot: SlotPosition,
    pub(crate) filled: bool,
    pub(crate) rendered: bool,
}

impl Entry {
    fn matches(&self, key: GlyphKey) -> bool {
        self.filled && self.key == key
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub(crate) type Chain = SmallVec<[Entry; 1]>;

/// Lookup counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteStats {
    pub hits: u64,
    pub misses: u64,
    /// Slots handed out through [`SpriteMap::reserve_slot`].
    pub reserved: u64,
    pub layout_resets: u64,
}

/// Sprite position cache for one rendering pipeline.
///
/// Not synchronized: the owner drives it from its compose step.
#[derive(Debug)]
pub struct SpriteMap {
    buckets: Box<[Chain]>,
    allocator: BumpAllocator,
    limits: SpriteLimits,
    filled: usize,
    dirty: bool,
    stats: SpriteStats,
    #[cfg(test)]
    fail_next_reserve: bool,
}

impl SpriteMap {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(SpriteLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: SpriteLimits) -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| Chain::new()).collect(),
            allocator: BumpAllocator::new(),
            limits,
            filled: 0,
            dirty: true,
            stats: SpriteStats::default(),
            #[cfg(test)]
            fail_next_reserve: false,
        }
    }

    /// Replace the atlas limits.
    ///
    /// The current layout is left alone; the new limits apply from the next
    /// [`set_layout`](Self::set_layout).
    pub fn set_limits(
        &mut self,
        max_texture_size: u32,
        max_array_len: u32,
    ) -> Result<(), SpriteError> {
        self.limits = SpriteLimits::new(max_texture_size, max_array_len)?;
        tracing::debug!(max_texture_size, max_array_len, "sprite limits updated");
        Ok(())
    }

    #[must_use]
    pub fn limits(&self) -> SpriteLimits {
        self.limits
    }

    /// Recompute the grid for a new cell size and invalidate every entry.
    pub fn set_layout(&mut self, cell_width: u32, cell_height: u32) -> Result<(), SpriteError> {
        let cell = CellSize::new(cell_width, cell_height)?;
        self.set_cell_size(cell);
        Ok(())
    }

    /// Same as [`set_layout`](Self::set_layout) for an already validated size.
    pub fn set_cell_size(&mut self, cell: CellSize) {
        self.allocator.configure(self.limits, cell);
        for chain in self.buckets.iter_mut() {
            for entry in chain.iter_mut() {
                entry.clear();
            }
        }
        self.filled = 0;
        self.dirty = true;
        self.stats.layout_resets += 1;
        tracing::debug!(
            cell_width = cell.width(),
            cell_height = cell.height(),
            xnum = self.allocator.xnum(),
            max_y = self.allocator.max_y(),
            retained_nodes = self.node_count(),
            "sprite layout reset"
        );
    }

    /// Return the slot for a glyph, allocating one on first sight.
    pub fn position_for(
        &mut self,
        char_code: u32,
        combining_code: u64,
        is_second_half: bool,
    ) -> Result<SlotPosition, SpriteError> {
        self.position_for_key(GlyphKey::new(char_code, combining_code, is_second_half))
    }

    pub fn position_for_key(&mut self, key: GlyphKey) -> Result<SlotPosition, SpriteError> {
        let bucket = key.bucket();
        let chain = &mut self.buckets[bucket];

        // Hot path: the head entry is usually the only one in its bucket.
        if let Some(head) = chain.first()
            && head.matches(key)
        {
            self.stats.hits += 1;
            return Ok(head.slot);
        }

        let mut target = None;
        for (idx, entry) in chain.iter().enumerate() {
            if !entry.filled {
                target = Some(idx);
                break;
            }
            if entry.key == key {
                self.stats.hits += 1;
                return Ok(entry.slot);
            }
        }

        let idx = match target {
            Some(idx) => idx,
            None => {
                #[cfg(test)]
                let reserved = if std::mem::take(&mut self.fail_next_reserve) {
                    Err(smallvec::CollectionAllocErr::CapacityOverflow)
                } else {
                    chain.try_reserve(1)
                };
                #[cfg(not(test))]
                let reserved = chain.try_reserve(1);
                reserved.map_err(|_| SpriteError::OutOfMemory { key })?;
                chain.len()
            }
        };

        let slot = self.allocator.next_slot()?;
        let entry = Entry {
            key,
            slot,
            filled: true,
            rendered: false,
        };
        if idx == chain.len() {
            chain.push(entry);
        } else {
            chain[idx] = entry;
        }
        self.filled += 1;
        self.dirty = true;
        self.stats.misses += 1;
        tracing::trace!(
            bucket,
            depth = idx,
            x = slot.x,
            y = slot.y,
            z = slot.z,
            "sprite allocated"
        );
        Ok(slot)
    }

    /// Look up a glyph without allocating.
    #[must_use]
    pub fn get(&self, key: GlyphKey) -> Option<SlotPosition> {
        self.buckets[key.bucket()]
            .iter()
            .take_while(|entry| entry.filled)
            .find(|entry| entry.key == key)
            .map(|entry| entry.slot)
    }

    /// Hand out the next slot without binding it to a glyph.
    ///
    /// Used for sprites the renderer draws itself (cursor shapes, box
    /// fills). Shares the capacity of the glyph slots.
    pub fn reserve_slot(&mut self) -> Result<SlotPosition, SpriteError> {
        let slot = self.allocator.next_slot()?;
        self.stats.reserved += 1;
        Ok(slot)
    }

    /// Resolve and store the sprite for `cell`.
    ///
    /// `previous` is the cell immediately to the left, if any; when it is the
    /// leading half of a wide glyph, `cell` receives the glyph's second half.
    pub fn assign_cell(
        &mut self,
        cell: &mut Cell,
        previous: Option<&Cell>,
    ) -> Result<(), SpriteError> {
        let slot = self.position_for_key(GlyphKey::for_cell(cell, previous))?;
        cell.set_sprite(slot);
        Ok(())
    }

    /// Assign sprites to a line of cells, left to right.
    pub fn assign_line(&mut self, cells: &mut [Cell]) -> Result<(), SpriteError> {
        for idx in 0..cells.len() {
            let previous = idx.checked_sub(1).map(|prev| cells[prev]);
            self.assign_cell(&mut cells[idx], previous.as_ref())?;
        }
        Ok(())
    }

    /// Shape and hand over every glyph not yet rasterized.
    ///
    /// Returns an empty batch if nothing changed since the last successful
    /// call. Records are ordered by bucket, then by chain position. If the
    /// shaper fails, no entry is marked rendered and the map stays dirty, so
    /// the next call retries the full batch.
    pub fn collect_dirty<S>(&mut self, shaper: &mut S) -> Result<Vec<RenderRecord>, SpriteError>
    where
        S: GlyphShaper + ?Sized,
    {
        if !self.dirty {
            return Ok(Vec::new());
        }
        let _span = tracing::debug_span!("collect_dirty", filled = self.filled).entered();
        let records = dirty::collect_pending(&mut self.buckets, shaper)?;
        self.dirty = false;
        tracing::debug!(count = records.len(), "dirty sprites collected");
        Ok(records)
    }

    /// Grid dimensions and current page.
    #[must_use]
    pub fn current_layout(&self) -> Layout {
        self.allocator.layout()
    }

    /// Position the next allocation will receive.
    #[must_use]
    pub fn cursor(&self) -> SlotPosition {
        self.allocator.cursor()
    }

    /// Total slots available under the current layout.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.allocator.capacity()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of cached glyphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filled
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Number of entry nodes held, filled or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.buckets.iter().map(|chain| chain.len()).sum()
    }

    #[must_use]
    pub fn stats(&self) -> SpriteStats {
        self.stats
    }

    /// Release every chain node and rewind the cursor.
    ///
    /// Limits and layout dimensions are kept; the map behaves like a freshly
    /// configured one afterwards.
    pub fn teardown(&mut self) {
        let released = self.node_count();
        for chain in self.buckets.iter_mut() {
            *chain = Chain::new();
        }
        self.allocator.rewind();
        self.filled = 0;
        self.dirty = true;
        tracing::debug!(released, "sprite map torn down");
    }
}

impl Default for SpriteMap {
    fn default() -> Self {
        Self::new()
    }
}
