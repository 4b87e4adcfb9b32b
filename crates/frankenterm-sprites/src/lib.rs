#![forbid(unsafe_code)]

//! Sprite map for FrankenTerm's glyph atlas.
//!
//! Maps a rendered character's identity to a stable `(x, y, z)` slot in a
//! stack of atlas pages, so each glyph is rasterized exactly once per
//! layout. The crate never touches a GPU: the renderer asks for slots while
//! composing lines, then periodically collects the glyphs it still has to
//! draw.
//!
//! # Primary responsibilities
//!
//! - **Keys**: packed char codes reduced to the bits that change glyph shape.
//! - **Allocation**: a bump cursor that fills rows, then pages, and fails
//!   cleanly once the configured pages are full.
//! - **Caching**: a fixed 1024-bucket table with per-bucket chains whose
//!   storage survives layout resets.
//! - **Dirty tracking**: deterministic batches of glyphs awaiting
//!   rasterization, committed only when the whole batch was shaped.
//!
//! # Lifecycle
//!
//! ```
//! use frankenterm_sprites::{PlainShaper, SlotPosition, SpriteMap};
//!
//! let mut map = SpriteMap::new();
//! map.set_limits(1000, 1000)?;
//! map.set_layout(8, 16)?;
//! assert_eq!(map.position_for('A' as u32, 0, false)?, SlotPosition::new(0, 0, 0));
//! let batch = map.collect_dirty(&mut PlainShaper)?;
//! assert_eq!(batch[0].text, "A");
//! # Ok::<(), frankenterm_sprites::SpriteError>(())
//! ```

pub mod allocator;
pub mod cell;
pub mod config;
pub mod dirty;
pub mod error;
pub mod sprite_map;

pub use allocator::{BumpAllocator, Layout};
pub use cell::{Cell, CharAttrs, CharCode, GlyphKey, SlotPosition};
pub use config::{CellSize, SpriteLimits};
pub use dirty::{GlyphShaper, PlainShaper, RenderRecord};
pub use error::{ConfigError, ShapingError, SpriteError};
pub use sprite_map::{BUCKET_COUNT, SpriteMap, SpriteStats};
