//! Packed terminal characters and the glyph keys derived from them.
//!
//! A cell's character is stored as a single `u32`: the low 24 bits hold the
//! Unicode scalar and the high byte holds [`CharAttrs`]. Only the scalar and
//! the bold/italic bits change a glyph's shape, so [`GlyphKey`] strips the
//! rest before hashing or comparing.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Bits of a packed char code holding the Unicode scalar.
pub const CHAR_MASK: u32 = 0x00FF_FFFF;
/// Shift of the attribute byte within a packed char code.
pub const ATTRS_SHIFT: u32 = 24;
/// Mask of the width field within the attribute byte.
pub const WIDTH_MASK: u8 = 0b11;
/// Shift of the bold bit within the attribute byte.
pub const BOLD_SHIFT: u32 = 4;
/// Shift of the italic bit within the attribute byte.
pub const ITALIC_SHIFT: u32 = 5;
/// Scalar plus the bold and italic bits: everything that affects glyph shape.
pub const POSCHAR_MASK: u32 = CHAR_MASK | (0b11 << (ATTRS_SHIFT + BOLD_SHIFT));

/// Width in bits of one packed combining mark.
pub const CC_SHIFT: u32 = 16;
/// Mask of one packed combining mark.
pub const CC_MASK: u64 = 0xFFFF;
/// Maximum number of combining marks a combining code can carry.
pub const MAX_COMBINING_MARKS: usize = (u64::BITS / CC_SHIFT) as usize;

bitflags! {
    /// Attribute byte of a packed char code.
    ///
    /// `WIDTH` and `DECORATION` are two-bit fields rather than single flags;
    /// use [`CharAttrs::width`] and [`CharAttrs::with_width`] to access the
    /// width as a number.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharAttrs: u8 {
        const WIDTH         = 0b0000_0011;
        const DECORATION    = 0b0000_1100;
        const BOLD          = 1 << BOLD_SHIFT;
        const ITALIC        = 1 << ITALIC_SHIFT;
        const REVERSE       = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

impl CharAttrs {
    /// Display width stored in the attribute byte (0, 1 or 2).
    #[must_use]
    pub const fn width(self) -> u8 {
        self.bits() & WIDTH_MASK
    }

    /// Return a copy with the width field replaced.
    #[must_use]
    pub const fn with_width(self, width: u8) -> Self {
        Self::from_bits_retain((self.bits() & !WIDTH_MASK) | (width & WIDTH_MASK))
    }
}

/// A character packed together with its attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharCode(u32);

impl CharCode {
    #[must_use]
    pub const fn new(ch: char, attrs: CharAttrs) -> Self {
        Self((ch as u32 & CHAR_MASK) | ((attrs.bits() as u32) << ATTRS_SHIFT))
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The Unicode scalar without attributes.
    #[must_use]
    pub const fn scalar(self) -> u32 {
        self.0 & CHAR_MASK
    }

    #[must_use]
    pub const fn attrs(self) -> CharAttrs {
        CharAttrs::from_bits_retain((self.0 >> ATTRS_SHIFT) as u8)
    }

    #[must_use]
    pub const fn width(self) -> u8 {
        self.attrs().width()
    }
}

impl From<u32> for CharCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Iterate the combining marks packed into a combining code, lowest first.
///
/// The sequence ends at the first zero unit.
pub fn combining_marks(cc: u64) -> impl Iterator<Item = u32> {
    (0..MAX_COMBINING_MARKS)
        .map(move |i| ((cc >> (i as u32 * CC_SHIFT)) & CC_MASK) as u32)
        .take_while(|&mark| mark != 0)
}

/// Pack combining marks into a combining code.
///
/// Returns `None` if there are more than [`MAX_COMBINING_MARKS`] marks or a
/// mark lies outside the Basic Multilingual Plane.
#[must_use]
pub fn pack_combining(marks: &[char]) -> Option<u64> {
    if marks.len() > MAX_COMBINING_MARKS {
        return None;
    }
    let mut cc = 0u64;
    for (i, &mark) in marks.iter().enumerate() {
        let unit = u64::from(u32::from(mark));
        if unit > CC_MASK {
            return None;
        }
        cc |= unit << (i as u32 * CC_SHIFT);
    }
    Some(cc)
}

/// Identity under which a glyph's atlas slot is cached.
///
/// Constructing a key strips every attribute bit except bold and italic, so
/// two cells that differ only in color or decoration share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlyphKey {
    ch: u32,
    cc: u64,
    is_second: bool,
}

impl GlyphKey {
    /// The zero key stored in cleared entries.
    pub const EMPTY: Self = Self::new(0, 0, false);

    #[must_use]
    pub const fn new(ch: u32, cc: u64, is_second: bool) -> Self {
        Self {
            ch: ch & POSCHAR_MASK,
            cc,
            is_second,
        }
    }

    /// Key for the cell at `cell`, given the cell immediately to its left.
    ///
    /// The trailing half of a double-width glyph carries no content of its
    /// own; it is keyed by the leading cell's character, without combining
    /// marks, with the second-half flag set.
    #[must_use]
    pub fn for_cell(cell: &Cell, previous: Option<&Cell>) -> Self {
        match previous {
            Some(prev) if prev.ch.width() == 2 => Self::new(prev.ch.bits(), 0, true),
            _ => Self::new(cell.ch.bits(), cell.cc, false),
        }
    }

    /// Masked char code: scalar plus bold and italic bits.
    #[must_use]
    pub const fn char_code(self) -> u32 {
        self.ch
    }

    #[must_use]
    pub const fn scalar(self) -> u32 {
        self.ch & CHAR_MASK
    }

    #[must_use]
    pub const fn combining_code(self) -> u64 {
        self.cc
    }

    #[must_use]
    pub const fn is_second_half(self) -> bool {
        self.is_second
    }

    #[must_use]
    pub const fn bold(self) -> bool {
        (self.ch >> (ATTRS_SHIFT + BOLD_SHIFT)) & 1 == 1
    }

    #[must_use]
    pub const fn italic(self) -> bool {
        (self.ch >> (ATTRS_SHIFT + ITALIC_SHIFT)) & 1 == 1
    }

    /// Bucket index: the low byte of the scalar with bold in bit 8 and
    /// italic in bit 9.
    #[must_use]
    pub const fn bucket(self) -> usize {
        (((self.ch >> (ATTRS_SHIFT - 4)) & 0x300) | (self.ch & 0xFF)) as usize
    }
}

/// Atlas coordinate of a sprite: `(x, y)` within a page, `z` selects the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SlotPosition {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl SlotPosition {
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }
}

/// A terminal cell as seen by the sprite map: content plus the sprite
/// coordinates the renderer samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub ch: CharCode,
    /// Packed combining marks (see [`combining_marks`]).
    pub cc: u64,
    pub sprite_x: u16,
    pub sprite_y: u16,
    pub sprite_z: u16,
}

impl Cell {
    /// A single-width cell with no attributes.
    #[must_use]
    pub fn new(ch: char) -> Self {
        Self::with_attrs(ch, CharAttrs::empty().with_width(1))
    }

    #[must_use]
    pub fn with_attrs(ch: char, attrs: CharAttrs) -> Self {
        Self {
            ch: CharCode::new(ch, attrs),
            ..Self::default()
        }
    }

    /// Create a wide (2-column) character.
    ///
    /// Returns `(leading, continuation)`. The continuation cell holds no
    /// character; its sprite is resolved from the leading cell.
    #[must_use]
    pub fn wide(ch: char, attrs: CharAttrs) -> (Self, Self) {
        let leading = Self::with_attrs(ch, attrs.with_width(2));
        let continuation = Self::with_attrs('\0', attrs.with_width(0));
        (leading, continuation)
    }

    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.ch.width() == 2
    }

    #[must_use]
    pub fn sprite(&self) -> SlotPosition {
        SlotPosition::new(self.sprite_x, self.sprite_y, self.sprite_z)
    }

    pub fn set_sprite(&mut self, slot: SlotPosition) {
        self.sprite_x = slot.x;
        self.sprite_y = slot.y;
        self.sprite_z = slot.z;
    }
}
