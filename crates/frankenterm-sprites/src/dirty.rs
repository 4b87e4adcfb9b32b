//! Dirty sprite collection.
//!
//! Every filled entry starts out unrendered. Collection walks the bucket
//! table in index order (chains in link order), asks a [`GlyphShaper`] for
//! each pending glyph's text and returns one [`RenderRecord`] per glyph.
//! Rendered flags are committed only after the whole walk succeeded.

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::cell::{SlotPosition, combining_marks};
use crate::error::ShapingError;
use crate::sprite_map::Chain;

/// Source of display text for a glyph.
pub trait GlyphShaper {
    /// Text for the Unicode scalar `char_code` followed by the marks packed
    /// in `combining_code`.
    fn shape(&mut self, char_code: u32, combining_code: u64) -> Result<String, ShapingError>;
}

impl<F> GlyphShaper for F
where
    F: FnMut(u32, u64) -> Result<String, ShapingError>,
{
    fn shape(&mut self, char_code: u32, combining_code: u64) -> Result<String, ShapingError> {
        self(char_code, combining_code)
    }
}

/// Shaper that spells the scalar and its combining marks, NFC-normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainShaper;

impl GlyphShaper for PlainShaper {
    fn shape(&mut self, char_code: u32, combining_code: u64) -> Result<String, ShapingError> {
        let invalid = |value: u32| {
            ShapingError::new(
                char_code,
                combining_code,
                format!("U+{value:04X} is not a Unicode scalar value"),
            )
        };
        let mut text = String::new();
        text.push(char::from_u32(char_code).ok_or_else(|| invalid(char_code))?);
        for mark in combining_marks(combining_code) {
            text.push(char::from_u32(mark).ok_or_else(|| invalid(mark))?);
        }
        Ok(text.nfc().collect())
    }
}

/// A glyph the renderer must rasterize into the atlas at `(x, y, z)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRecord {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub is_second_half: bool,
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl RenderRecord {
    #[must_use]
    pub fn slot(&self) -> SlotPosition {
        SlotPosition::new(self.x, self.y, self.z)
    }
}

/// Shape every filled, unrendered entry and mark them rendered.
///
/// On error nothing is marked.
pub(crate) fn collect_pending<S>(
    buckets: &mut [Chain],
    shaper: &mut S,
) -> Result<Vec<RenderRecord>, ShapingError>
where
    S: GlyphShaper + ?Sized,
{
    let mut records = Vec::new();
    let mut pending = Vec::new();

    for (bucket, chain) in buckets.iter().enumerate() {
        for (depth, entry) in chain.iter().enumerate() {
            if !entry.filled || entry.rendered {
                continue;
            }
            let key = entry.key;
            let text = shaper.shape(key.scalar(), key.combining_code())?;
            records.push(RenderRecord {
                text,
                bold: key.bold(),
                italic: key.italic(),
                is_second_half: key.is_second_half(),
                x: entry.slot.x,
                y: entry.slot.y,
                z: entry.slot.z,
            });
            pending.push((bucket, depth));
        }
    }

    for (bucket, depth) in pending {
        buckets[bucket][depth].rendered = true;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpriteMap;
    use crate::cell::{CharAttrs, CharCode, pack_combining};
    use crate::error::SpriteError;

    fn map() -> SpriteMap {
        let mut map = SpriteMap::new();
        map.set_layout(8, 16).expect("layout");
        map
    }

    #[test]
    fn plain_shaper_composes_marks() {
        let cc = pack_combining(&['\u{301}']).expect("mark");
        assert_eq!(PlainShaper.shape('e' as u32, cc).expect("shape"), "\u{e9}");
        assert_eq!(PlainShaper.shape('x' as u32, 0).expect("shape"), "x");
        assert!(PlainShaper.shape(0xD800, 0).is_err());
    }

    #[test]
    fn records_follow_bucket_then_chain_order() {
        let mut map = map();
        let bold_b = CharCode::new('b', CharAttrs::BOLD);
        map.position_for(bold_b.bits(), 0, false).expect("alloc"); // bucket 0x162
        map.position_for('b' as u32, 0, false).expect("alloc"); // bucket 0x62
        map.position_for('a' as u32, 0, false).expect("alloc"); // bucket 0x61
        map.position_for(0x161, 0, false).expect("alloc"); // bucket 0x61, chained

        let batch = map.collect_dirty(&mut PlainShaper).expect("collect");
        let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "\u{161}", "b", "b"]);
        assert_eq!(batch[0].slot(), SlotPosition::new(2, 0, 0));
        assert!(batch[3].bold);
        assert!(!batch[3].italic);
        assert_eq!(batch[3].slot(), SlotPosition::ORIGIN);
    }

    #[test]
    fn second_collection_is_empty() {
        let mut map = map();
        map.position_for('z' as u32, 0, true).expect("alloc");
        let batch = map.collect_dirty(&mut PlainShaper).expect("collect");
        assert_eq!(batch.len(), 1);
        assert!(batch[0].is_second_half);
        assert!(!map.is_dirty());
        assert!(map.collect_dirty(&mut PlainShaper).expect("collect").is_empty());

        // Only the newly added glyph is reported next time.
        map.position_for('y' as u32, 0, false).expect("alloc");
        let batch = map.collect_dirty(&mut PlainShaper).expect("collect");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].text, "y");
    }

    #[test]
    fn shaping_failure_commits_nothing() {
        let mut map = map();
        map.position_for('a' as u32, 0, false).expect("alloc");
        map.position_for('c' as u32, 0, false).expect("alloc");
        let mut calls = 0;
        let mut failing = |ch: u32, cc: u64| {
            calls += 1;
            if ch == 'c' as u32 {
                Err(ShapingError::new(ch, cc, "no glyph"))
            } else {
                Ok(char::from_u32(ch).map(String::from).unwrap_or_default())
            }
        };
        let err = map.collect_dirty(&mut failing);
        assert!(matches!(err, Err(SpriteError::Shaping(_))));
        assert_eq!(calls, 2);
        assert!(map.is_dirty());

        // Every pending glyph is retried, including the one shaped before the failure.
        let batch = map.collect_dirty(&mut PlainShaper).expect("collect");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn layout_reset_requires_rerender() {
        let mut map = map();
        map.position_for('k' as u32, 0, false).expect("alloc");
        map.collect_dirty(&mut PlainShaper).expect("collect");
        map.set_layout(9, 18).expect("layout");
        assert!(map.collect_dirty(&mut PlainShaper).expect("collect").is_empty());
        map.position_for('k' as u32, 0, false).expect("alloc");
        let batch = map.collect_dirty(&mut PlainShaper).expect("collect");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].slot(), SlotPosition::ORIGIN);
    }

    #[test]
    fn records_serialize_for_traces() {
        let record = RenderRecord {
            text: "A".to_string(),
            bold: true,
            italic: false,
            is_second_half: false,
            x: 1,
            y: 2,
            z: 3,
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            json,
            r#"{"text":"A","bold":true,"italic":false,"is_second_half":false,"x":1,"y":2,"z":3}"#
        );
    }
}
