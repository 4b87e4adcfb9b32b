//! Error types for sprite allocation, configuration and dirty collection.

use std::error::Error;
use std::fmt;

use crate::cell::GlyphKey;

/// Rejected configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_texture_size` must be positive.
    ZeroTextureSize,
    /// `max_array_len` must be positive.
    ZeroArrayLen,
    /// Cell width and height must both be positive.
    ZeroCellSize { width: u32, height: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroTextureSize => write!(f, "max texture size must be positive"),
            Self::ZeroArrayLen => write!(f, "max texture array length must be positive"),
            Self::ZeroCellSize { width, height } => {
                write!(f, "cell size must be positive (got {width}x{height})")
            }
        }
    }
}

impl Error for ConfigError {}

/// Failure reported by a [`GlyphShaper`](crate::dirty::GlyphShaper).
///
/// The underlying cause is kept opaque and exposed through
/// [`Error::source`].
#[derive(Debug)]
pub struct ShapingError {
    char_code: u32,
    combining_code: u64,
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl ShapingError {
    pub fn new(
        char_code: u32,
        combining_code: u64,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            char_code,
            combining_code,
            source: source.into(),
        }
    }

    /// Unicode scalar of the glyph that failed to shape.
    #[must_use]
    pub fn char_code(&self) -> u32 {
        self.char_code
    }

    #[must_use]
    pub fn combining_code(&self) -> u64 {
        self.combining_code
    }
}

impl fmt::Display for ShapingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to shape U+{:04X} (combining {:#x}): {}",
            self.char_code, self.combining_code, self.source
        )
    }
}

impl Error for ShapingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source)
    }
}

/// Errors returned by [`SpriteMap`](crate::SpriteMap) operations.
#[derive(Debug)]
pub enum SpriteError {
    /// Growing a collision chain failed; nothing was stored for the key.
    OutOfMemory { key: GlyphKey },
    /// Every slot of every configured atlas page has been handed out.
    OutOfSpace,
    /// A limit or cell dimension was rejected.
    InvalidConfig(ConfigError),
    /// The text-shaping collaborator failed during dirty collection.
    Shaping(ShapingError),
}

impl fmt::Display for SpriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { key } => write!(
                f,
                "out of memory growing sprite chain for U+{:04X}",
                key.scalar()
            ),
            Self::OutOfSpace => write!(f, "out of texture space for sprites"),
            Self::InvalidConfig(err) => write!(f, "invalid sprite configuration: {err}"),
            Self::Shaping(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SpriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Shaping(err) => Some(err),
            Self::OutOfMemory { .. } | Self::OutOfSpace => None,
        }
    }
}

impl From<ConfigError> for SpriteError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl From<ShapingError> for SpriteError {
    fn from(err: ShapingError) -> Self {
        Self::Shaping(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SpriteError::OutOfSpace.to_string(),
            "out of texture space for sprites"
        );
        let err = SpriteError::from(ConfigError::ZeroCellSize {
            width: 0,
            height: 16,
        });
        assert_eq!(
            err.to_string(),
            "invalid sprite configuration: cell size must be positive (got 0x16)"
        );
    }

    #[test]
    fn shaping_error_exposes_source() {
        let err = SpriteError::from(ShapingError::new(0x41, 0, "font missing"));
        assert!(err.to_string().contains("U+0041"));
        let shaping = err.source().expect("shaping source");
        assert_eq!(
            shaping.source().map(ToString::to_string).as_deref(),
            Some("font missing")
        );
    }
}
