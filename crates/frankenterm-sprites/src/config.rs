//! Atlas limits and cell geometry.
//!
//! Both types validate on construction and on deserialization, so a value
//! held by the sprite map is always usable. Limits take effect on the next
//! layout change; they never reshape an existing layout.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_ARRAY_LEN: u32 = 1000;

/// Environment override for [`SpriteLimits::max_texture_size`].
pub const ENV_MAX_TEXTURE_SIZE: &str = "FRANKENTERM_SPRITE_MAX_TEXTURE_SIZE";
/// Environment override for [`SpriteLimits::max_array_len`].
pub const ENV_MAX_ARRAY_LEN: &str = "FRANKENTERM_SPRITE_MAX_ARRAY_LEN";

/// GPU limits bounding the sprite atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimits", into = "RawLimits")]
pub struct SpriteLimits {
    max_texture_size: u32,
    max_array_len: u32,
}

#[derive(Serialize, Deserialize)]
struct RawLimits {
    max_texture_size: u32,
    max_array_len: u32,
}

impl SpriteLimits {
    /// Validate and build limits.
    ///
    /// `max_texture_size` is the edge length in pixels of one atlas page;
    /// `max_array_len` is the number of pages.
    pub fn new(max_texture_size: u32, max_array_len: u32) -> Result<Self, ConfigError> {
        if max_texture_size == 0 {
            return Err(ConfigError::ZeroTextureSize);
        }
        if max_array_len == 0 {
            return Err(ConfigError::ZeroArrayLen);
        }
        Ok(Self {
            max_texture_size,
            max_array_len,
        })
    }

    #[must_use]
    pub const fn max_texture_size(self) -> u32 {
        self.max_texture_size
    }

    #[must_use]
    pub const fn max_array_len(self) -> u32 {
        self.max_array_len
    }

    /// Resolve limits from `FRANKENTERM_SPRITE_MAX_TEXTURE_SIZE` and
    /// `FRANKENTERM_SPRITE_MAX_ARRAY_LEN`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve limits through an arbitrary variable lookup.
    ///
    /// Missing values keep their default. Values that do not parse as a
    /// positive integer are ignored with a warning.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, default: u32| -> u32 {
            let Some(raw) = lookup(name) else {
                return default;
            };
            match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(
                        var = name,
                        value = %raw,
                        "ignoring invalid sprite limit override"
                    );
                    default
                }
            }
        };
        Self {
            max_texture_size: read(ENV_MAX_TEXTURE_SIZE, DEFAULT_MAX_TEXTURE_SIZE),
            max_array_len: read(ENV_MAX_ARRAY_LEN, DEFAULT_MAX_ARRAY_LEN),
        }
    }
}

impl Default for SpriteLimits {
    fn default() -> Self {
        Self {
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

impl TryFrom<RawLimits> for SpriteLimits {
    type Error = ConfigError;

    fn try_from(raw: RawLimits) -> Result<Self, Self::Error> {
        Self::new(raw.max_texture_size, raw.max_array_len)
    }
}

impl From<SpriteLimits> for RawLimits {
    fn from(limits: SpriteLimits) -> Self {
        Self {
            max_texture_size: limits.max_texture_size,
            max_array_len: limits.max_array_len,
        }
    }
}

/// Pixel size of one rendered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCellSize", into = "RawCellSize")]
pub struct CellSize {
    width: u32,
    height: u32,
}

#[derive(Serialize, Deserialize)]
struct RawCellSize {
    width: u32,
    height: u32,
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroCellSize { width, height });
        }
        Ok(Self { width, height })
    }

    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(self) -> u32 {
        self.height
    }
}

impl TryFrom<RawCellSize> for CellSize {
    type Error = ConfigError;

    fn try_from(raw: RawCellSize) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height)
    }
}

impl From<CellSize> for RawCellSize {
    fn from(size: CellSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}
