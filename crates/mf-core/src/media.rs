//! Media-domain enums for item kinds, artwork types, and external services.
//!
//! All enums serialize in lowercase (via `serde(rename_all = "lowercase")`) and
//! implement `Display` manually for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Kind of library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    /// A standalone video file (trailers, extras).
    Video,
    /// A plain directory with no media semantics.
    Folder,
}

impl ItemKind {
    /// Whether items of this kind are playable video.
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Movie | Self::Episode | Self::Video)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
            Self::Season => write!(f, "season"),
            Self::Episode => write!(f, "episode"),
            Self::Video => write!(f, "video"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

// ---------------------------------------------------------------------------
// ImageType
// ---------------------------------------------------------------------------

/// Type of item image/artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Primary,
    Backdrop,
    Banner,
    Thumb,
    Logo,
    Art,
    Disc,
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backdrop => write!(f, "backdrop"),
            Self::Banner => write!(f, "banner"),
            Self::Thumb => write!(f, "thumb"),
            Self::Logo => write!(f, "logo"),
            Self::Art => write!(f, "art"),
            Self::Disc => write!(f, "disc"),
        }
    }
}

// ---------------------------------------------------------------------------
// ExternalService
// ---------------------------------------------------------------------------

/// Third-party metadata services an item may carry an identifier for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalService {
    Tvdb,
    Tmdb,
    Imdb,
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tvdb => write!(f, "tvdb"),
            Self::Tmdb => write!(f, "tmdb"),
            Self::Imdb => write!(f, "imdb"),
        }
    }
}
