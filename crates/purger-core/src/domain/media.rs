//! Media handles handed out by the library and shown by the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::asset::AssetId;

/// Requested decode size for photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSize {
    /// Full resolution.
    #[default]
    Maximum,
    /// Aspect-fit into the given box.
    Fit { width: u32, height: u32 },
}

/// Decoded (or decodable) photo bytes. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoData {
    bytes: Arc<[u8]>,
}

impl PhotoData {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A prepared, playable video reference (e.g. a local file URI).
///
/// Holding one is inert; only the owner's current video is "hot".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHandle {
    pub asset: AssetId,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHandle {
    Photo(PhotoData),
    Video(VideoHandle),
}

impl MediaHandle {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaHandle::Video(_))
    }
}
