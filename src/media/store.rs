use async_trait::async_trait;

use crate::media::types::{AssetId, SourceMedia};

/// How the store should deliver media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Full resolution original
    HighQuality,
    /// Whatever is cheapest to hand out right now
    Fast,
}

/// Options for a single fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Allow the store to download media that is not cached locally
    pub network_access_allowed: bool,
    pub delivery_mode: DeliveryMode,
}

impl FetchOptions {
    /// Options used by the export pipeline: network allowed, full quality
    pub fn for_export() -> Self {
        Self {
            network_access_allowed: true,
            delivery_mode: DeliveryMode::HighQuality,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::for_export()
    }
}

/// Download progress callback, called with fractions in `[0, 1]`
pub type DownloadProgress = Box<dyn Fn(f64) + Send + Sync>;

/// Boundary to the platform media library.
///
/// Implementations may call `progress` from any thread and any number of
/// times. `None` means the asset could not be made available.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn fetch_video_asset(
        &self,
        id: &AssetId,
        options: FetchOptions,
        progress: DownloadProgress,
    ) -> Option<SourceMedia>;
}
