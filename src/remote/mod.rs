//! Seams to the external collaborators: the OAuth token cache, the photo
//! service, the label classifier, and the OS wallpaper call.
//!
//! Everything network- or platform-shaped enters the crate through these
//! traits; the core never talks to a concrete backend.

use std::collections::BTreeSet;

use async_trait::async_trait;
use image::RgbaImage;

use crate::error::Result;
use crate::models::{Asset, Container};

pub mod auth;
pub mod indexer;

pub use auth::AuthenticatedExecutor;
pub use indexer::{AssetIndexer, DEFAULT_MAX_PAGES, PAGE_SIZE};

/// An opaque bearer token. Cloned freely; equality is how the provider
/// recognizes which cached token to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a container listing, as the remote reports it. The indexer
/// filters entries down to [`Asset`]s; `trashed` and non-image mime types
/// never leave that layer.
#[derive(Debug, Clone)]
pub struct MediaPage {
    pub entries: Vec<MediaEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub id: String,
    pub display_name: String,
    pub mime_type: String,
    pub trashed: bool,
    pub thumbnail_ref: Option<String>,
    pub size_bytes: Option<u64>,
}

impl MediaEntry {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn into_asset(self) -> Asset {
        Asset {
            id: self.id,
            display_name: self.display_name,
            mime_type: self.mime_type,
            thumbnail_ref: self.thumbnail_ref,
            size_bytes: self.size_bytes,
        }
    }
}

/// Source of bearer tokens. Implemented by the host's sign-in flow.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token, or `Error::NotAuthenticated` when no account is
    /// signed in. Never triggers an interactive flow.
    async fn current_access_token(&self) -> Result<AccessToken>;

    /// Drop `token` from the provider's cache so the next
    /// `current_access_token` performs a refresh.
    async fn invalidate(&self, token: &AccessToken);
}

/// The remote photo service. Implementations are expected to map their
/// transport's 401/403 responses to `Error::AuthExpired` so the executor can
/// recover, and everything else to `Error::RemoteUnavailable`.
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    async fn list_containers(&self, token: &AccessToken) -> Result<Vec<Container>>;

    async fn list_page(
        &self,
        token: &AccessToken,
        container_id: &str,
        page_token: Option<&str>,
    ) -> Result<MediaPage>;

    async fn fetch_thumbnail(&self, token: &AccessToken, asset: &Asset) -> Result<RgbaImage>;

    async fn fetch_full_image(&self, token: &AccessToken, asset: &Asset) -> Result<Vec<u8>>;
}

/// The black-box label model: raster in, zero or more label strings out.
#[async_trait]
pub trait LabelClassifier: Send + Sync {
    async fn classify(&self, image: &RgbaImage) -> Result<BTreeSet<String>>;
}

/// The OS-level "paint this raster as the wallpaper" call.
#[async_trait]
pub trait WallpaperTarget: Send + Sync {
    async fn apply(&self, image: &RgbaImage) -> Result<()>;
}
