//! Paginated container listing.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use crate::error::{Error, Result};
use crate::models::{Asset, Container};

use super::{AccessToken, AuthenticatedExecutor, PhotoLibrary};

/// Server-side page size; a page never carries more items than this.
pub const PAGE_SIZE: usize = 100;

/// Default page cap, bounding one refresh to 500 visible assets.
pub const DEFAULT_MAX_PAGES: usize = 5;

/// Lists a remote container into a deduplicated asset sequence.
///
/// Listing is all-or-nothing: a failed page aborts the refresh with no
/// partial result, so downstream never sees a silently truncated view.
#[derive(Clone)]
pub struct AssetIndexer {
    library: Arc<dyn PhotoLibrary>,
    auth: AuthenticatedExecutor,
}

impl AssetIndexer {
    pub fn new(library: Arc<dyn PhotoLibrary>, auth: AuthenticatedExecutor) -> Self {
        Self { library, auth }
    }

    /// Resolve a container title to the container itself. On duplicate
    /// titles the first match wins.
    pub async fn resolve_container(&self, title: &str) -> Result<Container> {
        let library = self.library.clone();
        let containers = self
            .auth
            .execute(|token: AccessToken| {
                let library = library.clone();
                async move { library.list_containers(&token).await }
            })
            .await?;

        containers
            .into_iter()
            .find(|container| container.title == title)
            .ok_or_else(|| Error::ContainerNotFound {
                title: title.to_string(),
            })
    }

    /// Fetch up to `max_pages` pages of `container`, keeping image entries
    /// that are not trashed, deduplicated by id. The last occurrence of a
    /// duplicate id wins; positions keep first-seen order so downstream
    /// indexing stays stable.
    pub async fn list(&self, container: &Container, max_pages: usize) -> Result<Vec<Asset>> {
        let mut merged: Vec<Asset> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut page_token: Option<String> = None;
        let mut pages_fetched = 0usize;

        while pages_fetched < max_pages {
            let library = self.library.clone();
            let container_id = container.id.clone();
            let cursor = page_token.clone();

            let page = self
                .auth
                .execute(|token: AccessToken| {
                    let library = library.clone();
                    let container_id = container_id.clone();
                    let cursor = cursor.clone();
                    async move {
                        library
                            .list_page(&token, &container_id, cursor.as_deref())
                            .await
                    }
                })
                .await?;
            pages_fetched += 1;

            for entry in page.entries {
                if entry.trashed || !entry.is_image() {
                    continue;
                }
                let asset = entry.into_asset();
                match position.get(&asset.id) {
                    Some(&slot) => merged[slot] = asset,
                    None => {
                        position.insert(asset.id.clone(), merged.len());
                        merged.push(asset);
                    }
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        info!(
            "listed container '{}': {} assets over {} page(s)",
            container.title,
            merged.len(),
            pages_fetched
        );

        Ok(merged)
    }
}
