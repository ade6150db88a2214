//! The rotation pass: load, classify, sample, render, apply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use log::info;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classify::{ClassificationCache, ClassifyProgress};
use crate::error::{Error, Result};
use crate::labels;
use crate::models::{Asset, Container};
use crate::remote::{
    AccessToken, AssetIndexer, AuthenticatedExecutor, LabelClassifier, PhotoLibrary,
    TokenProvider, WallpaperTarget,
};
use crate::render;
use crate::settings::SettingsStore;
use crate::store::StateStore;

/// The most recent listing, owned by the engine. Replaced wholesale on each
/// pass, dropped when the configured container changes. Never survives the
/// process; listing always restarts at page 1.
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    pub container: Container,
    pub assets: Vec<Asset>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// A wallpaper was rendered and handed to the target.
    Applied { asset_id: String },
    /// Classification finished but nothing matched the active filter.
    NoEligibleAsset,
    /// The pass was cancelled at an item boundary; nothing was applied.
    Cancelled,
}

/// Drives one full rotation pass. Taking `&mut self` is the single-writer
/// discipline: one classification run, one listing refresh, one apply at a
/// time per engine value.
pub struct RotationEngine {
    auth: AuthenticatedExecutor,
    indexer: AssetIndexer,
    cache: ClassificationCache,
    library: Arc<dyn PhotoLibrary>,
    target: Arc<dyn WallpaperTarget>,
    settings: Arc<SettingsStore>,
    store: StateStore,
    snapshot: Option<ListingSnapshot>,
}

impl RotationEngine {
    pub fn new(
        store: StateStore,
        settings: Arc<SettingsStore>,
        provider: Arc<dyn TokenProvider>,
        library: Arc<dyn PhotoLibrary>,
        classifier: Arc<dyn LabelClassifier>,
        target: Arc<dyn WallpaperTarget>,
    ) -> Self {
        let auth = AuthenticatedExecutor::new(provider);
        let indexer = AssetIndexer::new(library.clone(), auth.clone());
        let cache = ClassificationCache::new(
            store.clone(),
            library.clone(),
            classifier,
            auth.clone(),
        );
        Self {
            auth,
            indexer,
            cache,
            library,
            target,
            settings,
            store,
            snapshot: None,
        }
    }

    pub fn snapshot(&self) -> Option<&ListingSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn clear_snapshot(&mut self) {
        self.snapshot = None;
    }

    pub async fn rotate(
        &mut self,
        progress: &UnboundedSender<ClassifyProgress>,
        cancel: &CancellationToken,
    ) -> Result<RotationOutcome> {
        let run_id = Uuid::new_v4();
        let settings = self.settings.rotation();

        let container = self
            .indexer
            .resolve_container(&settings.container_title)
            .await?;

        let container_changed = self
            .snapshot
            .as_ref()
            .is_some_and(|snap| snap.container.id != container.id);
        if container_changed {
            info!("rotation {run_id}: container changed, dropping listing snapshot");
            self.snapshot = None;
        }

        let assets = self.indexer.list(&container, settings.max_pages).await?;
        self.snapshot = Some(ListingSnapshot {
            container,
            assets: assets.clone(),
            fetched_at: Utc::now(),
        });

        let record = self.cache.classify(&assets, progress, cancel).await?;
        if cancel.is_cancelled() {
            return Ok(RotationOutcome::Cancelled);
        }

        let filter = labels::load_filter(&self.store).await.map_err(Error::Store)?;
        let eligibility = labels::eligible_ids(&record, &filter);
        let chosen = {
            let mut rng = rand::thread_rng();
            labels::sample(&assets, &eligibility, &mut rng).cloned()
        };

        let Some(asset) = chosen else {
            info!("rotation {run_id}: no asset matches the active filter");
            return Ok(RotationOutcome::NoEligibleAsset);
        };
        info!(
            "rotation {run_id}: selected asset {} ('{}')",
            asset.id, asset.display_name
        );

        let bytes = self
            .auth
            .execute(|token: AccessToken| {
                let library = self.library.clone();
                let asset = asset.clone();
                async move { library.fetch_full_image(&token, &asset).await }
            })
            .await?;

        // Decode and blur are pure CPU work; keep them off the runtime.
        let intensity = settings.blur_intensity;
        let raster = tokio::task::spawn_blocking(move || -> Result<RgbaImage> {
            let decoded = render::decode_downsampled(&bytes, render::MAX_RENDER_DIM)?;
            Ok(render::blur(&decoded, intensity))
        })
        .await??;

        self.target.apply(&raster).await?;
        info!("rotation {run_id}: wallpaper applied from asset {}", asset.id);

        Ok(RotationOutcome::Applied { asset_id: asset.id })
    }
}
