//! Incremental classification of the asset collection.
//!
//! The cache is a persisted state machine over two structures: the processed
//! id set (a monotone do-not-retry boundary) and the label record. An asset
//! is submitted to the classifier at most once; failed thumbnails and
//! empty label sets still count as processed. Both structures are pruned
//! against the current listing on every completed run, persisted in batches
//! while the run is in flight, and always written through one transaction so
//! they never diverge on disk.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Asset, LabelRecord};
use crate::remote::{AccessToken, AuthenticatedExecutor, LabelClassifier, PhotoLibrary};
use crate::store::{codec, StateStore, KEY_LABEL_RECORD, KEY_PROCESSED};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Both structures are flushed after this many newly processed items, and
/// unconditionally at the end of a run, bounding rework after an
/// interruption to at most `PERSIST_EVERY - 1` items.
pub const PERSIST_EVERY: usize = 10;

/// One progress event, emitted after every processed item. A run over an
/// already-classified collection emits a single `{0, 0, true}` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyProgress {
    pub completed: usize,
    pub total: usize,
    pub is_complete: bool,
}

pub struct ClassificationCache {
    store: StateStore,
    library: Arc<dyn PhotoLibrary>,
    classifier: Arc<dyn LabelClassifier>,
    auth: AuthenticatedExecutor,
}

impl ClassificationCache {
    pub fn new(
        store: StateStore,
        library: Arc<dyn PhotoLibrary>,
        classifier: Arc<dyn LabelClassifier>,
        auth: AuthenticatedExecutor,
    ) -> Self {
        Self {
            store,
            library,
            classifier,
            auth,
        }
    }

    /// Classify every asset in `current_assets` that has not been submitted
    /// before, emitting a progress event per item, and return the pruned
    /// label record.
    ///
    /// Callers must serialize runs against the same store; the rotation
    /// engine does this by owning the cache behind `&mut self`. Cancellation
    /// is observed between items only, so an abandoned run always leaves the
    /// two persisted structures consistent with each other.
    pub async fn classify(
        &self,
        current_assets: &[Asset],
        progress: &UnboundedSender<ClassifyProgress>,
        cancel: &CancellationToken,
    ) -> Result<LabelRecord> {
        let run_id = Uuid::new_v4();
        let current_ids: BTreeSet<String> =
            current_assets.iter().map(|a| a.id.clone()).collect();

        let mut processed = self.load_processed().await?;
        let mut record = self.load_record().await?;

        let to_process: Vec<&Asset> = current_assets
            .iter()
            .filter(|asset| !processed.contains(&asset.id))
            .collect();
        let total = to_process.len();

        if to_process.is_empty() {
            let changed = prune(&mut processed, &mut record, &current_ids);
            if changed {
                self.persist(&processed, &record).await?;
            }
            let _ = progress.send(ClassifyProgress {
                completed: 0,
                total: 0,
                is_complete: true,
            });
            log_info!("classification run {run_id}: nothing new to classify");
            return Ok(record);
        }

        log_info!(
            "classification run {run_id}: {total} of {} assets to classify",
            current_assets.len()
        );

        let mut completed = 0usize;
        let mut since_persist = 0usize;
        let mut fatal: Option<Error> = None;

        for asset in to_process {
            if cancel.is_cancelled() {
                log_info!(
                    "classification run {run_id} cancelled after {completed}/{total} items"
                );
                break;
            }

            let labels = match self.classify_one(asset).await {
                Ok(labels) => labels,
                Err(Error::NotAuthenticated) => {
                    fatal = Some(Error::NotAuthenticated);
                    break;
                }
                Err(err) => {
                    // Per-item failure: the asset still counts as processed,
                    // with no labels, and is never auto-retried.
                    log_warn!("classification run {run_id}: {err}");
                    BTreeSet::new()
                }
            };

            // Label write lands before the processed mark, so an interrupt
            // between items can never leave a processed id whose labels were
            // dropped.
            if !labels.is_empty() {
                record.insert(asset.id.clone(), labels);
            }
            processed.insert(asset.id.clone());
            completed += 1;
            since_persist += 1;

            let _ = progress.send(ClassifyProgress {
                completed,
                total,
                is_complete: completed == total,
            });

            if since_persist == PERSIST_EVERY {
                self.persist(&processed, &record).await?;
                since_persist = 0;
            }
        }

        prune(&mut processed, &mut record, &current_ids);
        self.persist(&processed, &record).await?;

        if let Some(err) = fatal {
            log_warn!("classification run {run_id} aborted: {err}");
            return Err(err);
        }

        log_info!("classification run {run_id} finished: {completed}/{total} items");
        Ok(record)
    }

    /// Thumbnail fetch plus classifier call for one asset. Remote trouble
    /// while fetching the thumbnail folds into `ThumbnailUnavailable` for
    /// this asset; only a missing sign-in escapes as fatal.
    async fn classify_one(&self, asset: &Asset) -> Result<BTreeSet<String>> {
        let thumbnail = self
            .auth
            .execute(|token: AccessToken| {
                let library = self.library.clone();
                let asset = asset.clone();
                async move { library.fetch_thumbnail(&token, &asset).await }
            })
            .await
            .map_err(|err| match err {
                Error::NotAuthenticated => Error::NotAuthenticated,
                _ => Error::ThumbnailUnavailable {
                    asset_id: asset.id.clone(),
                },
            })?;

        self.classifier
            .classify(&thumbnail)
            .await
            .map_err(|err| Error::ClassifierFailure {
                asset_id: asset.id.clone(),
                message: err.to_string(),
            })
    }

    async fn load_processed(&self) -> Result<BTreeSet<String>> {
        let raw = self
            .store
            .get(KEY_PROCESSED)
            .await
            .map_err(Error::Store)?;
        Ok(raw.map(|s| codec::decode_id_set(&s)).unwrap_or_default())
    }

    async fn load_record(&self) -> Result<LabelRecord> {
        let raw = self
            .store
            .get(KEY_LABEL_RECORD)
            .await
            .map_err(Error::Store)?;
        Ok(raw.map(|s| codec::decode_record(&s)).unwrap_or_default())
    }

    async fn persist(&self, processed: &BTreeSet<String>, record: &LabelRecord) -> Result<()> {
        self.store
            .set_many(vec![
                (KEY_PROCESSED.to_string(), codec::encode_id_set(processed)),
                (KEY_LABEL_RECORD.to_string(), codec::encode_record(record)),
            ])
            .await
            .map_err(Error::Store)
    }
}

/// Intersect both structures with the current id set. Returns whether
/// anything was dropped.
fn prune(
    processed: &mut BTreeSet<String>,
    record: &mut LabelRecord,
    current_ids: &BTreeSet<String>,
) -> bool {
    let before = processed.len() + record.len();
    processed.retain(|id| current_ids.contains(id));
    record.retain(|id, _| current_ids.contains(id));
    before != processed.len() + record.len()
}


#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::RgbaImage;
    use tokio::sync::mpsc;

    use crate::models::Container;
    use crate::remote::{MediaPage, TokenProvider};

    use super::*;

    struct StaticProvider;

    #[async_trait]
    impl TokenProvider for StaticProvider {
        async fn current_access_token(&self) -> Result<AccessToken> {
            Ok(AccessToken("t".into()))
        }
        async fn invalidate(&self, _token: &AccessToken) {}
    }

    struct SignedOutProvider;

    #[async_trait]
    impl TokenProvider for SignedOutProvider {
        async fn current_access_token(&self) -> Result<AccessToken> {
            Err(Error::NotAuthenticated)
        }
        async fn invalidate(&self, _token: &AccessToken) {}
    }

    /// Serves 2x2 thumbnails, with configurable per-asset failures.
    #[derive(Default)]
    struct ThumbLibrary {
        unavailable: BTreeSet<String>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PhotoLibrary for ThumbLibrary {
        async fn list_containers(&self, _token: &AccessToken) -> Result<Vec<Container>> {
            Ok(vec![])
        }

        async fn list_page(
            &self,
            _token: &AccessToken,
            _container_id: &str,
            _page_token: Option<&str>,
        ) -> Result<MediaPage> {
            unimplemented!("not used by cache tests")
        }

        async fn fetch_thumbnail(&self, _token: &AccessToken, asset: &Asset) -> Result<RgbaImage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.contains(&asset.id) {
                return Err(Error::RemoteUnavailable {
                    phase: "thumbnail",
                    message: "timeout".into(),
                });
            }
            Ok(RgbaImage::new(2, 2))
        }

        async fn fetch_full_image(&self, _token: &AccessToken, _asset: &Asset) -> Result<Vec<u8>> {
            unimplemented!("not used by cache tests")
        }
    }

    /// Returns scripted label sets in call order; empty once exhausted.
    /// Iteration over `to_process` follows listing order, so tests know
    /// which asset each output lands on.
    struct SeqClassifier {
        outputs: Mutex<VecDeque<Vec<&'static str>>>,
        calls: AtomicUsize,
    }

    impl SeqClassifier {
        fn new(outputs: Vec<Vec<&'static str>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LabelClassifier for SeqClassifier {
        async fn classify(&self, _image: &RgbaImage) -> Result<BTreeSet<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(next.into_iter().map(str::to_string).collect())
        }
    }

    struct Fixture {
        cache: ClassificationCache,
        store: StateStore,
        library: Arc<ThumbLibrary>,
        classifier: Arc<SeqClassifier>,
    }

    fn fixture(outputs: Vec<Vec<&'static str>>) -> Fixture {
        fixture_with(outputs, ThumbLibrary::default(), Arc::new(StaticProvider))
    }

    fn fixture_with(
        outputs: Vec<Vec<&'static str>>,
        library: ThumbLibrary,
        provider: Arc<dyn TokenProvider>,
    ) -> Fixture {
        let path = std::env::temp_dir()
            .join("mural-tests")
            .join(format!("{}.sqlite3", uuid::Uuid::new_v4()));
        let store = StateStore::new(path).expect("temp store");
        let library = Arc::new(library);
        let classifier = Arc::new(SeqClassifier::new(outputs));
        let cache = ClassificationCache::new(
            store.clone(),
            library.clone(),
            classifier.clone(),
            AuthenticatedExecutor::new(provider),
        );
        Fixture {
            cache,
            store,
            library,
            classifier,
        }
    }

    fn assets(ids: &[&str]) -> Vec<Asset> {
        ids.iter()
            .map(|id| Asset {
                id: id.to_string(),
                display_name: format!("{id}.jpg"),
                mime_type: "image/jpeg".to_string(),
                thumbnail_ref: None,
                size_bytes: None,
            })
            .collect()
    }

    fn channel() -> (
        UnboundedSender<ClassifyProgress>,
        mpsc::UnboundedReceiver<ClassifyProgress>,
    ) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ClassifyProgress>) -> Vec<ClassifyProgress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn submits_exactly_the_unprocessed_assets() {
        let fx = fixture(vec![]);
        let ids: Vec<String> = (0..12).map(|i| format!("a{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        // 5 of 12 already processed: exactly 7 go to the classifier.
        fx.store.set(KEY_PROCESSED, "a0,a1,a2,a3,a4").await.unwrap();

        let (tx, mut rx) = channel();
        let cancel = CancellationToken::new();
        fx.cache
            .classify(&assets(&id_refs), &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(fx.classifier.call_count(), 7);
        assert_eq!(fx.library.fetches.load(Ordering::SeqCst), 7);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 7);
        assert_eq!(events.last().unwrap().total, 7);
    }

    #[tokio::test]
    async fn labels_land_in_record_and_empties_only_in_processed() {
        let fx = fixture(vec![vec!["Mountain"], vec![], vec!["Lake", "Forest"]]);
        let (tx, _rx) = channel();
        let cancel = CancellationToken::new();

        let record = fx
            .cache
            .classify(&assets(&["a0", "a1", "a2"]), &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(record.len(), 2);
        assert!(record["a0"].contains("Mountain"));
        assert!(record["a2"].contains("Forest"));
        assert!(!record.contains_key("a1"));

        assert_eq!(
            fx.store.get(KEY_PROCESSED).await.unwrap().as_deref(),
            Some("a0,a1,a2")
        );
        assert_eq!(
            fx.store.get(KEY_LABEL_RECORD).await.unwrap().as_deref(),
            Some("a0=Mountain\na2=Forest|Lake")
        );
    }

    #[tokio::test]
    async fn second_run_is_idempotent_and_submits_nothing() {
        let fx = fixture(vec![vec!["Mountain"], vec!["Lake"]]);
        let current = assets(&["a0", "a1"]);
        let cancel = CancellationToken::new();

        let (tx, _rx) = channel();
        fx.cache.classify(&current, &tx, &cancel).await.unwrap();
        let processed_first = fx.store.get(KEY_PROCESSED).await.unwrap();
        let record_first = fx.store.get(KEY_LABEL_RECORD).await.unwrap();

        let (tx, mut rx) = channel();
        let record = fx.cache.classify(&current, &tx, &cancel).await.unwrap();

        assert_eq!(fx.classifier.call_count(), 2, "no re-submission");
        assert_eq!(fx.store.get(KEY_PROCESSED).await.unwrap(), processed_first);
        assert_eq!(
            fx.store.get(KEY_LABEL_RECORD).await.unwrap(),
            record_first
        );
        assert_eq!(record.len(), 2);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![ClassifyProgress {
                completed: 0,
                total: 0,
                is_complete: true
            }]
        );
    }

    #[tokio::test]
    async fn shrinking_collection_prunes_both_structures() {
        let fx = fixture(vec![vec!["Mountain"], vec!["Lake"], vec!["City"]]);
        let cancel = CancellationToken::new();

        let (tx, _rx) = channel();
        fx.cache
            .classify(&assets(&["a0", "a1", "a2"]), &tx, &cancel)
            .await
            .unwrap();

        // a0 and a2 disappear from the remote collection.
        let (tx, _rx) = channel();
        let record = fx
            .cache
            .classify(&assets(&["a1"]), &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(record.len(), 1);
        assert!(record.contains_key("a1"));
        assert_eq!(
            fx.store.get(KEY_PROCESSED).await.unwrap().as_deref(),
            Some("a1")
        );
        assert_eq!(
            fx.store.get(KEY_LABEL_RECORD).await.unwrap().as_deref(),
            Some("a1=Lake")
        );
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_terminal() {
        let fx = fixture(vec![]);
        let ids: Vec<String> = (0..12).map(|i| format!("b{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (tx, mut rx) = channel();
        let cancel = CancellationToken::new();

        fx.cache
            .classify(&assets(&id_refs), &tx, &cancel)
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 12);
        let mut last_completed = 0;
        for event in &events {
            assert!(event.completed >= last_completed);
            assert_eq!(event.total, 12);
            last_completed = event.completed;
        }
        let final_event = events.last().unwrap();
        assert_eq!(final_event.completed, final_event.total);
        assert!(final_event.is_complete);
        assert!(events[..events.len() - 1].iter().all(|e| !e.is_complete));
    }

    #[tokio::test]
    async fn unavailable_thumbnail_marks_processed_without_labels() {
        let library = ThumbLibrary {
            unavailable: ["a1".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let fx = fixture_with(
            vec![vec!["Mountain"], vec!["Lake"]],
            library,
            Arc::new(StaticProvider),
        );
        let cancel = CancellationToken::new();
        let (tx, _rx) = channel();

        let record = fx
            .cache
            .classify(&assets(&["a0", "a1", "a2"]), &tx, &cancel)
            .await
            .unwrap();

        // a1 failed its download: processed, unlabeled, classifier skipped.
        assert_eq!(fx.classifier.call_count(), 2);
        assert!(!record.contains_key("a1"));
        assert_eq!(
            fx.store.get(KEY_PROCESSED).await.unwrap().as_deref(),
            Some("a0,a1,a2")
        );
        assert_eq!(
            fx.store.get(KEY_LABEL_RECORD).await.unwrap().as_deref(),
            Some("a0=Mountain\na2=Lake")
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_at_the_item_boundary() {
        let fx = fixture(vec![vec!["Mountain"]]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = channel();

        let record = fx
            .cache
            .classify(&assets(&["a0", "a1"]), &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(fx.classifier.call_count(), 0);
        assert!(record.is_empty());
        assert!(drain(&mut rx).is_empty());
        // The abandoned run still left consistent persisted state behind.
        assert_eq!(
            fx.store.get(KEY_PROCESSED).await.unwrap().as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn missing_signin_aborts_the_run() {
        let fx = fixture_with(
            vec![vec!["Mountain"]],
            ThumbLibrary::default(),
            Arc::new(SignedOutProvider),
        );
        let cancel = CancellationToken::new();
        let (tx, _rx) = channel();

        let result = fx
            .cache
            .classify(&assets(&["a0", "a1"]), &tx, &cancel)
            .await;

        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert_eq!(fx.classifier.call_count(), 0);
    }
}
