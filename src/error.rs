use thiserror::Error;

/// Failure taxonomy for the rotation core.
///
/// The split matters operationally: `AuthExpired` is the only variant the
/// authenticated executor recovers from (exactly once), `ThumbnailUnavailable`
/// and `ClassifierFailure` are per-item and never abort a classification
/// batch, everything else aborts the operation that raised it.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable access token exists. Surfaced immediately, never retried.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The remote rejected the bearer token (401/403-equivalent).
    #[error("access token rejected: {message}")]
    AuthExpired { message: String },

    /// A listing page or full-image download failed. The whole operation
    /// aborts; persisted state is left untouched.
    #[error("remote unavailable during {phase}: {message}")]
    RemoteUnavailable { phase: &'static str, message: String },

    /// A thumbnail could not be fetched. The asset is still marked processed
    /// with no labels.
    #[error("thumbnail unavailable for asset {asset_id}")]
    ThumbnailUnavailable { asset_id: String },

    /// The classifier failed on one asset. Treated as an empty label set.
    #[error("classifier failed for asset {asset_id}: {message}")]
    ClassifierFailure { asset_id: String, message: String },

    /// No container matched the configured title.
    #[error("container '{title}' not found")]
    ContainerNotFound { title: String },

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("state store failure: {0}")]
    Store(#[source] anyhow::Error),

    #[error("render worker failed: {0}")]
    RenderWorker(#[from] tokio::task::JoinError),

    #[error("wallpaper apply failed: {message}")]
    ApplyFailed { message: String },
}

impl Error {
    /// True for the variant the executor is allowed to recover from.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
