//! Core engine for a photo-library wallpaper rotator.
//!
//! The crate classifies a remote image collection incrementally (persisting
//! progress across interruption), samples one asset under a label filter,
//! softens it with a fast approximate Gaussian blur, and hands the result to
//! an external wallpaper target. Sign-in, the label model, the photo service,
//! and the OS wallpaper call all enter through the traits in [`remote`].

pub mod classify;
pub mod error;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod remote;
pub mod render;
pub mod settings;
pub mod store;
pub mod utils;

pub use classify::{ClassificationCache, ClassifyProgress, PERSIST_EVERY};
pub use error::{Error, Result};
pub use labels::{available_labels, eligible_ids, sample, Eligibility};
pub use models::{Asset, Container, FilterSelection, LabelRecord};
pub use pipeline::{ListingSnapshot, RotationEngine, RotationOutcome};
pub use remote::{
    AccessToken, AssetIndexer, AuthenticatedExecutor, LabelClassifier, PhotoLibrary,
    TokenProvider, WallpaperTarget,
};
pub use render::{blur, decode_downsampled, radius_for_intensity};
pub use settings::{RotationSettings, SettingsStore};
pub use store::StateStore;
