//! # zonestore
//!
//! Cache local de couches GeoJSON distantes (zonage, overlays) et requêtes
//! point-dans-polygone en WGS84.
//!
//! ## Features
//!
//! - Téléchargement unique avec écriture atomique (`cache`)
//! - Chargement GeoJSON avec limite de lignes optionnelle (`store`)
//! - Reprojection en pur Rust des systèmes australiens (MGA/UTM, Web Mercator),
//!   PROJ en repli avec la feature `reproject`
//! - Filtrage des géométries invalides (`validity`)
//! - Index R-tree et prédicat `Intersects` (`query`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonestore::{DatasetCache, DatasetDescriptor, IndexedLayer, LoadOptions, QueryPoint};
//!
//! let descriptor = DatasetDescriptor::new("Zoning Data", url, Path::new("."));
//! let cache = DatasetCache::new(Default::default())?;
//! let path = cache.ensure_cached(&descriptor).await?;
//! let layer = zonestore::load(&descriptor.name, &path, &LoadOptions::default())?;
//! let index = IndexedLayer::build(layer);
//! let result = index.query(QueryPoint::new(153.0251, -27.4698)?);
//! ```

pub mod cache;
pub mod error;
pub mod query;
#[cfg(feature = "reproject")]
pub mod reproject;
pub mod reproject_lite;
pub mod store;
pub mod types;
pub mod validity;

pub use cache::{CacheConfig, CacheEntry, CacheStatus, DatasetCache, FreshnessPolicy};
pub use error::{CacheError, InvalidPoint, ReprojectError, StoreError};
pub use query::{query, query_layers, IndexedLayer};
pub use store::{load, load_layers, LoadOptions};
pub use types::{
    slugify, value_text, DatasetDescriptor, Layer, LoadStats, MatchResult, QueryPoint, ZoneRecord,
    WGS84_EPSG,
};
