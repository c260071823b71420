//! Schema catalog: data model, CSV loading, join intelligence, and the
//! atomically-swappable published handle.

mod join_graph;
mod loader;
mod model;

pub use join_graph::{
    rel_type_bonus, score_edge, JoinPath, JoinRecommendation, JoinStep, JoinValidation,
};
pub use loader::{infer_family, load_catalog, parse_fk_targets, parse_join_peers};
pub use model::{
    CatalogStats, Column, Confidence, FkTarget, JoinEdge, SchemaCatalog, Table, PHI_COLUMNS,
    UNIVERSAL_KEYS,
};

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Published catalog handle.
///
/// The catalog is a process-wide constant between rebuilds. Readers clone
/// the inner `Arc`; an admin-initiated reload swaps the reference so
/// in-flight requests keep the snapshot they started with.
pub struct CatalogService {
    schema_dir: PathBuf,
    current: RwLock<Arc<SchemaCatalog>>,
}

impl CatalogService {
    pub fn load(schema_dir: PathBuf) -> anyhow::Result<Self> {
        let catalog = load_catalog(&schema_dir)?;
        Ok(Self { schema_dir, current: RwLock::new(Arc::new(catalog)) })
    }

    /// Current snapshot. Cheap; safe to hold across await points.
    pub fn get(&self) -> Arc<SchemaCatalog> {
        self.current.read().expect("catalog lock poisoned").clone()
    }

    /// Rebuild from the schema sources and publish atomically.
    pub fn reload(&self) -> anyhow::Result<CatalogStats> {
        let catalog = load_catalog(&self.schema_dir)?;
        let stats = catalog.stats();
        *self.current.write().expect("catalog lock poisoned") = Arc::new(catalog);
        tracing::info!("Schema catalog reloaded");
        Ok(stats)
    }
}
