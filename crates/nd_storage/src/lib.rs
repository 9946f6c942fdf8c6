use std::path::PathBuf;
use std::sync::Arc;

use nd_core::{NewsletterStore, Result};

pub mod backends;

pub use backends::*;

/// Which backend keeps generated newsletters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StoreKind {
    Memory,
    #[default]
    Json,
}

pub const DEFAULT_STORE_PATH: &str = "newsletters.json";

pub async fn create_store(kind: StoreKind, path: Option<PathBuf>) -> Result<Arc<dyn NewsletterStore>> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Json => {
            let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
            Ok(Arc::new(JsonFileStore::open(path).await?))
        }
    }
}

pub(crate) fn newest_first(records: &mut [nd_core::NewsletterRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_store, StoreKind};
}
