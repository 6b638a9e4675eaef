//! Build-or-load policy tying the metadata source, index builder and cache together.
use std::path::PathBuf;

use tracing::{info, warn};

use crate::catalog::MetadataSource;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::index::cache::IndexCache;
use crate::index::{ComposeOptions, IndexBuilder, SearchIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Cache,
    Built,
}

#[derive(Debug)]
pub struct LoadedIndex {
    pub index: SearchIndex,
    pub origin: IndexOrigin,
    /// Table ids that appeared more than once in the metadata (fresh builds only).
    pub duplicates: Vec<String>,
    /// Where the index was read from or written to, if anywhere.
    pub cache_path: Option<PathBuf>,
}

/// Load the cached index when allowed and valid, otherwise fetch metadata,
/// build, and (when caching is on) persist the fresh index.
///
/// A failed save is logged and does not fail the run. An index built from
/// empty metadata is never saved, so a later run picks up the tables once
/// they exist.
pub fn load_or_build(
    config: &Config,
    source: &dyn MetadataSource,
    embedder: &dyn Embedder,
    force_rebuild: bool,
) -> Result<LoadedIndex> {
    let options = ComposeOptions::with_name_weight(config.compose.name_weight);
    let cache = IndexCache::new(&config.cache_dir);

    if config.use_cache && !force_rebuild {
        if let Some(index) = cache.load(embedder.model_id(), &options.tag()) {
            if index.dimensions() != embedder.dimensions() {
                return Err(Error::Configuration(format!(
                    "cached index for {} has {} dimensions but the model produces {}; \
                     fix model.dimensions or rebuild the index",
                    index.model_id(),
                    index.dimensions(),
                    embedder.dimensions()
                )));
            }
            return Ok(LoadedIndex {
                index,
                origin: IndexOrigin::Cache,
                duplicates: Vec::new(),
                cache_path: Some(cache.path().to_path_buf()),
            });
        }
    }

    let tables = source.fetch_tables()?;
    let no_metadata = tables.is_empty();
    if no_metadata {
        warn!("No table metadata found; the index will be empty and is not cached");
    }

    let output = IndexBuilder::new(embedder)
        .with_options(options)
        .build(tables)?;

    let cache_path = if config.use_cache && !no_metadata {
        match cache.save(&output.index) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to save index cache: {e}");
                None
            }
        }
    } else {
        if !config.use_cache {
            info!("Index caching disabled");
        }
        None
    };

    Ok(LoadedIndex {
        index: output.index,
        origin: IndexOrigin::Built,
        duplicates: output.duplicates,
        cache_path,
    })
}
