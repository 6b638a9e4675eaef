/// End-to-end tests for the table search pipeline.
///
/// Tests the complete flow:
///   Config → metadata file → Embedder → IndexBuilder → IndexCache → Search → Render
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use catalog_search::catalog::{JsonFileSource, MetadataSource};
use catalog_search::config::{Config, ProviderKind};
use catalog_search::embedder::Embedder;
use catalog_search::embedder::hash::HashEmbedder;
use catalog_search::index::cache::IndexCache;
use catalog_search::pipeline::{IndexOrigin, load_or_build};
use catalog_search::render::{OutputFormat, render};
use catalog_search::search::SearchEngine;
use tempfile::tempdir;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/tables.json")
}

fn hash_config(cache_dir: &Path) -> Config {
    let mut config = Config::default();
    config.metadata_path = fixture_path();
    config.cache_dir = cache_dir.to_path_buf();
    config.model.provider = ProviderKind::Hash;
    config.model.dimensions = 384;
    config
}

/// Full pipeline: load fixture → build → save → reload → search → render
#[test]
fn test_full_pipeline() {
    let temp_dir = tempdir().unwrap();
    let config = hash_config(temp_dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(config.model.dimensions));
    let source = JsonFileSource::new(&config.metadata_path);

    // 1. First run builds and caches
    let built = load_or_build(&config, &source, embedder.as_ref(), false).unwrap();
    assert_eq!(built.origin, IndexOrigin::Built);
    assert_eq!(built.index.entry_count(), 5);
    assert!(built.duplicates.is_empty());
    assert!(IndexCache::new(temp_dir.path()).path().exists());

    // 2. Second run is served from the cache with identical embeddings
    let cached = load_or_build(&config, &source, embedder.as_ref(), false).unwrap();
    assert_eq!(cached.origin, IndexOrigin::Cache);
    for entry in built.index.iter() {
        let other = cached.index.get(&entry.table_id).unwrap();
        assert_eq!(other.embedding, entry.embedding);
    }

    // 3. Search the cached index
    let engine = SearchEngine::new(Arc::new(cached.index), embedder, config.search_top_k);

    let results = engine.search("campaign budget plan", Some(3)).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].table_id, "analytics-prod.marketing.campaigns");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    let results = engine.search("order revenue", None).unwrap();
    assert_eq!(results.len(), 5, "top_k larger than the index is capped");
    assert_eq!(results[0].table_id, "analytics-prod.sales.orders");

    for r in &results {
        assert!(
            (-1.0..=1.0).contains(&r.score),
            "score out of range: {}",
            r.score
        );
    }

    // 4. Render both formats
    let json: serde_json::Value =
        serde_json::from_str(&render(&results[..1], OutputFormat::Json)).unwrap();
    assert_eq!(json[0]["table_name"], "orders");
    assert_eq!(json[0]["table_schema"], "sales");

    let text = render(&results[..1], OutputFormat::Text);
    assert!(text.contains("Full ID: analytics-prod.sales.orders"));
}

/// A cache damaged mid-write is ignored and replaced
#[test]
fn test_corrupt_cache_triggers_rebuild() {
    let temp_dir = tempdir().unwrap();
    let config = hash_config(temp_dir.path());
    let embedder = HashEmbedder::new(config.model.dimensions);
    let source = JsonFileSource::new(&config.metadata_path);

    load_or_build(&config, &source, &embedder, false).unwrap();

    let cache = IndexCache::new(temp_dir.path());
    let bytes = fs::read(cache.path()).unwrap();
    fs::write(cache.path(), &bytes[..bytes.len() / 3]).unwrap();

    let reloaded = load_or_build(&config, &source, &embedder, false).unwrap();
    assert_eq!(reloaded.origin, IndexOrigin::Built);
    assert_eq!(reloaded.index.entry_count(), 5);

    // The rebuild rewrote a valid cache
    let again = load_or_build(&config, &source, &embedder, false).unwrap();
    assert_eq!(again.origin, IndexOrigin::Cache);
}

/// Changing the name weight changes the embedded text, so the cache is stale
#[test]
fn test_composition_change_invalidates_cache() {
    let temp_dir = tempdir().unwrap();
    let mut config = hash_config(temp_dir.path());
    let embedder = HashEmbedder::new(config.model.dimensions);
    let source = JsonFileSource::new(&config.metadata_path);

    load_or_build(&config, &source, &embedder, false).unwrap();

    config.compose.name_weight = 4;
    let reloaded = load_or_build(&config, &source, &embedder, false).unwrap();
    assert_eq!(reloaded.origin, IndexOrigin::Built);
    assert!(
        reloaded
            .index
            .get("analytics-prod.core.users")
            .unwrap()
            .composed_text
            .starts_with("users users users users ")
    );
}

/// Placeholder descriptions from the catalog never reach the embedded text
#[test]
fn test_fixture_placeholder_description() {
    let tables = JsonFileSource::new(fixture_path()).fetch_tables().unwrap();
    let invoices = tables
        .iter()
        .find(|t| t.name == "invoices")
        .expect("fixture has invoices");
    assert_eq!(invoices.description, "No description available");

    let temp_dir = tempdir().unwrap();
    let config = hash_config(temp_dir.path());
    let loaded = load_or_build(
        &config,
        &JsonFileSource::new(fixture_path()),
        &HashEmbedder::new(384),
        true,
    )
    .unwrap();
    let text = &loaded
        .index
        .get("analytics-prod.finance.invoices")
        .unwrap()
        .composed_text;
    assert!(!text.contains("No description"), "got: {text}");
}

/// Test config defaults and validation
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();

    assert_eq!(config.search_top_k, 10);
    assert_eq!(config.model.dimensions, 384);
    assert!(config.use_cache);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.search_top_k = 0;
    assert!(bad_config.validate().is_err());
}
