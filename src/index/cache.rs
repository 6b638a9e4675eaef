//! On-disk cache of a built [`SearchIndex`].
//!
//! File layout (little-endian):
//!
//! | bytes | field |
//! |-------|-------|
//! | 4     | magic `TIDX` |
//! | 2     | format version |
//! | 4     | metadata length `m` |
//! | 4     | CRC32 of everything after the header |
//! | m     | JSON metadata: model, composer tag, dimensions, entries |
//! | rest  | `entry_count * dimensions` f32 embeddings, in entry order |
//!
//! A cache that fails any check is a miss, never an error: the caller rebuilds.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{IndexEntry, SearchIndex};
use crate::catalog::TableDescriptor;
use crate::error::{Error, Result};

pub const CACHE_MAGIC: [u8; 4] = *b"TIDX";
pub const CACHE_VERSION: u16 = 1;
pub const CACHE_FILENAME: &str = "table_index.bin";

const HEADER_LEN: usize = 4 + 2 + 4 + 4;

/// Why a cache file could not be used.
#[derive(Error, Debug)]
pub enum CacheMiss {
    #[error("cache file not found")]
    NotFound,

    #[error("cache file unreadable: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("cache file corrupt: {0}")]
    Corrupt(String),

    #[error("unsupported cache format version {0}")]
    Version(u16),

    #[error("cache built with model {found}, expected {expected}")]
    ModelMismatch { expected: String, found: String },

    #[error("cache built with composer {found}, expected {expected}")]
    ComposerMismatch { expected: String, found: String },
}

#[derive(Serialize, Deserialize)]
struct CacheMeta {
    model_id: String,
    composer: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    entry_count: usize,
    entries: Vec<CachedEntry>,
}

#[derive(Serialize, Deserialize)]
struct CachedEntry {
    table_id: String,
    composed_text: String,
    descriptor: TableDescriptor,
}

/// Cache directory holding a single index file.
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
}

impl IndexCache {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            path: cache_dir.as_ref().join(CACHE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached index if it was built by `model_id` with composer tag
    /// `composer`; `None` means rebuild.
    pub fn load(&self, model_id: &str, composer: &str) -> Option<SearchIndex> {
        load(&self.path, model_id, composer)
    }

    pub fn save(&self, index: &SearchIndex) -> Result<PathBuf> {
        save(index, &self.path)?;
        Ok(self.path.clone())
    }

    /// Remove the cache file if present.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(
                format!("failed to remove cache {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Load an index from `path`, logging why a cache could not be used.
pub fn load(path: &Path, model_id: &str, composer: &str) -> Option<SearchIndex> {
    match read_index(path, model_id, composer) {
        Ok(index) => {
            info!(
                "Index loaded from {} ({} tables)",
                path.display(),
                index.entry_count()
            );
            Some(index)
        }
        Err(CacheMiss::NotFound) => {
            debug!("No index cache at {}", path.display());
            None
        }
        Err(
            miss @ (CacheMiss::ModelMismatch { .. } | CacheMiss::ComposerMismatch { .. }),
        ) => {
            info!("Index cache at {} is stale: {miss}", path.display());
            None
        }
        Err(miss) => {
            warn!("Ignoring index cache at {}: {miss}", path.display());
            None
        }
    }
}

/// Read and validate a cache file.
pub fn read_index(
    path: &Path,
    model_id: &str,
    composer: &str,
) -> std::result::Result<SearchIndex, CacheMiss> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CacheMiss::NotFound),
        Err(e) => return Err(CacheMiss::Unreadable(e)),
    };
    decode(&bytes, model_id, composer)
}

/// Write `index` to `path` atomically: temp file, fsync, rename.
pub fn save(index: &SearchIndex, path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| Error::io(format!("failed to create {}", parent.display()), e))?;

    let bytes = encode(index)?;

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .map_err(|e| Error::io(format!("failed to create {}", temp_path.display()), e))?;
    file.write_all(&bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::io(format!("failed to write {}", temp_path.display()), e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        Error::io(
            format!("failed to move {} into place", temp_path.display()),
            e,
        )
    })?;
    sync_dir(parent)
        .map_err(|e| Error::io(format!("failed to sync {}", parent.display()), e))?;

    info!("Index saved to {}", path.display());
    Ok(())
}

fn encode(index: &SearchIndex) -> Result<Vec<u8>> {
    let meta = CacheMeta {
        model_id: index.model_id().to_string(),
        composer: index.composer().to_string(),
        dimensions: index.dimensions(),
        built_at: index.built_at(),
        entry_count: index.entry_count(),
        entries: index
            .iter()
            .map(|e| CachedEntry {
                table_id: e.table_id.clone(),
                composed_text: e.composed_text.clone(),
                descriptor: TableDescriptor::clone(&e.descriptor),
            })
            .collect(),
    };
    let meta_bytes = serde_json::to_vec(&meta)
        .map_err(|e| Error::Data(format!("failed to serialize index metadata: {e}")))?;
    let meta_len = u32::try_from(meta_bytes.len())
        .map_err(|_| Error::Data("index metadata too large to cache".to_string()))?;

    let mut body = meta_bytes;
    body.reserve(index.entry_count() * index.dimensions() * 4);
    for entry in index.iter() {
        for v in &entry.embedding {
            body.extend_from_slice(&v.to_le_bytes());
        }
    }

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&CACHE_MAGIC);
    out.extend_from_slice(&CACHE_VERSION.to_le_bytes());
    out.extend_from_slice(&meta_len.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode(
    bytes: &[u8],
    model_id: &str,
    composer: &str,
) -> std::result::Result<SearchIndex, CacheMiss> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheMiss::Corrupt(format!(
            "file is {} bytes, shorter than the header",
            bytes.len()
        )));
    }
    if bytes[0..4] != CACHE_MAGIC {
        return Err(CacheMiss::Corrupt("bad magic".to_string()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != CACHE_VERSION {
        return Err(CacheMiss::Version(version));
    }
    let meta_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let expected_crc = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

    let body = &bytes[HEADER_LEN..];
    if crc32fast::hash(body) != expected_crc {
        return Err(CacheMiss::Corrupt("checksum mismatch".to_string()));
    }
    if meta_len > body.len() {
        return Err(CacheMiss::Corrupt(format!(
            "metadata length {meta_len} exceeds body of {} bytes",
            body.len()
        )));
    }
    let (meta_bytes, slab) = body.split_at(meta_len);

    let meta: CacheMeta = serde_json::from_slice(meta_bytes)
        .map_err(|e| CacheMiss::Corrupt(format!("invalid metadata: {e}")))?;

    if meta.model_id != model_id {
        return Err(CacheMiss::ModelMismatch {
            expected: model_id.to_string(),
            found: meta.model_id,
        });
    }
    if meta.composer != composer {
        return Err(CacheMiss::ComposerMismatch {
            expected: composer.to_string(),
            found: meta.composer,
        });
    }
    if meta.entry_count != meta.entries.len() {
        return Err(CacheMiss::Corrupt(format!(
            "entry_count {} but {} entries",
            meta.entry_count,
            meta.entries.len()
        )));
    }
    let expected_slab = meta
        .entry_count
        .checked_mul(meta.dimensions)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CacheMiss::Corrupt("vector slab size overflows".to_string()))?;
    if slab.len() != expected_slab {
        return Err(CacheMiss::Corrupt(format!(
            "vector slab is {} bytes, expected {expected_slab}",
            slab.len()
        )));
    }

    let mut entries = BTreeMap::new();
    let row_len = meta.dimensions * 4;
    for (i, cached) in meta.entries.into_iter().enumerate() {
        if cached.table_id != cached.descriptor.id {
            return Err(CacheMiss::Corrupt(format!(
                "entry {} does not match its descriptor {}",
                cached.table_id, cached.descriptor.id
            )));
        }
        let row = &slab[i * row_len..(i + 1) * row_len];
        let embedding: Vec<f32> = row
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let table_id = cached.table_id;
        let entry = IndexEntry {
            table_id: table_id.clone(),
            embedding,
            composed_text: cached.composed_text,
            descriptor: Arc::new(cached.descriptor),
        };
        if entries.insert(table_id.clone(), entry).is_some() {
            return Err(CacheMiss::Corrupt(format!("duplicate table id {table_id}")));
        }
    }

    Ok(SearchIndex::from_parts(
        entries,
        meta.model_id,
        meta.composer,
        meta.dimensions,
        meta.built_at,
    ))
}

fn sync_dir(path: &Path) -> std::io::Result<()> {
    // Directories cannot be opened for syncing on Windows
    if cfg!(windows) {
        return Ok(());
    }
    File::open(path)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDescriptor;
    use crate::embedder::hash::HashEmbedder;
    use crate::index::{ComposeOptions, IndexBuilder};
    use tempfile::tempdir;

    fn sample_index() -> SearchIndex {
        let embedder = HashEmbedder::new(32);
        let tables = vec![
            TableDescriptor::new("p.s.users", "users")
                .with_description("User accounts")
                .with_column(ColumnDescriptor::new("user_id", "STRING", "User ID")),
            TableDescriptor::new("p.s.orders", "orders").with_description("Orders"),
        ];
        IndexBuilder::new(&embedder).build(tables).unwrap().index
    }

    fn tag() -> String {
        ComposeOptions::default().tag()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        let index = sample_index();

        let path = cache.save(&index).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = cache.load("fnv1a-32", &tag()).unwrap();
        assert_eq!(loaded.entry_count(), 2);
        assert_eq!(loaded.dimensions(), 32);
        assert_eq!(loaded.built_at(), index.built_at());
        for entry in index.iter() {
            let other = loaded.get(&entry.table_id).unwrap();
            assert_eq!(other.embedding, entry.embedding);
            assert_eq!(other.composed_text, entry.composed_text);
            assert_eq!(other.descriptor, entry.descriptor);
        }
    }

    #[test]
    fn test_load_missing_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path().join("nested"));
        assert!(cache.load("fnv1a-32", &tag()).is_none());
        assert!(matches!(
            read_index(cache.path(), "fnv1a-32", &tag()),
            Err(CacheMiss::NotFound)
        ));
    }

    #[test]
    fn test_load_other_model_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.save(&sample_index()).unwrap();

        assert!(cache.load("all-MiniLM-L6-v2", &tag()).is_none());
        assert!(matches!(
            read_index(cache.path(), "all-MiniLM-L6-v2", &tag()),
            Err(CacheMiss::ModelMismatch { .. })
        ));
    }

    #[test]
    fn test_load_other_composer_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.save(&sample_index()).unwrap();

        let other = ComposeOptions::with_name_weight(5).tag();
        assert!(matches!(
            read_index(cache.path(), "fnv1a-32", &other),
            Err(CacheMiss::ComposerMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_file_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.save(&sample_index()).unwrap();

        let bytes = fs::read(cache.path()).unwrap();
        for cut in [0, 3, HEADER_LEN, bytes.len() / 2, bytes.len() - 1] {
            fs::write(cache.path(), &bytes[..cut]).unwrap();
            assert!(
                cache.load("fnv1a-32", &tag()).is_none(),
                "truncated at {cut} should be a miss"
            );
        }
    }

    #[test]
    fn test_flipped_byte_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.save(&sample_index()).unwrap();

        let mut bytes = fs::read(cache.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(cache.path(), &bytes).unwrap();

        assert!(matches!(
            read_index(cache.path(), "fnv1a-32", &tag()),
            Err(CacheMiss::Corrupt(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.save(&sample_index()).unwrap();

        let mut bytes = fs::read(cache.path()).unwrap();
        bytes[4..6].copy_from_slice(&(CACHE_VERSION + 1).to_le_bytes());
        fs::write(cache.path(), &bytes).unwrap();

        assert!(matches!(
            read_index(cache.path(), "fnv1a-32", &tag()),
            Err(CacheMiss::Version(_))
        ));
    }

    #[test]
    fn test_garbage_file_is_absent() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        fs::write(cache.path(), b"this is not an index at all").unwrap();
        assert!(cache.load("fnv1a-32", &tag()).is_none());
    }

    #[test]
    fn test_empty_index_roundtrip() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        let embedder = HashEmbedder::new(32);
        let empty = IndexBuilder::new(&embedder).build(Vec::new()).unwrap().index;
        cache.save(&empty).unwrap();

        let loaded = cache.load("fnv1a-32", &tag()).unwrap();
        assert_eq!(loaded.entry_count(), 0);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.clear().unwrap();
        cache.save(&sample_index()).unwrap();
        cache.clear().unwrap();
        assert!(!cache.path().exists());
    }
}
