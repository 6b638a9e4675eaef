//! In-memory table index and the builder that produces it.
//!
//! An index is built once per process (or loaded through [`cache`]) and is
//! read-only afterwards, so it can be shared across threads behind an `Arc`.
pub mod cache;
pub mod compose;

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::TableDescriptor;
use crate::embedder::Embedder;
use crate::error::{Error, Result};

pub use compose::{ComposeOptions, compose};

/// One embedded table.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub table_id: String,
    pub embedding: Vec<f32>,
    /// Exact text that was embedded, kept for auditing.
    pub composed_text: String,
    pub descriptor: Arc<TableDescriptor>,
}

/// Table id → entry, plus the identity of the model and composition rules
/// that produced the embeddings.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    entries: BTreeMap<String, IndexEntry>,
    model_id: String,
    composer: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
}

/// Summary of an index for status output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStats {
    pub num_tables: usize,
    pub embedding_dim: usize,
    pub model: String,
    pub built_at: DateTime<Utc>,
}

impl SearchIndex {
    pub(crate) fn from_parts(
        entries: BTreeMap<String, IndexEntry>,
        model_id: String,
        composer: String,
        dimensions: usize,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entries,
            model_id,
            composer,
            dimensions,
            built_at,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, table_id: &str) -> Option<&IndexEntry> {
        self.entries.get(table_id)
    }

    /// Entries in ascending table-id order.
    pub fn iter(&self) -> btree_map::Values<'_, String, IndexEntry> {
        self.entries.values()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Composition tag, see [`ComposeOptions::tag`].
    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_tables: self.entry_count(),
            embedding_dim: self.dimensions,
            model: self.model_id.clone(),
            built_at: self.built_at,
        }
    }
}

/// Result of a build: the index and every table id that appeared more than
/// once in the input (the last occurrence won).
#[derive(Debug)]
pub struct BuildOutput {
    pub index: SearchIndex,
    pub duplicates: Vec<String>,
}

pub struct IndexBuilder<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    options: ComposeOptions,
    reject_duplicates: bool,
}

impl<'a, E: Embedder + ?Sized> IndexBuilder<'a, E> {
    pub fn new(embedder: &'a E) -> Self {
        Self {
            embedder,
            options: ComposeOptions::default(),
            reject_duplicates: false,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// Fail with [`Error::Data`] on duplicate ids instead of keeping the last one.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.reject_duplicates = true;
        self
    }

    /// Compose and embed every descriptor. Tables are embedded in parallel;
    /// any single failure fails the whole build.
    pub fn build(&self, descriptors: Vec<TableDescriptor>) -> Result<BuildOutput> {
        for table in &descriptors {
            table.validate()?;
        }

        if self.reject_duplicates {
            let mut seen = std::collections::HashSet::new();
            for table in &descriptors {
                if !seen.insert(table.id.as_str()) {
                    return Err(Error::Data(format!("duplicate table id: {}", table.id)));
                }
            }
        }

        info!(
            "Building index for {} tables with {}",
            descriptors.len(),
            self.embedder.model_id()
        );

        let dimensions = self.embedder.dimensions();
        let options = self.options;
        let built: Vec<IndexEntry> = descriptors
            .into_par_iter()
            .map(|table| {
                let composed_text = compose(&table, &options);
                let embedding = self
                    .embedder
                    .embed(&composed_text)
                    .map_err(|e| Error::provider(format!("table {}", table.id), e))?;
                if embedding.len() != dimensions {
                    return Err(Error::Configuration(format!(
                        "embedding for table {} has {} dimensions, model {} declares {dimensions}",
                        table.id,
                        embedding.len(),
                        self.embedder.model_id()
                    )));
                }
                Ok(IndexEntry {
                    table_id: table.id.clone(),
                    embedding,
                    composed_text,
                    descriptor: Arc::new(table),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut entries = BTreeMap::new();
        let mut duplicates = Vec::new();
        for entry in built {
            let table_id = entry.table_id.clone();
            if entries.insert(table_id.clone(), entry).is_some() {
                warn!("Duplicate table id {table_id}: keeping the last descriptor");
                duplicates.push(table_id);
            }
        }

        let index = SearchIndex::from_parts(
            entries,
            self.embedder.model_id().to_string(),
            self.options.tag(),
            dimensions,
            Utc::now(),
        );
        info!("Index built with {} tables", index.entry_count());

        Ok(BuildOutput { index, duplicates })
    }
}
