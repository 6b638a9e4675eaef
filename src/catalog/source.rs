use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::TableDescriptor;
use crate::error::{Error, Result};

/// Supplier of table descriptors for indexing.
pub trait MetadataSource {
    fn fetch_tables(&self) -> Result<Vec<TableDescriptor>>;
}

/// Reads a JSON array of table descriptors exported from the catalog.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataSource for JsonFileSource {
    fn fetch_tables(&self) -> Result<Vec<TableDescriptor>> {
        if !self.path.exists() {
            warn!("Metadata file not found: {}", self.path.display());
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::io(
                format!("failed to read metadata: {}", self.path.display()),
                e,
            )
        })?;

        let tables: Vec<TableDescriptor> = serde_json::from_str(&data).map_err(|e| {
            Error::Data(format!(
                "invalid metadata in {}: {e}",
                self.path.display()
            ))
        })?;

        for table in &tables {
            table.validate()?;
        }

        info!(
            "Loaded {} table descriptors from {}",
            tables.len(),
            self.path.display()
        );
        Ok(tables)
    }
}

/// Fixed, in-memory set of descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    tables: Vec<TableDescriptor>,
}

impl StaticSource {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }
}

impl MetadataSource for StaticSource {
    fn fetch_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.clone())
    }
}
