//! Table metadata as delivered by a catalog, and the sources that supply it.
pub mod source;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use source::{JsonFileSource, MetadataSource, StaticSource};

/// One column of a catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(alias = "column_name")]
    pub name: String,

    /// Native type name as reported by the catalog (e.g. `STRING`, `FLOAT64`).
    #[serde(rename = "type", alias = "data_type", default)]
    pub data_type: String,

    #[serde(default)]
    pub description: String,
}

/// Immutable description of a single table. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Fully-qualified id, e.g. `project.dataset.table`.
    #[serde(alias = "table_id")]
    pub id: String,

    #[serde(alias = "table_schema", default)]
    pub schema: String,

    #[serde(alias = "table_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: description.into(),
        }
    }
}

impl TableDescriptor {
    /// Descriptor with only the required fields; schema is taken from the id
    /// when it has the `project.schema.table` shape.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let schema = schema_from_id(&id).unwrap_or_default().to_string();
        Self {
            id,
            schema,
            name: name.into(),
            description: String::new(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Reject descriptors missing the fields every index entry depends on.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Data(format!(
                "table descriptor without id (name: {:?})",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Data(format!("table {} has an empty name", self.id)));
        }
        Ok(())
    }
}

fn schema_from_id(id: &str) -> Option<&str> {
    let mut parts = id.rsplit('.');
    parts.next()?;
    parts.next()
}
