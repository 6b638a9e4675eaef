//! Renders a table descriptor into the single string that gets embedded.
use crate::catalog::TableDescriptor;

/// Bumped whenever the composition rules below change, so cached embeddings
/// of the old text are rebuilt instead of served.
pub const COMPOSER_VERSION: u32 = 1;

/// Description some catalogs report for undocumented tables; carries no meaning.
pub const PLACEHOLDER_DESCRIPTION: &str = "No description available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Times the table name is repeated to bias the embedding towards it.
    pub name_weight: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self { name_weight: 2 }
    }
}

impl ComposeOptions {
    #[must_use]
    pub fn with_name_weight(name_weight: usize) -> Self {
        Self {
            name_weight: name_weight.max(1),
        }
    }

    /// Cache-key tag identifying both the rules and the options in effect.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("v{COMPOSER_VERSION}/w{}", self.name_weight.max(1))
    }
}

/// Compose the embedding text: weighted name, description, column names,
/// then column descriptions, whitespace-normalized.
pub fn compose(table: &TableDescriptor, options: &ComposeOptions) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for _ in 0..options.name_weight.max(1) {
        parts.push(&table.name);
    }

    let description = table.description.trim();
    if !description.is_empty() && description != PLACEHOLDER_DESCRIPTION {
        parts.push(description);
    }

    let column_names: Vec<&str> = table
        .columns
        .iter()
        .map(|c| c.name.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if !column_names.is_empty() {
        parts.push("Columns:");
        parts.extend(column_names);
    }

    parts.extend(
        table
            .columns
            .iter()
            .map(|c| c.description.trim())
            .filter(|d| !d.is_empty()),
    );

    normalize_whitespace(&parts.join(" "))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
