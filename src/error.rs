/// Error taxonomy shared by the index builder, cache and search engine.
///
/// Cache corruption is deliberately absent: an unreadable cache is reported as
/// a miss by [`crate::index::cache`], never as an error.
use thiserror::Error;

use crate::embedder::EmbedderError;

#[derive(Error, Debug)]
pub enum Error {
    /// Mismatched embedding dimensions, unusable model settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed or duplicate descriptors from the metadata source.
    #[error("data error: {0}")]
    Data(String),

    /// The embedding provider failed for a specific table or query.
    #[error("embedding failed for {context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: EmbedderError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn provider(context: impl Into<String>, source: EmbedderError) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure kind.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Data(_) => 3,
            Self::Provider { .. } => 4,
            Self::Io { .. } => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
