//! Error types for typed state access

/// State access errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Stored value does not have the requested shape
    #[error("cannot decode state key '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be turned into JSON
    #[error("cannot encode state key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    /// Key the failing access was about
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Decode { key, .. } | Self::Encode { key, .. } => key,
        }
    }
}
