//! Error types for archive reading and extraction
//!
//! Each variant maps to an isolation level: a [`ExtractError::Format`] aborts the
//! archive it came from, while [`ExtractError::Member`] and
//! [`ExtractError::MemberNotFound`] only abort the member being extracted. The
//! engine logs both and moves on, so none of them stop a recursive run.

use std::path::PathBuf;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The file does not parse as the archive format its extension claims
    #[error("not a valid {kind} archive: {path}: {reason}")]
    Format {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The archive file itself could not be opened
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A member was requested by a name the archive does not expose
    #[error("member not found in archive: {name}")]
    MemberNotFound { name: String },

    /// Reading or writing a single member failed
    #[error("failed to extract {name}: {source}")]
    Member {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub(crate) fn format(
        kind: &'static str,
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::Format {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn member(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Member {
            name: name.into(),
            source,
        }
    }

    /// Whether this error only affects one member and extraction may continue
    pub fn is_member_scoped(&self) -> bool {
        matches!(self, Self::Member { .. } | Self::MemberNotFound { .. })
    }
}
