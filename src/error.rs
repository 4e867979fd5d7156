//! Error types for folder operations

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a listing, search or folder operation.
///
/// Validation variants are raised before any store call is made. Store
/// errors are passed through as returned by the [`ObjectStore`] and never
/// retried.
///
/// [`ObjectStore`]: crate::s3::ObjectStore
#[derive(Debug, Error)]
pub enum OpError {
    #[error("'{0}' is a file, expected a folder")]
    IsFile(String),

    #[error("'{0}' is a folder, expected a file")]
    IsFolder(String),

    #[error("Source and target are the same: '{0}'")]
    SameSourceAndTarget(String),

    #[error("Cannot move folder '{source_key}' into its own subfolder '{target_key}'")]
    TargetInsideSource {
        source_key: String,
        target_key: String,
    },

    #[error("Cannot copy or move folder '{source_key}' into its ancestor '{target_key}'")]
    SourceInsideTarget {
        source_key: String,
        target_key: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("Local file error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OpError {
    /// True for errors raised before any store call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OpError::IsFile(_)
                | OpError::IsFolder(_)
                | OpError::SameSourceAndTarget(_)
                | OpError::TargetInsideSource { .. }
                | OpError::SourceInsideTarget { .. }
                | OpError::InvalidArgument(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OpError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type OpResult<T> = Result<T, OpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(OpError::IsFile("a.txt".into()).is_validation());
        assert!(OpError::SameSourceAndTarget("a/".into()).is_validation());
        assert!(OpError::SourceInsideTarget {
            source_key: "a/b/".into(),
            target_key: "a/".into(),
        }
        .is_validation());
        assert!(!OpError::Store(anyhow::anyhow!("AccessDenied")).is_validation());
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err = OpError::from(anyhow::anyhow!("AccessDenied: no permission"));
        assert_eq!(err.to_string(), "AccessDenied: no permission");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            OpError::IsFile("docs/a.txt".into()).to_string(),
            "'docs/a.txt' is a file, expected a folder"
        );
        let err = OpError::TargetInsideSource {
            source_key: "a/".into(),
            target_key: "a/b/".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot move folder 'a/' into its own subfolder 'a/b/'"
        );
    }
}
