use std::path::PathBuf;
use thiserror::Error;

/// Failures the update loop distinguishes between.
///
/// Everything except `ProcessSpawn` is reported and absorbed by the cycle;
/// the next scheduled run is the only retry.
#[derive(Debug, Error)]
pub enum RelaunchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected feed response: {0}")]
    Parse(String),

    #[error("no asset named '{0}' in the latest release")]
    AssetNotFound(String),

    #[error("{action} {}: {source}", .path.display())]
    FileSystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {}: {source}", .path.display())]
    ProcessSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelaunchError {
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            action,
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for RelaunchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_message_names_path() {
        let err = RelaunchError::fs(
            "rename",
            "2.jar",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "rename 2.jar: denied");
    }

    #[test]
    fn test_asset_not_found_message() {
        let err = RelaunchError::AssetNotFound("app.jar".to_string());
        assert!(err.to_string().contains("'app.jar'"));
    }
}
