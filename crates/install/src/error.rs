use std::path::PathBuf;

use crate::report::BatchReport;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid skill URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("skill source not found: {source_url}: {reason}")]
    SourceNotFound { source_url: String, reason: String },

    #[error("{url} is unavailable (HTTP {status})")]
    SourceUnavailable { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "permission denied for {path}: {source} (check that the destination directory is \
         writable, or choose another destination)"
    )]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to write outside the destination directory: {path}")]
    UnsafePath { path: String },

    #[error("failed to read archive: {reason}")]
    Archive { reason: String },

    #[error("{} of {} skill installs failed", .report.failed(), .report.items.len())]
    PartialBatchFailure { report: Box<BatchReport> },
}

impl Error {
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn source_not_found(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceNotFound {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    #[must_use]
    pub fn unsafe_path(path: impl Into<String>) -> Self {
        Self::UnsafePath { path: path.into() }
    }

    #[must_use]
    pub fn archive(reason: impl Into<String>) -> Self {
        Self::Archive {
            reason: reason.into(),
        }
    }

    /// Attach `path` to an I/O failure, promoting permission problems to
    /// [`Error::PermissionDenied`].
    #[must_use]
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.into(),
                source,
            }
        } else {
            Self::FileIo {
                path: path.into(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use {super::*, std::io};

    #[test]
    fn permission_errors_name_the_path_and_a_fix() {
        let err = Error::file_io(
            "/skills/pdf/SKILL.md",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::PermissionDenied { .. }));
        let message = err.to_string();
        assert!(message.contains("/skills/pdf/SKILL.md"));
        assert!(message.contains("writable"));
    }

    #[test]
    fn other_io_errors_keep_their_kind() {
        let err = Error::file_io("/skills/pdf", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::FileIo { .. }));
    }
}
