//! Source fetching with ref fallback and an archive fallback for when the
//! listing API is unavailable.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use crate::{
    archive,
    error::{Error, Result},
    paths::{normalize_relative, strip_subpath},
    policy::RefPolicy,
    source::SourceReference,
};

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else that is not copied.
    Other,
}

/// One entry of a directory listing. `path` is relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// Why a platform lookup failed.
#[derive(Debug)]
pub enum PlatformError {
    /// The ref does not exist in the repository.
    RefNotFound,
    /// The ref exists but the path does not.
    PathNotFound,
    /// Rate limited or a server error.
    Unavailable { url: String, status: u16 },
    Failed(Error),
}

impl From<Error> for PlatformError {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Read-only access to a content hosting platform. Every call takes a source
/// already pinned to the ref being tried.
#[async_trait]
pub trait ContentPlatform: Send + Sync {
    /// List one directory, non-recursively. A path naming a file yields a
    /// single `File` entry.
    async fn list_dir(&self, at: &SourceReference, path: &str) -> PlatformResult<Vec<ListingEntry>>;

    /// Raw bytes of one file.
    async fn fetch_file(&self, at: &SourceReference, path: &str) -> PlatformResult<Vec<u8>>;

    /// Gzip'd tarball of the whole ref.
    async fn fetch_archive(&self, at: &SourceReference) -> PlatformResult<Vec<u8>>;
}

/// A fetched file, relative to the requested subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub relative_path: String,
    pub content: Vec<u8>,
    /// The source pinned to the ref it was fetched from.
    pub source: Arc<SourceReference>,
}

/// Everything fetched for one source.
#[derive(Debug, Clone)]
pub struct FetchedSkill {
    pub source: SourceReference,
    pub resolved_ref: String,
    /// Sorted by path, each path once.
    pub files: Vec<FetchedFile>,
    /// Files skipped in best-effort mode.
    pub skipped: Vec<String>,
    /// The source named one file, either through a file URL or a folder URL
    /// whose path turned out to be a file.
    pub single_file: bool,
}

/// Files gathered at one ref.
#[derive(Default)]
struct Collected {
    files: Vec<FetchedFile>,
    skipped: Vec<String>,
    single_file: bool,
}

/// Resolves a [`SourceReference`] into files through a [`ContentPlatform`].
pub struct Fetcher {
    platform: Arc<dyn ContentPlatform>,
    refs: RefPolicy,
    archive_fallback: bool,
    best_effort: bool,
}

impl Fetcher {
    pub fn new(platform: Arc<dyn ContentPlatform>, refs: RefPolicy) -> Self {
        Self {
            platform,
            refs,
            archive_fallback: true,
            best_effort: false,
        }
    }

    #[must_use]
    pub fn with_archive_fallback(mut self, enabled: bool) -> Self {
        self.archive_fallback = enabled;
        self
    }

    /// Skip individual files that fail to download instead of failing the
    /// whole source.
    #[must_use]
    pub fn with_best_effort(mut self, enabled: bool) -> Self {
        self.best_effort = enabled;
        self
    }

    /// Fetch every file of `source`, trying refs in [`RefPolicy`] order.
    /// The first ref that yields files wins. A source without an explicit ref
    /// starts from the policy's default ref.
    pub async fn fetch(&self, source: &SourceReference) -> Result<FetchedSkill> {
        let requested = if source.ref_explicit {
            source.git_ref.as_str()
        } else {
            self.refs.default_ref.as_str()
        };
        let candidates = self.refs.candidates(requested);
        let mut tried = Vec::new();

        for git_ref in candidates {
            if !tried.is_empty() {
                info!(%source, git_ref, "retrying with fallback ref");
            }
            tried.push(git_ref);
            let at = Arc::new(source.with_ref(git_ref));

            let outcome = if source.is_single_file() {
                self.fetch_single(&at).await
            } else {
                self.fetch_tree(&at).await
            };

            match outcome {
                Ok(collected) if collected.files.is_empty() => {
                    debug!(%source, git_ref, "nothing found at ref");
                },
                Ok(Collected {
                    mut files,
                    skipped,
                    single_file,
                }) => {
                    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
                    files.dedup_by(|a, b| a.relative_path == b.relative_path);
                    info!(%source, git_ref, count = files.len(), "fetched skill files");
                    return Ok(FetchedSkill {
                        source: source.clone(),
                        resolved_ref: git_ref.to_string(),
                        files,
                        skipped,
                        single_file,
                    });
                },
                Err(PlatformError::RefNotFound) => {
                    debug!(%source, git_ref, "ref not found");
                },
                // A raw file lookup cannot tell a missing ref from a missing
                // path, so single files keep walking the candidate list.
                Err(PlatformError::PathNotFound) if source.is_single_file() => {
                    debug!(%source, git_ref, "file not found at ref");
                },
                Err(PlatformError::PathNotFound) => {
                    return Err(Error::source_not_found(
                        source.to_string(),
                        format!("path '{}' does not exist at ref '{git_ref}'", source.subpath),
                    ));
                },
                Err(PlatformError::Unavailable { url, status }) => {
                    return Err(Error::SourceUnavailable { url, status });
                },
                Err(PlatformError::Failed(error)) => return Err(error),
            }
        }

        Err(Error::source_not_found(
            source.to_string(),
            format!("nothing found at ref(s) {}", tried.join(", ")),
        ))
    }

    async fn fetch_single(&self, at: &Arc<SourceReference>) -> PlatformResult<Collected> {
        let content = self.platform.fetch_file(at, &at.subpath).await?;
        let name = at.name_hint().to_string();
        Ok(Collected {
            files: vec![FetchedFile {
                relative_path: normalize_relative(&name)?,
                content,
                source: Arc::clone(at),
            }],
            skipped: Vec::new(),
            single_file: true,
        })
    }

    async fn fetch_tree(&self, at: &Arc<SourceReference>) -> PlatformResult<Collected> {
        match self.list_tree(at).await {
            Err(PlatformError::Unavailable { url, status }) if self.archive_fallback => {
                warn!(%url, status, "listing unavailable, falling back to ref archive");
                self.fetch_from_archive(at).await
            },
            other => other,
        }
    }

    async fn list_tree(&self, at: &Arc<SourceReference>) -> PlatformResult<Collected> {
        let mut collected = Collected::default();
        let mut pending = vec![at.subpath.clone()];

        while let Some(dir) = pending.pop() {
            for entry in self.platform.list_dir(at, &dir).await? {
                match entry.kind {
                    EntryKind::Dir => pending.push(entry.path),
                    EntryKind::Other => debug!(path = %entry.path, "skipping non-file entry"),
                    EntryKind::File => {
                        if !at.subpath.is_empty() && entry.path == at.subpath {
                            collected.single_file = true;
                        }
                        let Some(relative) = strip_subpath(&entry.path, &at.subpath) else {
                            return Err(Error::unsafe_path(entry.path).into());
                        };
                        let relative_path = normalize_relative(&relative)?;
                        match self.platform.fetch_file(at, &entry.path).await {
                            Ok(content) => collected.files.push(FetchedFile {
                                relative_path,
                                content,
                                source: Arc::clone(at),
                            }),
                            Err(PlatformError::Failed(error)) if self.best_effort => {
                                warn!(path = %entry.path, %error, "skipping file that failed to download");
                                collected.skipped.push(relative_path);
                            },
                            Err(PlatformError::PathNotFound) if self.best_effort => {
                                warn!(path = %entry.path, "skipping listed file that is gone");
                                collected.skipped.push(relative_path);
                            },
                            Err(other) => return Err(other),
                        }
                    },
                }
            }
        }

        Ok(collected)
    }

    async fn fetch_from_archive(&self, at: &Arc<SourceReference>) -> PlatformResult<Collected> {
        let bytes = self.platform.fetch_archive(at).await?;
        let subpath = at.subpath.clone();
        let subtree = tokio::task::spawn_blocking(move || archive::extract_subtree(&bytes, &subpath))
            .await
            .map_err(|e| Error::archive(e.to_string()))??;

        if subtree.files.is_empty() && !at.subpath.is_empty() {
            return Err(PlatformError::PathNotFound);
        }

        Ok(Collected {
            files: subtree
                .files
                .into_iter()
                .map(|(relative_path, content)| FetchedFile {
                    relative_path,
                    content,
                    source: Arc::clone(at),
                })
                .collect(),
            skipped: Vec::new(),
            single_file: subtree.single_file,
        })
    }
}
