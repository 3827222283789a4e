//! Skill source URLs.
//!
//! Four URL shapes are accepted, all on GitHub:
//!
//! - repository root: `https://github.com/<owner>/<repo>` (optionally `/tree/<ref>`)
//! - folder: `https://github.com/<owner>/<repo>/tree/<ref>/<path>`
//! - file: `https://github.com/<owner>/<repo>/blob/<ref>/<path>`
//! - raw file: `https://raw.githubusercontent.com/<owner>/<repo>/<ref>/<path>`

use std::fmt;

use {serde::Serialize, url::Url};

use crate::{
    error::{Error, Result},
    paths::encode_path,
};

/// Ref used when the URL does not name one.
pub const DEFAULT_REF: &str = "main";

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];
const RAW_HOST: &str = "raw.githubusercontent.com";

/// Which of the supported URL shapes a source was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    RepositoryRoot,
    Folder,
    File,
    Raw,
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryRoot => write!(f, "repository"),
            Self::Folder => write!(f, "folder"),
            Self::File => write!(f, "file"),
            Self::Raw => write!(f, "raw file"),
        }
    }
}

/// A parsed skill source. Immutable once parsed; use [`SourceReference::with_ref`]
/// to derive the same location at another ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReference {
    pub kind: UrlKind,
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    /// Whether the ref came from the URL rather than [`DEFAULT_REF`].
    pub ref_explicit: bool,
    /// Slash-separated path inside the repository, empty for the root.
    pub subpath: String,
}

impl SourceReference {
    pub fn is_single_file(&self) -> bool {
        matches!(self.kind, UrlKind::File | UrlKind::Raw)
    }

    /// The same location at another ref.
    #[must_use]
    pub fn with_ref(&self, git_ref: &str) -> Self {
        Self {
            git_ref: git_ref.to_string(),
            ..self.clone()
        }
    }

    /// Last segment of the subpath, or the repository name at the root.
    pub fn name_hint(&self) -> &str {
        self.subpath
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&self.repo)
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            owner,
            repo,
            git_ref,
            ..
        } = self;
        let subpath = encode_path(&self.subpath);
        match self.kind {
            UrlKind::RepositoryRoot if self.ref_explicit => {
                write!(f, "https://github.com/{owner}/{repo}/tree/{git_ref}")
            },
            UrlKind::RepositoryRoot => write!(f, "https://github.com/{owner}/{repo}"),
            UrlKind::Folder => write!(f, "https://github.com/{owner}/{repo}/tree/{git_ref}/{subpath}"),
            UrlKind::File => write!(f, "https://github.com/{owner}/{repo}/blob/{git_ref}/{subpath}"),
            UrlKind::Raw => write!(f, "https://{RAW_HOST}/{owner}/{repo}/{git_ref}/{subpath}"),
        }
    }
}

/// Parse a skill source URL. Pure: never touches the network.
pub fn parse_source_url(input: &str) -> Result<SourceReference> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_url(input, "empty URL"));
    }

    // `Url::parse` silently resolves dot segments, so reject them up front.
    if has_dot_segment(trimmed) {
        return Err(Error::invalid_url(
            trimmed,
            "path must not contain '.' or '..' segments",
        ));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| Error::invalid_url(trimmed, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_url(
            trimmed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let decoded = decode_segments(trimmed, &url)?;
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

    match url.host_str() {
        Some(host) if GITHUB_HOSTS.contains(&host) => parse_github_path(trimmed, &segments),
        Some(RAW_HOST) => parse_raw_path(trimmed, &segments),
        Some(host) => Err(Error::invalid_url(
            trimmed,
            format!("unsupported host '{host}'"),
        )),
        None => Err(Error::invalid_url(trimmed, "missing host")),
    }
}

fn parse_github_path(input: &str, segments: &[&str]) -> Result<SourceReference> {
    let (owner, repo) = owner_and_repo(input, segments)?;
    let mut reference = SourceReference {
        kind: UrlKind::RepositoryRoot,
        owner,
        repo,
        git_ref: DEFAULT_REF.to_string(),
        ref_explicit: false,
        subpath: String::new(),
    };

    let Some(route) = segments.get(2) else {
        return Ok(reference);
    };
    let Some(git_ref) = segments.get(3) else {
        return Err(Error::invalid_url(
            input,
            format!("missing ref after '/{route}'"),
        ));
    };
    reference.git_ref = (*git_ref).to_string();
    reference.ref_explicit = true;
    let rest = &segments[4..];

    match *route {
        "tree" if rest.is_empty() => {},
        "tree" => {
            reference.kind = UrlKind::Folder;
            reference.subpath = rest.join("/");
        },
        "blob" if rest.is_empty() => {
            return Err(Error::invalid_url(input, "file link has no path"));
        },
        "blob" => {
            reference.kind = UrlKind::File;
            reference.subpath = rest.join("/");
        },
        other => {
            return Err(Error::invalid_url(
                input,
                format!("unsupported GitHub route '{other}'"),
            ));
        },
    }
    Ok(reference)
}

fn parse_raw_path(input: &str, segments: &[&str]) -> Result<SourceReference> {
    let (owner, repo) = owner_and_repo(input, segments)?;

    // `refs/heads/<ref>/...` is an alias of `<ref>/...`.
    let after_repo = &segments[2..];
    let (git_ref, path) = match after_repo {
        ["refs", "heads", git_ref, path @ ..] => (*git_ref, path),
        [git_ref, path @ ..] => (*git_ref, path),
        [] => return Err(Error::invalid_url(input, "raw link has no ref")),
    };
    if path.is_empty() {
        return Err(Error::invalid_url(input, "raw link has no path"));
    }

    Ok(SourceReference {
        kind: UrlKind::Raw,
        owner,
        repo,
        git_ref: git_ref.to_string(),
        ref_explicit: true,
        subpath: path.join("/"),
    })
}

fn owner_and_repo(input: &str, segments: &[&str]) -> Result<(String, String)> {
    let owner = segments.first().copied().unwrap_or_default();
    let repo = segments
        .get(1)
        .map(|repo| repo.strip_suffix(".git").unwrap_or(repo))
        .unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return Err(Error::invalid_url(input, "expected /<owner>/<repo>"));
    }
    Ok((owner.to_string(), repo.to_string()))
}

/// Non-empty path segments, percent-decoded. GitHub APIs and listings use
/// decoded paths.
fn decode_segments(input: &str, url: &Url) -> Result<Vec<String>> {
    let mut decoded = Vec::new();
    for raw in url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
    {
        let segment = urlencoding::decode(raw).map_err(|_| {
            Error::invalid_url(input, format!("path segment '{raw}' is not valid UTF-8"))
        })?;
        if segment == "." || segment == ".." || segment.contains(['/', '\\']) {
            return Err(Error::invalid_url(
                input,
                format!("unsafe path segment '{segment}'"),
            ));
        }
        decoded.push(segment.into_owned());
    }
    Ok(decoded)
}

fn has_dot_segment(input: &str) -> bool {
    let without_query = input.split(['?', '#']).next().unwrap_or(input);
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}
