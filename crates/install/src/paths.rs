use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Normalize a slash-separated path from a remote listing or archive into a
/// safe relative path. Rejects absolute paths and `..`; drops `.` segments.
pub fn normalize_relative(path: &str) -> Result<String> {
    if path.starts_with('/') || path.contains('\\') {
        return Err(Error::unsafe_path(path));
    }
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => return Err(Error::unsafe_path(path)),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::unsafe_path(path));
    }
    Ok(segments.join("/"))
}

/// Express `path` relative to `subpath`. A path equal to `subpath` (a single
/// file) maps to its own file name. Returns `None` for paths outside.
pub fn strip_subpath(path: &str, subpath: &str) -> Option<String> {
    if subpath.is_empty() {
        return Some(path.to_string());
    }
    if path == subpath {
        return path.rsplit('/').next().map(ToOwned::to_owned);
    }
    path.strip_prefix(subpath)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .map(ToOwned::to_owned)
}

/// Join a normalized relative path onto `root`, verifying every component
/// stays a plain name.
pub fn join_under(root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = normalize_relative(relative)?;
    let joined = root.join(&normalized);
    let escapes = joined
        .strip_prefix(root)
        .map(|rest| {
            rest.components()
                .any(|c| !matches!(c, Component::Normal(_)))
        })
        .unwrap_or(true);
    if escapes {
        return Err(Error::unsafe_path(relative));
    }
    Ok(joined)
}

/// Percent-encode each segment of a slash-separated path for use in a URL.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_current_dir_segments() {
        assert_eq!(normalize_relative("./a//b/./c.md").unwrap(), "a/b/c.md");
    }

    #[test]
    fn normalize_rejects_traversal() {
        for bad in ["../x", "a/../../x", "/etc/passwd", "a\\..\\b", "", "."] {
            assert!(
                matches!(normalize_relative(bad), Err(Error::UnsafePath { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn strip_subpath_handles_folders_and_files() {
        assert_eq!(strip_subpath("skills/x/SKILL.md", "skills/x").as_deref(), Some("SKILL.md"));
        assert_eq!(strip_subpath("skills/x/SKILL.md", "skills/x/SKILL.md").as_deref(), Some("SKILL.md"));
        assert_eq!(strip_subpath("skills/xy/SKILL.md", "skills/x"), None);
        assert_eq!(strip_subpath("README.md", "").as_deref(), Some("README.md"));
    }

    #[test]
    fn join_under_stays_inside_root() {
        let root = Path::new("/dest/skill");
        assert_eq!(
            join_under(root, "refs/a.md").unwrap(),
            PathBuf::from("/dest/skill/refs/a.md")
        );
        assert!(join_under(root, "../other/a.md").is_err());
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let home = Path::new("/home/dev");
        assert_eq!(
            expand_home(Path::new("~/.claude/skills"), Some(home)),
            PathBuf::from("/home/dev/.claude/skills")
        );
        assert_eq!(
            expand_home(Path::new("skills/~"), Some(home)),
            PathBuf::from("skills/~")
        );
        assert_eq!(expand_home(Path::new("~/x"), None), PathBuf::from("~/x"));
    }
}
