//! Archive extraction: GitHub ref tarballs (used when the listing API is
//! unavailable) and zipped `.skill` bundles.

use std::{
    io::{Cursor, Read},
    path::{Component, Path},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    paths::{normalize_relative, strip_subpath},
};

/// Extension of a zipped skill bundle.
pub const SKILL_BUNDLE_EXTENSION: &str = ".skill";

const UNIX_FILE_TYPE_MASK: u32 = 0o170_000;
const UNIX_SYMLINK: u32 = 0o120_000;

/// Files found under a subpath of a ref tarball.
#[derive(Debug, Default)]
pub struct Subtree {
    /// Paths relative to the subpath.
    pub files: Vec<(String, Vec<u8>)>,
    /// The subpath named a file rather than a directory.
    pub single_file: bool,
}

/// Extract regular files under `subpath` from a gzip'd GitHub tarball.
///
/// Paths are returned relative to `subpath`. Symlinks and hard links are
/// skipped; any entry that would escape the archive root is an error.
pub fn extract_subtree(bytes: &[u8], subpath: &str) -> Result<Subtree> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut subtree = Subtree::default();

    let entries = archive
        .entries()
        .map_err(|e| Error::archive(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::archive(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("skipping symlink/hardlink archive entry");
            continue;
        }
        if !entry_type.is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| Error::archive(e.to_string()))?
            .into_owned();
        let Some(stripped) = sanitize_archive_path(&path)? else {
            continue;
        };
        let Some(relative) = strip_subpath(&stripped, subpath) else {
            continue;
        };
        if !subpath.is_empty() && stripped == subpath {
            subtree.single_file = true;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::archive(format!("{}: {e}", path.display())))?;
        subtree.files.push((relative, content));
    }

    Ok(subtree)
}

/// Whether `file_name` names a zipped skill bundle.
pub fn is_skill_bundle(file_name: &str) -> bool {
    file_name.len() > SKILL_BUNDLE_EXTENSION.len() && file_name.ends_with(SKILL_BUNDLE_EXTENSION)
}

/// Contents of a `.skill` bundle.
#[derive(Debug, PartialEq, Eq)]
pub struct SkillBundle {
    /// Directory the bundle installs into.
    pub name: String,
    /// Paths relative to the bundle's skill directory.
    pub files: Vec<(String, Vec<u8>)>,
}

/// Unpack a zipped `.skill` bundle.
///
/// When every entry sits under one top-level directory, that directory names
/// the skill and is stripped; otherwise `fallback_name` is used and paths are
/// kept. Symlinks are skipped; escaping entries are an error.
pub fn extract_skill_bundle(bytes: &[u8], fallback_name: &str) -> Result<SkillBundle> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::archive(e.to_string()))?;
    let mut entries = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::archive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        if file
            .unix_mode()
            .is_some_and(|mode| mode & UNIX_FILE_TYPE_MASK == UNIX_SYMLINK)
        {
            warn!(name = file.name(), "skipping symlink bundle entry");
            continue;
        }

        let name = file.name().to_string();
        let Some(relative) = sanitize_components(Path::new(&name), 0)? else {
            continue;
        };
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::archive(format!("{name}: {e}")))?;
        entries.push((relative, content));
    }

    let root = common_root(&entries);
    let bundle = match root {
        Some(root) => {
            let prefix = format!("{root}/");
            SkillBundle {
                files: entries
                    .into_iter()
                    .filter_map(|(path, content)| {
                        path.strip_prefix(&prefix).map(|rest| (rest.to_string(), content))
                    })
                    .collect(),
                name: root,
            }
        },
        None => SkillBundle {
            name: fallback_name.to_string(),
            files: entries,
        },
    };
    debug!(name = %bundle.name, count = bundle.files.len(), "unpacked skill bundle");
    Ok(bundle)
}

/// The top-level directory shared by every entry, if there is one.
fn common_root(entries: &[(String, Vec<u8>)]) -> Option<String> {
    let mut root: Option<&str> = None;
    for (path, _) in entries {
        let (first, _) = path.split_once('/')?;
        match root {
            None => root = Some(first),
            Some(existing) if existing == first => {},
            Some(_) => return None,
        }
    }
    root.map(ToOwned::to_owned)
}

/// Drop the `<owner>-<repo>-<sha>/` prefix GitHub puts on every entry.
fn sanitize_archive_path(path: &Path) -> Result<Option<String>> {
    sanitize_components(path, 1)
}

/// Relative path from `path` after skipping `skip` leading components.
/// Parent, root and prefix components are rejected.
fn sanitize_components(path: &Path, skip: usize) -> Result<Option<String>> {
    let mut parts = Vec::new();
    for component in path.components().skip(skip) {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::unsafe_path(path.display().to_string()));
            },
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    normalize_relative(&parts.join("/")).map(Some)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        std::{io::Write, path::PathBuf},
        zip::write::SimpleFileOptions,
    };

    /// Build a gzip'd tarball with every entry under `root/`.
    pub(crate) fn tarball(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{root}/{path}"), content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Build a zip archive holding `files` at the given paths.
    pub(crate) fn skill_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in files {
            writer
                .start_file(*path, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_only_files_under_subpath() {
        let bytes = tarball("acme-skills-abc123", &[
            ("README.md", "root"),
            ("skills/pdf/SKILL.md", "pdf skill"),
            ("skills/pdf/refs/forms.md", "forms"),
            ("skills/pdfx/SKILL.md", "other"),
        ]);

        let subtree = extract_subtree(&bytes, "skills/pdf").unwrap();
        assert!(!subtree.single_file);
        let mut files = subtree.files;
        files.sort();
        assert_eq!(files, vec![
            ("SKILL.md".to_string(), b"pdf skill".to_vec()),
            ("refs/forms.md".to_string(), b"forms".to_vec()),
        ]);
    }

    #[test]
    fn empty_subpath_extracts_everything() {
        let bytes = tarball("acme-skills-abc123", &[("SKILL.md", "x"), ("a/b.md", "y")]);
        assert_eq!(extract_subtree(&bytes, "").unwrap().files.len(), 2);
    }

    #[test]
    fn subpath_naming_a_file_is_flagged() {
        let bytes = tarball("acme-skills-abc123", &[("skills/pdf/SKILL.md", "pdf skill")]);
        let subtree = extract_subtree(&bytes, "skills/pdf/SKILL.md").unwrap();
        assert!(subtree.single_file);
        assert_eq!(subtree.files, vec![("SKILL.md".to_string(), b"pdf skill".to_vec())]);
    }

    #[test]
    fn corrupt_archive_is_an_archive_error() {
        let err = extract_subtree(b"definitely not gzip", "").unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }

    #[test]
    fn sanitize_archive_path_rejects_parent_dir() {
        let path = PathBuf::from("repo-root/../../etc/passwd");
        assert!(sanitize_archive_path(&path).is_err());
    }

    #[test]
    fn sanitize_archive_path_strips_root() {
        let path = PathBuf::from("repo-root/skills/demo/SKILL.md");
        assert_eq!(
            sanitize_archive_path(&path).unwrap().as_deref(),
            Some("skills/demo/SKILL.md")
        );
        assert_eq!(sanitize_archive_path(Path::new("repo-root")).unwrap(), None);
    }

    #[test]
    fn bundle_with_one_top_level_directory_names_the_skill() {
        let bytes = skill_zip(&[("pdf/SKILL.md", "skill"), ("pdf/refs/a.md", "a")]);
        let bundle = extract_skill_bundle(&bytes, "pdf-v2").unwrap();
        assert_eq!(bundle, SkillBundle {
            name: "pdf".into(),
            files: vec![
                ("SKILL.md".to_string(), b"skill".to_vec()),
                ("refs/a.md".to_string(), b"a".to_vec()),
            ],
        });
    }

    #[test]
    fn flat_bundle_uses_fallback_name() {
        let bytes = skill_zip(&[("SKILL.md", "skill"), ("refs/a.md", "a")]);
        let bundle = extract_skill_bundle(&bytes, "pdf").unwrap();
        assert_eq!(bundle.name, "pdf");
        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.files[1].0, "refs/a.md");
    }

    #[test]
    fn bundle_entries_cannot_escape() {
        let bytes = skill_zip(&[("pdf/SKILL.md", "skill"), ("../evil.sh", "boom")]);
        let err = extract_skill_bundle(&bytes, "pdf").unwrap_err();
        assert!(matches!(err, Error::UnsafePath { .. }));
    }

    #[test]
    fn bundle_detection_needs_a_stem() {
        assert!(is_skill_bundle("pdf.skill"));
        assert!(!is_skill_bundle(".skill"));
        assert!(!is_skill_bundle("SKILL.md"));
    }
}
