//! Skill layout detection: where the skill root sits inside fetched files.

use tracing::warn;

use crate::fetch::FetchedFile;

/// File that marks a skill root.
pub const SKILL_FILE: &str = "SKILL.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillLayout {
    /// Directory name the skill is installed under.
    pub name: String,
    /// Skill root relative to the fetched root, empty when they coincide.
    pub root: String,
    pub has_skill_file: bool,
}

/// Locate the skill root: the fetched root when it holds `SKILL.md`, else the
/// first immediate subdirectory (by name) that does. Without any `SKILL.md`
/// everything is kept under `fallback_name`.
pub fn detect(files: &[FetchedFile], fallback_name: &str) -> SkillLayout {
    if files.iter().any(|f| f.relative_path == SKILL_FILE) {
        return SkillLayout {
            name: fallback_name.to_string(),
            root: String::new(),
            has_skill_file: true,
        };
    }

    let mut candidates: Vec<&str> = files
        .iter()
        .filter_map(|f| f.relative_path.strip_suffix(SKILL_FILE))
        .filter_map(|dir| dir.strip_suffix('/'))
        .filter(|dir| !dir.is_empty() && !dir.contains('/'))
        .collect();
    candidates.sort_unstable();

    match candidates.first() {
        Some(dir) => SkillLayout {
            name: (*dir).to_string(),
            root: (*dir).to_string(),
            has_skill_file: true,
        },
        None => {
            warn!(name = fallback_name, "no {SKILL_FILE} found, installing all fetched files");
            SkillLayout {
                name: fallback_name.to_string(),
                root: String::new(),
                has_skill_file: false,
            }
        },
    }
}

/// Keep only the files under the layout root, re-rooted onto it.
pub fn reroot(files: Vec<FetchedFile>, layout: &SkillLayout) -> Vec<FetchedFile> {
    if layout.root.is_empty() {
        return files;
    }
    let prefix = format!("{}/", layout.root);
    files
        .into_iter()
        .filter_map(|mut file| {
            let relative = file.relative_path.strip_prefix(&prefix)?.to_string();
            file.relative_path = relative;
            Some(file)
        })
        .collect()
}
