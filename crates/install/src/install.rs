//! Writes fetched files into a skill directory without losing user edits.
//!
//! Planning only reads the destination, so check-only runs share it. Applying
//! a plan writes each file atomically (temp file + rename); a failure on one
//! file leaves the files already written in place.

use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use {
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    classify::{Classification, UpdateClassifier},
    error::{Error, Result},
    fetch::FetchedFile,
    paths::join_under,
    prompt::{DecisionProvider, Prompt},
};

const TMP_SUFFIX: &str = ".skillsync.tmp";

/// Appended to a preserved file's name for the incoming copy.
pub const DEFAULT_SIDECAR_SUFFIX: &str = ".new";

/// Verdict for one incoming file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallDecision {
    /// Nothing exists at the target yet.
    Add,
    /// Replace the existing file.
    Overwrite,
    /// Existing bytes already match.
    SkipUnchanged,
    /// Personalized file kept; incoming copy goes to the sidecar path.
    PreserveAndSidecar,
    /// The decision provider refused the overwrite.
    Declined,
}

impl InstallDecision {
    pub fn writes(self) -> bool {
        matches!(self, Self::Add | Self::Overwrite | Self::PreserveAndSidecar)
    }
}

impl fmt::Display for InstallDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Overwrite => "update",
            Self::SkipUnchanged => "skip",
            Self::PreserveAndSidecar => "preserve",
            Self::Declined => "declined",
        };
        f.pad(label)
    }
}

/// Planned (or applied) handling of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePlan {
    pub relative_path: String,
    /// Where the incoming bytes go: the file itself, or its sidecar.
    pub target: PathBuf,
    pub decision: InstallDecision,
    /// Existing file is not the preservable one, so replacing it needs
    /// confirmation.
    #[serde(skip)]
    confirm: bool,
}

pub struct Installer {
    classifier: UpdateClassifier,
    sidecar_suffix: String,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new(UpdateClassifier::default(), DEFAULT_SIDECAR_SUFFIX)
    }
}

impl Installer {
    /// A blank `sidecar_suffix` falls back to [`DEFAULT_SIDECAR_SUFFIX`].
    pub fn new(classifier: UpdateClassifier, sidecar_suffix: impl Into<String>) -> Self {
        let mut sidecar_suffix = sidecar_suffix.into();
        if sidecar_suffix.trim().is_empty() {
            warn!(
                fallback = DEFAULT_SIDECAR_SUFFIX,
                "empty sidecar suffix configured, using default"
            );
            sidecar_suffix = DEFAULT_SIDECAR_SUFFIX.to_string();
        }
        Self {
            classifier,
            sidecar_suffix,
        }
    }

    /// Decide what to do with every file. Reads the destination, never writes.
    pub async fn plan(&self, skill_dir: &Path, files: &[FetchedFile]) -> Result<Vec<FilePlan>> {
        let mut plans = Vec::with_capacity(files.len());
        for file in files {
            let target = join_under(skill_dir, &file.relative_path)?;
            let plan = match read_existing(&target).await? {
                None => FilePlan::new(file, target, InstallDecision::Add),
                Some(existing) if existing == file.content => {
                    FilePlan::new(file, target, InstallDecision::SkipUnchanged)
                },
                Some(existing) if self.classifier.is_preservable(&file.relative_path) => {
                    match self.classifier.classify(&existing) {
                        Classification::Template => {
                            FilePlan::new(file, target, InstallDecision::Overwrite)
                        },
                        Classification::Personalized => {
                            let sidecar = self.sidecar_path(&target);
                            if sidecar == target {
                                return Err(Error::unsafe_path(sidecar.display().to_string()));
                            }
                            FilePlan::new(file, sidecar, InstallDecision::PreserveAndSidecar)
                        },
                    }
                },
                Some(_) => FilePlan {
                    confirm: true,
                    ..FilePlan::new(file, target, InstallDecision::Overwrite)
                },
            };
            debug!(path = %plan.relative_path, decision = %plan.decision, "planned");
            plans.push(plan);
        }
        Ok(plans)
    }

    /// Carry out `plans` (from [`Installer::plan`] over the same `files`).
    ///
    /// Overwrites of non-preservable files go through `decisions` first. A
    /// fatal error (permission denied, unsafe path) aborts the remaining
    /// writes; files already written stay.
    pub async fn apply(
        &self,
        skill_dir: &Path,
        mut plans: Vec<FilePlan>,
        files: &[FetchedFile],
        decisions: &dyn DecisionProvider,
    ) -> Result<Vec<FilePlan>> {
        for (plan, file) in plans.iter_mut().zip(files) {
            if plan.confirm
                && plan.decision == InstallDecision::Overwrite
                && !decisions.confirm(&Prompt::Overwrite {
                    path: plan.target.clone(),
                })
            {
                info!(path = %plan.target.display(), "overwrite declined");
                plan.decision = InstallDecision::Declined;
            }
            if !plan.decision.writes() {
                continue;
            }
            if plan.decision == InstallDecision::PreserveAndSidecar
                && read_existing(&plan.target).await?.as_deref() == Some(file.content.as_slice())
            {
                debug!(path = %plan.target.display(), "sidecar already current");
                continue;
            }

            write_atomic(skill_dir, &plan.target, &file.content).await?;
            match plan.decision {
                InstallDecision::PreserveAndSidecar => warn!(
                    kept = %plan.relative_path,
                    incoming = %plan.target.display(),
                    "personalized file preserved, incoming version saved alongside"
                ),
                decision => debug!(path = %plan.target.display(), %decision, "written"),
            }
        }
        Ok(plans)
    }

    fn sidecar_path(&self, target: &Path) -> PathBuf {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(&self.sidecar_suffix);
        target.with_file_name(name)
    }
}

impl FilePlan {
    fn new(file: &FetchedFile, target: PathBuf, decision: InstallDecision) -> Self {
        Self {
            relative_path: file.relative_path.clone(),
            target,
            decision,
            confirm: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(relative_path: String, skill_dir: &Path, decision: InstallDecision) -> Self {
        Self {
            target: skill_dir.join(&relative_path),
            relative_path,
            decision,
            confirm: false,
        }
    }
}

async fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::file_io(path, e)),
    }
}

/// Write `content` to `target` via a temp file and rename, creating parent
/// directories. `target` must resolve inside `root`.
async fn write_atomic(root: &Path, target: &Path, content: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::unsafe_path(target.display().to_string()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::file_io(parent, e))?;

    let canonical_root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| Error::file_io(root, e))?;
    let canonical_parent = tokio::fs::canonicalize(parent)
        .await
        .map_err(|e| Error::file_io(parent, e))?;
    if !canonical_parent.starts_with(&canonical_root) {
        return Err(Error::unsafe_path(target.display().to_string()));
    }
    if let Ok(meta) = tokio::fs::symlink_metadata(target).await
        && meta.file_type().is_symlink()
    {
        return Err(Error::unsafe_path(target.display().to_string()));
    }

    let mut tmp_name = target.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(TMP_SUFFIX);
    let tmp = target.with_file_name(tmp_name);

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::file_io(target, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::file_io(target, e));
    }
    Ok(())
}
