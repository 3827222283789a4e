//! Per-source and per-batch install outcomes.

use std::{fmt, path::PathBuf};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    install::{FilePlan, InstallDecision},
    source::SourceReference,
};

/// Overall state of one skill after (or, in check mode, before) an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every file already matches.
    UpToDate,
    /// Nothing was installed before.
    New,
    /// Existing files change.
    Update,
    /// A personalized file was kept and the incoming copy saved alongside.
    Merge,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::New => f.write_str("new"),
            Self::Update => f.write_str("update"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub source: SourceReference,
    /// Directory the files were (or would be) written under.
    pub skill_dir: PathBuf,
    pub resolved_ref: String,
    pub files: Vec<FilePlan>,
    pub check_only: bool,
    /// Whether `SKILL.md` is present. `None` for single-file installs.
    pub has_skill_md: Option<bool>,
    /// Files that failed to download in best-effort mode.
    pub skipped_downloads: Vec<String>,
}

impl InstallReport {
    /// "No changes": every file was already identical.
    pub fn is_noop(&self) -> bool {
        self.files
            .iter()
            .all(|f| f.decision == InstallDecision::SkipUnchanged)
    }

    pub fn count(&self, decision: InstallDecision) -> usize {
        self.files.iter().filter(|f| f.decision == decision).count()
    }

    pub fn status(&self) -> ReportStatus {
        if self.is_noop() {
            ReportStatus::UpToDate
        } else if self.count(InstallDecision::PreserveAndSidecar) > 0 {
            ReportStatus::Merge
        } else if self.files.iter().all(|f| f.decision == InstallDecision::Add) {
            ReportStatus::New
        } else {
            ReportStatus::Update
        }
    }
}

/// Outcome of one batch entry.
#[derive(Debug)]
pub struct BatchItem {
    pub url: String,
    pub result: Result<InstallReport>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.items.len() - self.failed()
    }

    /// `Err(PartialBatchFailure)` when any entry failed.
    pub fn into_result(self) -> Result<Self> {
        if self.failed() == 0 {
            Ok(self)
        } else {
            Err(Error::PartialBatchFailure {
                report: Box::new(self),
            })
        }
    }
}
