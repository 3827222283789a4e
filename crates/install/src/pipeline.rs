//! URL → fetch → layout → install, for one source or a batch of them.

use std::{path::Path, sync::Arc, time::Duration};

use {
    skillsync_config::SkillsyncConfig,
    tracing::{info, warn},
};

use crate::{
    archive,
    classify::{DEFAULT_PRESERVE_FILE, UpdateClassifier},
    error::{Error, Result},
    fetch::{ContentPlatform, FetchedFile, Fetcher},
    github::{GitHubPlatform, GitHubSettings},
    install::Installer,
    layout::{self, SKILL_FILE},
    paths::join_under,
    policy::{RefPolicy, TemplateMarkerSet},
    prompt::DecisionProvider,
    report::{BatchItem, BatchReport, InstallReport},
    source::parse_source_url,
};

pub struct Pipeline {
    fetcher: Fetcher,
    installer: Installer,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, installer: Installer) -> Self {
        Self { fetcher, installer }
    }

    /// Build a GitHub-backed pipeline from configuration.
    pub fn from_config(config: &SkillsyncConfig) -> Result<Self> {
        let github = &config.github;
        let defaults = GitHubSettings::default();
        let platform = GitHubPlatform::new(GitHubSettings {
            api_url: github.api_url.clone().unwrap_or(defaults.api_url),
            raw_url: github.raw_url.clone().unwrap_or(defaults.raw_url),
            user_agent: github.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout: Duration::from_secs(github.timeout_secs),
            token: github.token.clone(),
        })?;
        Ok(Self::with_platform(Arc::new(platform), config))
    }

    /// Build a pipeline over any platform, taking policy from `config`.
    pub fn with_platform(platform: Arc<dyn ContentPlatform>, config: &SkillsyncConfig) -> Self {
        let install = &config.install;

        let default_policy = RefPolicy::default();
        let refs = RefPolicy::new(
            install
                .default_ref
                .clone()
                .unwrap_or(default_policy.default_ref),
            install
                .fallback_refs
                .clone()
                .unwrap_or(default_policy.fallbacks),
        );
        let markers = install
            .template_markers
            .clone()
            .map(TemplateMarkerSet::new)
            .unwrap_or_default();
        let classifier = UpdateClassifier::new(
            install
                .preserve_file
                .clone()
                .unwrap_or_else(|| DEFAULT_PRESERVE_FILE.to_string()),
            markers,
        );

        let fetcher = Fetcher::new(platform, refs)
            .with_archive_fallback(install.archive_fallback)
            .with_best_effort(install.best_effort);
        Self::new(fetcher, Installer::new(classifier, install.sidecar_suffix.clone()))
    }

    /// Install (or, with `check_only`, plan) one source under `destination`.
    pub async fn install(
        &self,
        url: &str,
        destination: &Path,
        check_only: bool,
        decisions: &dyn DecisionProvider,
    ) -> Result<InstallReport> {
        let source = parse_source_url(url)?;
        let fetched = self.fetcher.fetch(&source).await?;

        let bundle = match fetched.files.as_slice() {
            [file] if fetched.single_file && archive::is_skill_bundle(&file.relative_path) => {
                Some(unpack_bundle(file).await?)
            },
            _ => None,
        };
        // `None` when the install is a lone file that is not a skill.
        let (skill_dir, files, expects_skill_file) = if let Some((name, files)) = bundle {
            let has_skill_file = files.iter().any(|f| f.relative_path == SKILL_FILE);
            (join_under(destination, &name)?, files, Some(has_skill_file))
        } else if fetched.single_file {
            (destination.to_path_buf(), fetched.files, None)
        } else {
            let layout = layout::detect(&fetched.files, source.name_hint());
            let skill_dir = join_under(destination, &layout.name)?;
            let has_skill_file = layout.has_skill_file;
            (skill_dir, layout::reroot(fetched.files, &layout), Some(has_skill_file))
        };

        let plans = self.installer.plan(&skill_dir, &files).await?;
        let (plans, has_skill_md) = if check_only {
            (plans, expects_skill_file)
        } else {
            let plans = self
                .installer
                .apply(&skill_dir, plans, &files, decisions)
                .await?;
            let has_skill_md = match expects_skill_file {
                Some(_) => Some(
                    tokio::fs::try_exists(skill_dir.join(SKILL_FILE))
                        .await
                        .map_err(|e| Error::file_io(&skill_dir, e))?,
                ),
                None => None,
            };
            (plans, has_skill_md)
        };

        if has_skill_md == Some(false) {
            warn!(skill_dir = %skill_dir.display(), "installed skill has no {SKILL_FILE}");
        }

        let report = InstallReport {
            source,
            skill_dir,
            resolved_ref: fetched.resolved_ref,
            files: plans,
            check_only,
            has_skill_md,
            skipped_downloads: fetched.skipped,
        };
        info!(
            source = %report.source,
            skill_dir = %report.skill_dir.display(),
            status = %report.status(),
            check_only,
            "skill processed"
        );
        Ok(report)
    }

    /// Run [`Pipeline::install`] for every URL in order. A failing entry is
    /// recorded and the batch carries on.
    pub async fn install_batch(
        &self,
        urls: &[String],
        destination: &Path,
        check_only: bool,
        decisions: &dyn DecisionProvider,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for url in urls {
            let result = self.install(url, destination, check_only, decisions).await;
            if let Err(error) = &result {
                warn!(%url, %error, "skill install failed");
            }
            report.items.push(BatchItem {
                url: url.clone(),
                result,
            });
        }
        report
    }
}

/// Unpack a fetched `.skill` bundle into the files of one skill directory.
async fn unpack_bundle(bundle: &FetchedFile) -> Result<(String, Vec<FetchedFile>)> {
    let fallback_name = bundle
        .relative_path
        .strip_suffix(archive::SKILL_BUNDLE_EXTENSION)
        .unwrap_or(&bundle.relative_path)
        .to_string();
    let bytes = bundle.content.clone();
    let unpacked = tokio::task::spawn_blocking(move || {
        archive::extract_skill_bundle(&bytes, &fallback_name)
    })
    .await
    .map_err(|e| Error::archive(e.to_string()))??;
    if unpacked.files.is_empty() {
        return Err(Error::archive(format!("{} holds no files", bundle.relative_path)));
    }

    let mut files: Vec<FetchedFile> = unpacked
        .files
        .into_iter()
        .map(|(relative_path, content)| FetchedFile {
            relative_path,
            content,
            source: Arc::clone(&bundle.source),
        })
        .collect();
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    info!(name = %unpacked.name, count = files.len(), "unpacked skill bundle");
    Ok((unpacked.name, files))
}

/// Split a comma-separated batch argument into URLs.
pub fn split_batch(input: &str) -> Result<Vec<String>> {
    let urls: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return Err(Error::invalid_url(input, "batch list is empty"));
    }
    Ok(urls)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            archive::tests::skill_zip, fetch::tests::FakePlatform, install::InstallDecision,
            prompt::FixedAnswer, report::ReportStatus,
        },
    };

    fn pipeline(platform: FakePlatform) -> Pipeline {
        Pipeline::with_platform(Arc::new(platform), &SkillsyncConfig::default())
    }

    #[test]
    fn split_batch_trims_and_drops_blanks() {
        let urls = split_batch(" https://github.com/a/b , ,https://github.com/c/d,").unwrap();
        assert_eq!(urls, vec!["https://github.com/a/b", "https://github.com/c/d"]);
    }

    #[test]
    fn empty_batch_is_invalid() {
        assert!(matches!(split_batch(" , "), Err(Error::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn folder_installs_under_its_name() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(FakePlatform::default().with_ref("main", &[
            ("skills/pdf/SKILL.md", "skill"),
            ("skills/pdf/refs/a.md", "a"),
        ]));

        let report = pipeline
            .install(
                "https://github.com/acme/skills/tree/main/skills/pdf",
                tmp.path(),
                false,
                &FixedAnswer(false),
            )
            .await
            .unwrap();

        assert_eq!(report.skill_dir, tmp.path().join("pdf"));
        assert_eq!(report.status(), ReportStatus::New);
        assert_eq!(report.has_skill_md, Some(true));
        assert!(tmp.path().join("pdf/refs/a.md").is_file());
    }

    #[tokio::test]
    async fn repository_with_nested_skill_uses_that_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(FakePlatform::default().with_ref("main", &[
            ("README.md", "repo readme"),
            ("docx/SKILL.md", "skill"),
        ]));

        let report = pipeline
            .install("https://github.com/acme/bundle", tmp.path(), false, &FixedAnswer(false))
            .await
            .unwrap();

        assert_eq!(report.skill_dir, tmp.path().join("docx"));
        assert_eq!(report.files.len(), 1);
        assert!(!tmp.path().join("docx/README.md").exists());
    }

    #[tokio::test]
    async fn single_file_lands_in_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            FakePlatform::default().with_ref("main", &[("docs/CONTEXT.md", "ctx")]),
        );

        let report = pipeline
            .install(
                "https://raw.githubusercontent.com/acme/skills/main/docs/CONTEXT.md",
                tmp.path(),
                false,
                &FixedAnswer(false),
            )
            .await
            .unwrap();

        assert_eq!(report.has_skill_md, None);
        assert_eq!(std::fs::read_to_string(tmp.path().join("CONTEXT.md")).unwrap(), "ctx");
    }

    #[tokio::test]
    async fn missing_skill_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(FakePlatform::default().with_ref("main", &[("notes.md", "n")]));

        let report = pipeline
            .install("https://github.com/acme/notes", tmp.path(), false, &FixedAnswer(false))
            .await
            .unwrap();

        assert_eq!(report.skill_dir, tmp.path().join("notes"));
        assert_eq!(report.has_skill_md, Some(false));
    }

    #[tokio::test]
    async fn check_only_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(FakePlatform::default().with_ref("main", &[("SKILL.md", "s")]));

        let report = pipeline
            .install("https://github.com/acme/pdf", tmp.path(), true, &FixedAnswer(true))
            .await
            .unwrap();

        assert!(report.check_only);
        assert_eq!(report.files[0].decision, InstallDecision::Add);
        assert!(!tmp.path().join("pdf").exists());
    }

    #[tokio::test]
    async fn configured_default_ref_is_used_for_implicit_refs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = SkillsyncConfig::default();
        config.install.default_ref = Some("trunk".into());
        config.install.fallback_refs = Some(Vec::new());
        let platform = Arc::new(FakePlatform::default().with_ref("trunk", &[("SKILL.md", "s")]));
        let pipeline = Pipeline::with_platform(platform.clone(), &config);

        let report = pipeline
            .install("https://github.com/acme/pdf", tmp.path(), false, &FixedAnswer(false))
            .await
            .unwrap();

        assert_eq!(report.resolved_ref, "trunk");
        assert_eq!(platform.calls()[0], "list trunk:");
    }

    #[tokio::test]
    async fn folder_url_naming_a_file_installs_that_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            FakePlatform::default().with_ref("main", &[("x/SKILL.md", "skill"), ("x/y.md", "y")]),
        );

        let report = pipeline
            .install(
                "https://github.com/acme/skills/tree/main/x/SKILL.md",
                tmp.path(),
                false,
                &FixedAnswer(false),
            )
            .await
            .unwrap();

        assert_eq!(report.skill_dir, tmp.path());
        assert_eq!(report.has_skill_md, None);
        assert_eq!(std::fs::read_to_string(tmp.path().join("SKILL.md")).unwrap(), "skill");
        assert!(!tmp.path().join("SKILL.md/SKILL.md").exists());
    }

    #[tokio::test]
    async fn skill_bundle_is_unpacked_into_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = skill_zip(&[("pdf/SKILL.md", "skill"), ("pdf/refs/a.md", "a")]);
        let pipeline = pipeline(
            FakePlatform::default().with_binary("main", "dist/pdf.skill", bundle),
        );

        let report = pipeline
            .install(
                "https://github.com/acme/skills/blob/main/dist/pdf.skill",
                tmp.path(),
                false,
                &FixedAnswer(false),
            )
            .await
            .unwrap();

        assert_eq!(report.skill_dir, tmp.path().join("pdf"));
        assert_eq!(report.has_skill_md, Some(true));
        assert_eq!(report.status(), ReportStatus::New);
        assert_eq!(std::fs::read_to_string(tmp.path().join("pdf/refs/a.md")).unwrap(), "a");
        assert!(!tmp.path().join("pdf.skill").exists());
    }

    #[tokio::test]
    async fn skill_bundle_with_escaping_entry_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = skill_zip(&[("SKILL.md", "skill"), ("../../evil.sh", "boom")]);
        let pipeline = pipeline(
            FakePlatform::default().with_binary("main", "pdf.skill", bundle),
        );

        let err = pipeline
            .install(
                "https://github.com/acme/skills/blob/main/pdf.skill",
                tmp.path(),
                false,
                &FixedAnswer(true),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsafePath { .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
