//! Skill installation from GitHub sources.
//!
//! A source URL is parsed into a [`SourceReference`], fetched through a
//! [`ContentPlatform`] (with `main` → `master` ref fallback), and written into
//! a local skill directory by the [`Installer`], which keeps personalized
//! `CONTEXT.md` files and saves the incoming copy alongside.

pub mod archive;
pub mod classify;
pub mod error;
pub mod fetch;
pub mod github;
pub mod install;
pub mod layout;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod report;
pub mod source;

pub use {
    classify::{Classification, UpdateClassifier},
    error::{Error, Result},
    fetch::{
        ContentPlatform, EntryKind, FetchedFile, FetchedSkill, Fetcher, ListingEntry,
        PlatformError, PlatformResult,
    },
    github::{GitHubPlatform, GitHubSettings},
    install::{FilePlan, InstallDecision, Installer},
    pipeline::{Pipeline, split_batch},
    policy::{RefPolicy, TemplateMarkerSet},
    prompt::{DecisionProvider, FixedAnswer, Prompt},
    report::{BatchItem, BatchReport, InstallReport, ReportStatus},
    source::{SourceReference, UrlKind, parse_source_url},
};
