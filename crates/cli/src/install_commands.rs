use std::path::{Path, PathBuf};

use {
    anyhow::Result,
    clap::Args,
    skillsync_config::SkillsyncConfig,
    skillsync_install::{
        BatchReport, DecisionProvider, FixedAnswer, InstallDecision, InstallReport, Pipeline,
        paths::expand_home, split_batch,
    },
};

use crate::prompt::TerminalPrompter;

#[derive(Args)]
pub struct InstallArgs {
    /// Skill URL: repository, folder (`/tree/`), file (`/blob/`) or raw link.
    source: String,
    /// Directory skills are installed under (`~` expands to home).
    destination: PathBuf,
    /// Treat <SOURCE> as a comma-separated list of URLs.
    #[arg(short, long)]
    batch: bool,
    /// Report what would change without writing anything.
    #[arg(short, long)]
    check: bool,
    /// Overwrite changed files without asking. Personalized CONTEXT.md files
    /// are still preserved.
    #[arg(short, long)]
    force: bool,
    /// Answer yes to every prompt.
    #[arg(short, long)]
    yes: bool,
    /// Install what downloads successfully instead of failing the skill.
    #[arg(long)]
    best_effort: bool,
    /// Print reports as JSON.
    #[arg(long)]
    json: bool,
}

pub async fn handle_install(args: InstallArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config: SkillsyncConfig = skillsync_config::load_or_discover(config_path)?;
    if args.best_effort {
        config.install.best_effort = true;
    }
    let pipeline = Pipeline::from_config(&config)?;

    let destination = expand_home(&args.destination, skillsync_config::home_dir().as_deref());
    let decisions: Box<dyn DecisionProvider> = if args.force || args.yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(TerminalPrompter)
    };

    if args.batch {
        let urls = split_batch(&args.source)?;
        let batch = pipeline
            .install_batch(&urls, &destination, args.check, decisions.as_ref())
            .await;
        print_batch(&batch, args.json)?;
        batch.into_result()?;
    } else {
        let report = pipeline
            .install(&args.source, &destination, args.check, decisions.as_ref())
            .await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
    }
    Ok(())
}

fn print_batch(batch: &BatchReport, json: bool) -> Result<()> {
    if json {
        let items: Vec<serde_json::Value> = batch
            .items
            .iter()
            .map(|item| match &item.result {
                Ok(report) => serde_json::json!({ "url": item.url, "report": report }),
                Err(e) => serde_json::json!({ "url": item.url, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in &batch.items {
        match &item.result {
            Ok(report) => print_report(report),
            Err(e) => eprintln!("{}: error: {e}", item.url),
        }
    }
    println!(
        "\n{} succeeded, {} failed",
        batch.succeeded(),
        batch.failed()
    );
    Ok(())
}

fn print_report(report: &InstallReport) {
    let mode = if report.check_only {
        " (check only)"
    } else {
        ""
    };
    println!(
        "{} @ {} -> {}: {}{mode}",
        report.source,
        report.resolved_ref,
        report.skill_dir.display(),
        report.status()
    );

    if report.is_noop() {
        println!("  no changes");
    }
    for file in &report.files {
        match file.decision {
            InstallDecision::SkipUnchanged => {},
            InstallDecision::PreserveAndSidecar => println!(
                "  {:<9}{} (incoming saved as {})",
                file.decision,
                file.relative_path,
                file.target.display()
            ),
            decision => println!("  {decision:<9}{}", file.relative_path),
        }
    }

    let unchanged = report.count(InstallDecision::SkipUnchanged);
    if unchanged > 0 && !report.is_noop() {
        println!("  {unchanged} unchanged");
    }
    for path in &report.skipped_downloads {
        println!("  warning: {path} could not be downloaded");
    }
    if report.has_skill_md == Some(false) {
        println!("  warning: no SKILL.md in {}", report.skill_dir.display());
    }
}
