//! snapwatch - Main entry point
//!
//! Cron-driven agent watching OpenBSD topics for changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use snapwatch::checks::{self, Topic, Urgency};
use snapwatch::config::{machine_identity, Config, SiteUrls};
use snapwatch::docwatch::DocumentWatcher;
use snapwatch::feedback::Feedback;
use snapwatch::snapshot::{
    generations::GenerationSlots, integrity::IntegrityGate, verify::SignifyVerifier, Outcome,
    ReleasePipeline,
};
use snapwatch::transfer::HttpFetcher;
use snapwatch::{utils, AgentError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Do not print feedback to the command line
    #[arg(short, long)]
    quiet: bool,

    /// Send feedback via local mail to the current user
    #[arg(short, long)]
    mail: bool,

    /// Send feedback via popup notification (notify-send)
    #[arg(short, long)]
    notify: bool,

    /// Stage snapshot downloads under the working directory instead of the
    /// system temp dir
    #[arg(short = 't', long)]
    no_temp: bool,

    /// Look for a new snapshot set for the current architecture
    #[arg(short = 'S', long)]
    snapshot: bool,

    /// Look for a new set of packages
    #[arg(short = 'P', long)]
    packages: bool,

    /// Look for changes in the ChangeLog file
    #[arg(short = 'l', long)]
    changelog: bool,

    /// Look for changes in the errata web page
    #[arg(short = 's', long)]
    errata: bool,

    /// Look for changes in the events web page
    #[arg(short = 'e', long)]
    events: bool,

    /// Look for changes in the FAQ's current web page
    #[arg(short = 'c', long)]
    current: bool,

    /// Look for changes in the innovations web page
    #[arg(short = 'i', long)]
    innovations: bool,

    /// Look for changes in the hackathons web page
    #[arg(short = 'H', long)]
    hackathons: bool,

    /// The mirror to get snapshots from (default: the one from /etc/installurl)
    #[arg(short = 'M', long)]
    mirror: Option<String>,

    /// Path to configuration file
    #[arg(short = 'C', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long)]
    log_level: Option<String>,

    /// The path to store the working files
    path: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let work_dir = args
        .path
        .clone()
        .unwrap_or_else(|| config.paths.work_dir.clone());
    std::fs::create_dir_all(&work_dir)?;

    let mirror = config.resolve_mirror(args.mirror.as_deref())?;
    let (arch, release) = machine_identity()?;
    let site = SiteUrls::build(&mirror, &config.mirror.website, &arch, &release)?;

    tracing::info!(
        "Starting snapwatch v{} (mirror: {}, arch: {})",
        env!("CARGO_PKG_VERSION"),
        mirror,
        arch
    );

    let feedback = Feedback {
        console: !args.quiet,
        desktop: args.notify,
        mail: args.mail,
    };
    let fetcher = HttpFetcher::new();
    let watcher = DocumentWatcher::new(work_dir.clone());

    // One failed topic never silences the others.
    let topics = selected_topics(&args);
    for check in checks::document_checks(&site, &arch) {
        if !topics.contains(&check.topic) {
            continue;
        }
        match watcher.check(&fetcher, &check.url).await {
            Ok((_, Some(changes))) => {
                let body = check.body.as_deref().unwrap_or(changes.as_str());
                feedback.send(check.title, body, check.urgency).await;
            }
            Ok((_, None)) => {}
            Err(err @ AgentError::Config(_)) => return Err(err.into()),
            Err(err) => tracing::error!("{:?} check failed: {err}", check.topic),
        }
    }

    if args.snapshot {
        match check_snapshots(
            &config,
            &site,
            &work_dir,
            args.no_temp,
            &fetcher,
            &watcher,
            &feedback,
        )
        .await
        {
            Ok(()) => {}
            Err(err @ (AgentError::Transfer(_) | AgentError::HttpStatus { .. })) => {
                tracing::error!("Snapshot check aborted: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

/// Drive the snapshot pipeline from the change-status of the mirror's build
/// manifest, and announce a newly staged upgrade.
async fn check_snapshots(
    config: &Config,
    site: &SiteUrls,
    work_dir: &Path,
    no_temp: bool,
    fetcher: &HttpFetcher,
    watcher: &DocumentWatcher,
    feedback: &Feedback,
) -> snapwatch::Result<()> {
    let (status, _) = watcher.check(fetcher, &site.buildinfo).await?;

    let snaps_dir = work_dir.join("snapshots");
    let verifier = SignifyVerifier::new(config.verify.key_dir.clone());
    let pipeline = ReleasePipeline {
        fetcher,
        verifier: &verifier,
        gate: IntegrityGate::new(Duration::from_secs(config.verify.cooldown_secs)),
        snapshots_url: site.snapshots.clone(),
        slots: GenerationSlots::under(&snaps_dir),
        system_root: config.paths.system_root.clone(),
        staging_parent: no_temp.then(|| snaps_dir.clone()),
    };

    match pipeline.run(status).await? {
        Outcome::Staged => {
            feedback
                .send(
                    "OpenBSD Snapshot",
                    "New snapshot set available to upgrade.",
                    Urgency::Critical,
                )
                .await;
        }
        outcome => tracing::info!("Snapshot check finished: {outcome:?}"),
    }

    Ok(())
}

fn selected_topics(args: &Args) -> Vec<Topic> {
    [
        (args.errata, Topic::Errata),
        (args.changelog, Topic::Changelog),
        (args.events, Topic::Events),
        (args.current, Topic::Current),
        (args.innovations, Topic::Innovations),
        (args.hackathons, Topic::Hackathons),
        (args.packages, Topic::Packages),
    ]
    .into_iter()
    .filter_map(|(enabled, topic)| enabled.then_some(topic))
    .collect()
}
