//! `dispatch` CLI — check and apply job reschedules against a snapshot file.
//!
//! ## Usage
//!
//! ```sh
//! # List conflicts for moving job J1 to 2024-03-04 at 10:00
//! dispatch scan -s snapshot.json --job J1 --date 2024-03-04 --time 10:00
//!
//! # Same, as JSON
//! dispatch scan -s snapshot.json --job J1 --date 2024-03-04 --time 10:00 --json
//!
//! # Conflict-free start times for J1 on a given day
//! dispatch slots -s snapshot.json --job J1 --date 2024-03-04
//!
//! # Preview a reschedule (nothing is saved without --yes)
//! dispatch reschedule -s snapshot.json --job J1 --date 2024-03-05 --time 10:30
//!
//! # Save it, overriding conflicts and notifying the technicians
//! dispatch reschedule -s snapshot.json --job J1 --date 2024-03-04 --time 10:00 \
//!     --yes --proceed-anyway --notify
//! ```

mod logging;
mod store;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dispatch_engine::conflict::{resolve_candidate, scan_candidate};
use dispatch_engine::model::{Job, ScheduleSnapshot};
use dispatch_engine::window::format_time_of_day;
use dispatch_engine::{
    fetch_snapshot, suggest_start_times, Conflict, NotificationOutcome, Phase,
    RescheduleController, SchedulerConfig, Settings,
};
use serde::Serialize;

use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Check technician job reschedules for conflicts and apply them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Scheduler config file (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List conflicts for a candidate move
    Scan {
        #[command(flatten)]
        target: Target,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest conflict-free start times for a job on a date
    Slots {
        /// Schedule snapshot file (JSON)
        #[arg(short, long)]
        snapshot: String,
        /// Job to place
        #[arg(short, long)]
        job: String,
        /// Day to search (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Move a job, saving only after confirmation
    Reschedule {
        #[command(flatten)]
        target: Target,
        /// Confirm and save the change
        #[arg(short, long)]
        yes: bool,
        /// Save even though conflicts were found
        #[arg(long)]
        proceed_anyway: bool,
        /// Notify the assigned technicians after saving
        #[arg(long)]
        notify: bool,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Schedule snapshot file (JSON)
    #[arg(short, long)]
    snapshot: String,
    /// Job to move
    #[arg(short, long)]
    job: String,
    /// New date (YYYY-MM-DD); keeps the current date when omitted
    #[arg(short, long)]
    date: Option<NaiveDate>,
    /// New start time (HH:MM); keeps the current time when omitted
    #[arg(short, long)]
    time: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { target, json } => scan(&target, json, &settings).await,
        Commands::Slots {
            snapshot,
            job,
            date,
        } => slots(&snapshot, &job, date, &settings).await,
        Commands::Reschedule {
            target,
            yes,
            proceed_anyway,
            notify,
        } => reschedule(&target, yes, proceed_anyway, notify, settings).await,
    }
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path))?;
            SchedulerConfig::from_json(&json)?
        }
        None => SchedulerConfig::default(),
    };
    Ok(config.settings()?)
}

/// Open the snapshot file and look up the job being moved.
async fn open(snapshot: &str, job_id: &str) -> Result<(JsonFileStore, Job, ScheduleSnapshot)> {
    let store = JsonFileStore::open(snapshot)?;
    let snapshot = fetch_snapshot(&store).await?;
    let job = snapshot
        .job(job_id)
        .cloned()
        .with_context(|| format!("Job {} not found in snapshot", job_id))?;
    Ok((store, job, snapshot))
}

#[derive(Serialize)]
struct ConflictDto {
    kind: String,
    entity_id: String,
    overlap_minutes: i64,
    reason: String,
}

impl ConflictDto {
    fn new(conflict: &Conflict, settings: &Settings) -> Self {
        Self {
            kind: conflict.kind().as_str().to_string(),
            entity_id: conflict.entity_id().to_string(),
            overlap_minutes: conflict.overlap_minutes(),
            reason: conflict.reason(settings.timezone),
        }
    }
}

#[derive(Serialize)]
struct ScanReport {
    job_id: String,
    date: NaiveDate,
    time: String,
    conflicts: Vec<ConflictDto>,
}

async fn scan(target: &Target, json: bool, settings: &Settings) -> Result<()> {
    let (_, job, snapshot) = open(&target.snapshot, &target.job).await?;
    let candidate = resolve_candidate(&job, target.date, target.time.as_deref(), settings)?;
    let conflicts = scan_candidate(&job, &candidate, &snapshot, settings);

    let report = ScanReport {
        job_id: job.id.clone(),
        date: candidate.date,
        time: format_time_of_day(candidate.minutes),
        conflicts: conflicts.iter().map(|c| ConflictDto::new(c, settings)).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.conflicts.is_empty() {
        println!(
            "No conflicts for job {} on {} {}",
            report.job_id, report.date, report.time
        );
    } else {
        println!(
            "{} conflict(s) for job {} on {} {}:",
            report.conflicts.len(),
            report.job_id,
            report.date,
            report.time
        );
        print_conflicts(&conflicts, settings);
    }
    Ok(())
}

fn print_conflicts(conflicts: &[Conflict], settings: &Settings) {
    for conflict in conflicts {
        println!(
            "  - [{}] {}: {}",
            conflict.kind(),
            conflict.entity_id(),
            conflict.reason(settings.timezone)
        );
    }
}

async fn slots(snapshot: &str, job_id: &str, date: NaiveDate, settings: &Settings) -> Result<()> {
    let (_, job, snapshot) = open(snapshot, job_id).await?;
    let starts = suggest_start_times(&job, date, &snapshot, settings);

    if starts.is_empty() {
        println!("No free start times for job {} on {}", job.id, date);
    } else {
        println!("Free start times for job {} on {}:", job.id, date);
        for start in starts {
            println!("  {}", start);
        }
    }
    Ok(())
}

async fn reschedule(
    target: &Target,
    yes: bool,
    proceed_anyway: bool,
    notify: bool,
    settings: Settings,
) -> Result<()> {
    let (store, job, snapshot) = open(&target.snapshot, &target.job).await?;
    let mut controller = RescheduleController::new(store, settings);

    let phase = controller.request(&job, target.date, target.time.as_deref(), &snapshot)?;
    if notify {
        controller.set_notify(true)?;
    }

    let Some(pending) = controller.pending() else {
        bail!("No reschedule pending for job {}", job.id);
    };
    println!("{}", pending.summary());
    if phase == Phase::PendingConfirmWithConflicts {
        println!("{} conflict(s):", pending.conflicts().len());
        print_conflicts(pending.conflicts(), &settings);
    }
    if !pending.is_change() {
        bail!("Job {} is already scheduled at that date and time", job.id);
    }

    if !yes {
        println!("Not saved; pass --yes to apply");
        controller.cancel()?;
        return Ok(());
    }
    if phase == Phase::PendingConfirmWithConflicts {
        if !proceed_anyway {
            controller.cancel()?;
            bail!("Conflicts found; pass --proceed-anyway to save regardless");
        }
        controller.acknowledge_conflicts()?;
    }

    let outcome = controller.confirm().await?;
    println!(
        "Saved: job {} now scheduled {} {}",
        outcome.job_id, outcome.date, outcome.time
    );
    match outcome.notification {
        NotificationOutcome::NotRequested => {}
        NotificationOutcome::Sent => println!("Technicians notified"),
        NotificationOutcome::Failed(error) => {
            eprintln!("Warning: technicians were not notified: {}", error)
        }
    }
    Ok(())
}
