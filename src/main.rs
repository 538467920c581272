use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{ProgramHoursConfig, Settings};
use crate::db::PgHistoryStore;
use crate::history::{HistoryFilter, HistoryStore};
use crate::models::{format_hours, WarningRecord};
use crate::risk::Evaluation;

mod aggregate;
mod config;
mod db;
mod email;
mod error;
mod history;
mod hours;
mod import;
mod models;
mod normalize;
mod program;
mod report;
mod risk;

#[derive(Parser)]
#[command(name = "attendance-early-warning")]
#[command(about = "Absence and delay warnings from school attendance exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Attendance export (CSV)
    #[arg(long)]
    csv: PathBuf,
    /// Subject hours per program (JSON); defaults to HOURS_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the notification history schema
    InitDb,
    /// List warnings for an export with their sent status
    Scan {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        group: Vec<String>,
        #[arg(long)]
        student: Vec<String>,
        #[arg(long)]
        subject: Vec<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: Source,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write the warnings as CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print the notification email for a warning
    Email {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        id: String,
    },
    /// Mark warnings as sent (or not sent with --unsent)
    Mark {
        #[command(flatten)]
        source: Source,
        /// Warning id; repeat to mark several at once
        #[arg(long, required = true)]
        id: Vec<String>,
        #[arg(long)]
        unsent: bool,
    },
    /// List sent warnings
    History {
        #[arg(long)]
        program: Vec<String>,
        #[arg(long)]
        group: Vec<String>,
        #[arg(long)]
        subject: Vec<String>,
        #[arg(long)]
        student: Vec<String>,
    },
    /// Show the configured subject hours
    Hours {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        program: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>, settings: &Settings) -> anyhow::Result<ProgramHoursConfig> {
    let path = path.unwrap_or(&settings.hours_config);
    ProgramHoursConfig::load(path)
        .with_context(|| format!("cannot use hours config {}", path.display()))
}

fn evaluate_export(source: &Source, settings: &Settings) -> anyhow::Result<(usize, Evaluation)> {
    let config = load_config(source.config.as_ref(), settings)?;
    let events = import::read_events(&source.csv)?;
    Ok((events.len(), risk::evaluate(&events, &config)))
}

async fn history_store(settings: &Settings) -> anyhow::Result<PgHistoryStore> {
    let database_url = settings
        .database_url()
        .context("DATABASE_URL must be set to reach the notification history")?;
    let pool = db::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(PgHistoryStore::new(pool))
}

fn find_warning<'a>(warnings: &'a [WarningRecord], id: &str) -> anyhow::Result<&'a WarningRecord> {
    warnings
        .iter()
        .find(|warning| warning.warning_id() == id)
        .with_context(|| format!("no warning with id {id:?} in this export"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_early_warning=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::InitDb => {
            let database_url = settings.database_url()?;
            let pool = db::connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Scan {
            source,
            group,
            student,
            subject,
            limit,
        } => {
            let (_, evaluation) = evaluate_export(&source, &settings)?;
            if evaluation.warnings.is_empty() {
                println!("No student reached 15% of absences.");
                return Ok(());
            }

            let store = history_store(&settings).await?;
            let stored = store.load_all().await?;
            let mut tracked = history::attach_status(evaluation.warnings, &stored);
            report::sort_by_severity(&mut tracked);

            let filter = HistoryFilter {
                groups: group,
                students: student,
                subjects: subject,
                ..HistoryFilter::default()
            };
            let shown: Vec<_> = tracked
                .iter()
                .filter(|item| filter.admits_warning(&item.warning))
                .collect();

            println!("Showing {} of {} warnings:", shown.len().min(limit), tracked.len());
            for item in shown.into_iter().take(limit) {
                let warning = &item.warning;
                println!(
                    "- [{}] {} ({}, {}) {}: {} of {} h, {}",
                    warning.tier,
                    warning.student,
                    warning.group,
                    warning.program,
                    warning.subject_label(),
                    warning.percentage_label(),
                    format_hours(warning.total_hours),
                    report::status_label(item)
                );
                println!("  id: {}", item.id);
            }
        }
        Commands::Report {
            source,
            out,
            export,
        } => {
            let (event_count, evaluation) = evaluate_export(&source, &settings)?;
            let stored = if evaluation.warnings.is_empty() {
                history::History::new()
            } else {
                history_store(&settings).await?.load_all().await?
            };
            let tracked = history::attach_status(evaluation.warnings, &stored);

            let report = report::build_report(
                Local::now().date_naive(),
                &source.csv.display().to_string(),
                event_count,
                &tracked,
                &evaluation.summary,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = export {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report::write_warnings_csv(file, &tracked)?;
                println!("Warnings exported to {}.", path.display());
            }
        }
        Commands::Email { source, id } => {
            let (_, evaluation) = evaluate_export(&source, &settings)?;
            let warning = find_warning(&evaluation.warnings, &id)?;
            let message = email::compose(warning).context("warning has no tier")?;

            println!("Subject: {}", message.subject);
            println!();
            println!("{}", message.body);
            println!();
            println!("{}", email::gmail_compose_link(&message));
        }
        Commands::Mark {
            source,
            id,
            unsent,
        } => {
            let (_, evaluation) = evaluate_export(&source, &settings)?;
            let mut warnings = Vec::with_capacity(id.len());
            for id in &id {
                warnings.push(find_warning(&evaluation.warnings, id)?.clone());
            }
            let store = history_store(&settings).await?;

            let notified = !unsent;
            let written =
                history::mark_many(&store, &warnings, notified, Local::now().naive_local()).await?;
            let status = if notified { "sent" } else { "not sent" };
            for warning in &warnings {
                let id = warning.warning_id();
                if !written.contains_key(&id) {
                    println!("{id} already marked as {status}.");
                    continue;
                }
                println!("{id} marked as {status}.");
                if notified {
                    if let Some(message) = email::compose(warning) {
                        println!("{}", email::gmail_compose_link(&message));
                    }
                }
            }
        }
        Commands::History {
            program,
            group,
            subject,
            student,
        } => {
            let store = history_store(&settings).await?;
            let stored = store.load_all().await?;
            let filter = HistoryFilter {
                programs: program,
                groups: group,
                subjects: subject,
                students: student,
            };
            let entries = history::sent_history(&stored, &filter);

            if entries.is_empty() {
                println!("No warnings marked as sent.");
                return Ok(());
            }

            println!("Total sent: {}", entries.len());
            for entry in entries {
                let record = &entry.record;
                println!(
                    "- {} {} ({}, {}) {}: {} [{}]",
                    record
                        .last_update
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record.student,
                    record.group,
                    record.program,
                    record.subject,
                    record.percentage,
                    record.tier.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Hours { config, program } => {
            let config = load_config(config.as_ref(), &settings)?;
            match program {
                Some(program) => match config.program_hours(&program) {
                    Some(table) if !table.is_empty() => {
                        println!("{program}:");
                        for (subject, hours) in table {
                            println!("- {subject}: {} h", format_hours(*hours));
                        }
                    }
                    _ => println!("{program} has no hours defined."),
                },
                None => {
                    for id in config.program_ids() {
                        let table = config.program_hours(id).map(|t| (t.len(), t.values().sum::<f64>()));
                        let (subjects, total) = table.unwrap_or((0, 0.0));
                        println!("- {id}: {subjects} subjects, {} h", format_hours(total));
                    }
                }
            }
        }
    }

    Ok(())
}
