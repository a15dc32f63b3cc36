//! ipqc - IPQC checksheet command-line client
//!
//! Creates, edits, checks and exports in-process quality control
//! checksheets stored on the audit-record backend.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ipqc_cli::report::write_report;
use ipqc_cli::{AuditClient, Opened, SessionSync};
use ipqc_common::catalog;
use ipqc_common::config::{ConfigOverrides, Settings};
use ipqc_common::record::BasicField;
use ipqc_common::session::Session;
use ipqc_common::stage::build_all_stages;
use ipqc_common::validation::assess_record;
use ipqc_common::{AuditRecord, ObservationValue, ProductionLine, StageConfigRegistry};

/// Command-line arguments for ipqc
#[derive(Parser, Debug)]
#[command(name = "ipqc")]
#[command(about = "In-process quality control checksheet client")]
#[command(version)]
struct Args {
    /// Base URL of the audit-record backend
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Config file (default: ~/.config/ipqc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the stage catalog, with slot keys when a line is given
    Stages {
        #[arg(long)]
        line: Option<ProductionLine>,
        /// Only this stage
        #[arg(long)]
        stage: Option<u32>,
    },

    /// Start a checksheet, or resume the one stored for the same line, date and shift
    New {
        #[arg(long)]
        line: ProductionLine,
        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        shift: String,
        #[arg(long)]
        production_order: String,
        #[arg(long)]
        module_type: String,
        #[arg(long)]
        customer_specific: bool,
        #[arg(long)]
        trial_production: bool,
    },

    /// Print a stored checksheet
    Show {
        id: String,
        /// Full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored checksheets
    List,

    /// Record one observation and save the stage
    Set {
        id: String,
        #[arg(long)]
        stage: u32,
        #[arg(long)]
        param: String,
        #[arg(long)]
        slot: String,
        /// Field path inside the slot, '/'-separated (e.g. "Stringer-3/Unit A")
        #[arg(long)]
        field: Option<String>,
        value: String,
    },

    /// Move a stored checksheet to another production line
    ChangeLine {
        id: String,
        #[arg(long)]
        line: ProductionLine,
    },

    /// List readings outside their acceptance criteria
    Check { id: String },

    /// Delete a stored checksheet
    Delete { id: String },

    /// Download the spreadsheet report of a stored checksheet
    Report {
        id: String,
        /// Output file (default: report directory from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::resolve(&ConfigOverrides {
        config_path: args.config.clone(),
        backend_url: args.backend_url.clone(),
        log_level: args.log_level.clone(),
    })
    .context("Failed to load configuration")?;

    init_tracing(&settings)?;
    debug!(backend = %settings.backend_url, "Resolved settings");

    let registry = StageConfigRegistry::builtin();

    let client = AuditClient::new(&settings.backend_url, settings.request_timeout)
        .context("Failed to create backend client")?;
    run(args.command, &client, registry, &settings).await
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));

    let file_layer = match &settings.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(
    command: Command,
    client: &AuditClient,
    registry: &StageConfigRegistry,
    settings: &Settings,
) -> Result<()> {
    let sync = SessionSync::new(client);

    match command {
        Command::Stages { line, stage } => print_stages(registry, line, stage)?,

        Command::New {
            line,
            date,
            shift,
            production_order,
            module_type,
            customer_specific,
            trial_production,
        } => {
            let mut session = Session::new(registry);
            let date = date.unwrap_or_else(ipqc_common::time::today);
            session.set_line(line)?;
            session.set_basic_field(BasicField::Date, &date)?;
            session.set_basic_field(BasicField::Shift, &shift)?;
            session.set_basic_field(BasicField::ProductionOrderNo, &production_order)?;
            session.set_basic_field(BasicField::ModuleType, &module_type)?;
            session.set_flags(customer_specific, trial_production);

            match sync.resume_or_start(&mut session).await? {
                Opened::Resumed(id) => println!("Existing checksheet {} ({})", id, session.record().display_name()),
                Opened::Started(outcome) => println!("Saved checksheet {} ({})", outcome.id(), session.record().display_name()),
            }
        }

        Command::Show { id, json } => {
            let record = fetch_record(client, &id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_summary(&id, &record);
            }
        }

        Command::List => {
            let audits = client.list(false).await?;
            if audits.is_empty() {
                println!("No checksheets stored");
            }
            for audit in audits {
                println!(
                    "{:>8}  {:<24}  {}",
                    audit.id,
                    audit.timestamp.as_deref().unwrap_or("-"),
                    audit.name
                );
            }
        }

        Command::Set {
            id,
            stage,
            param,
            slot,
            field,
            value,
        } => {
            let mut session = Session::new(registry);
            sync.load(&mut session, &id).await?;
            if session.record().observation(stage, &param, &slot).is_none() {
                bail!("stage {} has no slot '{}' for parameter {}", stage, slot, param);
            }

            session.open_stage(stage)?;
            match field.as_deref() {
                Some(path) => {
                    let path: Vec<&str> = path.split('/').collect();
                    session.edit_field(&param, &slot, &path, &value)?;
                }
                None => {
                    session.edit_slot(&param, &slot, ObservationValue::from(value))?;
                }
            }
            session.save_stage()?;
            sync.save_stored(&mut session, &id).await?;

            if let Some(current) = session.record().observation(stage, &param, &slot) {
                println!("{}", serde_json::to_string_pretty(current)?);
            }
        }

        Command::ChangeLine { id, line } => {
            let mut session = Session::new(registry);
            sync.load(&mut session, &id).await?;
            session.set_line(line)?;
            sync.save_stored(&mut session, &id).await?;
            info!(id = %id, %line, "Checksheet moved to new line");
            println!("Checksheet {} now on line {}", id, line);
        }

        Command::Check { id } => {
            let record = fetch_record(client, &id).await?;
            let findings = assess_record(&record);
            if findings.is_empty() {
                println!("All recorded readings are within criteria");
            }
            for finding in findings {
                let location = std::iter::once(finding.slot_key.as_str())
                    .chain(finding.path.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" / ");
                println!(
                    "{:<6} {:<32} {:?} '{}' (criteria: {})",
                    finding.parameter_id, location, finding.assessment, finding.reading, finding.criteria
                );
            }
        }

        Command::Delete { id } => {
            client.delete(&id).await?;
            println!("Deleted checksheet {}", id);
        }

        Command::Report { id, output } => {
            let record = fetch_record(client, &id).await?;
            let bytes = client.generate_report_for(&id).await?;
            let path = write_report(&record, &bytes, &settings.report_dir, output.as_deref())
                .await
                .context("Failed to write report")?;
            println!("Report written to {}", path.display());
        }
    }

    Ok(())
}

async fn fetch_record(client: &AuditClient, id: &str) -> Result<AuditRecord> {
    let stored = client.fetch(id).await?;
    match stored.data {
        Some(record) => Ok(record),
        None => bail!("stored audit {} has no checksheet data", id),
    }
}

fn print_stages(
    registry: &StageConfigRegistry,
    line: Option<ProductionLine>,
    only: Option<u32>,
) -> Result<()> {
    if let Some(stage_id) = only {
        if catalog::stage_spec(stage_id).is_none() {
            bail!("unknown stage {}", stage_id);
        }
    }

    match line {
        Some(line) => {
            for stage in build_all_stages(registry, line) {
                if only.map_or(false, |id| id != stage.id) {
                    continue;
                }
                println!("{:>2}. {}", stage.id, stage.name);
                for param in &stage.parameters {
                    println!("    {:<6} {} [{}]", param.id, param.label, param.inspection_frequency);
                    println!("           criteria: {}", param.criteria);
                    println!("           slots: {}", param.slot_keys().join(", "));
                    if let Some(err) = &param.shape_error {
                        println!("           error: {}", err);
                    }
                }
            }
        }
        None => {
            for stage in catalog::stage_specs() {
                if only.map_or(false, |id| id != stage.id) {
                    continue;
                }
                println!("{:>2}. {}", stage.id, stage.name);
                for param in stage.parameters {
                    let dependent = if param.is_line_dependent() { " (line-dependent)" } else { "" };
                    println!("    {:<6} {}{}", param.id, param.label, dependent);
                }
            }
        }
    }
    Ok(())
}

fn print_summary(id: &str, record: &AuditRecord) {
    println!("{} [{}]", record.display_name(), id);
    println!("  Production order: {}", record.production_order_no);
    println!("  Module type:      {}", record.module_type);
    println!(
        "  Flags:            customer specific={}, trial production={}",
        record.customer_specific, record.trial_production
    );
    println!(
        "  Signatures:       audit by '{}', reviewed by '{}'",
        record.signatures.audit_by, record.signatures.reviewed_by
    );
    for stage in &record.stages {
        let (filled, total) = stage
            .parameters
            .iter()
            .flat_map(|p| &p.observations)
            .flat_map(|slot| slot.value.leaves())
            .fold((0, 0), |(filled, total), (_, text)| {
                (filled + usize::from(!text.trim().is_empty()), total + 1)
            });
        println!("  {:>2}. {:<36} {:>4}/{:<4}", stage.id, stage.name, filled, total);
    }
}
