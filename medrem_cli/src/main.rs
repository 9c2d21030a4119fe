use chrono::{Duration, Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use medrem_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "medrem")]
#[command(about = "Medication reminder and dose log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat this as the current time ("YYYY-MM-DD HH:MM")
    #[arg(long, global = true, value_parser = parse_datetime)]
    now: Option<NaiveDateTime>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage medicines
    Medicine {
        #[command(subcommand)]
        action: MedicineCommand,
    },

    /// Manage reminders
    Reminder {
        #[command(subcommand)]
        action: ReminderCommand,
    },

    /// Show upcoming doses and today's tally (default)
    Next,

    /// Log a dose of a reminder as taken now
    Take {
        /// Reminder id or unique prefix
        reminder: String,
    },

    /// Log a dose of a reminder as missed now
    Miss {
        /// Reminder id or unique prefix
        reminder: String,
    },

    /// Flip a logged dose between taken and missed (once)
    Undo {
        /// Dose record id or unique prefix
        record: String,
    },

    /// Show logged doses
    History {
        /// How many days back to show
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Also write the shown records to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Delete old dose records
    Purge {
        /// Age cutoff in days (defaults to history.retention_days)
        #[arg(long)]
        older_than_days: Option<u32>,
    },

    /// Export all data to a JSON file
    Export { path: PathBuf },

    /// Import data from a JSON export
    Import {
        path: PathBuf,

        /// Replace existing data instead of merging
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Subcommand)]
enum MedicineCommand {
    /// Add a medicine
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        dosage: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List medicines
    List,

    /// Remove a medicine no reminder uses
    Remove { id: String },
}

#[derive(Subcommand)]
enum ReminderCommand {
    /// Add a reminder for one or more medicines
    ///
    /// Without --every-days the reminder fires every day, --times times,
    /// --every-hours apart.
    Add {
        /// Medicine id or unique prefix (repeatable)
        #[arg(long = "medicine", required = true)]
        medicines: Vec<String>,

        /// First dose ("YYYY-MM-DD HH:MM"); its clock time anchors every dose
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,

        /// Doses per day
        #[arg(long)]
        times: Option<u32>,

        /// Hours between doses on the same day
        #[arg(long)]
        every_hours: Option<u32>,

        /// One dose every N days
        #[arg(long, conflicts_with_all = ["times", "every_hours"])]
        every_days: Option<u32>,
    },

    /// List reminders
    List,

    /// Stop a reminder from producing doses
    Pause { id: String },

    /// Re-enable a paused reminder
    Resume { id: String },

    /// Delete a reminder
    Remove { id: String },
}

/// Resolved paths and settings shared by every command
struct Context {
    config: Config,
    registry_path: PathBuf,
    records_path: PathBuf,
    now: NaiveDateTime,
}

impl Context {
    fn fmt_time(&self, time: NaiveDateTime) -> String {
        time.format(&self.config.display.time_format).to_string()
    }
}

fn main() -> Result<()> {
    medrem_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());

    let ctx = Context {
        registry_path: medrem_core::config::registry_path(&data_dir),
        records_path: medrem_core::config::records_path(&data_dir),
        now: cli.now.unwrap_or_else(|| Local::now().naive_local()),
        config,
    };
    tracing::debug!("Using data dir {:?} at {}", data_dir, ctx.now);

    match cli.command.unwrap_or(Commands::Next) {
        Commands::Medicine { action } => cmd_medicine(&ctx, action),
        Commands::Reminder { action } => cmd_reminder(&ctx, action),
        Commands::Next => cmd_next(&ctx),
        Commands::Take { reminder } => cmd_log_dose(&ctx, &reminder, true),
        Commands::Miss { reminder } => cmd_log_dose(&ctx, &reminder, false),
        Commands::Undo { record } => cmd_undo(&ctx, &record),
        Commands::History { days, csv } => cmd_history(&ctx, days, csv.as_deref()),
        Commands::Purge { older_than_days } => cmd_purge(&ctx, older_than_days),
        Commands::Export { path } => cmd_export(&ctx, &path),
        Commands::Import { path, overwrite } => cmd_import(&ctx, &path, overwrite),
    }
}

fn cmd_medicine(ctx: &Context, action: MedicineCommand) -> Result<()> {
    match action {
        MedicineCommand::Add {
            name,
            dosage,
            description,
        } => {
            let mut medicine = Medicine::new(name, dosage);
            medicine.description = description;
            let label = format!("{} ({})", medicine.name, medicine.dosage);

            let id = Registry::update(&ctx.registry_path, |r| r.add_medicine(medicine))?;
            println!("✓ Added medicine {}", label);
            println!("  id: {}", id);
        }

        MedicineCommand::List => {
            let registry = Registry::load(&ctx.registry_path)?;
            if registry.medicines.is_empty() {
                println!("No medicines yet.");
                return Ok(());
            }
            for medicine in &registry.medicines {
                let used_by = registry.reminders_for_medicine(medicine.id).count();
                println!(
                    "  {}  {} ({})  reminders: {}",
                    short_id(medicine.id),
                    medicine.name,
                    medicine.dosage,
                    used_by
                );
                if let Some(ref description) = medicine.description {
                    println!("            {}", description);
                }
            }
        }

        MedicineCommand::Remove { id } => {
            let removed = Registry::update(&ctx.registry_path, |r| {
                let id = r.find_medicine(&id)?.id;
                r.remove_medicine(id)
            })?;
            println!("✓ Removed medicine {}", removed.name);
        }
    }
    Ok(())
}

fn cmd_reminder(ctx: &Context, action: ReminderCommand) -> Result<()> {
    match action {
        ReminderCommand::Add {
            medicines,
            start,
            times,
            every_hours,
            every_days,
        } => {
            let rule = match every_days {
                Some(days) => RecurrenceRule::every_days(start, days),
                None => RecurrenceRule::times_per_day(
                    start,
                    times.unwrap_or(1),
                    every_hours.unwrap_or(0),
                ),
            };

            let reminder = Registry::update(&ctx.registry_path, |r| {
                let medicine_ids = medicines
                    .iter()
                    .map(|m| r.find_medicine(m).map(|found| found.id))
                    .collect::<Result<Vec<_>>>()?;
                let reminder = Reminder::new(medicine_ids, rule);
                r.add_reminder(reminder.clone())?;
                Ok(reminder)
            })?;

            println!("✓ Added reminder: {}", reminder.rule.describe());
            println!("  id: {}", reminder.id);
            if let Some(alert) = next_alert_after(&reminder.rule, ctx.now) {
                println!("  First alert: {}", ctx.fmt_time(alert));
            }
        }

        ReminderCommand::List => {
            let registry = Registry::load(&ctx.registry_path)?;
            if registry.reminders.is_empty() {
                println!("No reminders yet.");
                return Ok(());
            }
            for reminder in &registry.reminders {
                let status = if reminder.is_active() { "active" } else { "paused" };
                println!(
                    "  {}  [{}] {}",
                    short_id(reminder.id),
                    status,
                    reminder.rule.describe()
                );
                println!(
                    "            {}",
                    medicine_names(&registry.medicines_by_ids(&reminder.medicine_ids))
                );
                if let Some(alert) = next_alert_after(&reminder.rule, ctx.now) {
                    println!("            next alert: {}", ctx.fmt_time(alert));
                }
            }
        }

        ReminderCommand::Pause { id } => set_active(ctx, &id, false)?,
        ReminderCommand::Resume { id } => set_active(ctx, &id, true)?,

        ReminderCommand::Remove { id } => {
            let removed = Registry::update(&ctx.registry_path, |r| {
                let id = r.find_reminder(&id)?.id;
                r.remove_reminder(id)
            })?;
            println!("✓ Removed reminder {}", short_id(removed.id));
        }
    }
    Ok(())
}

fn set_active(ctx: &Context, id: &str, active: bool) -> Result<()> {
    let id = Registry::update(&ctx.registry_path, |r| {
        let id = r.find_reminder(id)?.id;
        r.set_reminder_active(id, active)?;
        Ok(id)
    })?;
    println!(
        "✓ Reminder {} {}",
        short_id(id),
        if active { "resumed" } else { "paused" }
    );
    Ok(())
}

fn cmd_next(ctx: &Context) -> Result<()> {
    let registry = Registry::load(&ctx.registry_path)?;
    let records = records::read_records(&ctx.records_path)?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  NEXT DOSES");
    println!("╰─────────────────────────────────────────╯");
    println!();

    let upcoming = upcoming_doses(&registry, &records, ctx.now);
    if upcoming.is_empty() {
        println!("  No active reminders.");
    }

    for dose in &upcoming {
        println!(
            "  {}  {}",
            ctx.fmt_time(dose.occurrence.time),
            medicine_names(&dose.medicines)
        );
        let alert = registry
            .reminder(dose.occurrence.reminder_id)
            .and_then(|r| next_alert_after(&r.rule, ctx.now));
        match alert {
            Some(alert) => println!(
                "      reminder {}  next alert {}",
                short_id(dose.occurrence.reminder_id),
                ctx.fmt_time(alert)
            ),
            None => println!("      reminder {}", short_id(dose.occurrence.reminder_id)),
        }
    }

    println!();
    println!(
        "  Today: {} taken, {} missed",
        history::taken_count_today(&records, ctx.now),
        history::missed_count_today(&records, ctx.now)
    );
    println!();
    Ok(())
}

fn cmd_log_dose(ctx: &Context, reminder_id: &str, taken: bool) -> Result<()> {
    let registry = Registry::load(&ctx.registry_path)?;
    let reminder = registry.find_reminder(reminder_id)?;

    let record = DoseRecord::new(reminder, ctx.now, taken);
    let mut log = JsonlRecordLog::new(&ctx.records_path);
    log.append(&record)?;

    println!(
        "✓ Dose logged as {} at {}",
        if taken { "taken" } else { "missed" },
        ctx.fmt_time(record.time)
    );
    println!("  record: {}", record.id);

    let logged = records::read_records(&ctx.records_path)?;
    let last_taken = history::last_taken_time(&logged, reminder.id);
    if let Some(next) = next_dose(reminder, last_taken, ctx.now) {
        println!("  Next dose: {}", ctx.fmt_time(next.time));
    }
    Ok(())
}

fn cmd_undo(ctx: &Context, record_id: &str) -> Result<()> {
    let all = records::read_records(&ctx.records_path)?;
    let id = records::find_record(&all, record_id)?.id;

    let record = records::toggle_taken(&ctx.records_path, id)?;
    println!(
        "✓ Dose at {} now marked as {}",
        ctx.fmt_time(record.time),
        if record.taken { "taken" } else { "missed" }
    );
    Ok(())
}

fn cmd_history(ctx: &Context, days: u32, csv_path: Option<&Path>) -> Result<()> {
    let registry = Registry::load(&ctx.registry_path)?;
    let all = records::read_records(&ctx.records_path)?;
    let recent = history::recent_records(&all, ctx.now, days);

    if recent.is_empty() {
        println!("No doses logged in the last {} days.", days);
    }
    for record in &recent {
        println!(
            "  {}  {:<6}  {}  ({})",
            ctx.fmt_time(record.time),
            if record.taken { "taken" } else { "missed" },
            medicine_names(&registry.medicines_by_ids(&record.medicine_ids)),
            short_id(record.id)
        );
    }

    if let Some(path) = csv_path {
        let count = csv_export::write_csv(path, &recent)?;
        println!("✓ Wrote {} records to {}", count, path.display());
    }
    Ok(())
}

fn cmd_purge(ctx: &Context, older_than_days: Option<u32>) -> Result<()> {
    let days = older_than_days.unwrap_or(ctx.config.history.retention_days);
    let cutoff = ctx
        .now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDateTime::MIN);

    let removed = records::delete_before(&ctx.records_path, cutoff)?;
    println!("✓ Purged {} records older than {} days", removed, days);
    Ok(())
}

fn cmd_export(ctx: &Context, path: &Path) -> Result<()> {
    let data = exchange::export_to(&ctx.registry_path, &ctx.records_path, path)?;
    println!(
        "✓ Exported {} medicines, {} reminders, {} records",
        data.medicines.len(),
        data.reminders.len(),
        data.records.len()
    );
    println!("  File: {}", path.display());
    Ok(())
}

fn cmd_import(ctx: &Context, path: &Path, overwrite: bool) -> Result<()> {
    let summary = exchange::import_from(path, &ctx.registry_path, &ctx.records_path, overwrite)?;
    println!(
        "✓ Imported {} medicines, {} reminders, {} records",
        summary.medicines, summary.reminders, summary.records
    );
    Ok(())
}

fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
        .ok_or_else(|| format!("expected \"YYYY-MM-DD HH:MM\", got {:?}", s))
}

fn short_id(id: uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn medicine_names(medicines: &[Medicine]) -> String {
    if medicines.is_empty() {
        return "(no medicines)".into();
    }
    medicines
        .iter()
        .map(|m| format!("{} ({})", m.name, m.dosage))
        .collect::<Vec<_>>()
        .join(", ")
}
