// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use worktime_core::bonus::{net_revenue, settle, BonusScheme};
use worktime_core::clock::round_hours;
use worktime_core::config::AppConfig;
use worktime_core::holidays::holidays_in_year;
use worktime_core::scenario::{import_entries, load_entries_csv, Scenario};
use worktime_core::{
    effective_pause_minutes, required_pause_minutes, Confirmations, EntryForm, FederalState,
    Resolution, StatusCode, WorkTimeService,
};

#[derive(Parser)]
#[command(name = "worktime")]
#[command(version = "0.1.0")]
#[command(about = "Checks working time against shift plans and computes balances and bonuses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Required break for a number of worked hours
    Pause {
        #[arg(long)]
        hours: Decimal,
        /// Employer minimum applied once a legal break is due
        #[arg(long)]
        under6: Option<u32>,
    },
    /// Validate an entry form against a scenario without saving
    Validate {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long)]
        form: PathBuf,
        #[arg(long)]
        confirm_meal: bool,
    },
    /// Validate, save and recompute
    Submit {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long)]
        form: PathBuf,
        #[arg(long)]
        confirm_meal: bool,
        /// Resolve a plan deviation: `revert` or a status code such as `KR`
        #[arg(long)]
        resolve: Option<String>,
    },
    /// Monthly report with day rows, totals and gaps
    Month {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long)]
        employee: i64,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Extra history in entry-form CSV format
        #[arg(long)]
        entries_csv: Option<PathBuf>,
    },
    /// Bonus for one period
    Bonus {
        /// Gross revenue including VAT
        #[arg(long)]
        gross: Decimal,
        #[arg(long)]
        scheme: PathBuf,
        /// Carryover from the previous month
        #[arg(long, default_value = "0")]
        carry: Decimal,
        #[arg(long)]
        payout: Option<Decimal>,
    },
    /// Public holidays of a year
    Holidays {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        region: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Serializing output failed")?
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading {} failed", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Parsing {} failed", path.display()))
}

fn parse_resolution(raw: &str) -> Result<Resolution> {
    if raw.trim().eq_ignore_ascii_case("revert") {
        return Ok(Resolution::RevertToPlan);
    }
    match StatusCode::parse(raw) {
        Ok(code) => Ok(Resolution::Reclassify(code)),
        Err(reason) => bail!("Invalid resolution '{}': {}", raw, reason),
    }
}

fn main() -> Result<()> {
    // --- Setup ---
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!("Loaded configuration: {:?}", config);

    let cli = Cli::parse();
    match cli.command {
        Commands::Pause { hours, under6 } => {
            let under6 = under6.or(config.mandatory_pause_under6);
            print_json(&serde_json::json!({
                "hours": round_hours(hours),
                "legalMinutes": required_pause_minutes(hours),
                "requiredMinutes": effective_pause_minutes(hours, under6),
            }))?;
        }
        Commands::Validate {
            scenario,
            form,
            confirm_meal,
        } => {
            let store = Scenario::load(&scenario)?.into_store(config.default_profile()?)?;
            let service = WorkTimeService::new(store);
            let form: EntryForm = read_json(&form)?;
            let check = service.validate_form(
                &form,
                Confirmations {
                    meal_without_pause: confirm_meal,
                },
            )?;
            print_json(&check)?;
        }
        Commands::Submit {
            scenario,
            form,
            confirm_meal,
            resolve,
        } => {
            let store = Scenario::load(&scenario)?.into_store(config.default_profile()?)?;
            let mut service = WorkTimeService::new(store);
            let form: EntryForm = read_json(&form)?;
            let confirmations = Confirmations {
                meal_without_pause: confirm_meal,
            };
            let outcome = match resolve.as_deref() {
                Some(raw) => service.submit_with_resolution(&form, parse_resolution(raw)?, confirmations),
                None => service.submit_entry(&form, confirmations),
            };
            match outcome {
                Ok(outcome) => {
                    print_json(&outcome.to_operation_result())?;
                    print_json(&outcome)?;
                }
                Err(err) => print_json(&worktime_core::OperationResult::from(&err))?,
            }
        }
        Commands::Month {
            scenario,
            employee,
            year,
            month,
            entries_csv,
        } => {
            let mut store = Scenario::load(&scenario)?.into_store(config.default_profile()?)?;
            if let Some(path) = entries_csv {
                let entries = load_entries_csv(&path)?;
                let count = entries.len();
                let warnings = import_entries(&mut store, entries)?;
                info!("Imported {} entries from {}", count, path.display());
                for warning in warnings {
                    warn!("Import: {}", warning);
                }
            }
            let service = WorkTimeService::new(store);
            let report = service.recompute_month(employee, year, month)?;
            print_json(&report)?;
        }
        Commands::Bonus {
            gross,
            scheme,
            carry,
            payout,
        } => {
            let scheme: BonusScheme = read_json(&scheme)?;
            let computation = scheme.compute(net_revenue(gross));
            let settlement = settle(computation.bonus, carry, payout);
            print_json(&serde_json::json!({
                "computation": computation,
                "settlement": settlement,
            }))?;
        }
        Commands::Holidays { year, region } => {
            let region: FederalState = match region {
                Some(raw) => raw.parse()?,
                None => config.region()?,
            };
            let days: Vec<_> = holidays_in_year(year, region)
                .into_iter()
                .map(|(date, name)| serde_json::json!({ "date": date, "name": name }))
                .collect();
            print_json(&days)?;
        }
    }
    Ok(())
}
