use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use medicipher::app_state::{AnalysisOutcome, AppState};
use medicipher::config::{self, Config};
use medicipher::expiry::{apply_expiry_alerts, ExpiryNotice, ExpiryTracker};
use medicipher::models::{
    GeoPoint, Language, PrescriptionAnalysis, TrackedMedicine, TrackedMedicineEntry,
};
use medicipher::pipeline::{AnalysisRequest, ImageSource, PrescriptionAnalyzer};
use medicipher::tips;

#[derive(Parser, Debug)]
#[command(name = "medicipher", about = "Decipher handwritten prescriptions", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a prescription image and print the result as JSON.
    Analyze(AnalyzeArgs),
    /// List pharmacies and hospitals near a location.
    Facilities(FacilitiesArgs),
    /// Manage the medicines tracked for expiry.
    Track {
        #[command(subcommand)]
        action: TrackAction,
    },
    /// Print the health tip of the day.
    Tip {
        /// Pick a random tip instead.
        #[arg(long)]
        random: bool,
    },
}

#[derive(Args, Debug)]
struct LocationArgs {
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
}

impl LocationArgs {
    fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lng?))
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Display language code (en, hi, bn, ta, ...).
    #[arg(long = "lang", default_value = "en")]
    language: Language,

    #[command(flatten)]
    location: LocationArgs,

    /// Extra medicine to cross-check, as NAME=YYYY-MM-DD. Repeatable.
    #[arg(long = "check", value_name = "NAME=DATE", value_parser = parse_check)]
    checks: Vec<TrackedMedicine>,

    /// Do not include the tracked medicines from the local store.
    #[arg(long)]
    no_tracked: bool,
}

#[derive(Args, Debug)]
struct FacilitiesArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    lng: f64,

    #[arg(long = "lang", default_value = "en")]
    language: Language,
}

#[derive(Subcommand, Debug)]
enum TrackAction {
    /// Record a medicine and its expiry date.
    Add {
        name: String,
        /// Expiry date, YYYY-MM-DD.
        #[arg(long, value_parser = parse_date)]
        expires: NaiveDate,
    },
    /// List tracked medicines with their status as of today.
    List,
    /// Stop tracking a medicine.
    Remove { id: Uuid },
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    analysis: &'a PrescriptionAnalysis,
    tip: &'static str,
}

#[derive(Serialize)]
struct AddOutput<'a> {
    entry: &'a TrackedMedicineEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'a ExpiryNotice>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{raw}': {e}"))
}

fn parse_check(raw: &str) -> Result<TrackedMedicine, String> {
    let (name, date) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=YYYY-MM-DD, got '{raw}'"))?;
    if name.trim().is_empty() {
        return Err(format!("missing medicine name in '{raw}'"));
    }
    Ok(TrackedMedicine::new(name.trim(), parse_date(date)?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

fn open_tracker(data_dir: PathBuf) -> Result<ExpiryTracker> {
    let path = data_dir.join(format!("{}.json", config::TRACKED_MEDICINES_KEY));
    ExpiryTracker::open(path.clone())
        .with_context(|| format!("Failed to open tracking store {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    medicipher::init_tracing();

    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Command::Analyze(args) => analyze(args).await,
        Command::Facilities(args) => facilities(args).await,
        Command::Track { action } => track(action),
        Command::Tip { random } => {
            let tip = if random {
                tips::health_tip()
            } else {
                tips::health_tip_for(Local::now().date_naive())
            };
            println!("{tip}");
            Ok(())
        }
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    let analyzer = PrescriptionAnalyzer::from_config(&config).context("Failed to set up client")?;
    let today = Local::now().date_naive();

    let mut tracked = if args.no_tracked {
        Vec::new()
    } else {
        open_tracker(config.data_dir.clone())?.as_tracked_medicines()
    };
    tracked.extend(args.checks);

    let state = Arc::new(AppState::new());
    state.set_language(args.language);

    let source = ImageSource::File(args.image);
    let language = args.language;
    let location = args.location.point();
    let request_tracked = tracked.clone();

    let ticket = state.begin_analysis();
    let task_state = Arc::clone(&state);
    let handle = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze_source(&source, today, |image| {
            AnalysisRequest::new(image, language)
                .with_location(location)
                .with_tracked_medicines(request_tracked)
        });
        task_state.complete(ticket, result)
    });

    tokio::select! {
        joined = handle => {
            joined.context("Analysis task panicked")?;
        }
        _ = tokio::signal::ctrl_c() => {
            // Exiting abandons the blocking call along with its result.
            eprintln!("Cancelled.");
            std::process::exit(130);
        }
    }

    match state.last_outcome() {
        Some(AnalysisOutcome::Success(mut analysis)) => {
            apply_expiry_alerts(&mut analysis, &tracked, today);
            print_json(&AnalyzeOutput {
                analysis: &analysis,
                tip: tips::health_tip_for(today),
            })
        }
        Some(AnalysisOutcome::Failure(failure)) => Err(failure.into()),
        None => bail!("Analysis result was discarded"),
    }
}

async fn facilities(args: FacilitiesArgs) -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    let analyzer = PrescriptionAnalyzer::from_config(&config).context("Failed to set up client")?;
    let point = GeoPoint::new(args.lat, args.lng);
    let language = args.language;

    let handle = tokio::task::spawn_blocking(move || analyzer.lookup_facilities(point, language));
    tokio::select! {
        joined = handle => {
            let facilities = joined.context("Lookup task panicked")??;
            print_json(&facilities)
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelled.");
            std::process::exit(130);
        }
    }
}

fn track(action: TrackAction) -> Result<()> {
    let mut tracker = open_tracker(config::data_dir_from_env())?;
    let today = Local::now().date_naive();

    match action {
        TrackAction::Add { name, expires } => {
            let (entry, notice) = tracker
                .add(&name, expires, today)
                .context("Failed to record medicine")?;
            if let Some(notice) = &notice {
                eprintln!("{}", notice.message);
            }
            print_json(&AddOutput {
                entry: &entry,
                notice: notice.as_ref(),
            })
        }
        TrackAction::List => {
            tracker.refresh(today).context("Failed to refresh statuses")?;
            print_json(&tracker.entries_as_of(today))
        }
        TrackAction::Remove { id } => {
            let removed = tracker.remove(id).context("Failed to remove medicine")?;
            print_json(&removed)
        }
    }
}
