use std::fmt;
use std::sync::Arc;

use speak_core::Clock;
use speak_core::model::{
    AxisScores, Difficulty, PhonemeScore, PracticeItem, PracticeMode, ReadAloudItem,
    WordErrorKind, WordResult,
};
use services::{PracticeHistoryService, PracticeService};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--limit <n>]");
    eprintln!("  cargo run -p app -- seed    [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!("  --limit 20");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SPEAK_DB_URL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    History,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "history" => Some(Self::History),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("SPEAK_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut limit = 20_u32;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, limit })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn seed_items() -> Result<Vec<PracticeItem>, Box<dyn std::error::Error>> {
    Ok(vec![
        PracticeItem::ReadAloud(ReadAloudItem::new(
            "The weather this morning is colder than they thought.",
            "weather",
            vec!["ð".into(), "θ".into()],
            vec!["keep your tongue between your teeth for th".into()],
        )?),
        PracticeItem::ReadAloud(ReadAloudItem::new(
            "Thirty birds gathered on the wire at dawn.",
            "animals",
            vec!["θ".into(), "ɜː".into()],
            vec![],
        )?),
    ])
}

fn seed_words(quality: f64) -> Result<Vec<WordResult>, Box<dyn std::error::Error>> {
    let the_accuracy = quality - 15.0;
    Ok(vec![
        WordResult::new(
            "the",
            the_accuracy >= 70.0,
            the_accuracy,
            WordErrorKind::Mispronunciation,
            vec![PhonemeScore::new("ð", quality - 20.0)?],
        )?,
        WordResult::new(
            "weather",
            true,
            quality,
            WordErrorKind::None,
            vec![PhonemeScore::new("ð", quality - 10.0)?],
        )?,
        WordResult::new("morning", true, quality + 5.0, WordErrorKind::None, vec![])?,
    ])
}

/// Walk one sample session through the full stack so a fresh database has
/// something to show in `history`.
async fn run_seed(practice: &PracticeService) -> Result<(), Box<dyn std::error::Error>> {
    let session = practice
        .start_session(PracticeMode::ReadAloud, Difficulty::Intermediate, seed_items()?)
        .await?;

    for (item_index, quality) in [(0, 72.0), (0, 81.0), (1, 64.0)] {
        practice
            .record_attempt(
                session.id(),
                item_index,
                "the weather this morning is colder than they thought".into(),
                AxisScores::new(
                    Some(quality),
                    Some(quality - 6.0),
                    Some(95.0),
                    Some(quality - 12.0),
                    None,
                )?,
                seed_words(quality)?,
            )
            .await?;
    }

    let summary = practice.complete_session(session.id()).await?;

    println!("seeded session {}", session.id());
    println!(
        "  attempts: {}  overall: {:.1}  best: {:.1}  worst: {:.1}",
        summary.total_attempts(),
        summary.overall_avg(),
        summary.best_score(),
        summary.worst_score()
    );
    println!("  weak words: {}", summary.weak_words().join(", "));
    for weak in summary.weak_phonemes() {
        println!(
            "  weak phoneme {} ({:.1}, seen {}x in {})",
            weak.phoneme,
            weak.score,
            weak.occurrences,
            weak.example_words.join(", ")
        );
    }

    Ok(())
}

async fn run_history(
    history: &PracticeHistoryService,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let overviews = history.list_recent(limit).await?;
    if overviews.is_empty() {
        println!("no sessions yet (try: cargo run -p app -- seed)");
        return Ok(());
    }

    for overview in overviews {
        let rollup = match (overview.total_attempts, overview.overall_avg) {
            (Some(attempts), Some(avg)) => format!("{attempts} attempts, avg {avg:.1}"),
            _ => "-".into(),
        };
        println!(
            "#{}  {}  {}  {}  items={}  {}",
            overview.id,
            overview.created_at.format("%Y-%m-%d %H:%M"),
            overview.mode.as_str(),
            overview.status.as_str(),
            overview.item_count,
            rollup
        );
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: show history when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::History,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::History,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, "storage ready");

    let clock = Clock::system();
    let practice = PracticeService::new(
        clock,
        Arc::clone(&storage.sessions),
        Arc::clone(&storage.attempts),
    );
    let history = PracticeHistoryService::new(Arc::clone(&storage.sessions));

    match cmd {
        Command::History => run_history(&history, parsed.limit).await,
        Command::Seed => run_seed(&practice).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
