use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use assess_core::model::{AssessmentId, FeedbackTiming, SessionSettings, TestMode, UserId};
use assess_core::progress::BankEnvelope;
use services::{AssessmentLoader, ClientConfig, LiveSession, Participant, SyncOutcome};
use storage::repository::Storage;
use storage::sqlite::SqliteRepository;

mod console;

use console::{HELP, Input};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidMode { raw: String },
    InvalidFeedback { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    MissingBackend,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value (multiple-choice|written|mixed): {raw}")
            }
            ArgsError::InvalidFeedback { raw } => {
                write!(f, "invalid --feedback value (immediate|end): {raw}")
            }
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingBackend => {
                write!(f, "no backend: pass --base-url or --db (or set ASSESS_BASE_URL / ASSESS_DB_URL)")
            }
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
    eprintln!("  cargo run -p app -- take --assessment <id> [--base-url <url> | --db <sqlite_url>]");
    eprintln!("                          [--user <id>] [--mode <mode>] [--feedback <timing>]");
    eprintln!("                          [--no-shuffle] [--seed <n>] [--debounce-ms <ms>]");
    eprintln!("  cargo run -p app -- seed --assessment <id> --file <bank.json> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Modes: multiple-choice (mc), written, mixed. Feedback: immediate, end.");
    eprintln!("Without --user the session is anonymous and progress is not saved.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_BASE_URL, ASSESS_DB_URL, ASSESS_USER_ID, ASSESS_SYNC_DEBOUNCE_MS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct TakeArgs {
    config: ClientConfig,
    assessment_id: AssessmentId,
    settings: SessionSettings,
    seed: Option<u64>,
}

#[derive(Debug)]
struct SeedArgs {
    db_url: String,
    assessment_id: AssessmentId,
    file: PathBuf,
}

fn parse_id(flag: &'static str, raw: String) -> Result<String, ArgsError> {
    if raw.trim().is_empty() {
        return Err(ArgsError::InvalidId { flag, raw });
    }
    Ok(raw.trim().to_owned())
}

fn parse_db(raw: String) -> Result<String, ArgsError> {
    if raw.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw });
    }
    Ok(normalize_sqlite_url(raw))
}

impl TakeArgs {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        mut config: ClientConfig,
    ) -> Result<Self, ArgsError> {
        let mut assessment_id = None;
        let mut settings = SessionSettings::default();
        let mut seed = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--assessment" => {
                    let value = require_value(args, "--assessment")?;
                    assessment_id = Some(AssessmentId::new(parse_id("--assessment", value)?));
                }
                "--base-url" => {
                    let value = require_value(args, "--base-url")?;
                    config.base_url = Some(parse_id("--base-url", value)?);
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    config.db_url = Some(parse_db(value)?);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    config.user_id = Some(UserId::new(parse_id("--user", value)?));
                }
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    let mode = value
                        .parse::<TestMode>()
                        .map_err(|_| ArgsError::InvalidMode { raw: value.clone() })?;
                    settings = settings.with_mode(mode);
                }
                "--feedback" => {
                    let value = require_value(args, "--feedback")?;
                    let feedback = value
                        .parse::<FeedbackTiming>()
                        .map_err(|_| ArgsError::InvalidFeedback { raw: value.clone() })?;
                    settings = settings.with_feedback(feedback);
                }
                "--no-shuffle" => settings = settings.with_shuffle_choices(false),
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    seed = Some(value.parse::<u64>().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--seed",
                        raw: value.clone(),
                    })?);
                }
                "--debounce-ms" => {
                    let value = require_value(args, "--debounce-ms")?;
                    let ms = value.parse::<u64>().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--debounce-ms",
                        raw: value.clone(),
                    })?;
                    config.sync_debounce = Duration::from_millis(ms);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            config,
            assessment_id: assessment_id.ok_or(ArgsError::MissingFlag {
                flag: "--assessment",
            })?,
            settings,
            seed,
        })
    }
}

impl SeedArgs {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        config: &ClientConfig,
    ) -> Result<Self, ArgsError> {
        let mut db_url = config
            .db_url
            .clone()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut assessment_id = None;
        let mut file = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    db_url = parse_db(value)?;
                }
                "--assessment" => {
                    let value = require_value(args, "--assessment")?;
                    assessment_id = Some(AssessmentId::new(parse_id("--assessment", value)?));
                }
                "--file" => {
                    let value = require_value(args, "--file")?;
                    file = Some(PathBuf::from(value));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            assessment_id: assessment_id.ok_or(ArgsError::MissingFlag {
                flag: "--assessment",
            })?,
            file: file.ok_or(ArgsError::MissingFlag { flag: "--file" })?,
        })
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
            .unwrap_or_else(|_| PathBuf::from("."))
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

async fn open_storage(config: &ClientConfig) -> Result<Storage, Box<dyn std::error::Error>> {
    if let Some(base_url) = &config.base_url {
        info!(%base_url, "using remote assessment service");
        return Ok(Storage::http(base_url.clone()));
    }
    if let Some(db_url) = &config.db_url {
        let db_url = normalize_sqlite_url(db_url.clone());
        prepare_sqlite_file(&db_url)?;
        info!(%db_url, "using local sqlite store");
        return Ok(Storage::sqlite(&db_url).await?);
    }
    Err(ArgsError::MissingBackend.into())
}

async fn take(args: TakeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&args.config).await?;
    let participant = args.config.participant();
    if !participant.is_persistent() {
        eprintln!("No user id given: progress will not be saved.");
    }

    let mut loader = AssessmentLoader::new(storage)
        .with_settings(args.settings)
        .with_debounce(args.config.sync_debounce);
    if let Some(seed) = args.seed {
        loader = loader.with_seed(seed);
    }

    let mut live = loader.load(&args.assessment_id, &participant).await?;
    run_console(&mut live, &participant).await?;

    match live.close().await {
        Some(SyncOutcome::Failed) => eprintln!("Warning: the last progress update was not saved."),
        Some(SyncOutcome::Sent | SyncOutcome::Superseded) | None => {}
    }
    Ok(())
}

async fn run_console(
    live: &mut LiveSession,
    participant: &Participant,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut cursor = 0;

    if let Some(user) = participant.user_id() {
        stdout
            .write_all(format!("Signed in as {user}. {HELP}\n").as_bytes())
            .await?;
    } else {
        stdout.write_all(format!("{HELP}\n").as_bytes()).await?;
    }

    if let Some(outcome) = live.session().outcome() {
        let summary = console::render_outcome(live.session(), &outcome);
        stdout.write_all(summary.as_bytes()).await?;
    }

    loop {
        let session = live.session();
        let prompt = if session.is_complete() {
            "> ".to_owned()
        } else {
            match console::next_open(session, cursor) {
                Some(index) => {
                    cursor = index;
                    console::render_question(session, index)
                }
                None => "All questions answered. Type :finish to submit.\n> ".to_owned(),
            }
        };
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Input::parse(&line) {
            Input::Quit => break,
            Input::Help => stdout.write_all(format!("{HELP}\n").as_bytes()).await?,
            Input::Unknown(command) => {
                stdout
                    .write_all(format!("unknown command {command}. {HELP}\n").as_bytes())
                    .await?;
            }
            Input::Restart => {
                live.restart();
                cursor = 0;
            }
            Input::Finish => match live.finish() {
                Ok(outcome) => {
                    let summary = console::render_outcome(live.session(), &outcome);
                    stdout.write_all(summary.as_bytes()).await?;
                }
                Err(err) => stdout.write_all(format!("{err}\n").as_bytes()).await?,
            },
            Input::Skip => {
                cursor = (cursor + 1) % live.session().total_questions().max(1);
            }
            Input::Answer(raw) => {
                if live.session().is_complete() {
                    stdout
                        .write_all(b"This attempt is finished. Type :restart to try again.\n")
                        .await?;
                    continue;
                }
                let Some(question) = live.session().question(cursor) else {
                    continue;
                };
                let Some(answer) = console::to_answer(question, &raw) else {
                    let count = question.choices().len();
                    stdout
                        .write_all(
                            format!("Pick an option from 1 to {count}, or type it exactly.\n")
                                .as_bytes(),
                        )
                        .await?;
                    continue;
                };
                match live.record_answer(cursor, answer) {
                    Ok(()) => {
                        if let Some(feedback) = console::render_feedback(live.session(), cursor) {
                            stdout.write_all(format!("{feedback}\n").as_bytes()).await?;
                        }
                        cursor += 1;
                    }
                    Err(err) => {
                        warn!(%err, cursor, "answer not recorded");
                        stdout.write_all(format!("{err}\n").as_bytes()).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn seed(args: SeedArgs) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(&args.file).await?;
    let envelope: BankEnvelope = serde_json::from_str(&raw)?;
    let items = envelope.into_items()?;

    prepare_sqlite_file(&args.db_url)?;
    let repo = SqliteRepository::open(&args.db_url).await?;
    repo.replace_bank(&args.assessment_id, &items).await?;

    println!(
        "Seeded assessment {} with {} items into {}",
        args.assessment_id,
        items.len(),
        args.db_url
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let config = ClientConfig::from_env()?;
    match cmd {
        Command::Take => {
            let args = TakeArgs::parse(&mut argv, config).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            take(args).await
        }
        Command::Seed => {
            let args = SeedArgs::parse(&mut argv, &config).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            seed(args).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
