use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheBridge;
use crate::cache_store;
use crate::config::{self, Config, ConfigError};
use crate::logging;
use crate::model::Candidate;
use crate::report::OutcomeReport;
use crate::search::{SearchMode, SearchOptions};
use crate::selection::{Resolution, SelectionError};
use crate::session::{NullRenderer, Session, SessionError};
use crate::session_lock::{FileSessionLock, LockError, SessionLock, SessionLockGuard};

#[derive(Debug)]
pub enum RuntimeError {
    Config(ConfigError),
    Lock(LockError),
    Session(SessionError),
    Io(std::io::Error),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "config error: {error}"),
            Self::Lock(error) => write!(f, "lock error: {error}"),
            Self::Session(error) => write!(f, "session error: {error}"),
            Self::Io(error) => write!(f, "io error: {error}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<ConfigError> for RuntimeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LockError> for RuntimeError {
    fn from(value: LockError) -> Self {
        Self::Lock(value)
    }
}

impl From<SessionError> for RuntimeError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeOptions {
    pub help: bool,
    pub session_id: Option<String>,
    pub initial_query: String,
    pub direct_mode: bool,
    pub preserve_order: bool,
    pub custom_entry: bool,
    pub limit: Option<usize>,
    pub json_output: bool,
    pub clear_cache: bool,
    pub config_path: Option<PathBuf>,
}

pub const USAGE: &str = "usage: quickmenu [options] < candidates.txt
  --session <id>     session identifier (enables caching + single-instance lock)
  --query <text>     initial filter query
  --direct           substring matching instead of fuzzy
  --preserve-order   show matches in input order
  --custom-entry     accept typed text that matches no candidate
  --limit <n>        cap displayed matches (0 = unlimited)
  --json             print the outcome as JSON
  --clear-cache      wipe the cached query/selection for the session
  --config <path>    alternate config file
  -h, --help         show this help";

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => options.help = true,
            "--direct" => options.direct_mode = true,
            "--preserve-order" => options.preserve_order = true,
            "--custom-entry" => options.custom_entry = true,
            "--json" => options.json_output = true,
            "--clear-cache" => options.clear_cache = true,
            "--session" => {
                options.session_id = Some(required_value(&mut iter, "--session")?);
            }
            "--query" => {
                options.initial_query = required_value(&mut iter, "--query")?;
            }
            "--limit" => {
                let raw = required_value(&mut iter, "--limit")?;
                let parsed = raw
                    .parse::<usize>()
                    .map_err(|_| format!("--limit expects a number, got '{raw}'"))?;
                options.limit = Some(parsed);
            }
            "--config" => {
                options.config_path = Some(PathBuf::from(required_value(&mut iter, "--config")?));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(options)
}

fn required_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<String, String> {
    iter.next()
        .map(|value| value.to_string())
        .ok_or_else(|| format!("{flag} requires a value"))
}

pub fn run_with_options(options: RuntimeOptions) -> Result<i32, RuntimeError> {
    run_from_reader(options, std::io::stdin().lock())
}

/// Full run against an arbitrary candidate source. Produces exactly
/// one process exit code: 0 selection made, 1 unknown error, 2 user
/// canceled / no decision.
pub fn run_from_reader(options: RuntimeOptions, reader: impl BufRead) -> Result<i32, RuntimeError> {
    if let Err(error) = logging::init() {
        eprintln!("[quickmenu] logging unavailable: {error}");
    }

    let cfg = config::load(options.config_path.clone())?;
    if !cfg.config_path.exists() {
        if let Err(error) = config::save(&cfg) {
            logging::warn(&format!("could not write default config: {error}"));
        }
    }

    let session_id = options
        .session_id
        .clone()
        .unwrap_or_else(|| cfg.session_id.clone());
    logging::info(&format!(
        "startup session_id='{session_id}' config_path={}",
        cfg.config_path.display()
    ));

    let lock: Arc<dyn SessionLock> = Arc::new(FileSessionLock::new(cfg.lock_dir.clone()));
    let guard = SessionLockGuard::acquire(lock, &session_id)?;

    let bridge = open_cache(&cfg, &session_id);
    if options.clear_cache {
        if let Err(error) = bridge.clear_cache() {
            logging::warn(&format!("cache clear failed: {error}"));
        }
    }

    let candidates = read_candidates(reader)?;
    let initial_query = bridge.initial_query(&options.initial_query);
    let custom_entry = options.custom_entry || cfg.custom_entry;

    if candidates.is_empty() {
        // no menu to build; a typed entry can still resolve
        let code = if custom_entry && !initial_query.is_empty() {
            if options.json_output {
                println!(
                    "{}",
                    OutcomeReport::CustomEntry {
                        entry: initial_query.clone(),
                        query: initial_query.clone(),
                    }
                    .to_json()
                );
            } else {
                println!("{initial_query}");
            }
            if let Err(error) = bridge.cache_state(&initial_query, &initial_query) {
                logging::warn(&format!("cache write failed: {error}"));
            }
            0
        } else {
            logging::error("no candidates on stdin and no custom entry to fall back to");
            1
        };
        if let Err(error) = guard.release() {
            logging::warn(&format!("lock release failed: {error}"));
        }
        return Ok(code);
    }

    let search_options = SearchOptions {
        mode: if options.direct_mode {
            SearchMode::Direct
        } else {
            cfg.search_mode.into()
        },
        preserve_order: options.preserve_order || cfg.preserve_order,
        limit: options.limit.unwrap_or(cfg.max_results as usize),
    };

    let session = Session::new(
        candidates,
        &initial_query,
        search_options,
        custom_entry,
        Arc::new(NullRenderer),
        Some(guard),
    )?;
    session.show();

    // Headless drive: an interactive frontend embedding the library
    // feeds keystrokes instead; here the seeded query decides and the
    // top match is committed immediately.
    session.commit_selection();
    let outcome = session.wait_for_outcome();
    let resolution = session.resolve_outcome(&outcome);

    let chosen_text = match &resolution {
        Ok(Resolution::Candidate(candidate)) => candidate.computed_title().to_string(),
        Ok(Resolution::CustomEntry(entry)) => entry.clone(),
        Err(_) => String::new(),
    };
    if let Err(error) = bridge.cache_state(&outcome.raw_query, &chosen_text) {
        logging::warn(&format!("cache write failed: {error}"));
    }

    if options.json_output {
        println!(
            "{}",
            OutcomeReport::from_resolution(&outcome, &resolution).to_json()
        );
    } else if !chosen_text.is_empty() {
        println!("{chosen_text}");
    }

    session.hide();
    session.release_lock();

    let code = match &resolution {
        Ok(_) => 0,
        Err(SelectionError::Canceled) => 2,
        Err(error) => {
            logging::error(&format!("selection did not resolve: {error}"));
            1
        }
    };
    logging::info(&format!("run finished exit_code={code}"));
    Ok(code)
}

fn open_cache(cfg: &Config, session_id: &str) -> CacheBridge {
    if session_id.is_empty() {
        return CacheBridge::disabled();
    }

    if let Some(parent) = cfg.cache_db_path.parent() {
        if let Err(error) = std::fs::create_dir_all(parent) {
            logging::warn(&format!("cache dir unavailable: {error}"));
            return CacheBridge::disabled();
        }
    }

    match cache_store::open_at_path(&cfg.cache_db_path) {
        Ok(db) => CacheBridge::new(db, session_id),
        Err(error) => {
            // caching must never block the selection flow
            logging::warn(&format!("cache store unavailable: {error}"));
            CacheBridge::disabled()
        }
    }
}

fn read_candidates(reader: impl BufRead) -> Result<Vec<Candidate>, std::io::Error> {
    let mut candidates = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        candidates.push(Candidate::new(&line));
    }
    Ok(candidates)
}
