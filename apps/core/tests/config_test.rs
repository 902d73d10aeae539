use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use quickmenu_core::config::{self, Config, SearchModeSetting};

// QUICKMENU_DATA_DIR is process-global; tests that touch it take this
// lock so parallel test threads never observe each other's override.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn unique_dir(tag: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be valid")
        .as_nanos();
    std::env::temp_dir().join(format!("quickmenu-config-{tag}-{unique}"))
}

#[test]
fn defaults_are_valid_and_fuzzy() {
    let cfg = Config::default();
    assert_eq!(cfg.max_results, 20);
    assert_eq!(cfg.search_mode, SearchModeSetting::Fuzzy);
    assert!(!cfg.preserve_order);
    assert!(!cfg.custom_entry);
    assert!(cfg.session_id.is_empty());
    config::validate(&cfg).expect("defaults should validate");
}

#[test]
fn data_dir_override_redirects_all_paths() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let dir = unique_dir("override");
    std::env::set_var("QUICKMENU_DATA_DIR", &dir);

    let cfg = Config::default();
    assert_eq!(cfg.cache_db_path, dir.join("cache.sqlite3"));
    assert_eq!(cfg.lock_dir, dir.join("locks"));
    assert_eq!(cfg.config_path, dir.join("config.toml"));

    std::env::remove_var("QUICKMENU_DATA_DIR");
}

#[test]
fn save_then_load_round_trips_settings() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let dir = unique_dir("roundtrip");
    std::env::set_var("QUICKMENU_DATA_DIR", &dir);

    let mut cfg = Config::default();
    cfg.session_id = "shell".to_string();
    cfg.max_results = 7;
    cfg.search_mode = SearchModeSetting::Direct;
    cfg.preserve_order = true;
    cfg.custom_entry = true;
    config::save(&cfg).expect("save should succeed");

    let loaded =
        config::load(Some(cfg.config_path.clone())).expect("load should succeed");
    assert_eq!(loaded.session_id, "shell");
    assert_eq!(loaded.max_results, 7);
    assert_eq!(loaded.search_mode, SearchModeSetting::Direct);
    assert!(loaded.preserve_order);
    assert!(loaded.custom_entry);
    // skipped path fields are refilled, never read from disk
    assert_eq!(loaded.cache_db_path, dir.join("cache.sqlite3"));

    std::env::remove_var("QUICKMENU_DATA_DIR");
    std::fs::remove_dir_all(dir).expect("config dir should be removable");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = unique_dir("missing");
    let loaded = config::load(Some(dir.join("config.toml"))).expect("load should succeed");
    assert_eq!(loaded.max_results, 20);
    assert_eq!(loaded.search_mode, SearchModeSetting::Fuzzy);
}

#[test]
fn unknown_search_mode_is_a_parse_error() {
    let dir = unique_dir("badmode");
    std::fs::create_dir_all(&dir).expect("dir should be creatable");
    let path = dir.join("config.toml");
    std::fs::write(&path, "search_mode = \"psychic\"\n").expect("write should succeed");

    match config::load(Some(path)) {
        Err(config::ConfigError::Parse(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    std::fs::remove_dir_all(dir).expect("config dir should be removable");
}

#[test]
fn out_of_range_max_results_is_rejected() {
    let dir = unique_dir("toolarge");
    std::fs::create_dir_all(&dir).expect("dir should be creatable");
    let path = dir.join("config.toml");
    std::fs::write(&path, "max_results = 10000\n").expect("write should succeed");

    match config::load(Some(path)) {
        Err(config::ConfigError::Invalid(message)) => {
            assert!(message.contains("max_results"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    std::fs::remove_dir_all(dir).expect("config dir should be removable");
}
