// tests/config.rs
use std::{env, fs};

use forum_trends::config::{
    EngineConfig, ENV_ANALYSIS_SCOPE, ENV_CONFIG_PATH, ENV_STORAGE_MODE, ENV_TRENDING_THRESHOLD,
};
use forum_trends::model::{AnalysisScope, StorageMode};

fn clear_env() {
    for key in [ENV_CONFIG_PATH, ENV_STORAGE_MODE, ENV_ANALYSIS_SCOPE, ENV_TRENDING_THRESHOLD] {
        env::remove_var(key);
    }
}

#[test]
fn toml_and_json_files_parse_the_same() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("engine.toml");
    fs::write(
        &p_toml,
        r#"
[storage]
mode = "append-only"

[analysis]
scope = "new-only"
top_tags = 5
"#,
    )
    .unwrap();
    let t = EngineConfig::load_from(&p_toml).unwrap();

    let p_json = dir.path().join("engine.json");
    fs::write(
        &p_json,
        r#"{"storage": {"mode": "append-only"}, "analysis": {"scope": "new-only", "top_tags": 5}}"#,
    )
    .unwrap();
    let j = EngineConfig::load_from(&p_json).unwrap();

    assert_eq!(t, j);
    assert_eq!(t.storage.mode, StorageMode::AppendOnly);
    assert_eq!(t.analysis.scope, AnalysisScope::NewOnly);
    assert_eq!(t.analysis.top_tags, 5);
    assert_eq!(t.analysis.top_authors, 10);

    // No extension: content sniffing.
    let p_plain = dir.path().join("engine");
    fs::write(&p_plain, r#"{"analysis": {"enabled": false}}"#).unwrap();
    assert!(!EngineConfig::load_from(&p_plain).unwrap().analysis.enabled);
}

#[test]
fn out_of_range_values_are_clamped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("engine.toml");
    fs::write(
        &p,
        "[analysis]\ntrending_threshold = 1e9\nsentiment_threshold = 4.0\nkeyword_ngram_max = 7\n",
    )
    .unwrap();
    let cfg = EngineConfig::load_from(&p).unwrap();
    assert_eq!(cfg.analysis.trending_threshold, 10_000.0);
    assert_eq!(cfg.analysis.sentiment_threshold, 1.0);
    assert_eq!(cfg.analysis.keyword_ngram_max, 2);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("engine.toml");
    fs::write(&p, "[storage\nmode = ").unwrap();
    assert!(EngineConfig::load_from(&p).is_err());
}

#[serial_test::serial]
#[test]
fn load_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing anywhere -> defaults.
    assert_eq!(EngineConfig::load().unwrap(), EngineConfig::default());

    // 2) JSON fallback in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("engine.json"), r#"{"analysis": {"top_tags": 7}}"#).unwrap();
    assert_eq!(EngineConfig::load().unwrap().analysis.top_tags, 7);

    // 3) TOML beats JSON.
    fs::write(cfg_dir.join("engine.toml"), "[analysis]\ntop_tags = 8\n").unwrap();
    assert_eq!(EngineConfig::load().unwrap().analysis.top_tags, 8);

    // 4) Env path beats both.
    let p_env = tmp.path().join("custom.toml");
    fs::write(&p_env, "[analysis]\ntop_tags = 9\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(EngineConfig::load().unwrap().analysis.top_tags, 9);

    // 5) Env path that does not exist is a hard error.
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(EngineConfig::load().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_the_file() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    env::set_var(ENV_STORAGE_MODE, "append_only");
    env::set_var(ENV_ANALYSIS_SCOPE, "NEW-ONLY");
    env::set_var(ENV_TRENDING_THRESHOLD, "35.5");
    let cfg = EngineConfig::load().unwrap();
    assert_eq!(cfg.storage.mode, StorageMode::AppendOnly);
    assert_eq!(cfg.analysis.scope, AnalysisScope::NewOnly);
    assert_eq!(cfg.analysis.trending_threshold, 35.5);

    // Garbage is ignored, out-of-range is clamped.
    env::set_var(ENV_STORAGE_MODE, "sometimes");
    env::set_var(ENV_TRENDING_THRESHOLD, "-5000");
    let cfg = EngineConfig::load().unwrap();
    assert_eq!(cfg.storage.mode, StorageMode::Update);
    assert_eq!(cfg.analysis.trending_threshold, -100.0);

    clear_env();
    env::set_current_dir(&old).unwrap();
}
