//! forum-trends: binary entrypoint
//! Reads a JSON array of scraped question records, stores them in the
//! snapshot-backed document store and prints the storage outcome plus the
//! analysis (or the reason it was skipped) as JSON.
//!
//! Usage: `forum-trends <records.json>` (use `-` for stdin).

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forum_trends::config::EngineConfig;
use forum_trends::engine::TrendEngine;
use forum_trends::metrics::TrendMetrics;
use forum_trends::store::MemoryStore;

/// Logs go to stderr so stdout stays machine-readable.
/// `TREND_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forum_trends=info,warn"));
    let json = std::env::var("TREND_LOG_JSON").ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn read_records(arg: &str) -> Result<Vec<Value>> {
    let raw = if arg == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("reading records from stdin")?;
        s
    } else {
        std::fs::read_to_string(Path::new(arg)).with_context(|| format!("reading records from {arg}"))?
    };
    match serde_json::from_str::<Value>(&raw).context("records are not valid JSON")? {
        Value::Array(items) => Ok(items),
        other => Err(anyhow!("expected a JSON array of records, got {}", kind(&other))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let Some(input) = std::env::args().nth(1) else {
        bail!("usage: forum-trends <records.json | ->");
    };

    let metrics = if std::env::var("TREND_METRICS_DUMP").ok().as_deref() == Some("1") {
        Some(TrendMetrics::init()?)
    } else {
        None
    };

    let config = EngineConfig::load()?;
    let snapshot: Option<PathBuf> = config.storage.snapshot_path.clone();
    let memory = match &snapshot {
        Some(p) => MemoryStore::load_snapshot(p)
            .await
            .with_context(|| format!("loading snapshot {}", p.display()))?,
        None => MemoryStore::new(),
    };

    let records = read_records(&input)?;
    info!(target: "ingest", records = records.len(), mode = %config.storage.mode, "records read");

    let engine = TrendEngine::new(config, memory.store());
    let report = engine.run_batch(&records).await?;

    if let Some(p) = &snapshot {
        memory
            .save_snapshot(p)
            .await
            .with_context(|| format!("saving snapshot {}", p.display()))?;
    }

    let stats = engine.store().database_stats().await?;
    let out = json!({
        "storage": report.storage,
        "analysis": report.analysis,
        "database": stats,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
