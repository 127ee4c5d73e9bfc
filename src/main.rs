use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;

use betrace::cli::{Cli, Commands};
use betrace::config::EngineConfig;
use betrace::engine::RuleEngine;
use betrace::lifecycle::Lifecycle;
use betrace::rule::Severity;
use betrace::span::Span;
use betrace::store::{DurableStore, FileStore};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Load {
            rules_dir,
            store_dir,
        } => cmd_load(&rules_dir, &store_dir),
        Commands::Ingest {
            rules_dir,
            spans_file,
            store_dir,
            config,
        } => cmd_ingest(&rules_dir, &spans_file, &store_dir, config.as_deref()),
    }
}

fn cmd_validate(file: &std::path::Path) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    match betrace::dsl::compile(&source) {
        Ok(_) => {
            println!("ok");
            Ok(())
        }
        Err(e) => {
            println!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Read every `.rule` file in `rules_dir` into an `(id, source)` pair.
fn read_rule_sources(rules_dir: &std::path::Path) -> Result<Vec<(String, String)>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(rules_dir)
        .with_context(|| format!("reading rules directory {}", rules_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("rule") {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("rule")
            .to_string();
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        sources.push((id, source));
    }
    Ok(sources)
}

/// Load every `.rule` file in a directory through the lifecycle FSM.
///
/// Parsing and static validation is pure per rule, so a large directory is
/// pre-compiled with `rayon` ahead of the sequential, per-id-serialized
/// admission into the lifecycle; only sources that already parse are handed
/// to `Lifecycle::create`, which still re-validates (cheaply, on an AST it
/// will discard and recompile) to keep this fast path from drifting out of
/// sync with the FSM's own admission contract.
fn load_rules_dir(lifecycle: &Lifecycle, rules_dir: &std::path::Path) -> Result<usize> {
    let sources = read_rule_sources(rules_dir)?;
    let precompiled: Vec<(String, String, bool)> = sources
        .into_par_iter()
        .map(|(id, source)| {
            let ok = betrace::dsl::compile(&source).is_ok();
            (id, source, ok)
        })
        .collect();

    let mut loaded = 0usize;
    for (id, source, parsed_ok) in precompiled {
        if !parsed_ok {
            tracing::warn!(rule_id = %id, "rule rejected: failed static validation");
            continue;
        }
        match lifecycle.create(&id, &id, &source, Severity::Medium, "", 0) {
            Ok(_) => {
                tracing::info!(rule_id = %id, "rule loaded");
                loaded += 1;
            }
            Err(e) => tracing::warn!(rule_id = %id, error = %e, "rule rejected"),
        }
    }
    Ok(loaded)
}

fn cmd_load(rules_dir: &std::path::Path, store_dir: &std::path::Path) -> Result<()> {
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(store_dir)?);
    let engine = RuleEngine::new(EngineConfig::default());
    let lifecycle = Lifecycle::new(Arc::clone(&engine), store, EngineConfig::default().max_rules);
    let loaded = load_rules_dir(&lifecycle, rules_dir)?;
    println!("loaded {loaded} rule(s) into {}", store_dir.display());
    engine.shutdown();
    Ok(())
}

fn cmd_ingest(
    rules_dir: &std::path::Path,
    spans_file: &std::path::Path,
    store_dir: &std::path::Path,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(store_dir)?);
    let engine = RuleEngine::new(config.clone());
    let lifecycle = Lifecycle::new(Arc::clone(&engine), store, config.max_rules);
    load_rules_dir(&lifecycle, rules_dir)?;

    let file = std::fs::File::open(spans_file)
        .with_context(|| format!("opening {}", spans_file.display()))?;
    let reader = std::io::BufReader::new(file);
    let mut submitted = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let span: Span = serde_json::from_str(&line)
            .with_context(|| format!("parsing span: {line}"))?;
        engine.submit(span);
        submitted += 1;
    }
    println!("submitted {submitted} span(s)");

    // Give workers a moment to drain the queue, then print violations.
    std::thread::sleep(Duration::from_millis(200));
    engine.sweep_idle_traces();
    for rule_id in lifecycle.enforce_error_budgets() {
        tracing::warn!(rule_id = %rule_id, "rule quarantined: error budget exceeded");
    }

    let mut violations = 0usize;
    while let Ok(v) = engine.violations().recv_timeout(Duration::from_millis(50)) {
        println!(
            "VIOLATION rule={} severity={:?} trace={} span={} {}",
            v.rule_name, v.severity, v.trace_id, v.span_id, v.metadata.get("description").cloned().unwrap_or_default()
        );
        violations += 1;
    }
    println!("{violations} violation(s)");

    engine.shutdown();
    Ok(())
}
