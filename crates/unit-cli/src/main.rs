use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use unit_spec::{
    ContentTree, EngineConfig, Event, FileStore, RecordingSink, StateStore, Unit,
    UnitProgressTracker, ValidationReport, validate,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Learning unit progress CLI",
    long_about = "Validates unit documents, lists node ids and replays interaction events through the completion engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a unit document and list every violation.
    Validate {
        /// Path to the unit JSON.
        #[arg(long, value_name = "UNIT")]
        unit: PathBuf,
    },
    /// Print the node ids events can target.
    Nodes {
        /// Path to the unit JSON.
        #[arg(long, value_name = "UNIT")]
        unit: PathBuf,
    },
    /// Replay an event log and print the resulting progress.
    Replay {
        /// Path to the unit JSON.
        #[arg(long, value_name = "UNIT")]
        unit: PathBuf,
        /// JSON array of events.
        #[arg(long, value_name = "EVENTS")]
        events: PathBuf,
        /// Engine configuration JSON.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Resume from a stored session before replaying.
        #[arg(long, value_name = "SESSION")]
        resume: Option<PathBuf>,
        /// Store the session (CBOR) after replaying.
        #[arg(long, value_name = "SESSION")]
        save: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON schema of unit documents.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing()?;
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { unit } => run_validate(&unit),
        Command::Nodes { unit } => run_nodes(&unit),
        Command::Replay {
            unit,
            events,
            config,
            resume,
            save,
            format,
        } => run_replay(&unit, &events, config.as_deref(), resume.as_deref(), save.as_deref(), format),
        Command::Schema => {
            println!("{}", component_unit::unit_schema());
            Ok(())
        }
    }
}

fn init_tracing() -> CliResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("unit_progress=info,unit_spec=info")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run_validate(path: &Path) -> CliResult<()> {
    let unit_json = fs::read_to_string(path)?;
    let unit: Unit = serde_json::from_str(&unit_json)?;
    let report = validate(&unit);
    println!(
        "Validation result: {}",
        if report.valid { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(report: &ValidationReport) {
    if report.violations.is_empty() {
        return;
    }
    println!("Violations:");
    for violation in &report.violations {
        println!(
            "  {} [{}] - {}",
            violation.path, violation.code, violation.message
        );
    }
}

fn load_tree(path: &Path) -> CliResult<ContentTree> {
    let unit_json = fs::read_to_string(path)?;
    Ok(ContentTree::from_json(&unit_json)?)
}

fn run_nodes(path: &Path) -> CliResult<()> {
    let tree = load_tree(path)?;
    for (id, info) in tree.index().iter() {
        let kind = serde_json::to_value(info.kind)?;
        let label = match (&kind["kind"], &kind["block"]) {
            (Value::String(kind), Value::String(block)) => format!("{kind}:{block}"),
            (Value::String(kind), _) => kind.clone(),
            _ => kind.to_string(),
        };
        match &info.activity {
            Some(activity) => println!("{id}\t{label}\t{activity}"),
            None => println!("{id}\t{label}"),
        }
    }
    Ok(())
}

fn run_replay(
    unit_path: &Path,
    events_path: &Path,
    config_path: Option<&Path>,
    resume_path: Option<&Path>,
    save_path: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let tree = Arc::new(load_tree(unit_path)?);
    let config = match config_path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let events: Vec<Event> = serde_json::from_str(&fs::read_to_string(events_path)?)?;

    let tracker = match resume_path.map(|path| FileStore::new(path).load()).transpose()? {
        Some(Some(record)) => UnitProgressTracker::resume(Arc::clone(&tree), config, &record)?,
        Some(None) => {
            warn!("no stored session found, starting fresh");
            UnitProgressTracker::new(Arc::clone(&tree), config)
        }
        None => UnitProgressTracker::new(Arc::clone(&tree), config),
    };
    let sink = RecordingSink::new();
    let mut tracker = tracker
        .with_statement_sink(sink.clone())
        .with_navigation_sink(sink.clone());
    if let Some(path) = save_path {
        tracker = tracker.with_store(FileStore::new(path));
    }

    let mut rejected = 0;
    for event in events {
        if tracker.apply_lossy(event).is_none() {
            rejected += 1;
        }
    }
    if let Some(path) = save_path {
        FileStore::new(path).save(&tracker.record())?;
        info!(path = %path.display(), "session saved");
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": tracker.status().as_str(),
                "rejected": rejected,
                "progress": tracker.snapshot(),
                "notifications": sink.notifications(),
                "navigation": sink.navigation(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Unit status: {}", tracker.status().as_str());
            println!("Events rejected: {rejected}");
            let snapshot = tracker.snapshot();
            println!("Done nodes:");
            for (id, node) in snapshot.nodes.iter().filter(|(_, node)| node.done) {
                match node.score {
                    Some(score) => println!("  {id} (score {score})"),
                    None => println!("  {id}"),
                }
            }
            for decision in sink.navigation() {
                println!(
                    "Branch: {} scored {} -> {}",
                    decision.questionnaire,
                    decision.score,
                    decision.next.as_ref().map_or("none", |next| next.as_str())
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn replay_defaults_to_text_output() {
        let cli = Cli::try_parse_from([
            "unit-progress",
            "replay",
            "--unit",
            "unit.json",
            "--events",
            "events.json",
        ])
        .unwrap();
        match cli.command {
            Command::Replay { format, config, .. } => {
                assert!(matches!(format, OutputFormat::Text));
                assert!(config.is_none());
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn run_validate_rejects_unsupported_version() -> CliResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("unit.json");
        fs::write(
            &path,
            r#"{
                "version": "2.0.0",
                "activity": { "id": "u" },
                "containers": [
                    { "id": "containers/a", "name": {}, "blocks": [{ "type": "html", "url": "a.html" }], "complete": true }
                ]
            }"#,
        )?;
        let err = run_validate(&path).unwrap_err();
        assert_eq!(err.to_string(), "validation failed");
        Ok(())
    }

    #[test]
    fn run_replay_writes_session_file() -> CliResult<()> {
        let dir = TempDir::new()?;
        let unit = dir.path().join("unit.json");
        fs::write(
            &unit,
            include_str!("../../unit-spec/tests/fixtures/summary_unit.json"),
        )?;
        let events = dir.path().join("events.json");
        fs::write(
            &events,
            r#"[{ "target": "containers/summary", "at": 1, "kind": "visible" }]"#,
        )?;
        let session = dir.path().join("session.cbor");
        run_replay(&unit, &events, None, None, Some(&session), OutputFormat::Json)?;

        let record = FileStore::new(&session).load()?.expect("stored record");
        assert_eq!(record.events.len(), 1);
        assert_eq!(record.activity_id, "https://example.com/units/summary");
        Ok(())
    }
}
