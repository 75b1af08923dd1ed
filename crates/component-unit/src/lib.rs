use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::warn;

use unit_spec::{
    ContentTree, EngineConfig, Event, LoadError, RecordingSink, Unit, UnitProgressTracker,
    resolve_next, validate,
};

const DEFAULT_UNIT: &str = include_str!("../../unit-spec/tests/fixtures/onboarding_unit.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse unit: {0}")]
    UnitParse(#[source] serde_json::Error),
    #[error("failed to parse events: {0}")]
    EventsParse(#[source] serde_json::Error),
    #[error("unit '{0}' is not available")]
    UnitUnavailable(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("'{0}' is not a questionnaire of the unit")]
    NotQuestionnaire(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    unit_json: Option<String>,
    #[serde(default)]
    engine: EngineConfig,
}

fn load_config(config_json: &str) -> Result<ComponentConfig, ComponentError> {
    if config_json.trim().is_empty() {
        return Ok(ComponentConfig::default());
    }
    serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
}

fn ensure_unit(unit_id: &str, config_json: &str) -> Result<(ContentTree, EngineConfig), ComponentError> {
    let config = load_config(config_json)?;
    let unit_json = config.unit_json.as_deref().unwrap_or(DEFAULT_UNIT);
    let tree = ContentTree::from_json(unit_json)?;
    if tree.unit().activity.id != unit_id {
        return Err(ComponentError::UnitUnavailable(unit_id.to_string()));
    }
    Ok((tree, config.engine))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

/// The unit definition as JSON.
pub fn describe(unit_id: &str, config_json: &str) -> String {
    respond(ensure_unit(unit_id, config_json).and_then(|(tree, _)| {
        serde_json::to_value(tree.unit()).map_err(ComponentError::JsonEncode)
    }))
}

/// Validation report for a unit document, without loading it into an engine.
pub fn validate_unit(unit_json: &str) -> String {
    let result = serde_json::from_str::<Unit>(unit_json)
        .map_err(ComponentError::UnitParse)
        .and_then(|unit| serde_json::to_value(validate(&unit)).map_err(ComponentError::JsonEncode));
    respond(result)
}

/// Every node id of the unit with its kind, parent and activity.
pub fn list_nodes(unit_id: &str, config_json: &str) -> String {
    respond(ensure_unit(unit_id, config_json).map(|(tree, _)| {
        let nodes: Vec<Value> = tree
            .index()
            .iter()
            .map(|(id, info)| {
                json!({
                    "id": id,
                    "kind": info.kind,
                    "parent": info.parent,
                    "activity": info.activity,
                })
            })
            .collect();
        Value::Array(nodes)
    }))
}

/// Replays `events_json` (an array of events) from a fresh session and
/// reports the resulting progress.
pub fn apply_events(unit_id: &str, config_json: &str, events_json: &str) -> String {
    let result = ensure_unit(unit_id, config_json).and_then(|(tree, engine)| {
        let events: Vec<Event> =
            serde_json::from_str(events_json).map_err(ComponentError::EventsParse)?;
        replay(tree, engine, events)
    });
    respond(result)
}

fn replay(tree: ContentTree, engine: EngineConfig, events: Vec<Event>) -> Result<Value, ComponentError> {
    let sink = RecordingSink::new();
    let mut tracker = UnitProgressTracker::new(Arc::new(tree), engine)
        .with_statement_sink(sink.clone())
        .with_navigation_sink(sink.clone());

    let mut rejected = Vec::new();
    for (position, event) in events.into_iter().enumerate() {
        let target = event.target.clone();
        if let Err(err) = tracker.apply(event) {
            warn!(node = %target, error = %err, "dropping invalid event");
            rejected.push(json!({
                "index": position,
                "target": target,
                "error": err.to_string(),
            }));
        }
    }

    let mut questionnaires = Map::new();
    for (id, info) in tracker.tree().index().iter() {
        if !info.kind.is_questionnaire() || tracker.state().questionnaire(id.as_str()).is_none() {
            continue;
        }
        questionnaires.insert(
            id.to_string(),
            json!({
                "branch": tracker.current_branch(id.as_str()),
                "feedback": tracker.feedback(id.as_str()),
                "reviewAvailable": tracker.review_available(id.as_str()),
            }),
        );
    }

    let snapshot = serde_json::to_value(tracker.snapshot()).map_err(ComponentError::JsonEncode)?;
    let notifications = serde_json::to_value(sink.notifications()).map_err(ComponentError::JsonEncode)?;
    let navigation = serde_json::to_value(sink.navigation()).map_err(ComponentError::JsonEncode)?;
    Ok(json!({
        "status": tracker.status().as_str(),
        "accepted": tracker.log().len(),
        "rejected": rejected,
        "progress": snapshot,
        "questionnaires": questionnaires,
        "notifications": notifications,
        "navigation": navigation,
    }))
}

/// Resolves the branch step of a questionnaire for a score.
pub fn next_step(unit_id: &str, config_json: &str, questionnaire_id: &str, score: f64) -> String {
    respond(ensure_unit(unit_id, config_json).and_then(|(tree, _)| {
        let questionnaire = tree
            .questionnaire(questionnaire_id)
            .ok_or_else(|| ComponentError::NotQuestionnaire(questionnaire_id.to_string()))?;
        let next = resolve_next(questionnaire, score);
        Ok(json!({
            "questionnaire": questionnaire_id,
            "score": score,
            "threshold": next.map(|(threshold, _)| threshold),
            "next": next.map(|(threshold, _)| format!("{questionnaire_id}/next/{threshold}")),
        }))
    }))
}

/// JSON schema of unit documents.
pub fn unit_schema() -> String {
    let schema = schemars::schema_for!(Unit);
    respond(serde_json::to_value(schema).map_err(ComponentError::JsonEncode))
}
