//! Notifications for the statement-emission and navigation collaborators.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

const VERB_IRI_BASE: &str = "http://adlnet.gov/expapi/verbs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Experienced,
    Interacted,
    Attempted,
    Answered,
    Exited,
    Completed,
    Passed,
    Failed,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Experienced => "experienced",
            Verb::Interacted => "interacted",
            Verb::Attempted => "attempted",
            Verb::Answered => "answered",
            Verb::Exited => "exited",
            Verb::Completed => "completed",
            Verb::Passed => "passed",
            Verb::Failed => "failed",
        }
    }

    /// ADL verb IRI, e.g. `http://adlnet.gov/expapi/verbs/passed`.
    pub fn iri(&self) -> String {
        format!("{VERB_IRI_BASE}{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Outcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// A tracked state change of a node that carries an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub activity_id: String,
    pub node: NodeId,
    pub verb: Verb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
}

impl Notification {
    pub fn new(activity_id: impl Into<String>, node: NodeId, verb: Verb) -> Self {
        Self {
            activity_id: activity_id.into(),
            node,
            verb,
            result: None,
        }
    }

    pub fn with_result(mut self, result: Outcome) -> Self {
        self.result = Some(result);
        self
    }
}

/// Outcome of a finalized questionnaire attempt for the navigation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDecision {
    pub questionnaire: NodeId,
    pub score: f64,
    /// Selected step, `None` when no further step follows (yet).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

pub trait StatementSink: Send {
    fn notify(&mut self, notification: &Notification);
}

pub trait NavigationSink: Send {
    fn navigate(&mut self, decision: &NavigationDecision);
}

#[derive(Debug, Default)]
struct Recorded {
    notifications: Vec<Notification>,
    navigation: Vec<NavigationDecision>,
}

/// Sink that keeps everything it receives. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn navigation(&self) -> Vec<NavigationDecision> {
        self.lock().navigation.clone()
    }

    /// Notifications for `activity_id` with `verb`.
    pub fn count(&self, activity_id: &str, verb: Verb) -> usize {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.activity_id == activity_id && n.verb == verb)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatementSink for RecordingSink {
    fn notify(&mut self, notification: &Notification) {
        self.lock().notifications.push(notification.clone());
    }
}

impl NavigationSink for RecordingSink {
    fn navigate(&mut self, decision: &NavigationDecision) {
        self.lock().navigation.push(decision.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_map_to_adl_iris() {
        assert_eq!(Verb::Passed.iri(), "http://adlnet.gov/expapi/verbs/passed");
        assert_eq!(Verb::Experienced.iri(), "http://adlnet.gov/expapi/verbs/experienced");
    }

    #[test]
    fn recording_clones_share_state() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.notify(&Notification::new("a", NodeId::from("unit"), Verb::Completed));
        assert_eq!(sink.count("a", Verb::Completed), 1);
        assert_eq!(sink.notifications().len(), 1);
    }

    #[test]
    fn notification_json_shape() {
        let notification = Notification::new("q-1", NodeId::from("x/questions/0"), Verb::Answered)
            .with_result(Outcome {
                response: Some("yes".into()),
                ..Outcome::default()
            });
        let value = serde_json::to_value(&notification).expect("json");
        assert_eq!(value["activityId"], "q-1");
        assert_eq!(value["verb"], "answered");
        assert_eq!(value["result"]["response"], "yes");
        assert!(value["result"].get("score").is_none());
    }
}
