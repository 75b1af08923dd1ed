use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::events::Timestamp;
use crate::node::NodeId;

/// Interaction facts accumulated for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodeFacts {
    pub visible_since: Option<Timestamp>,
    pub played: bool,
    pub ended: bool,
    pub controls_used: bool,
    pub opened: bool,
    pub actioned: bool,
    pub answered: bool,
    /// Set on the first interaction with the node or one of its items.
    pub interacted: bool,
}

const NO_FACTS: NodeFacts = NodeFacts {
    visible_since: None,
    played: false,
    ended: false,
    controls_used: false,
    opened: false,
    actioned: false,
    answered: false,
    interacted: false,
};

impl NodeFacts {
    pub fn is_visible(&self) -> bool {
        self.visible_since.is_some()
    }
}

/// A running questionnaire attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub number: u32,
    pub started_at: Timestamp,
    /// Question indexes shown in this attempt, in presentation order.
    pub presented: Vec<usize>,
    pub answers: BTreeMap<usize, String>,
}

impl Attempt {
    pub fn is_complete(&self) -> bool {
        self.presented
            .iter()
            .all(|question| self.answers.contains_key(question))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestionnaireProgress {
    pub attempts_used: u32,
    pub current: Option<Attempt>,
    pub last_score: Option<f64>,
    /// At least one attempt was finalized and its feedback shown.
    pub finalized: bool,
    /// Outcome of the last finalized attempt when pass criteria exist.
    pub last_passed: Option<bool>,
    /// Some finalized attempt passed.
    pub passed: bool,
    /// Attempts ran out without passing.
    pub exhausted: bool,
    pub answered_any: bool,
    /// Threshold key of the selected `next` step.
    pub branch: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitStatus {
    InProgress,
    Completed,
    Failed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::InProgress => "inProgress",
            UnitStatus::Completed => "completed",
            UnitStatus::Failed => "failed",
        }
    }
}

/// All mutable state of a session. Only the tracker writes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    pub facts: BTreeMap<NodeId, NodeFacts>,
    pub done: BTreeSet<NodeId>,
    pub questionnaires: BTreeMap<NodeId, QuestionnaireProgress>,
    pub completed: bool,
    pub failed: bool,
}

impl ProgressState {
    pub fn facts(&self, id: &str) -> &NodeFacts {
        self.facts.get(id).unwrap_or(&NO_FACTS)
    }

    pub fn facts_mut(&mut self, id: &NodeId) -> &mut NodeFacts {
        self.facts.entry(id.clone()).or_default()
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.facts(id).is_visible()
    }

    pub fn questionnaire(&self, id: &str) -> Option<&QuestionnaireProgress> {
        self.questionnaires.get(id)
    }

    pub fn questionnaire_mut(&mut self, id: &NodeId) -> &mut QuestionnaireProgress {
        self.questionnaires.entry(id.clone()).or_default()
    }

    /// Failure wins over completion when both happened.
    pub fn status(&self) -> UnitStatus {
        if self.failed {
            UnitStatus::Failed
        } else if self.completed {
            UnitStatus::Completed
        } else {
            UnitStatus::InProgress
        }
    }
}

/// Read-only view of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_used: Option<u32>,
}

/// Read-only copy of the session handed to collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: UnitStatus,
    pub completed: bool,
    pub failed: bool,
    pub nodes: BTreeMap<NodeId, NodeSnapshot>,
}

impl ProgressSnapshot {
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.get(id)
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.node(id).is_some_and(|node| node.done)
    }
}
