use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{NodeId, NodeKind};
use crate::spec::BlockKind;

/// Milliseconds since an arbitrary, session-wide epoch.
pub type Timestamp = u64;

/// A learner interaction reported by the surrounding player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub target: NodeId,
    #[serde(default)]
    pub at: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(target: impl Into<NodeId>, at: Timestamp, kind: EventKind) -> Self {
        Self {
            target: target.into(),
            at,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventKind {
    Visible,
    Played,
    PlayedToEnd,
    ControlsUsed,
    /// Response in experience-tracking notation: `[,]` separates list items,
    /// `[.]` matching pairs and `[:]` performance step values.
    Answered {
        response: String,
    },
    ActionTaken,
    LabelOpened,
    /// A tab, accordion panel or flashcard card was opened.
    Opened,
    Started,
    Submitted,
    TimeExpired,
    Abandoned,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Visible => "visible",
            EventKind::Played => "played",
            EventKind::PlayedToEnd => "played-to-end",
            EventKind::ControlsUsed => "controls-used",
            EventKind::Answered { .. } => "answered",
            EventKind::ActionTaken => "action-taken",
            EventKind::LabelOpened => "label-opened",
            EventKind::Opened => "opened",
            EventKind::Started => "started",
            EventKind::Submitted => "submitted",
            EventKind::TimeExpired => "time-expired",
            EventKind::Abandoned => "abandoned",
        }
    }

    /// Whether this kind of event means anything for a node of `kind`.
    pub fn applies_to(&self, kind: NodeKind) -> bool {
        match self {
            EventKind::Visible => {
                kind.is_container() || matches!(kind, NodeKind::Block(_) | NodeKind::Branch)
            }
            EventKind::Played | EventKind::PlayedToEnd => {
                matches!(kind, NodeKind::Block(block) if block.is_media())
            }
            EventKind::ControlsUsed => matches!(
                kind,
                NodeKind::Block(block) if block.is_media() || block == BlockKind::Process
            ),
            EventKind::Answered { .. } => kind == NodeKind::Question,
            EventKind::ActionTaken => kind == NodeKind::Button,
            EventKind::LabelOpened => kind == NodeKind::Label,
            EventKind::Opened => matches!(kind, NodeKind::Panel | NodeKind::Tab | NodeKind::Card),
            EventKind::Started
            | EventKind::Submitted
            | EventKind::TimeExpired
            | EventKind::Abandoned => kind.is_questionnaire(),
        }
    }
}

/// An event the engine could not apply. The session carries on without it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEvent {
    #[error("unknown node '{0}'")]
    UnknownNode(NodeId),
    #[error("'{kind}' events do not apply to '{node}'")]
    NotApplicable { node: NodeId, kind: &'static str },
    #[error("'{0}' is not the selected branch step")]
    Unreachable(NodeId),
    #[error("'{node}' rejected the event: {reason}")]
    Rejected { node: NodeId, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_flat_json_shape() {
        let event: Event = serde_json::from_value(json!({
            "target": "containers/quiz/blocks/0/questions/1",
            "at": 1200,
            "kind": "answered",
            "response": "a[,]b"
        }))
        .expect("event");
        assert_eq!(
            event.kind,
            EventKind::Answered {
                response: "a[,]b".into()
            }
        );

        let visible = Event::new("containers/intro", 5, EventKind::Visible);
        let value = serde_json::to_value(&visible).expect("serialize");
        assert_eq!(value["kind"], "visible");
        assert_eq!(value["target"], "containers/intro");
    }

    #[test]
    fn applicability_follows_node_kind() {
        let html = NodeKind::Block(BlockKind::Html);
        let video = NodeKind::Block(BlockKind::Video);
        assert!(EventKind::Visible.applies_to(html));
        assert!(!EventKind::PlayedToEnd.applies_to(html));
        assert!(EventKind::PlayedToEnd.applies_to(video));
        assert!(EventKind::ControlsUsed.applies_to(NodeKind::Block(BlockKind::Process)));
        assert!(EventKind::Opened.applies_to(NodeKind::Tab));
        assert!(!EventKind::Opened.applies_to(NodeKind::Label));
        assert!(EventKind::Started.applies_to(NodeKind::Branch));
        assert!(!EventKind::Visible.applies_to(NodeKind::Path));
    }
}
