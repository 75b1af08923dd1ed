//! Completion-state evaluation and branching engine for learning units.
//!
//! A [`ContentTree`] holds a validated unit. A [`UnitProgressTracker`] turns
//! interaction [`Event`]s into done states, questionnaire scores, branch
//! decisions and the unit status.

pub mod aggregate;
pub mod branch;
pub mod buttons;
pub mod config;
pub mod events;
pub mod node;
pub mod notify;
pub mod progress;
pub mod rules;
pub mod scoring;
pub mod session;
pub mod spec;
pub mod store;
pub mod tracker;
pub mod tree;
pub mod validate;

pub use aggregate::rollup;
pub use branch::{FeedbackView, feedback_for, resolve_next};
pub use buttons::ButtonAction;
pub use config::{AbandonPolicy, EngineConfig};
pub use events::{Event, EventKind, InvalidEvent, Timestamp};
pub use node::{ContentIndex, NodeId, NodeInfo, NodeKind};
pub use notify::{
    NavigationDecision, NavigationSink, Notification, Outcome, RecordingSink, StatementSink, Verb,
};
pub use progress::{NodeSnapshot, ProgressSnapshot, ProgressState, UnitStatus};
pub use rules::DoneState;
pub use session::{EventSender, PumpReport, Session};
pub use spec::Unit;
pub use store::{FileStore, MemoryStore, SessionRecord, StateStore, StoreError};
pub use tracker::{Applied, UnitProgressTracker};
pub use tree::{ContentTree, LoadError};
pub use validate::{SchemaError, ValidationReport, Violation, validate};
