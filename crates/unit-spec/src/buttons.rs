//! Resolution of button actions and their done semantics.

use std::sync::LazyLock;

use regex::Regex;

use crate::spec::path::{is_container_id, is_path_id};

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://|mailto:|tel:)\S+$").expect("valid href regex")
});

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Opens an external link. Done once actioned.
    Url(String),
    /// Redirects to a path and returns afterwards. Done once the path is done.
    Path(String),
    /// Redirects to a container, possibly without return. Done once actioned.
    Container(String),
}

impl ButtonAction {
    pub fn parse(action: &str) -> Option<Self> {
        if is_path_id(action) {
            Some(ButtonAction::Path(action.to_string()))
        } else if is_container_id(action) {
            Some(ButtonAction::Container(action.to_string()))
        } else if HREF.is_match(action) {
            Some(ButtonAction::Url(action.to_string()))
        } else {
            None
        }
    }

    /// Navigation target inside the unit, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ButtonAction::Url(_) => None,
            ButtonAction::Path(id) | ButtonAction::Container(id) => Some(id),
        }
    }

    /// Whether the learner is brought back after visiting the target.
    pub fn returns(&self) -> bool {
        matches!(self, ButtonAction::Path(_))
    }

    /// Done state of a button given whether it was actioned and a lookup of
    /// path completion.
    pub fn is_done(&self, actioned: bool, path_done: impl Fn(&str) -> bool) -> bool {
        match self {
            ButtonAction::Url(_) | ButtonAction::Container(_) => actioned,
            ButtonAction::Path(id) => path_done(id),
        }
    }
}
