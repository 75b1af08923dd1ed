use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::block::Block;
use crate::spec::unit::{Activity, LanguageMap};

/// Prefix of every path id.
pub const PATH_ID_PREFIX: &str = "paths/";
/// Prefix of every path container id.
pub const CONTAINER_ID_PREFIX: &str = "containers/";

static PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^paths/[A-Za-z0-9._~-]+$").expect("valid path id regex"));
static CONTAINER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^containers/[A-Za-z0-9._~-]+$").expect("valid container id regex")
});

/// `paths/` followed by URI unreserved characters only.
pub fn is_path_id(value: &str) -> bool {
    PATH_ID.is_match(value)
}

/// `containers/` followed by URI unreserved characters only.
pub fn is_container_id(value: &str) -> bool {
    CONTAINER_ID.is_match(value)
}

/// A path of a unit. A path without a name is hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Path {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    pub containers: Vec<PathContainer>,
}

impl Path {
    pub fn is_hidden(&self) -> bool {
        self.name.is_none()
    }
}

/// A container addressable by id, usable at the top of a unit or inside a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathContainer {
    pub id: String,
    pub name: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    pub blocks: Vec<Block>,
    /// Marks the unit-completing container. Accepts both spellings used by
    /// unit documents.
    #[serde(default, alias = "completed", skip_serializing_if = "std::ops::Not::not")]
    pub complete: bool,
}
