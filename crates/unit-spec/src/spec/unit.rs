use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::path::{Path, PathContainer};

/// Language tag to text, e.g. `{"en": "Summary"}`.
pub type LanguageMap = BTreeMap<String, String>;

/// Tracking activity attached to a unit, path, container or block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<ActivityDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ActivityDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LanguageMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageCredit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
}

/// An image with optional description, author and provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ImageCredit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ImageCredit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
}

/// Top-level learning unit definition.
///
/// The last entry of `containers` completes the unit once it is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub version: String,
    pub activity: Activity,
    #[serde(default)]
    pub name: LanguageMap,
    #[serde(default)]
    pub description: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_color: Option<String>,
    pub containers: Vec<PathContainer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<Path>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<Path>,
}

impl Unit {
    /// The container whose completion completes the unit.
    pub fn completing_container(&self) -> Option<&PathContainer> {
        self.containers.last()
    }

    /// The help path followed by the additional paths.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.help.iter().chain(self.paths.iter())
    }

    /// Every path container of the unit, top-level ones first.
    pub fn all_containers(&self) -> impl Iterator<Item = &PathContainer> {
        self.containers
            .iter()
            .chain(self.all_paths().flat_map(|path| path.containers.iter()))
    }
}
