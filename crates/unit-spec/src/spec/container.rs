use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::block::Block;
use crate::spec::unit::{Activity, LanguageMap};

/// Ordered blocks shown together: accordion panels, tabs and process steps.
///
/// A container is done once it is visible and all of its blocks are done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Container {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    pub blocks: Vec<Block>,
}
