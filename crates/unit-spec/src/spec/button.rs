use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::block::DoneCriteria;
use crate::spec::unit::{Activity, Image, LanguageMap};

/// A group of action buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ButtonGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    /// Buttons required for `completed`; all buttons when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_buttons_done: Option<usize>,
    /// Only one button may be actioned.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub single: bool,
    pub buttons: Vec<Button>,
}

/// A button whose `action` is a URL, a path id or a path container id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Button {
    pub action: String,
    pub text: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}
