use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::button::ButtonGroup;
use crate::spec::container::Container;
use crate::spec::questionnaire::Questionnaire;
use crate::spec::unit::{Activity, LanguageMap};

/// Condition under which a block counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DoneCriteria {
    Experienced,
    Completed,
    Interacted,
    Passed,
}

impl DoneCriteria {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoneCriteria::Experienced => "experienced",
            DoneCriteria::Completed => "completed",
            DoneCriteria::Interacted => "interacted",
            DoneCriteria::Passed => "passed",
        }
    }
}

/// The known block types, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Accordion(Accordion),
    Audio(Audio),
    ButtonGroup(ButtonGroup),
    Flashcard(Flashcard),
    Html(Html),
    LabeledImage(LabeledImage),
    Process(Process),
    Questionnaire(Questionnaire),
    Tabs(Tabs),
    Video(Video),
    #[serde(rename = "youtube")]
    YouTube(YouTube),
}

/// Fieldless mirror of [`Block`] used by the node index and rule dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Accordion,
    Audio,
    ButtonGroup,
    Flashcard,
    Html,
    LabeledImage,
    Process,
    Questionnaire,
    Tabs,
    Video,
    #[serde(rename = "youtube")]
    YouTube,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Accordion => "accordion",
            BlockKind::Audio => "audio",
            BlockKind::ButtonGroup => "button-group",
            BlockKind::Flashcard => "flashcard",
            BlockKind::Html => "html",
            BlockKind::LabeledImage => "labeled-image",
            BlockKind::Process => "process",
            BlockKind::Questionnaire => "questionnaire",
            BlockKind::Tabs => "tabs",
            BlockKind::Video => "video",
            BlockKind::YouTube => "youtube",
        }
    }

    /// Criteria a block of this kind may declare.
    pub fn supported_criteria(&self) -> &'static [DoneCriteria] {
        use DoneCriteria::*;
        match self {
            BlockKind::Html => &[Experienced],
            BlockKind::Questionnaire => &[Experienced, Completed, Interacted, Passed],
            _ => &[Experienced, Completed, Interacted],
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, BlockKind::Audio | BlockKind::Video | BlockKind::YouTube)
    }
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Accordion(_) => BlockKind::Accordion,
            Block::Audio(_) => BlockKind::Audio,
            Block::ButtonGroup(_) => BlockKind::ButtonGroup,
            Block::Flashcard(_) => BlockKind::Flashcard,
            Block::Html(_) => BlockKind::Html,
            Block::LabeledImage(_) => BlockKind::LabeledImage,
            Block::Process(_) => BlockKind::Process,
            Block::Questionnaire(_) => BlockKind::Questionnaire,
            Block::Tabs(_) => BlockKind::Tabs,
            Block::Video(_) => BlockKind::Video,
            Block::YouTube(_) => BlockKind::YouTube,
        }
    }

    pub fn activity(&self) -> Option<&Activity> {
        match self {
            Block::Accordion(block) => block.activity.as_ref(),
            Block::Audio(block) => block.activity.as_ref(),
            Block::ButtonGroup(block) => block.activity.as_ref(),
            Block::Flashcard(block) => block.activity.as_ref(),
            Block::Html(block) => block.activity.as_ref(),
            Block::LabeledImage(block) => block.activity.as_ref(),
            Block::Process(block) => block.activity.as_ref(),
            Block::Questionnaire(block) => block.activity.as_ref(),
            Block::Tabs(block) => block.activity.as_ref(),
            Block::Video(block) => block.activity.as_ref(),
            Block::YouTube(block) => block.activity.as_ref(),
        }
    }

    pub fn done_criteria(&self) -> Option<DoneCriteria> {
        match self {
            Block::Accordion(block) => block.done_criteria,
            Block::Audio(block) => block.done_criteria,
            Block::ButtonGroup(block) => block.done_criteria,
            Block::Flashcard(block) => block.done_criteria,
            Block::Html(block) => block.done_criteria,
            Block::LabeledImage(block) => block.done_criteria,
            Block::Process(block) => block.done_criteria,
            Block::Questionnaire(block) => block.done_criteria,
            Block::Tabs(block) => block.done_criteria,
            Block::Video(block) => block.done_criteria,
            Block::YouTube(block) => block.done_criteria,
        }
    }
}

/// A block made of expandable panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Accordion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    /// Panels required for `completed`; all panels when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_panels_done: Option<usize>,
    pub panels: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Audio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub url: String,
}

/// A deck of two-sided cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Card {
    pub front: CardSide,
    pub back: CardSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct CardSide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Html {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub url: String,
}

/// An image with openable labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabeledImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub image: String,
    /// Labels required for `completed`; 0 means experienced is enough,
    /// absent means every label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_labels_opened: Option<usize>,
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Label {
    pub name: LanguageMap,
    pub description: LanguageMap,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub steps: Vec<Container>,
}

/// Tabs block. One tab is shown at a time, the first one initially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tabs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    /// Tabs required for `completed`; below 2 experienced is enough,
    /// absent means every tab.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_tabs_done: Option<usize>,
    pub tabs: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct YouTube {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    pub video_id: String,
}
