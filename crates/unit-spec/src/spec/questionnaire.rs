use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::spec::block::DoneCriteria;
use crate::spec::unit::{Activity, LanguageMap};

/// A scored sequence of questions with optional branching on the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_criteria: Option<PassCriteria>,
    /// Seconds allowed once the learner starts an attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    /// Attempts permitted; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Upper bound of questions drawn at random for an attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_questions: Option<usize>,
    /// Follow-up step keyed by minimum score; `null` means no further step.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "threshold_map"
    )]
    pub next: BTreeMap<i64, Option<Questionnaire>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<QuestionnaireFeedback>,
    pub questions: Vec<Question>,
}

/// Score-keyed maps arrive with string keys (`"0"`, `"-5"`), also when the
/// owning block was buffered by the `type` tag.
fn threshold_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<i64, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
    let mut thresholds = BTreeMap::new();
    for (key, value) in raw {
        let threshold = key
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("score threshold '{key}' is not an integer")))?;
        if thresholds.insert(threshold, value).is_some() {
            return Err(D::Error::custom(format!("score threshold {threshold} appears twice")));
        }
    }
    Ok(thresholds)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PassCriteria {
    pub score: f64,
    /// Lower is better: `score` becomes the maximum passing score.
    #[serde(default)]
    pub inverse: bool,
    /// Pass or failure also applies to the owning unit.
    #[serde(default)]
    pub unit: bool,
}

impl PassCriteria {
    pub fn is_passing(&self, score: f64) -> bool {
        if self.inverse {
            score <= self.score
        } else {
            score >= self.score
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<LanguageMap>,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "threshold_map"
    )]
    pub score_text: BTreeMap<i64, Option<LanguageMap>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// Tracked id; no statement is sent for questions without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub definition: QuestionDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionType {
    TrueFalse,
    Choice,
    FillIn,
    LongFillIn,
    Matching,
    Performance,
    Sequencing,
    Likert,
    Numeric,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<LanguageMap>,
    pub description: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<QuestionFeedback>,
    pub interaction_type: InteractionType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multiple_choice: bool,
    /// Overrides component scores when a correct response pattern exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_responses_pattern: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_responses_pattern: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<InteractionComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scale: Vec<InteractionComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<InteractionComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<InteractionComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<InteractionComponent>,
}

impl QuestionDefinition {
    /// Component lists in a fixed order, used when resolving response ids.
    pub fn component_lists(&self) -> [&[InteractionComponent]; 5] {
        [
            self.choices.as_slice(),
            self.scale.as_slice(),
            self.source.as_slice(),
            self.target.as_slice(),
            self.steps.as_slice(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    #[serde(default)]
    pub immediate: bool,
    #[serde(default)]
    pub show_correct_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_text: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect_text: Option<LanguageMap>,
    #[serde(default)]
    pub success_icon: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<LanguageMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InteractionComponent {
    pub id: String,
    pub description: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}
