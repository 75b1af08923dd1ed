use serde::{Deserialize, Serialize};

/// What happens to a running questionnaire attempt the learner walks away from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AbandonPolicy {
    /// Drop the attempt without consuming it.
    #[default]
    Discard,
    /// Treat abandonment as a submission of the answers given so far.
    Submit,
}

/// Engine settings chosen by the hosting player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub abandon: AbandonPolicy,
    /// Seed for drawing `numberOfQuestions` questions, so replays repeat the
    /// same selection.
    pub seed: u64,
    /// Finalize an overdue attempt when any later event reaches its
    /// questionnaire, not only on an explicit `time-expired`.
    pub enforce_time_limit_on_event: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            abandon: AbandonPolicy::Discard,
            seed: 0,
            enforce_time_limit_on_event: true,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; blank input yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}
