//! Score-threshold lookups: next-step branching and score feedback.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::spec::{LanguageMap, Questionnaire};

/// Entry with the greatest key not exceeding `score`.
pub fn threshold<V>(map: &BTreeMap<i64, V>, score: f64) -> Option<(i64, &V)> {
    map.iter()
        .rev()
        .find(|(key, _)| (**key as f64) <= score)
        .map(|(key, value)| (*key, value))
}

/// The step to present after scoring `score`, with its threshold key.
/// `None` when there is no `next`, no threshold applies, or it maps to `null`.
pub fn resolve_next(questionnaire: &Questionnaire, score: f64) -> Option<(i64, &Questionnaire)> {
    let (key, step) = threshold(&questionnaire.next, score)?;
    step.as_ref().map(|step| (key, step))
}

/// Feedback shown after an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<LanguageMap>,
}

/// Resolves the feedback for `score`; `None` when feedback is hidden.
pub fn feedback_for(questionnaire: &Questionnaire, score: f64) -> Option<FeedbackView> {
    let Some(feedback) = &questionnaire.feedback else {
        return Some(FeedbackView {
            score: Some(score),
            text: None,
        });
    };
    if feedback.display == Some(false) {
        return None;
    }
    let text = match threshold(&feedback.score_text, score) {
        Some((_, Some(text))) => Some(text.clone()),
        _ => feedback.text.clone(),
    };
    Some(FeedbackView {
        score: (feedback.score != Some(false)).then_some(score),
        text,
    })
}
