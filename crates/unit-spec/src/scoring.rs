//! Questionnaire scoring, pass evaluation and question selection.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::progress::Attempt;
use crate::spec::{InteractionComponent, InteractionType, QuestionDefinition, Questionnaire};

pub const LIST_SEPARATOR: &str = "[,]";
pub const PAIR_SEPARATOR: &str = "[.]";
pub const STEP_SEPARATOR: &str = "[:]";

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Every presented question was answered.
    Answered,
    /// A response matched an exit pattern.
    Exited,
    Submitted,
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptResult {
    pub score: f64,
    /// `None` when the questionnaire has no pass criteria.
    pub passed: Option<bool>,
    pub reason: Finalization,
}

fn items(response: &str) -> impl Iterator<Item = &str> {
    response
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn order_insensitive(definition: &QuestionDefinition) -> bool {
    definition.multiple_choice || definition.interaction_type == InteractionType::Matching
}

/// Compares a response with one pattern of the question.
pub fn matches_pattern(definition: &QuestionDefinition, response: &str, pattern: &str) -> bool {
    if order_insensitive(definition) {
        let mut left: Vec<&str> = items(response).collect();
        let mut right: Vec<&str> = items(pattern).collect();
        left.sort_unstable();
        right.sort_unstable();
        left == right
    } else {
        items(response).eq(items(pattern))
    }
}

fn matches_any(definition: &QuestionDefinition, response: &str, patterns: Option<&Vec<String>>) -> bool {
    patterns.is_some_and(|patterns| {
        patterns
            .iter()
            .any(|pattern| matches_pattern(definition, response, pattern))
    })
}

/// `Some(correct)` when the question defines correct responses.
pub fn is_correct(definition: &QuestionDefinition, response: &str) -> Option<bool> {
    definition
        .correct_responses_pattern
        .as_ref()
        .map(|_| matches_any(definition, response, definition.correct_responses_pattern.as_ref()))
}

pub fn is_exit(definition: &QuestionDefinition, response: &str) -> bool {
    matches_any(definition, response, definition.exit_responses_pattern.as_ref())
}

/// Interaction components named by a response, each counted once.
pub fn chosen_components<'a>(
    definition: &'a QuestionDefinition,
    response: &str,
) -> Vec<&'a InteractionComponent> {
    let mut chosen: Vec<&InteractionComponent> = Vec::new();
    for item in items(response) {
        for part in item.split(PAIR_SEPARATOR) {
            let id = part.split(STEP_SEPARATOR).next().unwrap_or(part).trim();
            let found = definition
                .component_lists()
                .into_iter()
                .flatten()
                .find(|component| component.id == id);
            if let Some(component) = found
                && !chosen.iter().any(|seen| std::ptr::eq(*seen, component))
            {
                chosen.push(component);
            }
        }
    }
    chosen
}

/// Score of one answered question. The definition score applies when a
/// correct pattern exists; component scores are summed otherwise.
pub fn question_score(definition: &QuestionDefinition, response: &str) -> f64 {
    if let Some(score) = definition.score
        && let Some(correct) = is_correct(definition, response)
    {
        return if correct { score } else { 0.0 };
    }
    chosen_components(definition, response)
        .iter()
        .filter_map(|component| component.score)
        .sum()
}

pub fn attempt_score(questionnaire: &Questionnaire, answers: &BTreeMap<usize, String>) -> f64 {
    answers
        .iter()
        .filter_map(|(index, response)| {
            questionnaire
                .questions
                .get(*index)
                .map(|question| question_score(&question.definition, response))
        })
        .sum()
}

pub fn grade(questionnaire: &Questionnaire, attempt: &Attempt, reason: Finalization) -> AttemptResult {
    let score = attempt_score(questionnaire, &attempt.answers);
    AttemptResult {
        score,
        passed: questionnaire
            .pass_criteria
            .map(|criteria| criteria.is_passing(score)),
        reason,
    }
}

/// Questions shown in an attempt. With `numberOfQuestions` below the question
/// count a seeded random subset is drawn, kept in authored order.
pub fn select_questions(questionnaire: &Questionnaire, seed: u64, node: &str, attempt: u32) -> Vec<usize> {
    let total = questionnaire.questions.len();
    let wanted = questionnaire.number_of_questions.unwrap_or(total);
    if wanted >= total {
        return (0..total).collect();
    }
    let mut rng = StdRng::seed_from_u64(mix(seed, node, attempt));
    let all: Vec<usize> = (0..total).collect();
    let mut picked: Vec<usize> = all.choose_multiple(&mut rng, wanted).copied().collect();
    picked.sort_unstable();
    picked
}

// FNV-1a over the node id, folded with the seed and attempt number.
fn mix(seed: u64, node: &str, attempt: u32) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in node.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash ^ seed ^ u64::from(attempt).rotate_left(32)
}
