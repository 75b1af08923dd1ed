//! Completion rule table: pure functions from block, criteria and facts to a
//! done state. One rule per block variant.

use serde::{Deserialize, Serialize};

use crate::progress::NodeFacts;
use crate::spec::{Block, DoneCriteria};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DoneState {
    NotDone,
    Done,
}

impl DoneState {
    pub fn is_done(self) -> bool {
        self == DoneState::Done
    }
}

impl From<bool> for DoneState {
    fn from(done: bool) -> Self {
        if done {
            DoneState::Done
        } else {
            DoneState::NotDone
        }
    }
}

/// Counts over the items of a composite block (panels, tabs, steps, buttons,
/// labels, cards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemTally {
    pub total: usize,
    /// Items the learner opened or actioned. For tabs the initially shown
    /// tab is not counted.
    pub opened: usize,
    pub done: usize,
}

/// Questionnaire facts derived from its attempts and branch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuestionnaireFacts {
    pub has_pass_criteria: bool,
    pub finalized: bool,
    pub passed: bool,
    pub exhausted: bool,
    pub answered_any: bool,
    /// A selected next step exists and is not done yet.
    pub step_pending: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub facts: &'a NodeFacts,
    /// The block or its enclosing container has been shown.
    pub instantiated: bool,
    pub items: ItemTally,
    pub questionnaire: QuestionnaireFacts,
}

pub fn evaluate(block: &Block, input: &RuleInput<'_>) -> DoneState {
    let Some(criteria) = block.done_criteria() else {
        return input.instantiated.into();
    };
    let done = match block {
        Block::Html(_) => html(criteria, input),
        Block::Audio(_) | Block::Video(_) | Block::YouTube(_) => media(criteria, input),
        Block::Accordion(accordion) => counted(criteria, input, accordion.minimum_panels_done),
        Block::ButtonGroup(group) => counted(criteria, input, group.minimum_buttons_done),
        Block::Tabs(tabs) => tabs_rule(criteria, input, tabs.minimum_tabs_done),
        Block::Process(_) => process(criteria, input),
        Block::LabeledImage(image) => labeled_image(criteria, input, image.minimum_labels_opened),
        Block::Flashcard(_) => flashcard(criteria, input),
        Block::Questionnaire(_) => return evaluate_questionnaire(Some(criteria), input),
    };
    done.into()
}

/// Rule for questionnaires, shared by blocks and branch steps.
pub fn evaluate_questionnaire(criteria: Option<DoneCriteria>, input: &RuleInput<'_>) -> DoneState {
    let facts = &input.questionnaire;
    let completed = facts.finalized && !facts.step_pending;
    let done = match criteria {
        None => input.instantiated,
        Some(DoneCriteria::Experienced) => input.facts.is_visible(),
        Some(DoneCriteria::Interacted) => facts.answered_any,
        Some(DoneCriteria::Completed) => completed,
        Some(DoneCriteria::Passed) if !facts.has_pass_criteria => completed,
        Some(DoneCriteria::Passed) => facts.passed && !facts.exhausted && !facts.step_pending,
    };
    done.into()
}

fn html(criteria: DoneCriteria, input: &RuleInput<'_>) -> bool {
    match criteria {
        DoneCriteria::Experienced => input.facts.is_visible(),
        _ => false,
    }
}

fn media(criteria: DoneCriteria, input: &RuleInput<'_>) -> bool {
    let facts = input.facts;
    match criteria {
        DoneCriteria::Experienced => facts.is_visible() || facts.played,
        DoneCriteria::Completed => facts.ended,
        DoneCriteria::Interacted => facts.played || facts.controls_used,
        DoneCriteria::Passed => false,
    }
}

/// Accordions and button groups: `completed` needs a minimum of done items.
fn counted(criteria: DoneCriteria, input: &RuleInput<'_>, minimum: Option<usize>) -> bool {
    let items = input.items;
    match criteria {
        DoneCriteria::Experienced => input.facts.is_visible(),
        DoneCriteria::Completed => items.done >= minimum.unwrap_or(items.total),
        DoneCriteria::Interacted => items.opened >= 1,
        DoneCriteria::Passed => false,
    }
}

fn tabs_rule(criteria: DoneCriteria, input: &RuleInput<'_>, minimum: Option<usize>) -> bool {
    let items = input.items;
    match (criteria, minimum) {
        (DoneCriteria::Experienced, _) => input.facts.is_visible(),
        (DoneCriteria::Completed, Some(minimum)) if minimum < 2 => input.facts.is_visible(),
        (DoneCriteria::Completed, minimum) => items.done >= minimum.unwrap_or(items.total),
        (DoneCriteria::Interacted, _) => items.opened >= 1,
        (DoneCriteria::Passed, _) => false,
    }
}

fn process(criteria: DoneCriteria, input: &RuleInput<'_>) -> bool {
    match criteria {
        DoneCriteria::Experienced => input.facts.is_visible(),
        DoneCriteria::Completed => input.items.done == input.items.total,
        DoneCriteria::Interacted => input.facts.controls_used,
        DoneCriteria::Passed => false,
    }
}

fn labeled_image(criteria: DoneCriteria, input: &RuleInput<'_>, minimum: Option<usize>) -> bool {
    let items = input.items;
    match (criteria, minimum) {
        (DoneCriteria::Experienced, _) | (DoneCriteria::Completed, Some(0)) => {
            input.facts.is_visible()
        }
        (DoneCriteria::Completed, minimum) => items.opened >= minimum.unwrap_or(items.total),
        (DoneCriteria::Interacted, _) => items.opened >= 1,
        (DoneCriteria::Passed, _) => false,
    }
}

fn flashcard(criteria: DoneCriteria, input: &RuleInput<'_>) -> bool {
    let items = input.items;
    match criteria {
        DoneCriteria::Experienced => input.facts.is_visible(),
        DoneCriteria::Completed => items.opened == items.total,
        DoneCriteria::Interacted => items.opened >= 1,
        DoneCriteria::Passed => false,
    }
}
