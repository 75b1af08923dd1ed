use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buttons::ButtonAction;
use crate::spec::path::{is_container_id, is_path_id};
use crate::spec::{Block, BlockKind, ButtonGroup, Container, Questionnaire, Unit};

/// Major version of unit documents this engine can play.
pub const SUPPORTED_MAJOR_VERSION: &str = "1";

/// A structural problem in a unit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unit definition rejected with {} violation(s), first: {}", .0.len(), first_message(.0))]
    Rejected(Vec<Violation>),
}

impl SchemaError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            SchemaError::Rejected(violations) => violations,
        }
    }
}

fn first_message(violations: &[Violation]) -> String {
    violations
        .first()
        .map(|violation| format!("{} at {}", violation.message, violation.path))
        .unwrap_or_default()
}

pub fn validate(unit: &Unit) -> ValidationReport {
    let mut validator = Validator::new(unit);
    validator.unit(unit);
    ValidationReport {
        valid: validator.violations.is_empty(),
        violations: validator.violations,
    }
}

struct Validator {
    violations: Vec<Violation>,
    container_ids: BTreeSet<String>,
    path_ids: BTreeSet<String>,
}

impl Validator {
    fn new(unit: &Unit) -> Self {
        Self {
            violations: Vec::new(),
            container_ids: unit.all_containers().map(|c| c.id.clone()).collect(),
            path_ids: unit.all_paths().map(|p| p.id.clone()).collect(),
        }
    }

    fn report(&mut self, path: impl Into<String>, code: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            code: code.into(),
            message: message.into(),
        });
    }

    fn unit(&mut self, unit: &Unit) {
        if unit.version.split('.').next() != Some(SUPPORTED_MAJOR_VERSION) {
            self.report(
                "version",
                "unsupported_version",
                format!("unit version '{}' is not supported", unit.version),
            );
        }

        if unit.containers.is_empty() {
            self.report("containers", "empty_sequence", "a unit needs at least one container");
        }
        self.completing_container(unit);

        let mut seen_containers = BTreeSet::new();
        for container in unit.all_containers() {
            if !is_container_id(&container.id) {
                self.report(
                    container.id.clone(),
                    "invalid_container_id",
                    "container ids must look like containers/<name>",
                );
            }
            if !seen_containers.insert(container.id.as_str()) {
                self.report(
                    container.id.clone(),
                    "duplicate_container_id",
                    "container ids must be unique in the unit",
                );
            }
            self.blocks(&container.blocks, &container.id, None);
        }

        let mut seen_paths = BTreeSet::new();
        for path in unit.all_paths() {
            if !is_path_id(&path.id) {
                self.report(path.id.clone(), "invalid_path_id", "path ids must look like paths/<name>");
            }
            if !seen_paths.insert(path.id.as_str()) {
                self.report(path.id.clone(), "duplicate_path_id", "path ids must be unique in the unit");
            }
            if path.containers.is_empty() {
                self.report(path.id.clone(), "empty_sequence", "a path needs at least one container");
            }
        }
    }

    fn completing_container(&mut self, unit: &Unit) {
        let flagged = unit.all_containers().filter(|c| c.complete).count();
        match flagged {
            0 => self.report(
                "containers",
                "missing_completing_container",
                "the last container of the unit must be marked complete",
            ),
            1 => {}
            _ => self.report(
                "containers",
                "multiple_completing_containers",
                "exactly one container may complete the unit",
            ),
        }
        if flagged > 0
            && let Some(last) = unit.containers.last()
            && !last.complete
        {
            self.report(
                last.id.clone(),
                "completing_container_not_last",
                "the completing container must be the last top-level container",
            );
        }
    }

    fn blocks(&mut self, blocks: &[Block], parent: &str, allowed: Option<&[BlockKind]>) {
        if blocks.is_empty() {
            self.report(parent, "empty_sequence", "a container needs at least one block");
        }
        for (position, block) in blocks.iter().enumerate() {
            let path = format!("{parent}/blocks/{position}");
            let kind = block.kind();
            if let Some(allowed) = allowed
                && !allowed.contains(&kind)
            {
                self.report(
                    path.clone(),
                    "block_not_allowed",
                    format!("{} blocks are not allowed here", kind.as_str()),
                );
            }
            if let Some(criteria) = block.done_criteria()
                && !kind.supported_criteria().contains(&criteria)
            {
                self.report(
                    path.clone(),
                    "unsupported_done_criteria",
                    format!(
                        "{} blocks do not support done criteria '{}'",
                        kind.as_str(),
                        criteria.as_str()
                    ),
                );
            }
            self.block(block, &path);
        }
    }

    fn block(&mut self, block: &Block, path: &str) {
        const PANEL_BLOCKS: &[BlockKind] = &[BlockKind::Html, BlockKind::YouTube];
        const STEP_BLOCKS: &[BlockKind] =
            &[BlockKind::Html, BlockKind::YouTube, BlockKind::ButtonGroup];

        match block {
            Block::Accordion(accordion) => {
                self.non_empty(accordion.panels.len(), path, "panels");
                self.minimum(accordion.minimum_panels_done, 1, accordion.panels.len(), path, "minimumPanelsDone");
                self.sub_containers(&accordion.panels, path, "panels", PANEL_BLOCKS);
            }
            Block::Tabs(tabs) => {
                self.non_empty(tabs.tabs.len(), path, "tabs");
                self.minimum(tabs.minimum_tabs_done, 0, tabs.tabs.len(), path, "minimumTabsDone");
                self.sub_containers(&tabs.tabs, path, "tabs", PANEL_BLOCKS);
            }
            Block::Process(process) => {
                if process.steps.len() < 2 {
                    self.report(path, "too_few_steps", "a process needs at least two steps");
                }
                self.sub_containers(&process.steps, path, "steps", STEP_BLOCKS);
            }
            Block::ButtonGroup(group) => self.button_group(group, path),
            Block::LabeledImage(image) => {
                self.non_empty(image.labels.len(), path, "labels");
                self.minimum(image.minimum_labels_opened, 0, image.labels.len(), path, "minimumLabelsOpened");
            }
            Block::Flashcard(flashcard) => self.non_empty(flashcard.cards.len(), path, "cards"),
            Block::Questionnaire(questionnaire) => self.questionnaire(questionnaire, path),
            Block::Audio(_) | Block::Html(_) | Block::Video(_) | Block::YouTube(_) => {}
        }
    }

    fn sub_containers(&mut self, containers: &[Container], path: &str, segment: &str, allowed: &[BlockKind]) {
        for (position, container) in containers.iter().enumerate() {
            self.blocks(&container.blocks, &format!("{path}/{segment}/{position}"), Some(allowed));
        }
    }

    fn button_group(&mut self, group: &ButtonGroup, path: &str) {
        use crate::spec::DoneCriteria;

        self.non_empty(group.buttons.len(), path, "buttons");
        self.minimum(group.minimum_buttons_done, 1, group.buttons.len(), path, "minimumButtonsDone");
        if group.single
            && group.done_criteria == Some(DoneCriteria::Completed)
            && group.minimum_buttons_done != Some(1)
        {
            self.report(
                path,
                "single_button_precondition",
                "single requires minimumButtonsDone = 1 when done criteria is completed",
            );
        }
        for (position, button) in group.buttons.iter().enumerate() {
            let button_path = format!("{path}/buttons/{position}");
            match ButtonAction::parse(&button.action) {
                None => self.report(
                    button_path,
                    "invalid_button_action",
                    format!("'{}' is not a url, path id or container id", button.action),
                ),
                Some(ButtonAction::Path(id)) if !self.path_ids.contains(&id) => {
                    self.report(button_path, "unknown_action_target", format!("path '{id}' does not exist"))
                }
                Some(ButtonAction::Container(id)) if !self.container_ids.contains(&id) => self.report(
                    button_path,
                    "unknown_action_target",
                    format!("container '{id}' does not exist"),
                ),
                Some(_) => {}
            }
        }
    }

    fn questionnaire(&mut self, questionnaire: &Questionnaire, path: &str) {
        self.non_empty(questionnaire.questions.len(), path, "questions");
        if questionnaire.attempts == Some(0) {
            self.report(path, "invalid_attempts", "attempts must be greater than 0");
        }
        if questionnaire.time_limit == Some(0) {
            self.report(path, "invalid_time_limit", "timeLimit must be greater than 0");
        }
        if questionnaire.number_of_questions == Some(0) {
            self.report(
                path,
                "invalid_number_of_questions",
                "numberOfQuestions must be greater than 0",
            );
        }
        for (threshold, step) in &questionnaire.next {
            if let Some(step) = step {
                let step_path = format!("{path}/next/{threshold}");
                if let Some(criteria) = step.done_criteria
                    && !BlockKind::Questionnaire.supported_criteria().contains(&criteria)
                {
                    self.report(step_path.clone(), "unsupported_done_criteria", "unsupported done criteria");
                }
                self.questionnaire(step, &step_path);
            }
        }
    }

    fn non_empty(&mut self, len: usize, path: &str, field: &str) {
        if len == 0 {
            self.report(
                format!("{path}/{field}"),
                "empty_sequence",
                format!("{field} must not be empty"),
            );
        }
    }

    fn minimum(&mut self, value: Option<usize>, low: usize, high: usize, path: &str, field: &str) {
        if let Some(value) = value
            && (value < low || value > high)
        {
            self.report(
                path,
                "minimum_out_of_range",
                format!("{field} = {value} must be between {low} and {high}"),
            );
        }
    }
}
