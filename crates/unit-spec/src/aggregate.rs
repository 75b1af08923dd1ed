//! Upward roll-up of completion through sub-containers, blocks, containers
//! and paths to the unit.
//!
//! Done nodes stay done: the roll-up starts from the done set already in the
//! progress state and only ever adds to it. It is repeated until nothing
//! changes, since button groups may depend on paths evaluated later in a pass.

use std::collections::BTreeSet;

use crate::buttons::ButtonAction;
use crate::node::{NodeId, Segment};
use crate::progress::ProgressState;
use crate::rules::{self, ItemTally, QuestionnaireFacts, RuleInput};
use crate::spec::{Block, ButtonGroup, Container, PathContainer, Questionnaire};
use crate::tree::ContentTree;

/// Every node that is done given the facts in `state`.
pub fn rollup(tree: &ContentTree, state: &ProgressState) -> BTreeSet<NodeId> {
    let mut rollup = Rollup {
        tree,
        state,
        done: state.done.clone(),
    };
    loop {
        let before = rollup.done.len();
        rollup.pass();
        if rollup.done.len() == before {
            return rollup.done;
        }
    }
}

struct Rollup<'a> {
    tree: &'a ContentTree,
    state: &'a ProgressState,
    done: BTreeSet<NodeId>,
}

impl<'a> Rollup<'a> {
    fn pass(&mut self) {
        let tree = self.tree;
        let unit = tree.unit();
        for container in &unit.containers {
            self.path_container(container);
        }
        for path in unit.all_paths() {
            let mut all_done = true;
            for container in &path.containers {
                all_done &= self.path_container(container);
            }
            self.settle(NodeId::new(path.id.clone()), all_done);
        }
        if let Some(completing) = tree.completing_container_id() {
            let done = self.done.contains(completing);
            self.settle(NodeId::unit(), done);
        }
    }

    fn is_done(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    /// Records `now` for `id` unless it is already done; returns the done state.
    fn settle(&mut self, id: NodeId, now: bool) -> bool {
        if self.done.contains(&id) {
            return true;
        }
        if now {
            self.done.insert(id);
        }
        now
    }

    fn path_container(&mut self, container: &'a PathContainer) -> bool {
        let id = NodeId::new(container.id.clone());
        let visible = self.state.is_visible(id.as_str());
        let blocks_done = self.blocks(&id, &container.blocks, visible);
        self.settle(id, visible && blocks_done)
    }

    fn blocks(&mut self, parent: &NodeId, blocks: &'a [Block], container_visible: bool) -> bool {
        let mut all_done = true;
        for (position, block) in blocks.iter().enumerate() {
            let id = parent.child(&Segment::Block(position));
            all_done &= self.block(id, block, container_visible);
        }
        all_done
    }

    fn block(&mut self, id: NodeId, block: &'a Block, container_visible: bool) -> bool {
        let state = self.state;
        let facts = state.facts(id.as_str());
        let mut items = ItemTally::default();
        let mut questionnaire = QuestionnaireFacts::default();
        match block {
            Block::Accordion(accordion) => {
                items = self.sub_containers(&id, &accordion.panels, Segment::Panel, None)
            }
            Block::Tabs(tabs) => {
                items = self.sub_containers(&id, &tabs.tabs, Segment::Tab, Some(facts.is_visible()))
            }
            Block::Process(process) => {
                items = self.sub_containers(&id, &process.steps, Segment::Step, None)
            }
            Block::ButtonGroup(group) => items = self.buttons(&id, group),
            Block::LabeledImage(image) => items = self.leaves(&id, image.labels.len(), Segment::Label),
            Block::Flashcard(flashcard) => items = self.leaves(&id, flashcard.cards.len(), Segment::Card),
            Block::Questionnaire(definition) => questionnaire = self.questionnaire(&id, definition),
            Block::Audio(_) | Block::Html(_) | Block::Video(_) | Block::YouTube(_) => {}
        }
        if self.is_done(id.as_str()) {
            return true;
        }
        let input = RuleInput {
            facts,
            instantiated: container_visible || facts.is_visible(),
            items,
            questionnaire,
        };
        self.settle(id, rules::evaluate(block, &input).is_done())
    }

    /// Panels, tabs and steps. `first_shown` carries the visibility of a tabs
    /// block, whose first tab is shown without being opened.
    fn sub_containers(
        &mut self,
        parent: &NodeId,
        containers: &'a [Container],
        segment: fn(usize) -> Segment,
        first_shown: Option<bool>,
    ) -> ItemTally {
        let state = self.state;
        let mut tally = ItemTally {
            total: containers.len(),
            ..ItemTally::default()
        };
        for (position, container) in containers.iter().enumerate() {
            let id = parent.child(&segment(position));
            let facts = state.facts(id.as_str());
            let auto_shown = position == 0 && first_shown == Some(true);
            if facts.opened && !(position == 0 && first_shown.is_some()) {
                tally.opened += 1;
            }
            let visible = facts.is_visible() || facts.opened || auto_shown;
            let blocks_done = self.blocks(&id, &container.blocks, visible);
            if self.settle(id, visible && blocks_done) {
                tally.done += 1;
            }
        }
        tally
    }

    fn buttons(&mut self, parent: &NodeId, group: &ButtonGroup) -> ItemTally {
        let state = self.state;
        let mut tally = ItemTally {
            total: group.buttons.len(),
            ..ItemTally::default()
        };
        for (position, button) in group.buttons.iter().enumerate() {
            let id = parent.child(&Segment::Button(position));
            let actioned = state.facts(id.as_str()).actioned;
            if actioned {
                tally.opened += 1;
            }
            let done = ButtonAction::parse(&button.action).is_some_and(|action| {
                action.is_done(actioned, |path| self.done.contains(path))
            });
            if self.settle(id, done) {
                tally.done += 1;
            }
        }
        tally
    }

    /// Labels and flashcard cards: done once opened.
    fn leaves(&mut self, parent: &NodeId, count: usize, segment: fn(usize) -> Segment) -> ItemTally {
        let state = self.state;
        let mut tally = ItemTally {
            total: count,
            ..ItemTally::default()
        };
        for position in 0..count {
            let id = parent.child(&segment(position));
            let opened = state.facts(id.as_str()).opened;
            if opened {
                tally.opened += 1;
            }
            if self.settle(id, opened) {
                tally.done += 1;
            }
        }
        tally
    }

    fn questionnaire(&mut self, id: &NodeId, definition: &'a Questionnaire) -> QuestionnaireFacts {
        let state = self.state;
        for position in 0..definition.questions.len() {
            let question = id.child(&Segment::Question(position));
            let answered = state.facts(question.as_str()).answered;
            self.settle(question, answered);
        }

        let progress = state.questionnaire(id.as_str());
        let mut facts = QuestionnaireFacts {
            has_pass_criteria: definition.pass_criteria.is_some(),
            ..QuestionnaireFacts::default()
        };
        if let Some(progress) = progress {
            facts.finalized = progress.finalized;
            facts.passed = progress.passed;
            facts.exhausted = progress.exhausted;
            facts.answered_any = progress.answered_any;
        }
        if let Some(threshold) = progress.and_then(|progress| progress.branch)
            && let Some(Some(step)) = definition.next.get(&threshold)
        {
            let step_id = id.child(&Segment::Next(threshold));
            facts.step_pending = !self.branch_step(step_id, step);
        }
        facts
    }

    fn branch_step(&mut self, id: NodeId, step: &'a Questionnaire) -> bool {
        let questionnaire = self.questionnaire(&id, step);
        if self.is_done(id.as_str()) {
            return true;
        }
        let facts = self.state.facts(id.as_str());
        let input = RuleInput {
            facts,
            instantiated: facts.is_visible(),
            items: ItemTally::default(),
            questionnaire,
        };
        let done = rules::evaluate_questionnaire(step.done_criteria, &input).is_done();
        self.settle(id, done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NodeFacts, QuestionnaireProgress};

    fn tree(json: &str) -> ContentTree {
        ContentTree::from_json(json).expect("valid unit")
    }

    fn show(state: &mut ProgressState, id: &str) {
        state.facts_mut(&NodeId::from(id)).visible_since = Some(1);
    }

    fn open(state: &mut ProgressState, id: &str) {
        let facts: &mut NodeFacts = state.facts_mut(&NodeId::from(id));
        facts.opened = true;
        facts.visible_since = Some(1);
    }

    const ACCORDION: &str = r#"{
        "version": "1.0.0",
        "activity": { "id": "https://example.com/units/accordion" },
        "containers": [{
            "id": "containers/main",
            "name": { "en": "Main" },
            "complete": true,
            "blocks": [{
                "type": "accordion",
                "doneCriteria": "completed",
                "minimumPanelsDone": 2,
                "panels": [
                    { "blocks": [{ "type": "html", "url": "a.html" }] },
                    { "blocks": [{ "type": "html", "url": "b.html" }] },
                    { "blocks": [{ "type": "html", "url": "c.html" }] }
                ]
            }]
        }]
    }"#;

    #[test]
    fn container_needs_visibility_and_done_blocks() {
        let tree = tree(
            r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/summary",
                "name": { "en": "Summary" },
                "complete": true,
                "blocks": [{ "type": "video", "url": "v.mp4", "doneCriteria": "completed" }]
            }]
        }"#,
        );
        let mut state = ProgressState::default();
        show(&mut state, "containers/summary");
        let done = rollup(&tree, &state);
        assert!(!done.contains("containers/summary"));
        assert!(!done.contains("unit"));

        state.facts_mut(&NodeId::from("containers/summary/blocks/0")).ended = true;
        let done = rollup(&tree, &state);
        assert!(done.contains("containers/summary/blocks/0"));
        assert!(done.contains("containers/summary"));
        assert!(done.contains("unit"));
    }

    #[test]
    fn accordion_counts_done_panels_in_any_order() {
        let tree = tree(ACCORDION);
        for pair in [["0", "1"], ["2", "0"], ["1", "2"]] {
            let mut state = ProgressState::default();
            show(&mut state, "containers/main");
            open(&mut state, &format!("containers/main/blocks/0/panels/{}", pair[0]));
            let done = rollup(&tree, &state);
            assert!(!done.contains("containers/main/blocks/0"));

            open(&mut state, &format!("containers/main/blocks/0/panels/{}", pair[1]));
            let done = rollup(&tree, &state);
            assert!(done.contains("containers/main/blocks/0"), "panels {pair:?}");
            assert!(done.contains("unit"));
        }
    }

    #[test]
    fn done_nodes_never_revert() {
        let tree = tree(ACCORDION);
        let mut state = ProgressState::default();
        state.done.insert(NodeId::from("containers/main/blocks/0"));
        let done = rollup(&tree, &state);
        assert!(done.contains("containers/main/blocks/0"));
        assert!(!done.contains("containers/main"));
    }

    #[test]
    fn path_button_waits_for_path() {
        let tree = tree(
            r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/main",
                "name": { "en": "Main" },
                "complete": true,
                "blocks": [{
                    "type": "button-group",
                    "doneCriteria": "completed",
                    "buttons": [{ "action": "paths/more", "text": { "en": "More" } }]
                }]
            }],
            "paths": [{
                "id": "paths/more",
                "containers": [{
                    "id": "containers/more",
                    "name": { "en": "More" },
                    "blocks": [{ "type": "html", "url": "more.html" }]
                }]
            }]
        }"#,
        );
        let mut state = ProgressState::default();
        show(&mut state, "containers/main");
        state
            .facts_mut(&NodeId::from("containers/main/blocks/0/buttons/0"))
            .actioned = true;
        let done = rollup(&tree, &state);
        assert!(!done.contains("containers/main/blocks/0/buttons/0"));

        show(&mut state, "containers/more");
        let done = rollup(&tree, &state);
        assert!(done.contains("paths/more"));
        assert!(done.contains("containers/main/blocks/0/buttons/0"));
        assert!(done.contains("containers/main"));
        assert!(done.contains("unit"));
    }

    #[test]
    fn questionnaire_waits_for_selected_step() {
        let tree = tree(
            r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/quiz",
                "name": { "en": "Quiz" },
                "complete": true,
                "blocks": [{
                    "type": "questionnaire",
                    "doneCriteria": "completed",
                    "questions": [{ "definition": { "description": {}, "interactionType": "choice" } }],
                    "next": {
                        "0": null,
                        "1": {
                            "doneCriteria": "completed",
                            "questions": [{ "definition": { "description": {}, "interactionType": "likert" } }]
                        }
                    }
                }]
            }]
        }"#,
        );
        let quiz = NodeId::from("containers/quiz/blocks/0");
        let mut state = ProgressState::default();
        show(&mut state, "containers/quiz");
        *state.questionnaire_mut(&quiz) = QuestionnaireProgress {
            finalized: true,
            answered_any: true,
            attempts_used: 1,
            branch: Some(1),
            ..QuestionnaireProgress::default()
        };
        let done = rollup(&tree, &state);
        assert!(!done.contains("containers/quiz/blocks/0"));

        let step = NodeId::from("containers/quiz/blocks/0/next/1");
        state.questionnaire_mut(&step).finalized = true;
        let done = rollup(&tree, &state);
        assert!(done.contains("containers/quiz/blocks/0/next/1"));
        assert!(done.contains("containers/quiz/blocks/0"));
        assert!(done.contains("unit"));
    }
}
