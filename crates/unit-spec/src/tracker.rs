//! The unit progress tracker: single writer of the progress state.
//!
//! Every event is applied as one transition on a copy of the state. The copy
//! is rolled up, committed, and only then are notifications dispatched and
//! the event log persisted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregate::rollup;
use crate::branch::{self, FeedbackView};
use crate::config::{AbandonPolicy, EngineConfig};
use crate::events::{Event, EventKind, InvalidEvent, Timestamp};
use crate::node::{NodeId, NodeInfo, NodeKind, NodeRef, Segment};
use crate::notify::{
    NavigationDecision, NavigationSink, Notification, Outcome, StatementSink, Verb,
};
use crate::progress::{Attempt, NodeSnapshot, ProgressSnapshot, ProgressState, UnitStatus};
use crate::scoring::{self, Finalization};
use crate::spec::{Block, DoneCriteria, Questionnaire};
use crate::store::{SessionRecord, StateStore, StoreError};
use crate::tree::ContentTree;

/// Effects of one applied event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Applied {
    pub newly_done: Vec<NodeId>,
    pub notifications: Vec<Notification>,
    pub navigation: Vec<NavigationDecision>,
    /// The event changed nothing and was not logged.
    pub ignored: bool,
}

#[derive(Default)]
struct Outbox {
    notifications: Vec<Notification>,
    navigation: Vec<NavigationDecision>,
}

impl Outbox {
    fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.navigation.is_empty()
    }
}

pub struct UnitProgressTracker {
    tree: Arc<ContentTree>,
    config: EngineConfig,
    state: ProgressState,
    log: Vec<Event>,
    statements: Vec<Box<dyn StatementSink>>,
    navigation: Vec<Box<dyn NavigationSink>>,
    store: Option<Box<dyn StateStore>>,
}

impl UnitProgressTracker {
    pub fn new(tree: Arc<ContentTree>, config: EngineConfig) -> Self {
        Self {
            tree,
            config,
            state: ProgressState::default(),
            log: Vec::new(),
            statements: Vec::new(),
            navigation: Vec::new(),
            store: None,
        }
    }

    /// Rebuilds a session by replaying a stored record.
    pub fn resume(
        tree: Arc<ContentTree>,
        config: EngineConfig,
        record: &SessionRecord,
    ) -> Result<Self, StoreError> {
        let unit = tree.unit();
        if record.unit_version != unit.version || record.activity_id != unit.activity.id {
            return Err(StoreError::Mismatch {
                expected: format!("{}@{}", unit.activity.id, unit.version),
                found: format!("{}@{}", record.activity_id, record.unit_version),
            });
        }
        let mut tracker = Self::new(tree, config);
        for event in &record.events {
            if let Err(err) = tracker.apply(event.clone()) {
                warn!(node = %event.target, error = %err, "stored event no longer applies");
            }
        }
        info!(events = tracker.log.len(), status = tracker.status().as_str(), "session resumed");
        Ok(tracker)
    }

    pub fn with_statement_sink(mut self, sink: impl StatementSink + 'static) -> Self {
        self.statements.push(Box::new(sink));
        self
    }

    pub fn with_navigation_sink(mut self, sink: impl NavigationSink + 'static) -> Self {
        self.navigation.push(Box::new(sink));
        self
    }

    pub fn with_store(mut self, store: impl StateStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Events accepted so far, in application order.
    pub fn log(&self) -> &[Event] {
        &self.log
    }

    pub fn record(&self) -> SessionRecord {
        let unit = self.tree.unit();
        SessionRecord {
            unit_version: unit.version.clone(),
            activity_id: unit.activity.id.clone(),
            events: self.log.clone(),
        }
    }

    /// Applies one event. Invalid events leave the session untouched.
    pub fn apply(&mut self, event: Event) -> Result<Applied, InvalidEvent> {
        let tree = Arc::clone(&self.tree);
        let Some(info) = tree.info(event.target.as_str()) else {
            return Err(InvalidEvent::UnknownNode(event.target.clone()));
        };
        if !event.kind.applies_to(info.kind) {
            return Err(InvalidEvent::NotApplicable {
                node: event.target.clone(),
                kind: event.kind.name(),
            });
        }
        if !self.reachable(&tree, event.target.as_str()) {
            return Err(InvalidEvent::Unreachable(event.target.clone()));
        }
        if self.state.is_done(event.target.as_str()) {
            debug!(node = %event.target, kind = event.kind.name(), "event on a done node");
        }

        let mut next = self.state.clone();
        let mut outbox = Outbox::default();
        Transition {
            tree: &tree,
            config: &self.config,
            state: &mut next,
            outbox: &mut outbox,
        }
        .run(&event, info)?;

        let done = rollup(&tree, &next);
        let newly_done: Vec<NodeId> = done.difference(&next.done).cloned().collect();
        next.done = done;
        if next.is_done(NodeId::UNIT) && !next.completed {
            next.completed = true;
            info!(unit = %tree.unit().activity.id, "unit completed");
        }
        for id in &newly_done {
            if let Some(notification) = done_notification(&tree, id) {
                outbox.notifications.push(notification);
            }
        }

        if next == self.state && outbox.is_empty() {
            debug!(node = %event.target, kind = event.kind.name(), "event changed nothing");
            return Ok(Applied {
                ignored: true,
                ..Applied::default()
            });
        }

        self.state = next;
        self.log.push(event);
        self.dispatch(&outbox);
        self.persist();
        Ok(Applied {
            newly_done,
            notifications: outbox.notifications,
            navigation: outbox.navigation,
            ignored: false,
        })
    }

    /// Like [`apply`](Self::apply) but logs and drops invalid events.
    pub fn apply_lossy(&mut self, event: Event) -> Option<Applied> {
        let target = event.target.clone();
        match self.apply(event) {
            Ok(applied) => Some(applied),
            Err(err) => {
                warn!(node = %target, error = %err, "dropping invalid event");
                None
            }
        }
    }

    /// Nodes inside a branch step are reachable only once that step was
    /// selected by its questionnaire.
    fn reachable(&self, tree: &ContentTree, id: &str) -> bool {
        let ancestors = tree.index().ancestors(id).map(|(_, info)| info);
        tree.info(id).into_iter().chain(ancestors).all(|info| {
            if info.kind != NodeKind::Branch {
                return true;
            }
            let Some(Segment::Next(threshold)) = info.address.last() else {
                return false;
            };
            info.parent
                .as_ref()
                .and_then(|parent| self.state.questionnaire(parent.as_str()))
                .and_then(|progress| progress.branch)
                == Some(*threshold)
        })
    }

    fn dispatch(&mut self, outbox: &Outbox) {
        for notification in &outbox.notifications {
            for sink in &mut self.statements {
                sink.notify(notification);
            }
        }
        for decision in &outbox.navigation {
            for sink in &mut self.navigation {
                sink.navigate(decision);
            }
        }
    }

    fn persist(&mut self) {
        let Some(mut store) = self.store.take() else {
            return;
        };
        if let Err(err) = store.save(&self.record()) {
            warn!(error = %err, "failed to persist session");
        }
        self.store = Some(store);
    }

    pub fn status(&self) -> UnitStatus {
        self.state.status()
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.state.is_done(id)
    }

    pub fn node(&self, id: &str) -> Option<NodeSnapshot> {
        let info = self.tree.info(id)?;
        Some(self.node_snapshot(id, info))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status(),
            completed: self.state.completed,
            failed: self.state.failed,
            nodes: self
                .tree
                .index()
                .iter()
                .map(|(id, info)| (id.clone(), self.node_snapshot(id.as_str(), info)))
                .collect(),
        }
    }

    fn node_snapshot(&self, id: &str, info: &NodeInfo) -> NodeSnapshot {
        let progress = info
            .kind
            .is_questionnaire()
            .then(|| self.state.questionnaire(id))
            .flatten();
        NodeSnapshot {
            done: self.state.is_done(id),
            score: progress.and_then(|progress| progress.last_score),
            attempts_used: info
                .kind
                .is_questionnaire()
                .then(|| progress.map_or(0, |progress| progress.attempts_used)),
        }
    }

    /// Selected next step of a questionnaire, if one was resolved.
    pub fn current_branch(&self, questionnaire: &str) -> Option<NodeId> {
        let threshold = self.state.questionnaire(questionnaire)?.branch?;
        Some(NodeId::from(questionnaire).child(&Segment::Next(threshold)))
    }

    /// Feedback of the last finalized attempt, `None` before that or when hidden.
    pub fn feedback(&self, questionnaire: &str) -> Option<FeedbackView> {
        let definition = self.tree.questionnaire(questionnaire)?;
        let progress = self.state.questionnaire(questionnaire)?;
        if !progress.finalized {
            return None;
        }
        branch::feedback_for(definition, progress.last_score?)
    }

    /// Whether the learner may review answers: the last step of the chain
    /// allows review and is done.
    pub fn review_available(&self, questionnaire: &str) -> bool {
        let mut current = NodeId::from(questionnaire);
        while let Some(step) = self.current_branch(current.as_str()) {
            current = step;
        }
        self.tree
            .questionnaire(current.as_str())
            .is_some_and(|definition| definition.review)
            && self.state.is_done(current.as_str())
    }
}

/// Verb announcing that `id` became done, if the node is tracked.
/// Questionnaires report completion through their attempt verbs instead.
fn done_notification(tree: &ContentTree, id: &NodeId) -> Option<Notification> {
    let (info, node) = tree.node(id.as_str())?;
    let activity = info.activity.as_deref()?;
    let verb = match (info.kind, node) {
        (NodeKind::Question | NodeKind::Button | NodeKind::Label | NodeKind::Card, _) => {
            return None;
        }
        (NodeKind::Block(_) | NodeKind::Branch, node) => {
            let criteria = match node {
                NodeRef::Block(block) => block.done_criteria(),
                NodeRef::Branch(step) => step.done_criteria,
                _ => None,
            };
            let verb = match criteria {
                None | Some(DoneCriteria::Experienced) => Verb::Experienced,
                Some(DoneCriteria::Interacted) => Verb::Interacted,
                Some(DoneCriteria::Completed) => Verb::Completed,
                Some(DoneCriteria::Passed) => Verb::Passed,
            };
            if info.kind.is_questionnaire() && !matches!(verb, Verb::Experienced | Verb::Interacted) {
                return None;
            }
            verb
        }
        _ => Verb::Completed,
    };
    let notification = Notification::new(activity, id.clone(), verb);
    Some(match verb {
        Verb::Completed => notification.with_result(Outcome {
            completion: Some(true),
            ..Outcome::default()
        }),
        _ => notification,
    })
}

/// One state transition on a working copy of the progress state.
struct Transition<'t> {
    tree: &'t ContentTree,
    config: &'t EngineConfig,
    state: &'t mut ProgressState,
    outbox: &'t mut Outbox,
}

impl<'t> Transition<'t> {
    fn run(mut self, event: &Event, info: &NodeInfo) -> Result<(), InvalidEvent> {
        let expired = if self.config.enforce_time_limit_on_event {
            self.expire_overdue(event.at)
        } else {
            Vec::new()
        };
        let id = &event.target;
        match &event.kind {
            EventKind::Visible => {
                let facts = self.state.facts_mut(id);
                facts.visible_since = facts.visible_since.or(Some(event.at));
            }
            EventKind::Played => {
                let facts = self.state.facts_mut(id);
                facts.played = true;
                facts.interacted = true;
            }
            EventKind::PlayedToEnd => {
                let facts = self.state.facts_mut(id);
                facts.played = true;
                facts.ended = true;
            }
            EventKind::ControlsUsed => {
                let facts = self.state.facts_mut(id);
                facts.controls_used = true;
                facts.interacted = true;
            }
            EventKind::Opened => {
                let facts = self.state.facts_mut(id);
                facts.opened = true;
                facts.visible_since = facts.visible_since.or(Some(event.at));
                self.mark_parent_interacted(info);
            }
            EventKind::LabelOpened => {
                self.state.facts_mut(id).opened = true;
                self.mark_parent_interacted(info);
            }
            EventKind::ActionTaken => {
                self.check_single_choice(id, info)?;
                self.state.facts_mut(id).actioned = true;
                self.mark_parent_interacted(info);
            }
            EventKind::Answered { response } => {
                let Some(parent) = info.parent.as_ref() else {
                    return Err(InvalidEvent::UnknownNode(id.clone()));
                };
                if expired.contains(parent) {
                    warn!(question = %id, "answer arrived after the time limit; dropped");
                    return Ok(());
                }
                let Some(Segment::Question(position)) = info.address.last() else {
                    return Err(InvalidEvent::UnknownNode(id.clone()));
                };
                self.answer(parent, *position, id, response, event.at)?;
            }
            EventKind::Started => {
                let definition = self.definition(id)?;
                if self.state.questionnaire(id.as_str()).is_some_and(|p| p.current.is_some()) {
                    return Ok(());
                }
                self.start_attempt(id, definition, event.at)?;
            }
            EventKind::Submitted => self.finalize_running(id, Finalization::Submitted)?,
            EventKind::TimeExpired => {
                let definition = self.definition(id)?;
                if definition.time_limit.is_none() {
                    debug!(questionnaire = %id, "time-expired without a time limit");
                    return Ok(());
                }
                self.finalize_running(id, Finalization::TimeExpired)?;
            }
            EventKind::Abandoned => match self.config.abandon {
                AbandonPolicy::Discard => {
                    if let Some(progress) = self.state.questionnaires.get_mut(id.as_str())
                        && progress.current.take().is_some()
                    {
                        info!(questionnaire = %id, "attempt abandoned and discarded");
                    }
                }
                AbandonPolicy::Submit => self.finalize_running(id, Finalization::Submitted)?,
            },
        }
        Ok(())
    }

    fn definition(&self, id: &NodeId) -> Result<&'t Questionnaire, InvalidEvent> {
        self.tree
            .questionnaire(id.as_str())
            .ok_or_else(|| InvalidEvent::UnknownNode(id.clone()))
    }

    fn mark_parent_interacted(&mut self, info: &NodeInfo) {
        if let Some(parent) = &info.parent {
            self.state.facts_mut(parent).interacted = true;
        }
    }

    /// A `single` button group accepts one actioned button only.
    fn check_single_choice(&self, id: &NodeId, info: &NodeInfo) -> Result<(), InvalidEvent> {
        let Some(parent) = &info.parent else {
            return Ok(());
        };
        let Some((_, NodeRef::Block(Block::ButtonGroup(group)))) =
            self.tree.node(parent.as_str())
        else {
            return Ok(());
        };
        if !group.single {
            return Ok(());
        }
        let other_actioned = (0..group.buttons.len())
            .map(|position| parent.child(&Segment::Button(position)))
            .any(|button| button != *id && self.state.facts(button.as_str()).actioned);
        if other_actioned {
            return Err(InvalidEvent::Rejected {
                node: id.clone(),
                reason: "another button of this single-choice group was already actioned".into(),
            });
        }
        Ok(())
    }

    /// Finalizes every running attempt whose time limit has passed at `now`.
    fn expire_overdue(&mut self, now: Timestamp) -> Vec<NodeId> {
        let overdue: Vec<NodeId> = self
            .state
            .questionnaires
            .iter()
            .filter_map(|(id, progress)| {
                let attempt = progress.current.as_ref()?;
                let limit = self.tree.questionnaire(id.as_str())?.time_limit?;
                let deadline = attempt.started_at.saturating_add(limit.saturating_mul(1000));
                (now >= deadline).then(|| id.clone())
            })
            .collect();
        for id in &overdue {
            info!(questionnaire = %id, "time limit reached");
            if let Err(err) = self.finalize_running(id, Finalization::TimeExpired) {
                warn!(questionnaire = %id, error = %err, "could not expire attempt");
            }
        }
        overdue
    }

    fn can_start(&self, id: &NodeId, definition: &Questionnaire) -> Result<(), InvalidEvent> {
        let Some(progress) = self.state.questionnaire(id.as_str()) else {
            return Ok(());
        };
        let reason = if progress.exhausted {
            Some("attempts are exhausted")
        } else if definition
            .attempts
            .is_some_and(|max| progress.attempts_used >= max)
        {
            Some("no attempts left")
        } else if progress.finalized && progress.last_passed != Some(false) {
            Some("questionnaire is already finalized")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InvalidEvent::Rejected {
                node: id.clone(),
                reason: reason.into(),
            }),
            None => Ok(()),
        }
    }

    fn start_attempt(
        &mut self,
        id: &NodeId,
        definition: &Questionnaire,
        at: Timestamp,
    ) -> Result<(), InvalidEvent> {
        self.can_start(id, definition)?;
        let progress = self.state.questionnaire_mut(id);
        let number = progress.attempts_used + 1;
        let presented = scoring::select_questions(definition, self.config.seed, id.as_str(), number);
        progress.current = Some(Attempt {
            number,
            started_at: at,
            presented,
            answers: Default::default(),
        });
        debug!(questionnaire = %id, attempt = number, "attempt started");
        self.attempt_verb(id, Verb::Attempted, None);
        Ok(())
    }

    fn answer(
        &mut self,
        questionnaire: &NodeId,
        position: usize,
        question_id: &NodeId,
        response: &str,
        at: Timestamp,
    ) -> Result<(), InvalidEvent> {
        let definition = self.definition(questionnaire)?;
        let running = self
            .state
            .questionnaire(questionnaire.as_str())
            .is_some_and(|progress| progress.current.is_some());
        if !running {
            self.start_attempt(questionnaire, definition, at)?;
        }
        let Some(question) = definition.questions.get(position) else {
            return Err(InvalidEvent::UnknownNode(question_id.clone()));
        };

        let progress = self.state.questionnaire_mut(questionnaire);
        let Some(attempt) = progress.current.as_mut() else {
            return Ok(());
        };
        if !attempt.presented.contains(&position) {
            return Err(InvalidEvent::Rejected {
                node: question_id.clone(),
                reason: "question is not part of the running attempt".into(),
            });
        }
        attempt.answers.insert(position, response.to_string());
        let complete = attempt.is_complete();
        progress.answered_any = true;
        let facts = self.state.facts_mut(question_id);
        facts.answered = true;
        facts.interacted = true;

        if let Some(activity) = &question.id {
            let outcome = Outcome {
                score: Some(scoring::question_score(&question.definition, response)),
                success: scoring::is_correct(&question.definition, response),
                response: Some(response.to_string()),
                ..Outcome::default()
            };
            self.outbox.notifications.push(
                Notification::new(activity.clone(), question_id.clone(), Verb::Answered)
                    .with_result(outcome),
            );
        }

        if scoring::is_exit(&question.definition, response) {
            self.finalize_running(questionnaire, Finalization::Exited)?;
        } else if complete {
            self.finalize_running(questionnaire, Finalization::Answered)?;
        }
        Ok(())
    }

    /// Ends the running attempt of `id`; a no-op without one.
    fn finalize_running(&mut self, id: &NodeId, reason: Finalization) -> Result<(), InvalidEvent> {
        let definition = self.definition(id)?;
        let Some(attempt) = self
            .state
            .questionnaires
            .get_mut(id.as_str())
            .and_then(|progress| progress.current.take())
        else {
            return Ok(());
        };
        let result = scoring::grade(definition, &attempt, reason);
        let progress = self.state.questionnaire_mut(id);
        progress.attempts_used += 1;
        progress.last_score = Some(result.score);
        progress.finalized = true;
        progress.last_passed = result.passed;
        if result.passed == Some(true) {
            progress.passed = true;
        }
        let out_of_attempts = definition
            .attempts
            .is_some_and(|max| progress.attempts_used >= max);
        let exhausted = result.passed == Some(false) && out_of_attempts && !progress.passed;
        if exhausted {
            progress.exhausted = true;
        }
        // Every finalized attempt selects its step; a retry replaces it.
        let step = branch::resolve_next(definition, result.score).map(|(threshold, _)| threshold);
        progress.branch = step;
        let next = step.map(|threshold| id.child(&Segment::Next(threshold)));

        let unit_scoped = definition.pass_criteria.is_some_and(|criteria| criteria.unit);
        if exhausted {
            info!(questionnaire = %id, attempts = progress.attempts_used, "attempts exhausted");
            if unit_scoped && !self.state.failed {
                self.state.failed = true;
                info!(unit = %self.tree.unit().activity.id, "unit failed");
            }
        }

        let score = Some(result.score);
        if reason == Finalization::Exited {
            self.attempt_verb(id, Verb::Exited, Some(Outcome { score, ..Outcome::default() }));
        }
        let (verb, success) = match result.passed {
            Some(true) => (Verb::Passed, Some(true)),
            Some(false) => (Verb::Failed, Some(false)),
            None => (Verb::Completed, None),
        };
        self.attempt_verb(
            id,
            verb,
            Some(Outcome {
                score,
                success,
                completion: Some(true),
                ..Outcome::default()
            }),
        );

        info!(
            questionnaire = %id,
            score = result.score,
            next = next.as_ref().map(NodeId::as_str),
            "questionnaire finalized"
        );
        self.outbox.navigation.push(NavigationDecision {
            questionnaire: id.clone(),
            score: result.score,
            next,
        });
        Ok(())
    }

    /// Attempt-level verb for the questionnaire activity, repeated without a
    /// result for the unit when the pass criteria apply to the unit.
    fn attempt_verb(&mut self, id: &NodeId, verb: Verb, result: Option<Outcome>) {
        let Some(definition) = self.tree.questionnaire(id.as_str()) else {
            return;
        };
        if let Some(activity) = &definition.activity {
            let mut notification = Notification::new(activity.id.clone(), id.clone(), verb);
            notification.result = result;
            self.outbox.notifications.push(notification);
        }
        if definition.pass_criteria.is_some_and(|criteria| criteria.unit) {
            self.outbox.notifications.push(Notification::new(
                self.tree.unit().activity.id.clone(),
                NodeId::unit(),
                verb,
            ));
        }
    }
}
