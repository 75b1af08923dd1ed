use std::sync::Arc;

use unit_spec::{
    ContentTree, EngineConfig, Event, EventKind, InvalidEvent, NodeId, RecordingSink,
    UnitProgressTracker, UnitStatus, Verb,
};

const SUMMARY_UNIT: &str = include_str!("fixtures/summary_unit.json");
const ONBOARDING_UNIT: &str = include_str!("fixtures/onboarding_unit.json");

fn tracker(json: &str) -> UnitProgressTracker {
    let tree = ContentTree::from_json(json).expect("fixture unit is valid");
    UnitProgressTracker::new(Arc::new(tree), EngineConfig::default())
}

fn event(target: &str, kind: EventKind) -> Event {
    Event::new(target, 0, kind)
}

fn apply_all(tracker: &mut UnitProgressTracker, events: Vec<Event>) {
    for event in events {
        let target = event.target.clone();
        tracker
            .apply(event)
            .unwrap_or_else(|err| panic!("event on {target} rejected: {err}"));
    }
}

#[test]
fn summary_container_completes_unit() {
    let mut tracker = tracker(SUMMARY_UNIT);
    apply_all(
        &mut tracker,
        vec![
            event("containers/summary", EventKind::Visible),
            event("containers/summary/blocks/0", EventKind::Visible),
        ],
    );
    assert_eq!(tracker.status(), UnitStatus::Completed);
    assert!(tracker.is_done("containers/summary"));
    assert!(tracker.snapshot().is_done("unit"));
}

#[test]
fn container_visibility_alone_is_not_enough() {
    let mut tracker = tracker(SUMMARY_UNIT);
    apply_all(&mut tracker, vec![event("containers/summary", EventKind::Visible)]);
    assert_eq!(tracker.status(), UnitStatus::InProgress);
    assert!(!tracker.is_done("containers/summary/blocks/0"));
}

fn intro_events() -> Vec<Event> {
    vec![
        event("containers/intro", EventKind::Visible),
        event("containers/intro/blocks/0", EventKind::Visible),
        event("containers/intro/blocks/0", EventKind::PlayedToEnd),
        event("containers/intro/blocks/1/panels/2", EventKind::Opened),
        event("containers/intro/blocks/1/panels/0", EventKind::Opened),
        event("containers/intro/blocks/2", EventKind::Visible),
        event("containers/intro/blocks/2/tabs/1", EventKind::Opened),
        event("containers/intro/blocks/3/labels/1", EventKind::LabelOpened),
    ]
}

fn practice_events() -> Vec<Event> {
    vec![
        event("containers/practice", EventKind::Visible),
        event("containers/practice/blocks/0/steps/0", EventKind::Visible),
        event("containers/practice/blocks/0/steps/1", EventKind::Visible),
        event("containers/practice/blocks/0/steps/1/blocks/0/buttons/0", EventKind::ActionTaken),
        event("containers/deep-dive", EventKind::Visible),
        event("containers/deep-dive/blocks/0", EventKind::Visible),
        event("containers/practice/blocks/1/cards/0", EventKind::Opened),
        event("containers/practice/blocks/1/cards/1", EventKind::Opened),
    ]
}

fn answer(target: &str, response: &str) -> Event {
    event(
        target,
        EventKind::Answered {
            response: response.into(),
        },
    )
}

#[test]
fn intro_container_rolls_up_every_block_variant() {
    let sink = RecordingSink::new();
    let mut tracker = tracker(ONBOARDING_UNIT).with_statement_sink(sink.clone());
    let mut events = intro_events();
    let last = events.pop().expect("label event");
    apply_all(&mut tracker, events);
    for block in 0..3 {
        assert!(tracker.is_done(&format!("containers/intro/blocks/{block}")), "block {block}");
    }
    assert!(!tracker.is_done("containers/intro/blocks/1/panels/1"));
    assert!(!tracker.is_done("containers/intro"));

    let applied = tracker.apply(last).expect("label");
    assert!(applied.newly_done.contains(&NodeId::from("containers/intro")));
    assert_eq!(
        sink.count("https://example.com/units/onboarding/intro", Verb::Completed),
        1
    );
    assert_eq!(
        sink.count("https://example.com/units/onboarding/welcome-video", Verb::Completed),
        1
    );
}

#[test]
fn path_button_is_done_only_after_the_path() {
    let mut tracker = tracker(ONBOARDING_UNIT);
    let button = "containers/practice/blocks/0/steps/1/blocks/0/buttons/0";
    let mut events = practice_events();
    let rest = events.split_off(4);
    apply_all(&mut tracker, events);
    assert!(!tracker.is_done(button));
    assert!(!tracker.is_done("containers/practice/blocks/0"));

    apply_all(&mut tracker, rest);
    assert!(tracker.is_done("paths/deep-dive"));
    assert!(tracker.is_done(button));
    assert!(tracker.is_done("containers/practice/blocks/0"));
    assert!(tracker.is_done("containers/practice"));
}

#[test]
fn full_walkthrough_completes_onboarding() {
    let mut tracker = tracker(ONBOARDING_UNIT);
    apply_all(&mut tracker, intro_events());
    apply_all(&mut tracker, practice_events());
    apply_all(
        &mut tracker,
        vec![
            event("containers/check", EventKind::Visible),
            answer("containers/check/blocks/0/questions/0", "yes"),
            answer("containers/check/blocks/0/questions/1", "often"),
        ],
    );
    let check = "containers/check/blocks/0";
    assert_eq!(
        tracker.current_branch(check),
        Some(NodeId::from("containers/check/blocks/0/next/3"))
    );
    assert!(!tracker.is_done(check), "follow-up step still pending");

    apply_all(
        &mut tracker,
        vec![
            answer("containers/check/blocks/0/next/3/questions/0", "true"),
            event("containers/summary", EventKind::Visible),
        ],
    );
    assert!(tracker.is_done(check));
    assert!(tracker.review_available(check));
    assert_eq!(tracker.status(), UnitStatus::Completed);

    let feedback = tracker.feedback(check).expect("feedback shown");
    assert_eq!(feedback.score, Some(4.0));
    assert_eq!(
        feedback.text.and_then(|text| text.get("en").cloned()).as_deref(),
        Some("Talk to your manager.")
    );
}

#[test]
fn done_nodes_stay_done() {
    let mut tracker = tracker(ONBOARDING_UNIT);
    apply_all(&mut tracker, intro_events());
    let before = tracker.snapshot();
    apply_all(
        &mut tracker,
        vec![
            event("containers/intro/blocks/0", EventKind::Played),
            event("containers/intro/blocks/0", EventKind::ControlsUsed),
            event("containers/intro/blocks/1/panels/1", EventKind::Opened),
            event("containers/intro/blocks/3/labels/0", EventKind::LabelOpened),
        ],
    );
    let after = tracker.snapshot();
    for (id, node) in &before.nodes {
        if node.done {
            assert!(after.is_done(id.as_str()), "{id} reverted");
        }
    }
    assert!(after.is_done("containers/intro/blocks/1/panels/1"));
}

#[test]
fn invalid_events_leave_state_untouched() {
    let mut tracker = tracker(ONBOARDING_UNIT);
    let before = tracker.snapshot();
    assert!(matches!(
        tracker.apply(event("containers/intro/blocks/1/panels/0/blocks/0", EventKind::PlayedToEnd)),
        Err(InvalidEvent::NotApplicable { .. })
    ));
    assert!(matches!(
        tracker.apply(event("containers/missing", EventKind::Visible)),
        Err(InvalidEvent::UnknownNode(_))
    ));
    assert!(matches!(
        tracker.apply(answer("containers/check/blocks/0/next/3/questions/0", "true")),
        Err(InvalidEvent::Unreachable(_))
    ));
    assert_eq!(tracker.snapshot(), before);
    assert!(tracker.log().is_empty());
}
