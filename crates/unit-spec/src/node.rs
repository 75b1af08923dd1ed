use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::spec::{
    Block, BlockKind, Button, Card, Container, Label, Path, PathContainer, Question,
    Questionnaire, Unit,
};

/// Structural id of a node in the content tree, e.g.
/// `containers/intro/blocks/2/panels/0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub const UNIT: &'static str = "unit";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn unit() -> Self {
        Self(Self::UNIT.to_string())
    }

    pub fn child(&self, segment: &Segment) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One step below a node. Paths and containers are numbered in
/// [`Unit::all_paths`] / [`Unit::all_containers`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Path(usize),
    Container(usize),
    Block(usize),
    Panel(usize),
    Tab(usize),
    Step(usize),
    Button(usize),
    Label(usize),
    Card(usize),
    Question(usize),
    Next(i64),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Path(index) => write!(f, "paths/{index}"),
            Segment::Container(index) => write!(f, "containers/{index}"),
            Segment::Block(index) => write!(f, "blocks/{index}"),
            Segment::Panel(index) => write!(f, "panels/{index}"),
            Segment::Tab(index) => write!(f, "tabs/{index}"),
            Segment::Step(index) => write!(f, "steps/{index}"),
            Segment::Button(index) => write!(f, "buttons/{index}"),
            Segment::Label(index) => write!(f, "labels/{index}"),
            Segment::Card(index) => write!(f, "cards/{index}"),
            Segment::Question(index) => write!(f, "questions/{index}"),
            Segment::Next(threshold) => write!(f, "next/{threshold}"),
        }
    }
}

/// What a node is, independent of its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "block", rename_all = "kebab-case")]
pub enum NodeKind {
    Unit,
    Path,
    Container,
    Panel,
    Tab,
    Step,
    Block(BlockKind),
    /// Questionnaire reached through a score branch.
    Branch,
    Question,
    Button,
    Label,
    Card,
}

impl NodeKind {
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Container | NodeKind::Panel | NodeKind::Tab | NodeKind::Step
        )
    }

    pub fn is_questionnaire(&self) -> bool {
        matches!(
            self,
            NodeKind::Block(BlockKind::Questionnaire) | NodeKind::Branch
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub address: Vec<Segment>,
    pub activity: Option<String>,
}

/// Borrowed view of the content behind a node id.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Unit(&'a Unit),
    Path(&'a Path),
    Container(&'a PathContainer),
    SubContainer(&'a Container),
    Block(&'a Block),
    Branch(&'a Questionnaire),
    Question(&'a Question),
    Button(&'a Button),
    Label(&'a Label),
    Card(&'a Card),
}

impl<'a> NodeRef<'a> {
    pub fn questionnaire(self) -> Option<&'a Questionnaire> {
        match self {
            NodeRef::Block(Block::Questionnaire(questionnaire)) => Some(questionnaire),
            NodeRef::Branch(questionnaire) => Some(questionnaire),
            _ => None,
        }
    }

    fn root(unit: &'a Unit, segment: &Segment) -> Option<Self> {
        match segment {
            Segment::Path(index) => unit.all_paths().nth(*index).map(NodeRef::Path),
            Segment::Container(index) => unit.all_containers().nth(*index).map(NodeRef::Container),
            _ => None,
        }
    }

    fn child(self, segment: &Segment) -> Option<Self> {
        let node = match (self, segment) {
            (NodeRef::Container(container), Segment::Block(index)) => {
                NodeRef::Block(container.blocks.get(*index)?)
            }
            (NodeRef::SubContainer(container), Segment::Block(index)) => {
                NodeRef::Block(container.blocks.get(*index)?)
            }
            (NodeRef::Block(Block::Accordion(accordion)), Segment::Panel(index)) => {
                NodeRef::SubContainer(accordion.panels.get(*index)?)
            }
            (NodeRef::Block(Block::Tabs(tabs)), Segment::Tab(index)) => {
                NodeRef::SubContainer(tabs.tabs.get(*index)?)
            }
            (NodeRef::Block(Block::Process(process)), Segment::Step(index)) => {
                NodeRef::SubContainer(process.steps.get(*index)?)
            }
            (NodeRef::Block(Block::ButtonGroup(group)), Segment::Button(index)) => {
                NodeRef::Button(group.buttons.get(*index)?)
            }
            (NodeRef::Block(Block::LabeledImage(image)), Segment::Label(index)) => {
                NodeRef::Label(image.labels.get(*index)?)
            }
            (NodeRef::Block(Block::Flashcard(flashcard)), Segment::Card(index)) => {
                NodeRef::Card(flashcard.cards.get(*index)?)
            }
            (node, Segment::Question(index)) => {
                NodeRef::Question(node.questionnaire()?.questions.get(*index)?)
            }
            (node, Segment::Next(threshold)) => {
                NodeRef::Branch(node.questionnaire()?.next.get(threshold)?.as_ref()?)
            }
            _ => return None,
        };
        Some(node)
    }
}

/// Resolves an address produced by [`ContentIndex`] against the unit.
pub fn resolve<'a>(unit: &'a Unit, address: &[Segment]) -> Option<NodeRef<'a>> {
    let Some((first, rest)) = address.split_first() else {
        return Some(NodeRef::Unit(unit));
    };
    rest.iter()
        .try_fold(NodeRef::root(unit, first)?, |node, segment| node.child(segment))
}

/// Every addressable node of a unit, keyed by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    nodes: BTreeMap<NodeId, NodeInfo>,
}

impl ContentIndex {
    pub fn build(unit: &Unit) -> Self {
        let mut index = ContentIndex::default();
        let unit_id = NodeId::unit();
        index.insert(
            unit_id.clone(),
            NodeKind::Unit,
            None,
            Vec::new(),
            Some(unit.activity.id.clone()),
        );

        let mut container_position = 0;
        for container in &unit.containers {
            index.container(container, &unit_id, container_position);
            container_position += 1;
        }
        for (path_position, path) in unit.all_paths().enumerate() {
            let path_id = NodeId::new(path.id.clone());
            index.insert(
                path_id.clone(),
                NodeKind::Path,
                Some(unit_id.clone()),
                vec![Segment::Path(path_position)],
                path.activity.as_ref().map(|activity| activity.id.clone()),
            );
            for container in &path.containers {
                index.container(container, &path_id, container_position);
                container_position += 1;
            }
        }
        index
    }

    pub fn get(&self, id: &str) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeInfo)> {
        self.nodes.iter()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors<'a>(&'a self, id: &str) -> impl Iterator<Item = (&'a NodeId, &'a NodeInfo)> {
        let mut next = self.nodes.get(id).and_then(|info| info.parent.as_ref());
        std::iter::from_fn(move || {
            let parent = next?;
            let (key, info) = self.nodes.get_key_value(parent.as_str())?;
            next = info.parent.as_ref();
            Some((key, info))
        })
    }

    fn insert(
        &mut self,
        id: NodeId,
        kind: NodeKind,
        parent: Option<NodeId>,
        address: Vec<Segment>,
        activity: Option<String>,
    ) {
        self.nodes.insert(
            id,
            NodeInfo {
                kind,
                parent,
                address,
                activity,
            },
        );
    }

    fn container(&mut self, container: &PathContainer, parent: &NodeId, position: usize) {
        let id = NodeId::new(container.id.clone());
        let address = vec![Segment::Container(position)];
        self.insert(
            id.clone(),
            NodeKind::Container,
            Some(parent.clone()),
            address.clone(),
            container.activity.as_ref().map(|activity| activity.id.clone()),
        );
        self.blocks(&container.blocks, &id, &address);
    }

    fn blocks(&mut self, blocks: &[Block], parent: &NodeId, address: &[Segment]) {
        for (position, block) in blocks.iter().enumerate() {
            let segment = Segment::Block(position);
            let id = parent.child(&segment);
            let address = extend(address, segment);
            self.insert(
                id.clone(),
                NodeKind::Block(block.kind()),
                Some(parent.clone()),
                address.clone(),
                block.activity().map(|activity| activity.id.clone()),
            );
            self.block_children(block, &id, &address);
        }
    }

    fn block_children(&mut self, block: &Block, id: &NodeId, address: &[Segment]) {
        match block {
            Block::Accordion(accordion) => {
                self.sub_containers(&accordion.panels, id, address, NodeKind::Panel, Segment::Panel)
            }
            Block::Tabs(tabs) => self.sub_containers(&tabs.tabs, id, address, NodeKind::Tab, Segment::Tab),
            Block::Process(process) => {
                self.sub_containers(&process.steps, id, address, NodeKind::Step, Segment::Step)
            }
            Block::ButtonGroup(group) => {
                self.leaves(group.buttons.len(), id, address, NodeKind::Button, Segment::Button)
            }
            Block::LabeledImage(image) => {
                self.leaves(image.labels.len(), id, address, NodeKind::Label, Segment::Label)
            }
            Block::Flashcard(flashcard) => {
                self.leaves(flashcard.cards.len(), id, address, NodeKind::Card, Segment::Card)
            }
            Block::Questionnaire(questionnaire) => self.questionnaire(questionnaire, id, address),
            Block::Audio(_) | Block::Html(_) | Block::Video(_) | Block::YouTube(_) => {}
        }
    }

    fn sub_containers(
        &mut self,
        containers: &[Container],
        parent: &NodeId,
        address: &[Segment],
        kind: NodeKind,
        segment: fn(usize) -> Segment,
    ) {
        for (position, container) in containers.iter().enumerate() {
            let segment = segment(position);
            let id = parent.child(&segment);
            let address = extend(address, segment);
            self.insert(
                id.clone(),
                kind,
                Some(parent.clone()),
                address.clone(),
                container.activity.as_ref().map(|activity| activity.id.clone()),
            );
            self.blocks(&container.blocks, &id, &address);
        }
    }

    fn leaves(
        &mut self,
        count: usize,
        parent: &NodeId,
        address: &[Segment],
        kind: NodeKind,
        segment: fn(usize) -> Segment,
    ) {
        for position in 0..count {
            let segment = segment(position);
            self.insert(
                parent.child(&segment),
                kind,
                Some(parent.clone()),
                extend(address, segment),
                None,
            );
        }
    }

    fn questionnaire(&mut self, questionnaire: &Questionnaire, id: &NodeId, address: &[Segment]) {
        for (position, question) in questionnaire.questions.iter().enumerate() {
            let segment = Segment::Question(position);
            self.insert(
                id.child(&segment),
                NodeKind::Question,
                Some(id.clone()),
                extend(address, segment),
                question.id.clone(),
            );
        }
        for (threshold, step) in &questionnaire.next {
            let Some(step) = step else {
                continue;
            };
            let segment = Segment::Next(*threshold);
            let step_id = id.child(&segment);
            let step_address = extend(address, segment);
            self.insert(
                step_id.clone(),
                NodeKind::Branch,
                Some(id.clone()),
                step_address.clone(),
                step.activity.as_ref().map(|activity| activity.id.clone()),
            );
            self.questionnaire(step, &step_id, &step_address);
        }
    }
}

fn extend(address: &[Segment], segment: Segment) -> Vec<Segment> {
    let mut address = address.to_vec();
    address.push(segment);
    address
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit() -> Unit {
        serde_json::from_value(json!({
            "version": "1.0.0",
            "activity": { "id": "https://example.com/units/weather" },
            "containers": [
                {
                    "id": "containers/intro",
                    "name": { "en": "Intro" },
                    "blocks": [
                        {
                            "type": "accordion",
                            "panels": [
                                { "name": { "en": "A" }, "blocks": [{ "type": "html", "url": "a.html" }] }
                            ]
                        },
                        {
                            "type": "questionnaire",
                            "questions": [
                                { "id": "q-1", "definition": { "description": { "en": "?" }, "interactionType": "choice" } }
                            ],
                            "next": {
                                "0": null,
                                "2": {
                                    "questions": [
                                        { "definition": { "description": { "en": "?" }, "interactionType": "likert" } }
                                    ]
                                }
                            }
                        }
                    ],
                    "completed": true
                }
            ],
            "paths": [
                {
                    "id": "paths/extra",
                    "containers": [
                        { "id": "containers/extra", "name": { "en": "Extra" }, "blocks": [{ "type": "youtube", "videoId": "abc" }] }
                    ]
                }
            ]
        }))
        .expect("unit fixture")
    }

    #[test]
    fn index_assigns_structural_ids() {
        let index = ContentIndex::build(&unit());
        let panel = index
            .get("containers/intro/blocks/0/panels/0")
            .expect("panel indexed");
        assert_eq!(panel.kind, NodeKind::Panel);
        assert!(index.contains("containers/intro/blocks/0/panels/0/blocks/0"));
        let question = index
            .get("containers/intro/blocks/1/questions/0")
            .expect("question indexed");
        assert_eq!(question.activity.as_deref(), Some("q-1"));
        assert_eq!(
            index.get("containers/intro/blocks/1/next/2").map(|info| info.kind),
            Some(NodeKind::Branch)
        );
        assert!(!index.contains("containers/intro/blocks/1/next/0"));
        assert_eq!(
            index
                .get("containers/extra")
                .and_then(|info| info.parent.clone()),
            Some(NodeId::from("paths/extra"))
        );
    }

    #[test]
    fn addresses_resolve_to_content() {
        let unit = unit();
        let index = ContentIndex::build(&unit);
        for (id, info) in index.iter() {
            assert!(resolve(&unit, &info.address).is_some(), "{id} must resolve");
        }
        let info = index.get("containers/extra/blocks/0").expect("block");
        assert!(matches!(
            resolve(&unit, &info.address),
            Some(NodeRef::Block(Block::YouTube(_)))
        ));
    }

    #[test]
    fn ancestors_walk_to_unit() {
        let index = ContentIndex::build(&unit());
        let chain: Vec<_> = index
            .ancestors("containers/intro/blocks/1/next/2/questions/0")
            .map(|(id, _)| id.as_str().to_string())
            .collect();
        assert_eq!(
            chain,
            vec![
                "containers/intro/blocks/1/next/2",
                "containers/intro/blocks/1",
                "containers/intro",
                "unit",
            ]
        );
    }
}
