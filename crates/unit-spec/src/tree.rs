use thiserror::Error;

use crate::node::{ContentIndex, NodeInfo, NodeRef, resolve};
use crate::spec::{Questionnaire, Unit};
use crate::validate::{SchemaError, validate};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse unit definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A validated unit together with its node index. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ContentTree {
    unit: Unit,
    index: ContentIndex,
}

impl ContentTree {
    /// Validates `unit` and indexes its nodes. Any violation rejects the unit.
    pub fn load(unit: Unit) -> Result<Self, SchemaError> {
        let report = validate(&unit);
        if !report.valid {
            return Err(SchemaError::Rejected(report.violations));
        }
        let index = ContentIndex::build(&unit);
        Ok(Self { unit, index })
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let unit: Unit = serde_json::from_str(json)?;
        Ok(Self::load(unit)?)
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn index(&self) -> &ContentIndex {
        &self.index
    }

    pub fn info(&self, id: &str) -> Option<&NodeInfo> {
        self.index.get(id)
    }

    pub fn node(&self, id: &str) -> Option<(&NodeInfo, NodeRef<'_>)> {
        let info = self.index.get(id)?;
        let node = resolve(&self.unit, &info.address)?;
        Some((info, node))
    }

    pub fn questionnaire(&self, id: &str) -> Option<&Questionnaire> {
        self.node(id).and_then(|(_, node)| node.questionnaire())
    }

    pub fn completing_container_id(&self) -> Option<&str> {
        self.unit
            .completing_container()
            .map(|container| container.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_units_before_indexing() {
        let json = r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": []
        }"#;
        let err = ContentTree::from_json(json).expect_err("empty unit");
        match err {
            LoadError::Schema(schema) => {
                assert!(schema.violations().iter().any(|v| v.code == "empty_sequence"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_parse_errors() {
        assert!(matches!(
            ContentTree::from_json("{\"version\": 1"),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn resolves_questionnaires_by_node_id() {
        let json = r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/quiz",
                "name": { "en": "Quiz" },
                "complete": true,
                "blocks": [{
                    "type": "questionnaire",
                    "questions": [{ "definition": { "description": {}, "interactionType": "true-false" } }]
                }]
            }]
        }"#;
        let tree = ContentTree::from_json(json).expect("tree");
        assert!(tree.questionnaire("containers/quiz/blocks/0").is_some());
        assert!(tree.questionnaire("containers/quiz").is_none());
        assert_eq!(tree.completing_container_id(), Some("containers/quiz"));
    }
    #[test]
    fn loads_score_keyed_maps_inside_tagged_blocks() {
        let json = r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/quiz",
                "name": { "en": "Quiz" },
                "complete": true,
                "blocks": [{
                    "type": "questionnaire",
                    "doneCriteria": "completed",
                    "questions": [{ "definition": { "description": {}, "interactionType": "true-false" } }],
                    "next": {
                        "0": null,
                        "-2": {
                            "next": { "1": null },
                            "questions": [{ "definition": { "description": {}, "interactionType": "likert" } }]
                        }
                    },
                    "feedback": { "scoreText": { "0": { "en": "Fine" }, "10": null } }
                }]
            }]
        }"#;
        let tree = ContentTree::from_json(json).expect("tree");
        let quiz = tree.questionnaire("containers/quiz/blocks/0").expect("questionnaire");
        assert_eq!(quiz.next.keys().copied().collect::<Vec<_>>(), vec![-2, 0]);
        let step = quiz.next[&-2].as_ref().expect("step");
        assert!(step.next.contains_key(&1));
        let feedback = quiz.feedback.as_ref().expect("feedback");
        assert_eq!(feedback.score_text.keys().copied().collect::<Vec<_>>(), vec![0, 10]);
        assert!(tree.index().contains("containers/quiz/blocks/0/next/-2"));
    }

    #[test]
    fn rejects_non_numeric_thresholds() {
        let json = r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [{
                "id": "containers/quiz",
                "name": { "en": "Quiz" },
                "complete": true,
                "blocks": [{
                    "type": "questionnaire",
                    "questions": [{ "definition": { "description": {}, "interactionType": "true-false" } }],
                    "next": { "high": null }
                }]
            }]
        }"#;
        let err = ContentTree::from_json(json).expect_err("bad threshold");
        assert!(matches!(err, LoadError::Parse(_)));
        assert!(err.to_string().contains("not an integer"));
    }
}
